use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::{ANALYSIS_PROMPT, IDEAS_SCHEMA_DESCRIPTION};
use crate::llm::gemini::{inline_image_part, text_part, truncate_for_log, GeminiClient};
use crate::studio::codec::UploadedImage;
use crate::studio::error::{StudioError, StudioResult};
use crate::utils::timing::log_llm_timing;

pub const MAX_IDEAS: usize = 10;

pub fn build_analysis_payload(image: &UploadedImage) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), text_part(ANALYSIS_PROMPT)]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "ideas": {
                        "type": "ARRAY",
                        "description": IDEAS_SCHEMA_DESCRIPTION,
                        "items": { "type": "STRING" }
                    }
                }
            }
        }
    })
}

/// Parses `{"ideas": [..]}` and keeps at most [`MAX_IDEAS`] entries; the model
/// is asked for ten but not trusted to stop there.
pub fn parse_ideas(raw: &str) -> StudioResult<Vec<String>> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| StudioError::ResponseFormat(format!("not JSON: {err}")))?;

    let ideas = value
        .get("ideas")
        .ok_or_else(|| StudioError::ResponseFormat("missing `ideas` field".to_string()))?
        .as_array()
        .ok_or_else(|| StudioError::ResponseFormat("`ideas` is not an array".to_string()))?;

    let mut parsed = Vec::with_capacity(ideas.len().min(MAX_IDEAS));
    for idea in ideas.iter().take(MAX_IDEAS) {
        let text = idea.as_str().ok_or_else(|| {
            StudioError::ResponseFormat(format!("non-string idea entry: {idea}"))
        })?;
        parsed.push(text.to_string());
    }

    if ideas.len() > MAX_IDEAS {
        warn!(
            "Model returned {} shot ideas; keeping the first {}",
            ideas.len(),
            MAX_IDEAS
        );
    }
    Ok(parsed)
}

pub async fn analyze_product_image(
    client: &GeminiClient,
    image: &UploadedImage,
) -> StudioResult<Vec<String>> {
    let model = client.analysis_model();
    let payload = build_analysis_payload(image);
    let metadata = json!({ "mimeType": image.mime_type(), "bytes": image.bytes().len() });

    let response = log_llm_timing("gemini", model, "analyze_product_image", Some(metadata), || {
        client.generate_content(model, payload)
    })
    .await
    .map_err(|err| {
        warn!("Error analyzing product image: {err:#}");
        StudioError::Analysis(err)
    })?;

    if let Some(reason) = response.block_reason() {
        warn!("Gemini blocked the analysis prompt: {reason}");
    }

    let text = response.text();
    let ideas = parse_ideas(&text).map_err(|err| {
        warn!(
            "Unusable analysis response: {err} (text={})",
            truncate_for_log(&text, 500)
        );
        err
    })?;
    info!("Received {} shot ideas from {}", ideas.len(), model);
    Ok(ideas)
}
