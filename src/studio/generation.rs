use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::llm::gemini::{inline_image_part, text_part, GeminiClient, GeminiResponse};
use crate::studio::codec::{normalize_mime_type, UploadedImage};
use crate::studio::error::{StudioError, StudioResult};
use crate::studio::settings::RenderSettings;
use crate::utils::timing::log_llm_timing;

pub fn build_generation_prompt(idea: &str, settings: RenderSettings) -> String {
    let mut prompt = format!(
        "Using the provided product image as a reference for the main subject, generate a new image based on this concept: \"{idea}\"."
    );

    if !settings.style.is_default() {
        prompt.push_str(&format!(
            " The image should have a {} style.",
            settings.style.label()
        ));
    }

    prompt.push_str(&format!(
        " The image must have a {} aspect ratio.",
        settings.aspect_ratio.prompt_term()
    ));
    prompt
}

pub fn build_generation_payload(image: &UploadedImage, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), text_part(prompt)]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"]
        }
    })
}

/// The first inline image of the response as a data URI.
pub fn extract_image_data_uri(response: &GeminiResponse) -> Option<String> {
    let inline = response.first_inline_data()?;
    if inline.data.trim().is_empty() {
        return None;
    }
    Some(format!(
        "data:{};base64,{}",
        normalize_mime_type(&inline.mime_type),
        inline.data
    ))
}

/// `Ok(None)` means the model answered without an image; the caller drops
/// that idea rather than failing the batch.
pub async fn generate_shot(
    client: &GeminiClient,
    image: &UploadedImage,
    idea: &str,
    settings: RenderSettings,
) -> StudioResult<Option<String>> {
    let model = client.image_model();
    let prompt = build_generation_prompt(idea, settings);
    let payload = build_generation_payload(image, &prompt);
    let metadata = json!({
        "aspectRatio": settings.aspect_ratio.ratio(),
        "style": settings.style.label(),
    });

    let response = log_llm_timing("gemini", model, "generate_shot", Some(metadata), || {
        client.generate_content(model, payload)
    })
    .await
    .map_err(|err| {
        warn!("Error generating image for {idea:?}: {err:#}");
        StudioError::Generation {
            idea: idea.to_string(),
            source: err,
        }
    })?;

    let shot = extract_image_data_uri(&response);
    if shot.is_none() {
        debug!(
            "No image returned for {idea:?} (block_reason={:?})",
            response.block_reason()
        );
    }
    Ok(shot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::llm::gemini::tests::test_client;
    use crate::studio::codec::tests::PNG_HEADER;
    use crate::studio::settings::{AspectRatio, StylePreset};

    fn product() -> UploadedImage {
        UploadedImage::from_bytes(PNG_HEADER.to_vec(), None).unwrap()
    }

    #[test]
    fn default_style_adds_only_the_ratio_clause() {
        let prompt = build_generation_prompt("A mug on a desk", RenderSettings::default());
        assert_eq!(
            prompt,
            "Using the provided product image as a reference for the main subject, generate a new image based on this concept: \"A mug on a desk\". The image must have a square (1:1) aspect ratio."
        );
    }

    #[test]
    fn style_clause_precedes_ratio_clause() {
        let settings = RenderSettings {
            aspect_ratio: AspectRatio::Portrait,
            style: StylePreset::Vibrant,
        };
        let prompt = build_generation_prompt("A mug on a desk", settings);
        let style_at = prompt.find("vibrant style").unwrap();
        let ratio_at = prompt.find("portrait (3:4)").unwrap();
        assert!(style_at < ratio_at);

        let landscape = build_generation_prompt(
            "x",
            RenderSettings {
                aspect_ratio: AspectRatio::Landscape,
                style: StylePreset::Cinematic,
            },
        );
        assert!(landscape.ends_with("The image must have a landscape (16:9) aspect ratio."));
        assert!(landscape.contains("The image should have a cinematic style."));
    }

    #[test]
    fn extraction_returns_first_image_as_data_uri() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
            ]}}]
        }))
        .unwrap();
        assert_eq!(
            extract_image_data_uri(&response).as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn text_only_response_yields_nothing() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't draw that" }] } }]
        }))
        .unwrap();
        assert!(extract_image_data_uri(&response).is_none());
        assert!(extract_image_data_uri(&GeminiResponse::default()).is_none());
    }

    #[tokio::test]
    async fn generate_requests_image_modality() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseModalities": ["IMAGE"] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": "/9j/4AAQ" } }
                ]}}]
            })))
            .mount(&server)
            .await;

        let shot = generate_shot(
            &test_client(&server.uri()),
            &product(),
            "On a beach",
            RenderSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(shot.as_deref(), Some("data:image/jpeg;base64,/9j/4AAQ"));
    }

    #[tokio::test]
    async fn generation_failures_carry_the_idea() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = generate_shot(
            &test_client(&server.uri()),
            &product(),
            "On a beach",
            RenderSettings::default(),
        )
        .await
        .unwrap_err();
        match err {
            StudioError::Generation { idea, .. } => assert_eq!(idea, "On a beach"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
