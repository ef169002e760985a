use async_trait::async_trait;

use crate::llm::gemini::GeminiClient;
use crate::studio::analysis::analyze_product_image;
use crate::studio::codec::UploadedImage;
use crate::studio::error::StudioResult;
use crate::studio::generation::generate_shot;
use crate::studio::settings::RenderSettings;

/// The two remote capabilities the workflow depends on.
#[async_trait]
pub trait ShotModel: Send + Sync {
    async fn analyze(&self, image: &UploadedImage) -> StudioResult<Vec<String>>;

    async fn generate(
        &self,
        image: &UploadedImage,
        idea: &str,
        settings: RenderSettings,
    ) -> StudioResult<Option<String>>;
}

#[async_trait]
impl ShotModel for GeminiClient {
    async fn analyze(&self, image: &UploadedImage) -> StudioResult<Vec<String>> {
        analyze_product_image(self, image).await
    }

    async fn generate(
        &self,
        image: &UploadedImage,
        idea: &str,
        settings: RenderSettings,
    ) -> StudioResult<Option<String>> {
        generate_shot(self, image, idea, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::llm::gemini::tests::test_client;
    use crate::studio::codec::tests::PNG_HEADER;
    use crate::studio::settings::{AspectRatio, StylePreset};
    use crate::studio::workflow::{Studio, WorkflowState};

    const IMAGE_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

    async fn mount_gemini(server: &MockServer) {
        let ideas: Vec<String> = (1..=10).map(|i| format!("Idea {i}")).collect();
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "text": json!({ "ideas": ideas }).to_string() }
                ]}}]
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                ]}}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn every_request_in_a_batch_carries_the_same_settings() {
        let server = MockServer::start().await;
        mount_gemini(&server).await;

        let studio = Studio::new(test_client(&server.uri()));
        studio.upload(UploadedImage::from_bytes(PNG_HEADER.to_vec(), None).unwrap());
        assert_eq!(studio.analyze().await.unwrap().len(), 10);
        studio.set_aspect_ratio(AspectRatio::Portrait).unwrap();
        studio.set_style(StylePreset::Vibrant).unwrap();

        let shots = studio.generate().await.unwrap();
        assert_eq!(shots.len(), 10);

        let requests = server.received_requests().await.unwrap();
        let bodies: Vec<String> = requests
            .iter()
            .filter(|request| request.url.path() == IMAGE_PATH)
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect();
        assert_eq!(bodies.len(), 10);
        assert!(bodies
            .iter()
            .all(|body| body.contains("portrait (3:4)") && body.contains("vibrant style")));
    }

    #[tokio::test]
    async fn one_failing_idea_discards_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .and(body_string_contains("Idea 7"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_gemini(&server).await;

        let studio = Studio::new(test_client(&server.uri()));
        studio.upload(UploadedImage::from_bytes(PNG_HEADER.to_vec(), None).unwrap());
        studio.analyze().await.unwrap();
        studio.set_aspect_ratio(AspectRatio::Portrait).unwrap();
        studio.set_style(StylePreset::Vibrant).unwrap();

        assert!(studio.generate().await.is_err());
        let snapshot = studio.snapshot();
        assert_eq!(snapshot.state(), WorkflowState::Error);
        assert!(snapshot.shots().is_empty());
    }
}
