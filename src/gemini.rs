use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;

macro_rules! debug_println {
    ($($arg:tt)*) => {
        if std::env::var("RARE_CHAT_DEBUG").is_ok() {
            eprintln!($($arg)*);
        }
    };
}

/// Failures the generation endpoints can report. Transport errors fold into
/// `Upstream` so callers only ever see these two kinds.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("{0}")]
    Upstream(String),
    #[error("Image data not found in API response.")]
    MissingPayload,
}

/// The generation capability the conversation controller consumes: one
/// prompt in, one reply out, no retries, no streaming. Kept behind a trait
/// so turns can be driven against a scripted stand-in.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenError>;
    async fn generate_image(&self, prompt: &str) -> Result<DynamicImage, GenError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<Instance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for Google's generative-language endpoints: Gemini for text,
/// Imagen for images.
pub struct GeminiClient {
    host: String,
    api_key: String,
    text_model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn with_config(api: ApiConfig) -> Self {
        GeminiClient {
            host: api.host,
            api_key: api.key,
            text_model: api.text_model,
            image_model: api.image_model,
            client: reqwest::Client::new(),
        }
    }

    async fn post_checked<T: Serialize>(
        &self,
        url: String,
        body: &T,
        label: &str,
    ) -> Result<reqwest::Response, GenError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GenError::Upstream(format!("{} Error: {}", label, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            // Surface the upstream-reported message when the error body
            // parses, otherwise fall back to the status line.
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(GenError::Upstream(format!("{} Error: {}", label, message)));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenError> {
        debug_println!("[Gemini] generate_text ({} chars)", prompt.len());

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.host, self.text_model, self.api_key
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.post_checked(url, &request, "Gemini API").await?;
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenError::Upstream(format!("Gemini API Error: {}", e)))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GenError::Upstream("Gemini API Error: empty response".to_string()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<DynamicImage, GenError> {
        debug_println!("[Imagen] generate_image ({} chars)", prompt.len());

        let url = format!(
            "{}/v1beta/models/{}:predict?key={}",
            self.host, self.image_model, self.api_key
        );
        let request = PredictRequest {
            instances: vec![Instance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };

        let response = self.post_checked(url, &request, "Imagen API").await?;
        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| GenError::Upstream(format!("Imagen API Error: {}", e)))?;

        let encoded = body
            .predictions
            .into_iter()
            .next()
            .and_then(|p| p.bytes_base64_encoded)
            .ok_or(GenError::MissingPayload)?;

        let bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
                .map_err(|e| GenError::Upstream(format!("Imagen API Error: {}", e)))?;
        image::load_from_memory(&bytes)
            .map_err(|e| GenError::Upstream(format!("Imagen API Error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_request_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "hello".to_string(),
                }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_image_request_shape() {
        let request = PredictRequest {
            instances: vec![Instance {
                prompt: "a red bicycle".to_string(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "instances": [{"prompt": "a red bicycle"}],
                "parameters": {"sampleCount": 1}
            })
        );
    }

    #[test]
    fn test_text_response_parses() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "the reply"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.candidates[0].content.parts[0].text, "the reply");
    }

    #[test]
    fn test_image_response_without_payload_field() {
        let body: PredictResponse = serde_json::from_str(r#"{"predictions": [{}]}"#).unwrap();
        assert!(body.predictions[0].bytes_base64_encoded.is_none());
    }

    #[test]
    fn test_error_body_parses() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error": {"message": "quota exceeded", "code": 429}}"#)
                .unwrap();
        assert_eq!(body.error.message, "quota exceeded");
    }
}
