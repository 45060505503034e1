//! Gemini `generateContent` client for prompt expansion and image synthesis.
//!
//! See: <https://ai.google.dev/api/generate-content>

use std::borrow::Cow;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use tracing::debug;

use super::classify::{GenerateContentResponse, classify_image, classify_status, classify_text};
use super::traits::{ImageProvider, TextProvider};
use crate::types::{
    ExpandOptions, GeneratedImage, ImageOptions, Outcome, ReferenceMaterial, SafetySetting,
    TextExpansion,
};
use crate::{BananaError, Result};

/// Default base URL for the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const IMAGE_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Client for the Gemini API.
///
/// One client serves both capabilities: text expansion goes to
/// `text_model`, image synthesis to `image_model`.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    http: Client,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BananaError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        })
    }

    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// POST one `generateContent` request and parse the body.
    ///
    /// Transport failures and unparseable bodies are transient; non-2xx
    /// statuses go through [`classify_status`].
    async fn call(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Outcome<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let response = match self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::transient(format!("request to {model} failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            debug!(model, status = status.as_u16(), "provider returned error status");
            return classify_status(status.as_u16(), &body, retry_after);
        }

        match response.json::<GenerateContentResponse>().await {
            Ok(parsed) => Outcome::Success(parsed),
            Err(e) => Outcome::transient(format!("unparseable response from {model}: {e}")),
        }
    }
}

#[async_trait]
impl TextProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn expand(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ExpandOptions,
    ) -> Outcome<TextExpansion> {
        let mut parts = reference_parts(&options.reference_material);
        parts.push(RequestPart::text(user_prompt));

        let request = GenerateContentRequest {
            system_instruction: (!system_prompt.is_empty()).then(|| RequestContent {
                role: None,
                parts: vec![RequestPart::text(system_prompt)],
            }),
            contents: vec![RequestContent {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
                top_p: Some(options.top_p),
                top_k: Some(options.top_k),
                candidate_count: None,
                response_modalities: None,
            },
            safety_settings: &options.safety,
        };

        let model = self.text_model.as_str();
        self.call(model, &request)
            .await
            .and_then(|response| classify_text(response, model))
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.image_model
    }

    async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
    ) -> Outcome<GeneratedImage> {
        let started = Instant::now();
        let mut parts = reference_parts(&options.reference_material);
        parts.push(RequestPart::text(prompt));

        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![RequestContent {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature(),
                max_output_tokens: IMAGE_MAX_OUTPUT_TOKENS,
                top_p: None,
                top_k: None,
                candidate_count: Some(1),
                response_modalities: Some(&["TEXT", "IMAGE"]),
            },
            safety_settings: &options.safety,
        };

        self.call(&self.image_model, &request)
            .await
            .and_then(classify_image)
            .map(|decoded| {
                let generated_at = Utc::now();
                let (width, height) = options.aspect_ratio.dimensions();
                GeneratedImage {
                    bytes: decoded.bytes,
                    mime_type: decoded.mime_type,
                    seed: GeneratedImage::seed_for(prompt, generated_at),
                    width,
                    height,
                    aspect_ratio: options.aspect_ratio,
                    prompt: prompt.to_string(),
                    model: self.image_model.clone(),
                    generated_at,
                    elapsed: started.elapsed(),
                    degraded: false,
                }
            })
    }
}

fn reference_parts(materials: &[ReferenceMaterial]) -> Vec<RequestPart<'_>> {
    materials
        .iter()
        .map(|m| RequestPart::Inline {
            inline_data: RequestInline {
                mime_type: &m.mime_type,
                data: STANDARD.encode(&m.data),
            },
        })
        .collect()
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent<'a>>,
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    safety_settings: &'a [SafetySetting],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: Cow<'a, str>,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: RequestInline<'a>,
    },
}

impl<'a> RequestPart<'a> {
    fn text(text: &'a str) -> Self {
        Self::Text {
            text: Cow::Borrowed(text),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestInline<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<&'static [&'static str]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SafetyThreshold;

    #[test]
    fn request_serializes_gemini_shape() {
        let material = ReferenceMaterial::new("image/png", vec![1, 2, 3]);
        let safety = SafetySetting::all(SafetyThreshold::BlockNone);
        let mut parts = reference_parts(std::slice::from_ref(&material));
        parts.push(RequestPart::text("a cat"));
        let request = GenerateContentRequest {
            system_instruction: Some(RequestContent {
                role: None,
                parts: vec![RequestPart::text("guide")],
            }),
            contents: vec![RequestContent {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: 0.5,
                max_output_tokens: 512,
                top_p: Some(0.95),
                top_k: Some(40),
                candidate_count: None,
                response_modalities: None,
            },
            safety_settings: &safety,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "guide");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "AQID");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "a cat");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert!(json["generationConfig"].get("candidateCount").is_none());
        assert_eq!(
            json["safetySettings"][0]["category"],
            "HARM_CATEGORY_HARASSMENT"
        );
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GeminiClient::with_base_url("k", "http://localhost:1234/").unwrap();
        assert_eq!(client.base_url, "http://localhost:1234");
    }
}
