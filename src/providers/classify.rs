//! Classification of Gemini `generateContent` responses.
//!
//! The wire format nests everything optionally: candidates may be missing,
//! a candidate may have no content, content may mix text and inline binary
//! parts, and block signals live in two different places (prompt feedback
//! for blocked prompts, the finish reason for blocked outputs). This module
//! parses that shape once and reduces it to an [`Outcome`] with exhaustive
//! matches, keeping provider parsing out of the retry policy.

use std::time::Duration;

use serde::Deserialize;

use super::payload::{ImageFormat, decode_image};
use crate::types::{Outcome, TextExpansion};

// ============================================================================
// Wire types
// ============================================================================

/// Body of a successful `generateContent` call. Field names accept both the
/// REST (camelCase) and SDK (snake_case) spellings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, alias = "prompt_feedback")]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default, alias = "finish_reason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default, alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, alias = "block_reason")]
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Finish reasons
// ============================================================================

/// Why the provider stopped producing a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    /// Stopped by a content or safety policy; carries the provider's reason.
    Policy(String),
    Other(String),
    Unspecified,
}

impl FinishReason {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") | Some("FINISH_REASON_UNSPECIFIED") => Self::Unspecified,
            Some("STOP") => Self::Stop,
            Some("MAX_TOKENS") => Self::MaxTokens,
            Some(
                reason @ ("SAFETY"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST"
                | "SPII"
                | "RECITATION"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"),
            ) => Self::Policy(reason.to_string()),
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// An image extracted from a response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

// ============================================================================
// Classification
// ============================================================================

/// Prompt-level block signal, if any.
fn prompt_block(response: &GenerateContentResponse) -> Option<String> {
    response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
        .filter(|r| !r.is_empty() && *r != "BLOCK_REASON_UNSPECIFIED")
        .map(|r| format!("prompt blocked: {r}"))
}

/// Classify a text-expansion response.
///
/// Text wins over the finish reason: a candidate cut off at the token limit
/// still yields its partial text, flagged as truncated.
pub fn classify_text(response: GenerateContentResponse, model: &str) -> Outcome<TextExpansion> {
    if let Some(reason) = prompt_block(&response) {
        return Outcome::blocked(reason);
    }
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Outcome::Empty;
    };

    let finish = FinishReason::parse(candidate.finish_reason.as_deref());
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();

    if !text.is_empty() {
        return Outcome::Success(TextExpansion {
            text: text.to_string(),
            model: model.to_string(),
            truncated: finish == FinishReason::MaxTokens,
        });
    }
    match finish {
        FinishReason::Policy(reason) => Outcome::blocked(reason),
        FinishReason::Stop
        | FinishReason::MaxTokens
        | FinishReason::Other(_)
        | FinishReason::Unspecified => Outcome::Empty,
    }
}

/// Classify an image-generation response.
///
/// The first inline part that decodes to image bytes is the result.
/// Parts that are undecodable or carry no image signature are skipped.
pub fn classify_image(response: GenerateContentResponse) -> Outcome<DecodedImage> {
    if let Some(reason) = prompt_block(&response) {
        return Outcome::blocked(reason);
    }
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Outcome::Empty;
    };

    let finish = FinishReason::parse(candidate.finish_reason.as_deref());
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    for inline in parts.into_iter().filter_map(|p| p.inline_data) {
        if let Some(bytes) = decode_image(inline.data.as_bytes()) {
            let mime_type = ImageFormat::sniff(&bytes)
                .map(|f| f.mime_type().to_string())
                .or(inline.mime_type)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return Outcome::Success(DecodedImage { bytes, mime_type });
        }
    }

    match finish {
        FinishReason::Policy(reason) => Outcome::blocked(reason),
        FinishReason::Stop
        | FinishReason::MaxTokens
        | FinishReason::Other(_)
        | FinishReason::Unspecified => Outcome::Empty,
    }
}

/// Classify a non-2xx HTTP status.
///
/// Throttling, timeouts and server errors are transient; everything else
/// (bad request, bad credentials, unknown model) needs operator action.
pub fn classify_status<T>(status: u16, body: &str, retry_after: Option<Duration>) -> Outcome<T> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let detail = envelope
        .error
        .and_then(|e| match (e.status, e.message) {
            (Some(s), Some(m)) => Some(format!("{s}: {m}")),
            (None, Some(m)) => Some(m),
            (Some(s), None) => Some(s),
            (None, None) => None,
        })
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        408 | 429 | 500..=599 => Outcome::Transient {
            message: format!("provider error ({status}): {detail}"),
            retry_after,
        },
        _ => Outcome::fatal(format!("provider rejected request ({status}): {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_success_trims() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"  a lit scene \n"}]},"finishReason":"STOP"}]}"#,
        );
        let Outcome::Success(expansion) = classify_text(response, "m") else {
            panic!("expected success");
        };
        assert_eq!(expansion.text, "a lit scene");
        assert!(!expansion.truncated);
    }

    #[test]
    fn text_max_tokens_keeps_partial() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"partial"}]},"finishReason":"MAX_TOKENS"}]}"#,
        );
        let Outcome::Success(expansion) = classify_text(response, "m") else {
            panic!("expected success");
        };
        assert!(expansion.truncated);
    }

    #[test]
    fn text_safety_finish_is_blocked() {
        let response = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert_eq!(classify_text(response, "m"), Outcome::blocked("SAFETY"));
    }

    #[test]
    fn prompt_feedback_block_wins() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"OTHER"},"candidates":[]}"#);
        assert!(matches!(
            classify_text(response, "m"),
            Outcome::SafetyBlocked { .. }
        ));
    }

    #[test]
    fn no_candidates_is_empty_not_fatal() {
        assert_eq!(classify_text(parse("{}"), "m"), Outcome::Empty);
        assert_eq!(classify_image(parse(r#"{"candidates":[]}"#)), Outcome::Empty);
    }

    #[test]
    fn image_snake_case_inline_data() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"here"},{"inline_data":{"mime_type":"image/png","data":"iVBORw0KGgo="}}]}}]}"#,
        );
        let Outcome::Success(image) = classify_image(response) else {
            panic!("expected success");
        };
        assert_eq!(image.mime_type, "image/png");
        assert!(image.bytes.starts_with(b"\x89PNG"));
    }

    #[test]
    fn image_text_only_is_empty() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"I cannot draw that"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(classify_image(response), Outcome::Empty);
    }

    #[test]
    fn image_bytes_without_signature_are_empty() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"AAAA"}}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(classify_image(response), Outcome::Empty);
    }

    #[test]
    fn image_safety_finish_is_blocked() {
        let response = parse(r#"{"candidates":[{"finishReason":"IMAGE_SAFETY"}]}"#);
        assert_eq!(classify_image(response), Outcome::blocked("IMAGE_SAFETY"));
    }

    #[test]
    fn status_classification() {
        assert!(classify_status::<()>(503, "", None).is_retryable());
        assert!(classify_status::<()>(429, "", Some(Duration::from_secs(2))).is_retryable());
        let fatal = classify_status::<()>(
            400,
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
            None,
        );
        let Outcome::Fatal { message } = fatal else {
            panic!("expected fatal");
        };
        assert!(message.contains("API key not valid"));
        assert!(matches!(
            classify_status::<()>(403, "<html>", None),
            Outcome::Fatal { .. }
        ));
    }
}
