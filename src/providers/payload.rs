//! Image payload sniffing and decoding.
//!
//! Providers hand back image data in one of three shapes: raw bytes,
//! plain base64 text, or a `data:image/...;base64,` URL. [`decode_image`]
//! normalises all of them to raw bytes. Raw data is recognised by its
//! magic number; anything else is treated as (possibly wrapped) base64.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

/// Image formats accepted from providers and uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Identify a format from the leading bytes of `data`.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    /// Format for a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Normalise a provider image payload to raw bytes.
///
/// Returns `None` unless the payload, raw or base64-decoded, starts with a
/// recognised image signature.
pub fn decode_image(data: &[u8]) -> Option<Vec<u8>> {
    if ImageFormat::sniff(data).is_some() {
        return Some(data.to_vec());
    }

    let text = std::str::from_utf8(data).ok()?.trim();
    let encoded = strip_data_url(text);
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let decoded = STANDARD
        .decode(compact.as_bytes())
        .or_else(|_| URL_SAFE.decode(compact.as_bytes()))
        .ok()?;
    ImageFormat::sniff(&decoded).is_some().then_some(decoded)
}

/// Drop a `data:<mime>;base64,` header if present.
fn strip_data_url(text: &str) -> &str {
    if text.starts_with("data:") {
        text.split_once(',').map_or(text, |(_, body)| body)
    } else {
        text
    }
}
