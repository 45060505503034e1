//! Identity types used for admission control.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{BananaError, Result};

/// Rate-limited operation kinds. Each class has its own window per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    /// Prompt expansion.
    Assist,
    /// Reference-image upload.
    Upload,
    /// Image synthesis.
    Generate,
}

impl OperationClass {
    pub const ALL: [OperationClass; 3] = [Self::Assist, Self::Upload, Self::Generate];

    /// Stable lowercase name, used for metric labels and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assist => "assist",
            Self::Upload => "upload",
            Self::Generate => "generate",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationClass {
    type Err = BananaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assist" => Ok(Self::Assist),
            "upload" => Ok(Self::Upload),
            "generate" => Ok(Self::Generate),
            other => Err(BananaError::Validation(format!(
                "unknown operation class '{other}'"
            ))),
        }
    }
}

/// Identifier of the calling party, opaque to the governance core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ClientKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

/// Output framing for generated images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 9:16, the default.
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    /// 16:9.
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
        }
    }

    /// Pixel dimensions reported for generated images: `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Portrait => (1080, 1920),
            Self::Landscape => (1920, 1080),
        }
    }

    /// Canvas size quoted to the model in expansion prompts.
    pub fn prompt_canvas(&self) -> (u32, u32) {
        match self {
            Self::Portrait => (1024, 1820),
            Self::Landscape => (1820, 1024),
        }
    }

    pub fn composition_hint(&self) -> &'static str {
        match self {
            Self::Portrait => "Vertical composition ideal for portraits and mobile content",
            Self::Landscape => "Horizontal composition ideal for landscapes and cinematic shots",
        }
    }

    pub fn orientation(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }

    /// Filename-safe form: `9x16` / `16x9`.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Portrait => "9x16",
            Self::Landscape => "16x9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = BananaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "9:16" => Ok(Self::Portrait),
            "16:9" => Ok(Self::Landscape),
            _ => Err(BananaError::Validation(
                "Invalid aspect ratio. Must be '9:16' or '16:9'".to_string(),
            )),
        }
    }
}
