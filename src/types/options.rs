//! Provider call options (provider-agnostic)

use serde::{Deserialize, Serialize};

use super::operation::AspectRatio;

/// Harm categories understood by the safety filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Blocking threshold for a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: SafetyThreshold,
}

impl SafetySetting {
    pub fn new(category: HarmCategory, threshold: SafetyThreshold) -> Self {
        Self {
            category,
            threshold,
        }
    }

    /// Threshold applied to all four categories.
    pub fn all(threshold: SafetyThreshold) -> Vec<Self> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| Self::new(category, threshold))
        .collect()
    }
}

/// An auxiliary input (typically a reference photo) sent alongside the prompt.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ReferenceMaterial {
    /// Upload name the material was loaded from, if any.
    pub name: Option<String>,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceMaterial {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: None,
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for ReferenceMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceMaterial")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Options for text expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    pub reference_material: Vec<ReferenceMaterial>,
    pub safety: Vec<SafetySetting>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            max_output_tokens: 512,
            top_p: 0.95,
            top_k: 40,
            reference_material: Vec::new(),
            safety: SafetySetting::all(SafetyThreshold::BlockNone),
        }
    }
}

impl ExpandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.top_p = p;
        self
    }

    pub fn top_k(mut self, k: u32) -> Self {
        self.top_k = k;
        self
    }

    pub fn reference(mut self, material: ReferenceMaterial) -> Self {
        self.reference_material.push(material);
        self
    }

    pub fn safety(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety = settings;
        self
    }
}

/// Options for image synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    pub aspect_ratio: AspectRatio,
    /// Things the image should avoid; folded into the prompt.
    pub negative_prompt: Option<String>,
    /// How closely to follow the prompt, 1–20.
    pub guidance_scale: f32,
    /// Denoising steps, 1–100. Part of the request identity even when the
    /// provider does not honour it.
    pub num_inference_steps: u32,
    pub reference_material: Vec<ReferenceMaterial>,
    pub safety: Vec<SafetySetting>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            negative_prompt: None,
            guidance_scale: 7.5,
            num_inference_steps: 20,
            reference_material: Vec::new(),
            safety: Vec::new(),
        }
    }
}

impl ImageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    pub fn guidance_scale(mut self, scale: f32) -> Self {
        self.guidance_scale = scale;
        self
    }

    pub fn num_inference_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = steps;
        self
    }

    pub fn reference(mut self, material: ReferenceMaterial) -> Self {
        self.reference_material.push(material);
        self
    }

    pub fn safety(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety = settings;
        self
    }

    /// Sampling temperature derived from the guidance scale.
    pub fn temperature(&self) -> f32 {
        (self.guidance_scale / 10.0).clamp(0.1, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_defaults_disable_blocking() {
        let options = ExpandOptions::default();
        assert_eq!(options.safety.len(), 4);
        assert!(
            options
                .safety
                .iter()
                .all(|s| s.threshold == SafetyThreshold::BlockNone)
        );
    }

    #[test]
    fn image_temperature_is_clamped() {
        assert_eq!(ImageOptions::new().guidance_scale(7.5).temperature(), 0.75);
        assert_eq!(ImageOptions::new().guidance_scale(20.0).temperature(), 1.0);
        assert_eq!(ImageOptions::new().guidance_scale(0.5).temperature(), 0.1);
    }

    #[test]
    fn safety_setting_serializes_provider_names() {
        let json = serde_json::to_value(SafetySetting::new(
            HarmCategory::HateSpeech,
            SafetyThreshold::BlockOnlyHigh,
        ))
        .unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HATE_SPEECH");
        assert_eq!(json["threshold"], "BLOCK_ONLY_HIGH");
    }
}
