//! Caller input validation. Every failure here is a [`BananaError::Validation`]
//! carrying a message safe to show the caller.

use crate::types::AspectRatio;
use crate::{BananaError, Result};

/// Maximum prompt length, in characters, after trimming.
pub const MAX_PROMPT_CHARS: usize = 2000;

pub const GUIDANCE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=20.0;
pub const STEPS_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Trim and check a prompt.
pub fn validate_prompt(prompt: &str) -> Result<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(BananaError::Validation("Prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(BananaError::Validation(format!(
            "Prompt exceeds maximum length of {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(prompt)
}

/// Parse an optional aspect ratio; absent means the 9:16 default.
pub fn parse_aspect_ratio(raw: Option<&str>) -> Result<AspectRatio> {
    raw.map_or(Ok(AspectRatio::default()), |s| s.parse())
}

pub fn validate_guidance(scale: f32) -> Result<f32> {
    if GUIDANCE_RANGE.contains(&scale) {
        Ok(scale)
    } else {
        Err(BananaError::Validation(
            "guidance_scale must be between 1 and 20".to_string(),
        ))
    }
}

pub fn validate_steps(steps: u32) -> Result<u32> {
    if STEPS_RANGE.contains(&steps) {
        Ok(steps)
    } else {
        Err(BananaError::Validation(
            "num_inference_steps must be between 1 and 100".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_trimmed_and_bounded() {
        assert_eq!(validate_prompt("  hi  ").unwrap(), "hi");
        assert!(validate_prompt("   ").is_err());
        let exact = "é".repeat(MAX_PROMPT_CHARS);
        assert!(validate_prompt(&exact).is_ok());
        let over = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert!(validate_prompt(&over).is_err());
    }

    #[test]
    fn aspect_ratio_defaults_to_portrait() {
        assert_eq!(parse_aspect_ratio(None).unwrap(), AspectRatio::Portrait);
        assert_eq!(
            parse_aspect_ratio(Some("16:9")).unwrap(),
            AspectRatio::Landscape
        );
        assert!(parse_aspect_ratio(Some("1:1")).is_err());
    }

    #[test]
    fn numeric_ranges_are_inclusive() {
        assert!(validate_guidance(1.0).is_ok());
        assert!(validate_guidance(20.0).is_ok());
        assert!(validate_guidance(0.5).is_err());
        assert!(validate_guidance(f32::NAN).is_err());
        assert!(validate_steps(1).is_ok());
        assert!(validate_steps(100).is_ok());
        assert!(validate_steps(0).is_err());
        assert!(validate_steps(101).is_err());
    }
}
