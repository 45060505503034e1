//! Prompt templating for expansion and image synthesis.

use crate::types::AspectRatio;

/// System prompt for the expansion model.
pub const SYSTEM_GUIDE: &str = "You are a prompt expander for Banana AI image generation. \
Expand user intent into a precise, visual, and non-ambiguous instruction. \
Keep photography-aware details (lighting, lens, perspective), subject placement, style, and constraints. \
Avoid copyrighted names unless provided. Output plain text.";

/// Rule-based first pass over the user's text, refined by the model afterwards.
pub fn expand_prompt(user_text: &str, aspect_ratio: AspectRatio) -> String {
    let (width, height) = aspect_ratio.prompt_canvas();
    let hint = aspect_ratio.composition_hint();
    format!(
        "{text}\n\
         \n\
         Scene & Subject: clarify age range, pose, and facial expression; wardrobe details with textures.\n\
         Lighting: soft daylight or match source; realistic shadows and reflections.\n\
         Composition: rule of thirds; foreground/background separation. {hint}.\n\
         Technical: Aspect ratio {ar} ({width}x{height}); maintain detail; photorealistic skin; no watermark.\n\
         Context: match perspective and shadows with the original photo if provided. \
         clean background continuity; avoid artifacts or extra limbs. \
         subtle, natural color grading; avoid oversaturation\n",
        text = user_text.trim(),
        ar = aspect_ratio.as_str(),
    )
}

/// Prompt sent to the image model.
pub fn build_image_prompt(
    prompt: &str,
    negative_prompt: Option<&str>,
    aspect_ratio: AspectRatio,
) -> String {
    let format = match aspect_ratio {
        AspectRatio::Landscape => "wide landscape orientation, 16:9 aspect ratio",
        AspectRatio::Portrait => "portrait orientation, 9:16 aspect ratio",
    };
    let avoid = match negative_prompt.map(str::trim).filter(|n| !n.is_empty()) {
        Some(negative) => format!("{negative}, blurry, low quality, distorted"),
        None => "blurry, low quality, distorted, artifacts".to_string(),
    };
    format!(
        "Create a high-quality image: {prompt}. \
         Style: photorealistic, highly detailed, vibrant colors, professional lighting. \
         Format: {format}. Avoid: {avoid}"
    )
}

/// Prefix an image prompt for `references` attached reference images.
pub fn with_reference_preamble(image_prompt: String, references: usize) -> String {
    match references {
        0 => image_prompt,
        1 => format!("Based on this reference image, {image_prompt}"),
        _ => format!(
            "Based on these reference images, combine and use them as inspiration for: {image_prompt}"
        ),
    }
}
