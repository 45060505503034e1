//! Degraded-mode placeholder images.
//!
//! When image generation keeps coming back empty, the orchestrator can
//! substitute a vertical gradient PNG sized like the requested output.
//! Results built here always carry `degraded = true` and a model name
//! suffixed with `(placeholder)`.
//!
//! The gradient depends only on the aspect ratio, so each frame is encoded
//! once per process and cloned afterwards.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;

use crate::error::{BananaError, Result};
use crate::types::{AspectRatio, GeneratedImage, ImageOptions};

const TOP: [u8; 3] = [253, 224, 71];
const BOTTOM: [u8; 3] = [255, 140, 0];

static PORTRAIT: OnceLock<Vec<u8>> = OnceLock::new();
static LANDSCAPE: OnceLock<Vec<u8>> = OnceLock::new();

/// Build a placeholder result standing in for a failed generation.
pub fn placeholder_image(
    prompt: &str,
    options: &ImageOptions,
    model: &str,
    elapsed: Duration,
) -> Result<GeneratedImage> {
    let (width, height) = options.aspect_ratio.dimensions();
    let generated_at = Utc::now();
    Ok(GeneratedImage {
        bytes: gradient_for(options.aspect_ratio)?.to_vec(),
        mime_type: "image/png".to_string(),
        seed: GeneratedImage::seed_for(prompt, generated_at),
        width,
        height,
        aspect_ratio: options.aspect_ratio,
        prompt: prompt.to_string(),
        model: format!("{model} (placeholder)"),
        generated_at,
        elapsed,
        degraded: true,
    })
}

fn gradient_for(aspect_ratio: AspectRatio) -> Result<&'static [u8]> {
    let slot = match aspect_ratio {
        AspectRatio::Portrait => &PORTRAIT,
        AspectRatio::Landscape => &LANDSCAPE,
    };
    if let Some(png) = slot.get() {
        return Ok(png);
    }
    let (width, height) = aspect_ratio.dimensions();
    let png = render_gradient_png(width, height)?;
    // A concurrent first render may win the slot; either copy is identical.
    Ok(slot.get_or_init(|| png))
}

/// Encode a `width` x `height` RGB PNG fading from yellow to orange.
pub fn render_gradient_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let mut frame = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        let pixel = gradient_at(y, height);
        for _ in 0..width {
            frame.extend_from_slice(&pixel);
        }
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_filter(png::FilterType::Sub);
    encoder.set_compression(png::Compression::Best);
    let mut writer = encoder.write_header().map_err(encode_error)?;
    writer.write_image_data(&frame).map_err(encode_error)?;
    writer.finish().map_err(encode_error)?;
    Ok(out)
}

fn encode_error(err: png::EncodingError) -> BananaError {
    BananaError::Internal(format!("placeholder encoding failed: {err}"))
}

fn gradient_at(y: u32, height: u32) -> [u8; 3] {
    let t = if height > 1 {
        y as f32 / (height - 1) as f32
    } else {
        0.0
    };
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [
        mix(TOP[0], BOTTOM[0]),
        mix(TOP[1], BOTTOM[1]),
        mix(TOP[2], BOTTOM[2]),
    ]
}
