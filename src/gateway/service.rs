//! The request-governance pipeline: admission, cache, orchestrated call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompt::{SYSTEM_GUIDE, build_image_prompt, expand_prompt, with_reference_preamble};
use super::validation::{parse_aspect_ratio, validate_guidance, validate_prompt, validate_steps};
use crate::cache::{CacheKey, ResponseCache};
use crate::providers::RetryOrchestrator;
use crate::ratelimit::{Admission, RateLimiter};
use crate::storage::{StoredFile, UploadStore};
use crate::telemetry;
use crate::types::{
    AspectRatio, ClientKey, ExpandOptions, GeneratedImage, ImageOptions, OperationClass,
    ReferenceMaterial, TextExpansion,
};
use crate::{BananaError, Result};

/// Prompt expansion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistRequest {
    pub prompt: String,
    /// `"9:16"` (default) or `"16:9"`.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

impl AssistRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: None,
        }
    }

    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistResponse {
    pub expanded: String,
    pub model: String,
    pub truncated: bool,
    pub cached: bool,
}

/// Image generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,
    /// Names of earlier uploads to use as reference images.
    #[serde(default)]
    pub reference_images: Vec<String>,
}

fn default_guidance_scale() -> f32 {
    7.5
}

fn default_steps() -> u32 {
    20
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: None,
            negative_prompt: None,
            guidance_scale: default_guidance_scale(),
            num_inference_steps: default_steps(),
            reference_images: Vec::new(),
        }
    }

    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
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

    pub fn reference_image(mut self, name: impl Into<String>) -> Self {
        self.reference_images.push(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub image: Arc<GeneratedImage>,
    /// Reference images actually found and sent.
    pub references_used: usize,
    pub cached: bool,
}

/// Value stored in the response cache.
#[derive(Debug, Clone)]
pub enum CachedResponse {
    Expansion(TextExpansion),
    Image(Arc<GeneratedImage>),
}

/// Composes rate limiter, response cache and retry orchestrator.
///
/// All state is process-local; nothing survives a restart.
pub struct Gateway {
    limiter: RateLimiter,
    cache: ResponseCache<CachedResponse>,
    orchestrator: RetryOrchestrator,
    expand_options: ExpandOptions,
    uploads: Option<UploadStore>,
}

impl Gateway {
    pub(crate) fn new(
        limiter: RateLimiter,
        cache: ResponseCache<CachedResponse>,
        orchestrator: RetryOrchestrator,
        expand_options: ExpandOptions,
        uploads: Option<UploadStore>,
    ) -> Self {
        Self {
            limiter,
            cache,
            orchestrator,
            expand_options,
            uploads,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &ResponseCache<CachedResponse> {
        &self.cache
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    pub fn uploads(&self) -> Option<&UploadStore> {
        self.uploads.as_ref()
    }

    /// Admission only, for routes that do not call the provider.
    pub fn admit(&self, client: &ClientKey, class: OperationClass) -> Result<()> {
        match self.limiter.check_and_record(client, class) {
            Admission::Allowed => Ok(()),
            Admission::Denied { retry_after } => {
                debug!(client = %client, operation = %class, ?retry_after, "request denied");
                Err(BananaError::RateLimited { retry_after })
            }
        }
    }

    /// Expand a prompt for image generation.
    pub async fn assist(&self, client: &ClientKey, request: AssistRequest) -> Result<AssistResponse> {
        self.admit(client, OperationClass::Assist)?;
        let result = self.assist_admitted(request).await;
        record_request(OperationClass::Assist, &result);
        result
    }

    async fn assist_admitted(&self, request: AssistRequest) -> Result<AssistResponse> {
        let prompt = validate_prompt(&request.prompt)?;
        let aspect_ratio = parse_aspect_ratio(request.aspect_ratio.as_deref())?;

        let key = CacheKey::builder(OperationClass::Assist.as_str())
            .text(prompt)
            .text(aspect_ratio.as_str())
            .finish();
        if let Some(CachedResponse::Expansion(hit)) = self.lookup(OperationClass::Assist, &key) {
            debug!("returning cached prompt expansion");
            return Ok(AssistResponse {
                expanded: hit.text,
                model: hit.model,
                truncated: hit.truncated,
                cached: true,
            });
        }

        let local = expand_prompt(prompt, aspect_ratio);
        let expansion = self
            .orchestrator
            .expand(SYSTEM_GUIDE, &local, &self.expand_options)
            .await
            .into_result()?;

        self.cache
            .insert(key, CachedResponse::Expansion(expansion.clone()));
        info!(model = %expansion.model, truncated = expansion.truncated, "prompt expanded");
        Ok(AssistResponse {
            expanded: expansion.text,
            model: expansion.model,
            truncated: expansion.truncated,
            cached: false,
        })
    }

    /// Generate an image.
    ///
    /// Degraded placeholder results are returned but never cached.
    pub async fn generate(
        &self,
        client: &ClientKey,
        request: GenerateRequest,
    ) -> Result<GenerateResponse> {
        self.admit(client, OperationClass::Generate)?;
        let result = self.generate_admitted(request).await;
        record_request(OperationClass::Generate, &result);
        result
    }

    async fn generate_admitted(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let prompt = validate_prompt(&request.prompt)?;
        let aspect_ratio = parse_aspect_ratio(request.aspect_ratio.as_deref())?;
        let guidance = validate_guidance(request.guidance_scale)?;
        let steps = validate_steps(request.num_inference_steps)?;
        let negative = request
            .negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let references = match (&self.uploads, request.reference_images.is_empty()) {
            (_, true) => Vec::new(),
            (Some(store), false) => store.load_references(&request.reference_images).await,
            (None, false) => {
                return Err(BananaError::Configuration(
                    "reference images requested but no upload directory is configured".to_string(),
                ));
            }
        };

        let mut key = CacheKey::builder(OperationClass::Generate.as_str())
            .text(prompt)
            .text(aspect_ratio.as_str())
            .optional_text(negative)
            .float(guidance)
            .number(u64::from(steps))
            .number(references.len() as u64);
        for reference in &references {
            key = key.text(&reference.mime_type).bytes(&reference.data);
        }
        let key = key.finish();

        if let Some(CachedResponse::Image(hit)) = self.lookup(OperationClass::Generate, &key) {
            debug!("returning cached image");
            return Ok(GenerateResponse {
                image: hit,
                references_used: references.len(),
                cached: true,
            });
        }

        let references_used = references.len();
        let options = image_options(aspect_ratio, negative, guidance, steps, references);
        let image_prompt = with_reference_preamble(
            build_image_prompt(prompt, negative, aspect_ratio),
            references_used,
        );

        let mut image = self
            .orchestrator
            .generate_image(&image_prompt, &options)
            .await
            .into_result()?;
        image.prompt = prompt.to_string();
        let image = Arc::new(image);

        if !image.degraded {
            self.cache.insert(key, CachedResponse::Image(Arc::clone(&image)));
        }
        info!(
            model = %image.model,
            degraded = image.degraded,
            elapsed_ms = image.elapsed.as_millis() as u64,
            "image generated"
        );
        Ok(GenerateResponse {
            image,
            references_used,
            cached: false,
        })
    }

    /// Admit and store an upload.
    pub async fn upload(&self, client: &ClientKey, filename: &str, data: &[u8]) -> Result<StoredFile> {
        self.admit(client, OperationClass::Upload)?;
        let result = match &self.uploads {
            Some(store) => store.save(filename, data).await,
            None => Err(BananaError::Configuration(
                "no upload directory configured".to_string(),
            )),
        };
        record_request(OperationClass::Upload, &result);
        result
    }

    fn lookup(&self, class: OperationClass, key: &CacheKey) -> Option<CachedResponse> {
        let hit = self.cache.get(key);
        let metric = if hit.is_some() {
            telemetry::CACHE_HITS_TOTAL
        } else {
            telemetry::CACHE_MISSES_TOTAL
        };
        metrics::counter!(metric, "operation" => class.as_str()).increment(1);
        hit
    }
}

fn image_options(
    aspect_ratio: AspectRatio,
    negative: Option<&str>,
    guidance: f32,
    steps: u32,
    references: Vec<ReferenceMaterial>,
) -> ImageOptions {
    let mut options = ImageOptions::new()
        .aspect_ratio(aspect_ratio)
        .guidance_scale(guidance)
        .num_inference_steps(steps);
    if let Some(negative) = negative {
        options = options.negative_prompt(negative);
    }
    options.reference_material = references;
    options
}

fn record_request<T>(class: OperationClass, result: &Result<T>) {
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "operation" => class.as_str(),
        "status" => status,
    )
    .increment(1);
}
