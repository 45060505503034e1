//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::service::Gateway;
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Config;
use crate::providers::{GeminiClient, ImageProvider, RetryConfig, RetryOrchestrator, TextProvider};
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::storage::UploadStore;
use crate::types::ExpandOptions;
use crate::{BananaError, Result};

impl Gateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct GatewayBuilder {
    text: Option<Arc<dyn TextProvider>>,
    image: Option<Arc<dyn ImageProvider>>,
    rate_limit: RateLimitConfig,
    cache: CacheConfig,
    retry: RetryConfig,
    expand_options: ExpandOptions,
    uploads: Option<UploadStore>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            text: None,
            image: None,
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            expand_options: ExpandOptions::default(),
            uploads: None,
        }
    }

    /// Builder populated from a loaded [`Config`] and the Gemini API key.
    pub fn from_config(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let client = GeminiClient::with_timeout(
            api_key,
            &config.provider.base_url,
            Duration::from_secs(config.provider.timeout_secs),
        )?
        .text_model(&config.provider.text_model)
        .image_model(&config.provider.image_model);

        Ok(Self::new()
            .gemini(client)
            .rate_limit(config.rate_limit_config())
            .cache(config.cache_config())
            .retry(config.retry_config())
            .uploads(UploadStore::new(
                &config.storage.upload_dir,
                config.storage.max_upload_bytes(),
            )))
    }

    /// Use one Gemini client for both text and images.
    pub fn gemini(self, client: GeminiClient) -> Self {
        let client = Arc::new(client);
        self.text_provider(client.clone()).image_provider(client)
    }

    pub fn text_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.text = Some(provider);
        self
    }

    pub fn image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image = Some(provider);
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Sampling and safety options for prompt expansion.
    pub fn expand_options(mut self, options: ExpandOptions) -> Self {
        self.expand_options = options;
        self
    }

    /// Directory that uploads are stored in and references loaded from.
    pub fn uploads(mut self, store: UploadStore) -> Self {
        self.uploads = Some(store);
        self
    }

    /// Build the gateway. Both providers must be configured.
    pub fn build(self) -> Result<Gateway> {
        let text = self.text.ok_or_else(|| {
            BananaError::Configuration("no text provider configured".to_string())
        })?;
        let image = self.image.ok_or_else(|| {
            BananaError::Configuration("no image provider configured".to_string())
        })?;
        if self.rate_limit.window.is_zero() {
            return Err(BananaError::Configuration(
                "rate limit window must be positive".to_string(),
            ));
        }

        Ok(Gateway::new(
            RateLimiter::new(self.rate_limit),
            ResponseCache::new(&self.cache),
            RetryOrchestrator::new(text, image, self.retry),
            self.expand_options,
            self.uploads,
        ))
    }
}
