//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (CLI flag)
//! 2. `~/.bananaai/config.toml` (user)
//! 3. `/etc/bananaai/config.toml` (system)
//!
//! Environment variables then override individual values (see
//! [`Config::apply_env`]).
//!
//! The provider API key is a secret and loaded separately with a mandatory
//! permission check:
//! 1. `~/.bananaai/secrets.toml` (user, must be 0600 or 0400)
//! 2. `/etc/bananaai/secrets.toml` (system, same rule)
//! 3. `GEMINI_API_KEY`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::providers::RetryConfig;
use crate::providers::gemini::{DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::ratelimit::RateLimitConfig;
use crate::types::OperationClass;
use crate::{BananaError, Result};

/// Upper bound accepted for `storage.max_upload_mb`.
pub const MAX_UPLOAD_MB_LIMIT: u64 = 100;

const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Gemini endpoint and models.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// HTTP timeout per provider attempt (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// `[rate_limit]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Limit for operation classes absent from `limits` (default: 10).
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: u64,
    /// Requests per window keyed by operation class name.
    #[serde(default = "default_limits")]
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            default_limit: default_limit(),
            max_tracked_clients: default_max_tracked_clients(),
            limits: default_limits(),
        }
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_limit() -> u32 {
    10
}

fn default_max_tracked_clients() -> u64 {
    100_000
}

fn default_limits() -> HashMap<String, u32> {
    HashMap::from([
        ("assist".to_string(), 10),
        ("upload".to_string(), 5),
        ("generate".to_string(), 10),
    ])
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    100
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub placeholder_fallback: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            placeholder_fallback: true,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    /// Age after which stored files are swept (default: 24).
    #[serde(default = "default_cleanup_hours")]
    pub cleanup_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            max_upload_mb: default_max_upload_mb(),
            cleanup_hours: default_cleanup_hours(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_upload_mb() -> u64 {
    20
}

fn default_cleanup_hours() -> u64 {
    24
}

impl StorageConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn cleanup_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_hours.saturating_mul(3600))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.bananaai/config.toml`
    /// 3. `/etc/bananaai/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but an absent file yields defaults.
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path) {
            Ok(path) => Self::load_from_file(&path),
            Err(_) if explicit_path.is_none() => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BananaError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            BananaError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(BananaError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bananaai").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/bananaai/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(BananaError::Configuration(
            "No config file found. Create ~/.bananaai/config.toml or /etc/bananaai/config.toml"
                .to_string(),
        ))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Unparseable numbers are configuration
    /// errors, not silently ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        for class in OperationClass::ALL {
            let var = format!("RATE_LIMIT_{}", class.as_str().to_ascii_uppercase());
            if let Some(limit) = parse_env(&lookup, &var)? {
                self.rate_limit.limits.insert(class.as_str().to_string(), limit);
            }
        }
        if let Some(ttl) = parse_env(&lookup, "CACHE_TTL")? {
            self.cache.ttl_secs = ttl;
        }
        if let Some(size) = parse_env(&lookup, "CACHE_MAX_SIZE")? {
            self.cache.max_entries = size;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.provider.text_model = model;
        }
        if let Some(model) = lookup("BANANA_MODEL") {
            self.provider.image_model = model;
        }
        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_FOLDER") {
            self.storage.output_dir = PathBuf::from(dir);
        }
        if let Some(mb) = parse_env(&lookup, "MAX_CONTENT_MB")? {
            self.storage.max_upload_mb = mb;
        }
        if let Some(hours) = parse_env(&lookup, "FILE_CLEANUP_HOURS")? {
            self.storage.cleanup_hours = hours;
        }
        Ok(())
    }

    /// Reject values the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.storage.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(BananaError::Configuration(format!(
                "storage.max_upload_mb must not exceed {MAX_UPLOAD_MB_LIMIT} (got {})",
                self.storage.max_upload_mb
            )));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(BananaError::Configuration(
                "rate_limit.window_secs must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(BananaError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for name in self.rate_limit.limits.keys() {
            name.parse::<OperationClass>().map_err(|_| {
                BananaError::Configuration(format!("unknown operation class in rate_limit.limits: {name}"))
            })?;
        }
        Ok(())
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::new()
            .window(Duration::from_secs(self.rate_limit.window_secs))
            .default_limit(self.rate_limit.default_limit)
            .max_tracked_clients(self.rate_limit.max_tracked_clients);
        for class in OperationClass::ALL {
            config = match self.rate_limit.limits.get(class.as_str()) {
                Some(&limit) => config.limit(class, limit),
                None => config.clear_limit(class),
            };
        }
        config
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts)
            .base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .placeholder_fallback(self.retry.placeholder_fallback)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            BananaError::Configuration(format!("{name} must be a non-negative integer, got {raw:?}"))
        }),
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl std::fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySecret")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".bananaai").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/bananaai/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            BananaError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            BananaError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            BananaError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(BananaError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The Gemini API key, falling back to `GEMINI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.gemini
            .as_ref()
            .map(|s| s.api_key.clone())
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    /// Like [`api_key`](Self::api_key), but missing is an error.
    pub fn require_api_key(&self) -> Result<String> {
        self.api_key().ok_or_else(|| {
            BananaError::Configuration(format!(
                "{API_KEY_ENV} not configured (set it or add [gemini] api_key to ~/.bananaai/secrets.toml)"
            ))
        })
    }
}
