//! Upload and output file handling.
//!
//! [`UploadStore`] validates and stores caller uploads and reads them back
//! as reference material. [`OutputStore`] writes generated images. Both can
//! sweep files older than a cutoff.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::providers::ImageFormat;
use crate::types::{AspectRatio, GeneratedImage, ReferenceMaterial};
use crate::{BananaError, Result};

/// Upload extensions accepted (lower-case, without the dot).
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

const MAX_STEM_CHARS: usize = 50;
const MAX_PROMPT_SLUG_CHARS: usize = 30;
const MAX_NAME_CLASHES: u32 = 100;

/// A file written by one of the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    /// Path under which the outer HTTP layer serves the file.
    pub url: String,
    pub size: u64,
}

// ============================================================================
// Naming
// ============================================================================

/// Make a caller-supplied filename safe to store.
///
/// Keeps only the final path component, replaces anything outside
/// `[A-Za-z0-9._-]` with `_`, cuts the stem to 50 characters and prefixes a
/// `YYYYmmdd_HHMMSS_` timestamp.
pub fn sanitize_filename(filename: &str, now: DateTime<Local>) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let (stem, ext) = match cleaned.rfind('.') {
        Some(idx) if idx > 0 => cleaned.split_at(idx),
        _ => (cleaned.as_str(), ""),
    };
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    format!("{}_{stem}{ext}", now.format("%Y%m%d_%H%M%S"))
}

/// Filename for a generated image:
/// `<YYYYmmdd_HHMMSS>_<prompt slug>_<9x16|16x9>.<ext>`.
pub fn output_filename(
    prompt: &str,
    aspect_ratio: AspectRatio,
    extension: &str,
    now: DateTime<Local>,
) -> String {
    let kept: String = prompt
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let slug: String = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_PROMPT_SLUG_CHARS)
        .collect();
    format!(
        "{}_{slug}_{}.{extension}",
        now.format("%Y%m%d_%H%M%S"),
        aspect_ratio.file_suffix()
    )
}

fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

// ============================================================================
// Uploads
// ============================================================================

/// Directory of caller uploads.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check name, size and content of an upload.
    ///
    /// The extension must be allowed and the bytes must carry a known image
    /// magic number; the two are not required to agree.
    pub fn validate(&self, filename: &str, data: &[u8]) -> Result<ImageFormat> {
        if filename.trim().is_empty() {
            return Err(BananaError::Validation("No file selected".to_string()));
        }
        if data.is_empty() {
            return Err(BananaError::Validation("No file provided".to_string()));
        }
        let allowed = extension_of(filename)
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            return Err(BananaError::Validation(format!(
                "Invalid file type. Allowed types: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        if data.len() as u64 > self.max_bytes {
            return Err(BananaError::Validation(format!(
                "File exceeds maximum size of {} MB",
                self.max_bytes / (1024 * 1024)
            )));
        }
        ImageFormat::sniff(data)
            .ok_or_else(|| BananaError::Validation("Invalid image file".to_string()))
    }

    /// Validate and store an upload under a sanitized, timestamped name.
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<StoredFile> {
        self.validate(filename, data)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let (stored_name, path) =
            write_new(&self.dir, &sanitize_filename(filename, Local::now()), data).await?;
        info!(filename = %stored_name, size = data.len(), "upload stored");

        Ok(StoredFile {
            url: format!("/uploads/{stored_name}"),
            filename: stored_name,
            path,
            size: data.len() as u64,
        })
    }

    /// Read one stored upload as reference material.
    ///
    /// Only the final path component of `name` is used. Returns `Ok(None)`
    /// when no such file exists.
    pub async fn load_reference(&self, name: &str) -> Result<Option<ReferenceMaterial>> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
        if base.is_empty() || base == "." || base == ".." {
            return Ok(None);
        }
        let path = self.dir.join(base);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mime_type = ImageFormat::sniff(&data)
            .or_else(|| extension_of(base).and_then(|ext| ImageFormat::from_extension(&ext)))
            .map_or("application/octet-stream", |f| f.mime_type());
        Ok(Some(
            ReferenceMaterial::new(mime_type, data).named(base.to_string()),
        ))
    }

    /// Load every named reference, skipping (and logging) ones that are
    /// missing or unreadable.
    pub async fn load_references(&self, names: &[String]) -> Vec<ReferenceMaterial> {
        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            match self.load_reference(name).await {
                Ok(Some(material)) => {
                    debug!(reference = %name, "using reference image");
                    loaded.push(material);
                }
                Ok(None) => warn!(reference = %name, "reference image not found"),
                Err(e) => warn!(reference = %name, error = %e, "failed to read reference image"),
            }
        }
        loaded
    }

    /// Delete uploads older than `max_age`. Returns the number removed.
    pub async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        cleanup_dir(&self.dir, max_age).await
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Directory of generated images.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a generated image, named after `prompt`.
    pub async fn save(&self, prompt: &str, image: &GeneratedImage) -> Result<StoredFile> {
        if image.bytes.is_empty() {
            return Err(BananaError::Internal("generated image has no data".to_string()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let extension = ImageFormat::sniff(&image.bytes).map_or("png", |f| f.extension());
        let name = output_filename(prompt, image.aspect_ratio, extension, Local::now());
        let (filename, path) = write_new(&self.dir, &name, &image.bytes).await?;
        info!(filename = %filename, degraded = image.degraded, "generated image saved");

        Ok(StoredFile {
            url: format!("/output/{filename}"),
            filename,
            path,
            size: image.bytes.len() as u64,
        })
    }

    pub async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        cleanup_dir(&self.dir, max_age).await
    }
}

/// Create `name` in `dir` without replacing an existing file.
///
/// On a clash a `-1`, `-2`, ... suffix goes before the extension. Returns the
/// name actually written and its path.
async fn write_new(dir: &Path, name: &str, data: &[u8]) -> Result<(String, PathBuf)> {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    for n in 0..MAX_NAME_CLASHES {
        let candidate = if n == 0 {
            name.to_string()
        } else {
            format!("{stem}-{n}{ext}")
        };
        let path = dir.join(&candidate);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(data).await?;
                file.flush().await?;
                return Ok((candidate, path));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(file = %candidate, "name taken, trying next suffix");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(BananaError::Internal(format!("no free file name for {name}")))
}

/// Remove regular files in `dir` last modified more than `max_age` ago.
///
/// A missing directory counts as empty. Per-file failures are logged and
/// skipped.
pub async fn cleanup_dir(dir: &Path, max_age: Duration) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = ?entry.path(), error = %e, "cannot stat file during cleanup");
                continue;
            }
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified < cutoff {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    info!(file = ?entry.file_name(), "deleted old file");
                    removed += 1;
                }
                Err(e) => warn!(path = ?entry.path(), error = %e, "failed to delete old file"),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(
            sanitize_filename("../../etc/my photo (1).PNG", at()),
            "20250304_050607_my_photo__1_.PNG"
        );
        assert_eq!(
            sanitize_filename(r"C:\Users\x\cat.jpg", at()),
            "20250304_050607_cat.jpg"
        );
    }

    #[test]
    fn sanitize_truncates_stem_only() {
        let long = format!("{}.webp", "a".repeat(80));
        let name = sanitize_filename(&long, at());
        assert_eq!(name, format!("20250304_050607_{}.webp", "a".repeat(50)));
    }

    #[test]
    fn output_name_slugs_prompt() {
        let name = output_filename(
            "  A cat, on a roof!  at night ",
            AspectRatio::Landscape,
            "png",
            at(),
        );
        assert_eq!(name, "20250304_050607_A_cat_on_a_roof_at_night_16x9.png");

        let long = output_filename(&"word ".repeat(20), AspectRatio::Portrait, "jpg", at());
        assert_eq!(
            long,
            "20250304_050607_word_word_word_word_word_word__9x16.jpg"
        );
    }

    #[test]
    fn validate_rejects_bad_uploads() {
        let store = UploadStore::new("unused", 16);
        let png = b"\x89PNG\r\n\x1a\n0000";
        assert_eq!(store.validate("a.png", png).unwrap(), ImageFormat::Png);
        assert!(store.validate("a.exe", png).is_err());
        assert!(store.validate("noext", png).is_err());
        assert!(store.validate("a.png", b"plain text").is_err());
        assert!(store.validate("a.png", &[0x89; 17]).is_err());
        assert!(store.validate("", png).is_err());
    }
}
