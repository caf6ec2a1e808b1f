//! Admin image uploads.
//!
//! # Responsibility
//! - Reject unauthenticated, mistyped and oversized uploads before any I/O.
//! - Store accepted images in the remote blob store when configured, else on
//!   local disk, and return the public URL.
//!
//! # Invariants
//! - Object names are `<timestamp_ms>_<name>` with every character outside
//!   `[A-Za-z0-9.-]` replaced by `_`.
//! - The store is chosen once from configuration; a failed remote upload is
//!   reported, never retried against local disk.
//! - Local uploads are served under `/uploads`; blob uploads return the URL
//!   the blob store answered with.

use crate::config::{BlobStoreConfig, SiteConfig};
use crate::service::session::SessionGuard;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

static UNSAFE_NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9.-]").expect("valid file name regex"));

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const LOCAL_PUBLIC_PREFIX: &str = "/uploads";
const BLOB_KEY_PREFIX: &str = "uploads";

/// One uploaded file as received from the admin form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub file_name: String,
    pub source: &'static str,
}

#[derive(Debug)]
pub enum UploadError {
    Unauthorized,
    MissingFile,
    UnsupportedType(String),
    TooLarge { size: usize, max: usize },
    StorageUnavailable {
        message: String,
        needs_configuration: bool,
    },
    Storage(String),
}

impl Display for UploadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::MissingFile => write!(f, "no file provided"),
            Self::UnsupportedType(content_type) => write!(
                f,
                "invalid file type `{content_type}`; only images are allowed"
            ),
            Self::TooLarge { size, max } => write!(
                f,
                "file too large ({size} bytes); maximum size is {} MB",
                max / (1024 * 1024)
            ),
            Self::StorageUnavailable { message, .. } => {
                write!(f, "image storage unavailable: {message}")
            }
            Self::Storage(message) => write!(f, "failed to store image: {message}"),
        }
    }
}

impl Error for UploadError {}

/// Backend that persists image bytes under a name and returns a public URL.
pub trait ImageStore: Send + Sync {
    fn source(&self) -> &'static str;
    /// Prefix every URL returned by [`ImageStore::put`] starts with, when the
    /// store knows it ahead of time.
    fn public_prefix(&self) -> Option<&str>;
    fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, UploadError>;
}

/// Writes images under a public directory served at `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalDiskImageStore {
    dir: PathBuf,
}

impl LocalDiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageStore for LocalDiskImageStore {
    fn source(&self) -> &'static str {
        "filesystem"
    }

    fn public_prefix(&self) -> Option<&str> {
        Some(LOCAL_PUBLIC_PREFIX)
    }

    fn put(&self, name: &str, bytes: &[u8], _content_type: &str) -> Result<String, UploadError> {
        fs::create_dir_all(&self.dir).map_err(|err| UploadError::Storage(err.to_string()))?;
        fs::write(self.dir.join(name), bytes).map_err(|err| UploadError::Storage(err.to_string()))?;
        Ok(format!("{LOCAL_PUBLIC_PREFIX}/{name}"))
    }
}

/// Remote blob store reached over HTTP `PUT`.
pub struct HttpBlobImageStore {
    config: BlobStoreConfig,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: Option<String>,
}

impl HttpBlobImageStore {
    pub fn new(config: BlobStoreConfig, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| UploadError::StorageUnavailable {
                message: format!("blob client could not be built: {err}"),
                needs_configuration: false,
            })?;
        Ok(Self { config, client })
    }
}

impl ImageStore for HttpBlobImageStore {
    fn source(&self) -> &'static str {
        "blob"
    }

    fn public_prefix(&self) -> Option<&str> {
        self.config.public_base_url.as_deref()
    }

    fn put(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, UploadError> {
        let key = format!("{BLOB_KEY_PREFIX}/{name}");
        let response = self
            .client
            .put(format!("{}/{key}", self.config.endpoint))
            .bearer_auth(&self.config.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-content-type", content_type)
            .body(bytes.to_vec())
            .send()
            .map_err(|err| UploadError::Storage(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Storage(format!(
                "blob store answered {status}"
            )));
        }

        let returned = response
            .json::<BlobPutResponse>()
            .ok()
            .and_then(|body| body.url)
            .filter(|url| !url.trim().is_empty());
        let url = match returned {
            Some(url) => {
                if let Some(prefix) = self.public_prefix().filter(|p| !url.starts_with(*p)) {
                    warn!(
                        "event=image_upload module=service status=warn reason=unexpected_public_host expected_prefix={prefix}"
                    );
                }
                url
            }
            None => {
                let base = self.public_prefix().unwrap_or(&self.config.endpoint);
                warn!("event=image_upload module=service status=warn reason=missing_url_in_response");
                format!("{base}/{key}")
            }
        };
        Ok(url)
    }
}

/// Validates uploads and hands accepted files to one [`ImageStore`].
pub struct ImageUploader {
    store: Option<Box<dyn ImageStore>>,
    guard: Arc<dyn SessionGuard>,
}

impl ImageUploader {
    /// `store: None` means no writable image storage exists; every accepted
    /// upload then fails with `StorageUnavailable`.
    pub fn new(store: Option<Box<dyn ImageStore>>, guard: Arc<dyn SessionGuard>) -> Self {
        Self { store, guard }
    }

    pub fn from_config(
        config: &SiteConfig,
        guard: Arc<dyn SessionGuard>,
    ) -> Result<Self, UploadError> {
        let store: Option<Box<dyn ImageStore>> = match config.blob.clone() {
            Some(blob) => Some(Box::new(HttpBlobImageStore::new(
                blob,
                config.storage_timeout,
            )?)),
            None if config.read_only_fs => None,
            None => Some(Box::new(LocalDiskImageStore::new(&config.uploads_dir))),
        };
        Ok(Self::new(store, guard))
    }

    pub fn upload(
        &self,
        session: Option<&str>,
        upload: Option<&ImageUpload>,
        now_ms: i64,
    ) -> Result<StoredImage, UploadError> {
        if !self.guard.is_authorized(session) {
            warn!("event=image_upload module=service status=denied reason=unauthorized");
            return Err(UploadError::Unauthorized);
        }
        let upload = upload.ok_or(UploadError::MissingFile)?;
        validate_upload(upload)?;

        let store = self.store.as_ref().ok_or_else(|| UploadError::StorageUnavailable {
            message: "the deployment filesystem is read-only; configure BLOB_READ_WRITE_TOKEN \
                      to enable image uploads"
                .to_string(),
            needs_configuration: true,
        })?;

        let file_name = object_name(&upload.file_name, now_ms);
        let started_at = Instant::now();
        match store.put(&file_name, &upload.bytes, &upload.content_type) {
            Ok(url) => {
                info!(
                    "event=image_upload module=service status=ok source={} bytes={} duration_ms={}",
                    store.source(),
                    upload.bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(StoredImage {
                    url,
                    file_name,
                    source: store.source(),
                })
            }
            Err(err) => {
                error!(
                    "event=image_upload module=service status=error source={} error={err}",
                    store.source()
                );
                Err(err)
            }
        }
    }
}

/// Type and size checks shared by every store.
pub fn validate_upload(upload: &ImageUpload) -> Result<(), UploadError> {
    if !ALLOWED_IMAGE_TYPES.contains(&upload.content_type.as_str()) {
        return Err(UploadError::UnsupportedType(upload.content_type.clone()));
    }
    if upload.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: upload.bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// `<timestamp_ms>_<sanitized name>`.
pub fn object_name(file_name: &str, now_ms: i64) -> String {
    let sanitized = UNSAFE_NAME_CHARS_RE.replace_all(file_name, "_");
    format!("{now_ms}_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::{object_name, validate_upload, ImageUpload, UploadError, MAX_UPLOAD_BYTES};

    fn upload(content_type: &str, size: usize) -> ImageUpload {
        ImageUpload {
            file_name: "a.png".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn object_name_replaces_unsafe_characters() {
        assert_eq!(object_name("my photo (1).PNG", 42), "42_my_photo__1_.PNG");
        assert_eq!(object_name("../../etc/passwd", 1), "1_.._.._etc_passwd");
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_upload(&upload("image/png", MAX_UPLOAD_BYTES)).is_ok());
        assert!(matches!(
            validate_upload(&upload("image/png", MAX_UPLOAD_BYTES + 1)),
            Err(UploadError::TooLarge { .. })
        ));
    }

    #[test]
    fn only_image_types_pass() {
        assert!(validate_upload(&upload("image/svg+xml", 10)).is_ok());
        assert!(matches!(
            validate_upload(&upload("text/plain", 10)),
            Err(UploadError::UnsupportedType(_))
        ));
    }
}
