//! Content persistence core for the studio marketing site.
//! Owns storage selection, admin write authorization and page read models.

pub mod config;
pub mod db;
pub mod diagnostics;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, DatabaseLocation, SiteConfig, UnsupportedScheme};
pub use diagnostics::{migrate, storage_diagnostics, MigrationReport, StorageDiagnostics};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::blog_post::{BlogPost, BlogPostDraft, PostValidationError};
pub use repo::{ContentStore, FsContentStore, SqliteContentStore, StoreBackend, StoreError};
pub use service::content_repository::{ContentRepository, RepositoryError, RepositoryResult};
pub use service::invalidation::{CacheInvalidator, NoopInvalidator, PageCache, PagePath};
pub use service::page_data::PageData;
pub use service::session::{AdminAuthenticator, SessionError, SessionGuard, SessionKeys};
pub use service::site_content::SiteContent;
pub use service::upload::{ImageUpload, ImageUploader, StoredImage, UploadError};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
