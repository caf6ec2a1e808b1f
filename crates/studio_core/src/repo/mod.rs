//! Storage backends behind one small capability interface.
//!
//! # Responsibility
//! - Define the `ContentStore` contract shared by the primary SQLite store and
//!   the filesystem fallback store.
//! - Map backend failures into one semantic error type.
//!
//! # Invariants
//! - Absent keys/slugs are `Ok(None)`, never an error.
//! - `create_blog_post` reports `DuplicateSlug` distinctly.
//! - `update_blog_post` on a missing slug is `PostNotFound`.
//! - Returned posts carry `YYYY-MM-DD` dates and uncoerced tag lists.

use crate::db::OpenError;
use crate::model::blog_post::{BlogPost, BlogPostDraft};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod frontmatter;
pub mod fs_store;
pub mod sqlite_store;

pub use fs_store::FsContentStore;
pub use sqlite_store::SqliteContentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which backend served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Primary,
    Filesystem,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Filesystem => "filesystem",
        }
    }
}

/// Backend error for content and post persistence.
#[derive(Debug)]
pub enum StoreError {
    DuplicateSlug(String),
    PostNotFound(String),
    /// The backend cannot serve writes at all.
    Unavailable {
        message: String,
        needs_configuration: bool,
    },
    Db(OpenError),
    Io(std::io::Error),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSlug(slug) => write!(f, "blog post with slug `{slug}` already exists"),
            Self::PostNotFound(slug) => write!(f, "blog post not found: {slug}"),
            Self::Unavailable { message, .. } => write!(f, "storage unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OpenError> for StoreError {
    fn from(value: OpenError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(OpenError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Capability interface implemented by each storage backend.
///
/// Drafts passed to write methods are already validated and date-normalized
/// by the repository layer.
pub trait ContentStore: Send + Sync {
    fn backend(&self) -> StoreBackend;
    fn get_content(&self, key: &str) -> StoreResult<Option<Value>>;
    fn set_content(&self, key: &str, value: &Value) -> StoreResult<()>;
    /// Posts ordered by `date DESC`, then `created_at DESC`.
    fn list_blog_posts(&self) -> StoreResult<Vec<BlogPost>>;
    fn get_blog_post(&self, slug: &str) -> StoreResult<Option<BlogPost>>;
    fn create_blog_post(&self, draft: &BlogPostDraft) -> StoreResult<()>;
    /// Replaces every mutable field of `slug`; `draft.slug` is ignored.
    fn update_blog_post(&self, slug: &str, draft: &BlogPostDraft) -> StoreResult<()>;
    /// Removing an absent slug succeeds.
    fn delete_blog_post(&self, slug: &str) -> StoreResult<()>;
}

pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Sorts posts newest first with creation time as tie-break.
pub(crate) fn sort_posts_newest_first(posts: &mut [BlogPost]) {
    posts.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.slug.cmp(&b.slug))
    });
}
