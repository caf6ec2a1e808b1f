//! Content repository facade.
//!
//! # Responsibility
//! - Choose the storage backend once, from configuration.
//! - Gate every write on the session guard, validate input, persist, then
//!   request cache invalidation.
//! - Collapse backend failures into the repository error taxonomy.
//!
//! # Invariants
//! - When a primary store is configured it serves every call; the fallback
//!   store is never consulted, not even for reads of absent keys.
//! - Unauthorized and invalid writes are rejected before any storage I/O.
//! - Invalidation runs only after the store reported success.

use crate::config::SiteConfig;
use crate::model::blog_post::{
    slug_from_title, validate_slug, BlogPost, BlogPostDraft, PostValidationError,
};
use crate::model::content::{normalize_content_key, InvalidContentKey, KEY_SITE_CONTENT};
use crate::repo::{
    now_epoch_ms, ContentStore, FsContentStore, SqliteContentStore, StoreBackend, StoreError,
};
use crate::service::invalidation::{CacheInvalidator, ContentChange};
use crate::service::session::SessionGuard;
use crate::service::site_content::SiteContent;
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Caller-facing error taxonomy for content and post operations.
#[derive(Debug)]
pub enum RepositoryError {
    /// No valid admin session; nothing was read or written.
    Unauthorized,
    /// Input rejected before storage I/O.
    Validation(String),
    DuplicateSlug(String),
    PostNotFound(String),
    /// No usable backend for this call.
    StorageUnavailable {
        message: String,
        needs_configuration: bool,
    },
    /// Any other backend failure.
    Storage(StoreError),
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::DuplicateSlug(slug) => write!(f, "a blog post with slug `{slug}` already exists"),
            Self::PostNotFound(slug) => write!(f, "blog post not found: {slug}"),
            Self::StorageUnavailable {
                message,
                needs_configuration,
            } => {
                if *needs_configuration {
                    write!(f, "storage needs configuration: {message}")
                } else {
                    write!(f, "storage temporarily unavailable: {message}")
                }
            }
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for RepositoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepositoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateSlug(slug) => Self::DuplicateSlug(slug),
            StoreError::PostNotFound(slug) => Self::PostNotFound(slug),
            StoreError::Unavailable {
                message,
                needs_configuration,
            } => Self::StorageUnavailable {
                message,
                needs_configuration,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<PostValidationError> for RepositoryError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<InvalidContentKey> for RepositoryError {
    fn from(value: InvalidContentKey) -> Self {
        Self::Validation(value.to_string())
    }
}

/// Opens the backend the configuration selects.
///
/// A configured primary store that fails to open is reported as transiently
/// unavailable; it never falls through to the filesystem.
pub fn select_store(config: &SiteConfig) -> RepositoryResult<Box<dyn ContentStore>> {
    if let Some(database) = config.database.as_ref() {
        return match SqliteContentStore::open(&database.location, config.storage_timeout) {
            Ok(store) => {
                info!(
                    "event=store_select module=service status=ok backend=primary source_var={}",
                    database.source_var
                );
                Ok(Box::new(store))
            }
            Err(err) => {
                error!(
                    "event=store_select module=service status=error backend=primary source_var={} error={err}",
                    database.source_var
                );
                Err(RepositoryError::StorageUnavailable {
                    message: format!("primary store could not be opened: {err}"),
                    needs_configuration: false,
                })
            }
        };
    }

    let store = if config.read_only_fs {
        warn!("event=store_select module=service status=ok backend=filesystem read_only=true");
        FsContentStore::read_only(&config.content_dir)
    } else {
        info!("event=store_select module=service status=ok backend=filesystem read_only=false");
        FsContentStore::new(&config.content_dir)
    };
    Ok(Box::new(store))
}

/// Read/write facade over the selected [`ContentStore`].
pub struct ContentRepository {
    store: Box<dyn ContentStore>,
    guard: Arc<dyn SessionGuard>,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl ContentRepository {
    pub fn new(
        store: Box<dyn ContentStore>,
        guard: Arc<dyn SessionGuard>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            guard,
            invalidator,
        }
    }

    pub fn from_config(
        config: &SiteConfig,
        guard: Arc<dyn SessionGuard>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> RepositoryResult<Self> {
        Ok(Self::new(select_store(config)?, guard, invalidator))
    }

    pub fn backend(&self) -> StoreBackend {
        self.store.backend()
    }

    /// Reads one content slot; an absent slot is `Ok(None)`.
    pub fn read(&self, key: &str) -> RepositoryResult<Option<Value>> {
        let key = normalize_content_key(key)?;
        self.store.get_content(&key).map_err(|err| {
            self.log_failure("content_read", &key, &err);
            err.into()
        })
    }

    /// Replaces one content slot with `value`.
    pub fn write(&self, session: Option<&str>, key: &str, value: &Value) -> RepositoryResult<()> {
        self.authorize(session, "content_write")?;
        let key = normalize_content_key(key)?;

        let started_at = Instant::now();
        if let Err(err) = self.store.set_content(&key, value) {
            self.log_failure("content_write", &key, &err);
            return Err(err.into());
        }
        info!(
            "event=content_write module=service status=ok backend={} key={key} duration_ms={}",
            self.backend().as_str(),
            started_at.elapsed().as_millis()
        );

        self.invalidate(ContentChange::Content(key));
        Ok(())
    }

    /// Posts ordered newest first.
    pub fn list_posts(&self) -> RepositoryResult<Vec<BlogPost>> {
        self.store.list_blog_posts().map_err(|err| {
            self.log_failure("post_list", "*", &err);
            err.into()
        })
    }

    pub fn get_post(&self, slug: &str) -> RepositoryResult<Option<BlogPost>> {
        validate_slug(slug)?;
        self.store.get_blog_post(slug).map_err(|err| {
            self.log_failure("post_read", slug, &err);
            err.into()
        })
    }

    /// Creates a post; an existing slug is `DuplicateSlug` and is left as is.
    ///
    /// A blank slug is derived from the title.
    pub fn create_post(
        &self,
        session: Option<&str>,
        draft: &BlogPostDraft,
    ) -> RepositoryResult<BlogPost> {
        self.authorize(session, "post_create")?;
        let draft = if draft.slug.trim().is_empty() {
            BlogPostDraft {
                slug: slug_from_title(&draft.title, now_epoch_ms()),
                ..draft.clone()
            }
            .validated()?
        } else {
            draft.validated()?
        };

        let started_at = Instant::now();
        if let Err(err) = self.store.create_blog_post(&draft) {
            self.log_failure("post_create", &draft.slug, &err);
            return Err(err.into());
        }
        info!(
            "event=post_create module=service status=ok backend={} slug={} duration_ms={}",
            self.backend().as_str(),
            draft.slug,
            started_at.elapsed().as_millis()
        );

        self.invalidate(ContentChange::PostCreated(draft.slug.clone()));
        Ok(self.read_back(&draft, "post_create"))
    }

    /// Replaces every mutable field of an existing post.
    pub fn update_post(
        &self,
        session: Option<&str>,
        slug: &str,
        draft: &BlogPostDraft,
    ) -> RepositoryResult<BlogPost> {
        self.authorize(session, "post_update")?;
        validate_slug(slug)?;
        let draft = BlogPostDraft {
            slug: slug.to_string(),
            ..draft.clone()
        }
        .validated()?;

        let started_at = Instant::now();
        if let Err(err) = self.store.update_blog_post(slug, &draft) {
            self.log_failure("post_update", slug, &err);
            return Err(err.into());
        }
        info!(
            "event=post_update module=service status=ok backend={} slug={slug} duration_ms={}",
            self.backend().as_str(),
            started_at.elapsed().as_millis()
        );

        self.invalidate(ContentChange::PostUpdated(slug.to_string()));
        Ok(self.read_back(&draft, "post_update"))
    }

    /// Deletes a post; deleting an absent slug succeeds.
    pub fn delete_post(&self, session: Option<&str>, slug: &str) -> RepositoryResult<()> {
        self.authorize(session, "post_delete")?;
        validate_slug(slug)?;

        let started_at = Instant::now();
        if let Err(err) = self.store.delete_blog_post(slug) {
            self.log_failure("post_delete", slug, &err);
            return Err(err.into());
        }
        info!(
            "event=post_delete module=service status=ok backend={} slug={slug} duration_ms={}",
            self.backend().as_str(),
            started_at.elapsed().as_millis()
        );

        self.invalidate(ContentChange::PostDeleted(slug.to_string()));
        Ok(())
    }

    /// Stored `site-content` merged over the built-in defaults.
    pub fn site_content(&self) -> RepositoryResult<SiteContent> {
        let stored = self.read(KEY_SITE_CONTENT)?;
        Ok(SiteContent::merged_over(stored.as_ref()))
    }

    fn authorize(&self, session: Option<&str>, event: &str) -> RepositoryResult<()> {
        if self.guard.is_authorized(session) {
            return Ok(());
        }
        warn!("event={event} module=service status=denied reason=unauthorized");
        Err(RepositoryError::Unauthorized)
    }

    fn invalidate(&self, change: ContentChange) {
        self.invalidator.invalidate(&change.dependent_paths());
    }

    /// Post as stored after a committed write, or the draft itself when the
    /// read-back fails.
    fn read_back(&self, draft: &BlogPostDraft, event: &str) -> BlogPost {
        let reason = match self.store.get_blog_post(&draft.slug) {
            Ok(Some(post)) => return post,
            Ok(None) => "missing".to_string(),
            Err(err) => err.to_string(),
        };
        warn!(
            "event={event} module=service status=warn backend={} slug={} reason=read_back_failed error={reason}",
            self.backend().as_str(),
            draft.slug
        );
        let now = now_epoch_ms();
        BlogPost {
            slug: draft.slug.clone(),
            title: draft.title.clone(),
            date: draft.date.clone(),
            tags: draft.tags.clone(),
            cover: draft.cover.clone(),
            content: draft.content.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    fn log_failure(&self, event: &str, target: &str, err: &StoreError) {
        match err {
            StoreError::DuplicateSlug(_) | StoreError::PostNotFound(_) => warn!(
                "event={event} module=service status=rejected backend={} target={target} error={err}",
                self.backend().as_str()
            ),
            _ => error!(
                "event={event} module=service status=error backend={} target={target} error={err}",
                self.backend().as_str()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepositoryError;
    use crate::repo::StoreError;

    #[test]
    fn store_errors_map_onto_repository_taxonomy() {
        assert!(matches!(
            RepositoryError::from(StoreError::DuplicateSlug("a".to_string())),
            RepositoryError::DuplicateSlug(slug) if slug == "a"
        ));
        assert!(matches!(
            RepositoryError::from(StoreError::Unavailable {
                message: "ro".to_string(),
                needs_configuration: true,
            }),
            RepositoryError::StorageUnavailable {
                needs_configuration: true,
                ..
            }
        ));
        assert!(matches!(
            RepositoryError::from(StoreError::InvalidData("x".to_string())),
            RepositoryError::Storage(_)
        ));
    }

    #[test]
    fn unavailable_message_distinguishes_configuration_from_transient() {
        let config = RepositoryError::StorageUnavailable {
            message: "m".to_string(),
            needs_configuration: true,
        };
        let transient = RepositoryError::StorageUnavailable {
            message: "m".to_string(),
            needs_configuration: false,
        };
        assert!(config.to_string().contains("needs configuration"));
        assert!(transient.to_string().contains("temporarily"));
    }
}
