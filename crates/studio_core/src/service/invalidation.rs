//! Page cache invalidation after successful writes.
//!
//! # Responsibility
//! - Map each content/post change to the page paths that render it.
//! - Deliver those paths to a pluggable invalidator.
//!
//! # Invariants
//! - Paths are derived from the change alone; the mapping is static.
//! - Invalidation is only requested after the store reported success.

use crate::model::content::{KEY_FAVICON, KEY_LOGO};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Mutex;

const PUBLIC_PAGES: &[&str] = &["/", "/explore", "/believe", "/studio-notes", "/development"];

/// How much of the rendered tree a path invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathScope {
    Page,
    /// The path and every page sharing its layout.
    Layout,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PagePath {
    pub path: String,
    pub scope: PathScope,
}

impl PagePath {
    pub fn page(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: PathScope::Page,
        }
    }

    pub fn layout(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: PathScope::Layout,
        }
    }
}

/// A successful write that affects rendered pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    Content(String),
    PostCreated(String),
    PostUpdated(String),
    PostDeleted(String),
}

impl ContentChange {
    /// Page paths whose rendering depends on this change.
    pub fn dependent_paths(&self) -> Vec<PagePath> {
        match self {
            Self::Content(key) if key == KEY_LOGO => {
                let mut paths = public_pages();
                paths.push(PagePath::page("/blog"));
                paths.push(PagePath::page("/admin/logo"));
                paths
            }
            Self::Content(key) if key == KEY_FAVICON => {
                let mut paths = vec![PagePath::layout("/")];
                paths.extend(public_pages().into_iter().filter(|p| p.path != "/"));
                paths.push(PagePath::page("/blog"));
                paths.push(PagePath::page("/admin/favicon"));
                paths
            }
            Self::Content(key) => {
                let mut paths = vec![PagePath::page(format!("/admin/{key}"))];
                paths.extend(public_pages());
                paths
            }
            Self::PostCreated(slug) | Self::PostDeleted(slug) => post_paths(slug),
            Self::PostUpdated(slug) => {
                let mut paths = post_paths(slug);
                paths.push(PagePath::page(format!("/admin/blog/edit/{slug}")));
                paths
            }
        }
    }
}

fn public_pages() -> Vec<PagePath> {
    PUBLIC_PAGES.iter().map(|path| PagePath::page(*path)).collect()
}

fn post_paths(slug: &str) -> Vec<PagePath> {
    let mut paths = vec![
        PagePath::page("/admin/blog"),
        PagePath::page(format!("/blog/{slug}")),
    ];
    paths.extend(public_pages());
    paths
}

/// Receives the paths to drop after a successful write.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, paths: &[PagePath]);
}

/// Invalidator for contexts without a page cache (CLI, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, paths: &[PagePath]) {
        debug!(
            "event=cache_invalidate module=service status=skip paths={}",
            paths.len()
        );
    }
}

/// In-process record of stale rendered pages.
///
/// The renderer drains it with [`PageCache::take_stale`] before serving.
#[derive(Debug, Default)]
pub struct PageCache {
    stale: Mutex<BTreeSet<PagePath>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stale(&self, path: &str) -> bool {
        match self.stale.lock() {
            Ok(stale) => stale.iter().any(|entry| {
                entry.path == path || (entry.scope == PathScope::Layout && path.starts_with(&entry.path))
            }),
            // A poisoned set may have lost entries; treat everything as stale.
            Err(_) => true,
        }
    }

    /// Returns and clears every stale path.
    pub fn take_stale(&self) -> Vec<PagePath> {
        match self.stale.lock() {
            Ok(mut stale) => std::mem::take(&mut *stale).into_iter().collect(),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner())
                .into_iter()
                .collect(),
        }
    }
}

impl CacheInvalidator for PageCache {
    fn invalidate(&self, paths: &[PagePath]) {
        let mut stale = match self.stale.lock() {
            Ok(stale) => stale,
            Err(poisoned) => poisoned.into_inner(),
        };
        stale.extend(paths.iter().cloned());
        debug!(
            "event=cache_invalidate module=service status=ok paths={} pending={}",
            paths.len(),
            stale.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheInvalidator, ContentChange, PageCache, PagePath, PathScope};

    fn paths_of(change: ContentChange) -> Vec<String> {
        change
            .dependent_paths()
            .into_iter()
            .map(|path| path.path)
            .collect()
    }

    #[test]
    fn content_keys_invalidate_admin_page_and_public_pages() {
        let paths = paths_of(ContentChange::Content("beliefs".to_string()));
        assert_eq!(paths[0], "/admin/beliefs");
        for page in ["/", "/explore", "/believe", "/studio-notes", "/development"] {
            assert!(paths.iter().any(|p| p == page), "{page}");
        }
        assert!(!paths.iter().any(|p| p == "/blog"));
    }

    #[test]
    fn favicon_invalidates_root_layout() {
        let paths = ContentChange::Content("favicon".to_string()).dependent_paths();
        assert_eq!(paths[0], PagePath::layout("/"));
        assert_eq!(paths.iter().filter(|p| p.path == "/").count(), 1);
        assert!(paths.contains(&PagePath::page("/admin/favicon")));
        assert!(paths.contains(&PagePath::page("/blog")));
    }

    #[test]
    fn post_update_adds_edit_page() {
        let created = paths_of(ContentChange::PostCreated("hello".to_string()));
        let updated = paths_of(ContentChange::PostUpdated("hello".to_string()));
        assert!(created.contains(&"/blog/hello".to_string()));
        assert!(!created.contains(&"/admin/blog/edit/hello".to_string()));
        assert_eq!(updated.len(), created.len() + 1);
        assert!(updated.contains(&"/admin/blog/edit/hello".to_string()));
    }

    #[test]
    fn page_cache_tracks_and_drains_stale_paths() {
        let cache = PageCache::new();
        assert!(!cache.is_stale("/blog"));

        cache.invalidate(&[PagePath::page("/blog"), PagePath::layout("/admin")]);
        assert!(cache.is_stale("/blog"));
        assert!(cache.is_stale("/admin/logo"));
        assert!(!cache.is_stale("/explore"));

        let drained = cache.take_stale();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().any(|p| p.scope == PathScope::Layout));
        assert!(!cache.is_stale("/blog"));
    }
}
