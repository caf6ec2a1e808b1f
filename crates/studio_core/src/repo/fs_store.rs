//! Fallback store: content and posts as local files.
//!
//! # Responsibility
//! - Keep one `<key>.json` file per content slot under the content root.
//! - Keep one `blog/<slug>.md` file per post with a header block.
//!
//! # Invariants
//! - Writes go to a temp file first and are renamed/linked into place, so a
//!   failed write leaves the previous file untouched.
//! - Post creation never replaces an existing file (`DuplicateSlug`).
//! - Only files whose stem is a valid slug are listed as posts.
//! - A read-only deployment rejects every write before touching disk.

use crate::model::blog_post::{normalize_post_date, validate_slug, BlogPost, BlogPostDraft};
use crate::repo::frontmatter::{parse_post_file, render_post_file, PostHeader};
use crate::repo::{
    now_epoch_ms, sort_posts_newest_first, ContentStore, StoreBackend, StoreError, StoreResult,
};
use log::warn;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use uuid::Uuid;

const BLOG_DIR_NAME: &str = "blog";
const POST_EXTENSION: &str = "md";

/// Filesystem implementation of [`ContentStore`].
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
    read_only: bool,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// A store whose writes always fail with `Unavailable`.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn content_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn blog_dir(&self) -> PathBuf {
        self.root.join(BLOG_DIR_NAME)
    }

    fn post_path(&self, slug: &str) -> PathBuf {
        self.blog_dir().join(format!("{slug}.{POST_EXTENSION}"))
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::Unavailable {
                message: "the deployment filesystem is read-only; configure a database \
                          (STUDIO_DATABASE_URL) to persist content"
                    .to_string(),
                needs_configuration: true,
            });
        }
        Ok(())
    }

    fn read_post(&self, slug: &str, path: &Path) -> StoreResult<Option<BlogPost>> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let (header, body) = parse_post_file(&source)
            .map_err(|err| StoreError::InvalidData(format!("post `{slug}`: {err}")))?;

        let raw_date = header.date.as_deref().unwrap_or_default();
        let date = normalize_post_date(raw_date).ok_or_else(|| {
            StoreError::InvalidData(format!("post `{slug}`: invalid date `{raw_date}`"))
        })?;
        let modified_at = modified_epoch_ms(path);

        Ok(Some(BlogPost {
            slug: slug.to_string(),
            title: header.title,
            date,
            tags: header.tags,
            cover: header.cover,
            content: body,
            created_at: header.created_at.unwrap_or(modified_at),
            updated_at: header.updated_at.unwrap_or(modified_at),
        }))
    }
}

impl ContentStore for FsContentStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Filesystem
    }

    fn get_content(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.content_path(key);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&source)
            .map(Some)
            .map_err(|err| StoreError::InvalidData(format!("`{}`: {err}", path.display())))
    }

    fn set_content(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.ensure_writable()?;
        let encoded = serde_json::to_string_pretty(value)
            .map_err(|err| StoreError::InvalidData(format!("unencodable content value: {err}")))?;
        fs::create_dir_all(&self.root)?;
        let staged = stage_file(&self.root, key, encoded.as_bytes())?;
        replace_with(&staged, &self.content_path(key))
    }

    fn list_blog_posts(&self) -> StoreResult<Vec<BlogPost>> {
        let entries = match fs::read_dir(self.blog_dir()) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut posts = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(POST_EXTENSION) {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Err(err) = validate_slug(slug) {
                warn!(
                    "event=post_list module=repo status=skip backend=filesystem file={} error={err}",
                    path.display()
                );
                continue;
            }
            match self.read_post(slug, &path) {
                Ok(Some(post)) => posts.push(post),
                Ok(None) => {}
                Err(err) => warn!(
                    "event=post_list module=repo status=skip backend=filesystem slug={slug} error={err}"
                ),
            }
        }

        sort_posts_newest_first(&mut posts);
        Ok(posts)
    }

    fn get_blog_post(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        self.read_post(slug, &self.post_path(slug))
    }

    fn create_blog_post(&self, draft: &BlogPostDraft) -> StoreResult<()> {
        self.ensure_writable()?;
        let blog_dir = self.blog_dir();
        fs::create_dir_all(&blog_dir)?;

        let now = now_epoch_ms();
        let payload = render_draft(draft, now, now);
        let staged = stage_file(&blog_dir, &draft.slug, payload.as_bytes())?;

        // hard_link refuses to replace an existing target, which makes the
        // slug check and the insert one filesystem operation.
        let linked = fs::hard_link(&staged, self.post_path(&draft.slug));
        let _ = fs::remove_file(&staged);
        match linked {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::DuplicateSlug(draft.slug.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_blog_post(&self, slug: &str, draft: &BlogPostDraft) -> StoreResult<()> {
        self.ensure_writable()?;
        let path = self.post_path(slug);
        let existing = self
            .read_post(slug, &path)?
            .ok_or_else(|| StoreError::PostNotFound(slug.to_string()))?;

        let payload = render_draft(draft, existing.created_at, now_epoch_ms());
        let staged = stage_file(&self.blog_dir(), slug, payload.as_bytes())?;
        replace_with(&staged, &path)
    }

    fn delete_blog_post(&self, slug: &str) -> StoreResult<()> {
        self.ensure_writable()?;
        match fs::remove_file(self.post_path(slug)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn render_draft(draft: &BlogPostDraft, created_at: i64, updated_at: i64) -> String {
    let header = PostHeader {
        title: draft.title.clone(),
        date: Some(draft.date.clone()),
        tags: draft.tags.clone(),
        cover: draft.cover.clone(),
        created_at: Some(created_at),
        updated_at: Some(updated_at),
    };
    render_post_file(&header, &draft.content)
}

/// Writes `bytes` to a synced temp file inside `dir`.
fn stage_file(dir: &Path, stem: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
    let staged = dir.join(format!(".{stem}.{}.tmp", Uuid::new_v4().simple()));
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&staged)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();
    if let Err(err) = result {
        let _ = fs::remove_file(&staged);
        return Err(err.into());
    }
    Ok(staged)
}

fn replace_with(staged: &Path, target: &Path) -> StoreResult<()> {
    if let Err(err) = fs::rename(staged, target) {
        let _ = fs::remove_file(staged);
        return Err(err.into());
    }
    Ok(())
}

fn modified_epoch_ms(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or(0)
}
