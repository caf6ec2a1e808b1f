//! Primary store: SQLite-backed content and blog post tables.
//!
//! # Responsibility
//! - Upsert and read opaque JSON content by key.
//! - Create/read/update/delete blog posts keyed by slug.
//!
//! # Invariants
//! - One connection serializes every call, so a write is visible to the next
//!   read from any caller of this store.
//! - Duplicate slugs are detected by the `blog_posts` primary key, not by a
//!   pre-read.
//! - Tags are persisted as a JSON array and read back without coercion.

use crate::config::DatabaseLocation;
use crate::db::migrations::REQUIRED_TABLES;
use crate::db::open_location;
use crate::model::blog_post::{normalize_post_date, BlogPost, BlogPostDraft};
use crate::repo::{now_epoch_ms, ContentStore, StoreBackend, StoreError, StoreResult};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const POST_SELECT_SQL: &str = "SELECT
    slug,
    title,
    date,
    tags,
    cover,
    content,
    created_at,
    updated_at
FROM blog_posts";

/// SQLite implementation of [`ContentStore`].
pub struct SqliteContentStore {
    conn: Mutex<Connection>,
}

impl SqliteContentStore {
    /// Opens (and migrates) the configured location.
    pub fn open(location: &DatabaseLocation, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = open_location(location, busy_timeout)?;
        Self::try_new(conn)
    }

    /// Wraps a migrated connection, rejecting one without the required tables.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        for table in REQUIRED_TABLES {
            if !table_exists(&conn, table)? {
                return Err(StoreError::InvalidData(format!(
                    "required table `{table}` is missing; run migrations first"
                )));
            }
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Unavailable {
            message: "primary store connection lock is poisoned".to_string(),
            needs_configuration: false,
        })
    }
}

impl ContentStore for SqliteContentStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Primary
    }

    fn get_content(&self, key: &str) -> StoreResult<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value
                 FROM content
                 WHERE key = ?1
                 ORDER BY updated_at DESC
                 LIMIT 1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                StoreError::InvalidData(format!("content `{key}` is not valid JSON: {err}"))
            })
        })
        .transpose()
    }

    fn set_content(&self, key: &str, value: &Value) -> StoreResult<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|err| StoreError::InvalidData(format!("unencodable content value: {err}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO content (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, encoded, now_epoch_ms()],
        )?;
        debug!(
            "event=content_upsert module=repo status=ok backend=primary key={key} bytes={}",
            encoded.len()
        );
        Ok(())
    }

    fn list_blog_posts(&self) -> StoreResult<Vec<BlogPost>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{POST_SELECT_SQL} ORDER BY date DESC, created_at DESC, slug ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_post_row(row)?);
        }
        Ok(posts)
    }

    fn get_blog_post(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{POST_SELECT_SQL} WHERE slug = ?1;"))?;
        let mut rows = stmt.query([slug])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_post_row(row)?)),
            None => Ok(None),
        }
    }

    fn create_blog_post(&self, draft: &BlogPostDraft) -> StoreResult<()> {
        let tags = encode_tags(&draft.tags)?;
        let now = now_epoch_ms();
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO blog_posts (
                slug,
                title,
                date,
                tags,
                cover,
                content,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                draft.slug.as_str(),
                draft.title.as_str(),
                draft.date.as_str(),
                tags,
                draft.cover.as_str(),
                draft.content.as_str(),
                now,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_primary_key_violation(&err) => {
                Err(StoreError::DuplicateSlug(draft.slug.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_blog_post(&self, slug: &str, draft: &BlogPostDraft) -> StoreResult<()> {
        let tags = encode_tags(&draft.tags)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE blog_posts
             SET
                title = ?2,
                date = ?3,
                tags = ?4,
                cover = ?5,
                content = ?6,
                updated_at = ?7
             WHERE slug = ?1;",
            params![
                slug,
                draft.title.as_str(),
                draft.date.as_str(),
                tags,
                draft.cover.as_str(),
                draft.content.as_str(),
                now_epoch_ms(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::PostNotFound(slug.to_string()));
        }
        Ok(())
    }

    fn delete_blog_post(&self, slug: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM blog_posts WHERE slug = ?1;", [slug])?;
        debug!("event=post_delete module=repo status=ok backend=primary slug={slug} removed={removed}");
        Ok(())
    }
}

fn parse_post_row(row: &Row<'_>) -> StoreResult<BlogPost> {
    let slug: String = row.get("slug")?;

    let raw_date: String = row.get("date")?;
    let date = normalize_post_date(&raw_date).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid date `{raw_date}` in blog_posts.date ({slug})"))
    })?;

    let raw_tags: String = row.get("tags")?;
    let tags = decode_tags(&raw_tags).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid tags `{raw_tags}` in blog_posts.tags ({slug})"))
    })?;

    Ok(BlogPost {
        slug,
        title: row.get("title")?,
        date,
        tags,
        cover: row.get::<_, Option<String>>("cover")?.unwrap_or_default(),
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn encode_tags(tags: &[String]) -> StoreResult<String> {
    serde_json::to_string(tags)
        .map_err(|err| StoreError::InvalidData(format!("unencodable tag list: {err}")))
}

fn decode_tags(raw: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw).ok()
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{decode_tags, encode_tags};

    #[test]
    fn tag_encoding_keeps_empty_list_and_order() {
        assert_eq!(encode_tags(&[]).unwrap(), "[]");
        let tags = vec!["b".to_string(), "a".to_string()];
        assert_eq!(decode_tags(&encode_tags(&tags).unwrap()).unwrap(), tags);
    }

    #[test]
    fn tag_decoding_rejects_non_arrays() {
        assert!(decode_tags("null").is_none());
        assert!(decode_tags("{\"a\":1}").is_none());
    }
}
