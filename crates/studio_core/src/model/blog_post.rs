//! Blog post domain model.
//!
//! # Responsibility
//! - Define the submitted (`BlogPostDraft`) and stored (`BlogPost`) shapes.
//! - Validate drafts before any storage I/O.
//! - Normalize post dates to plain `YYYY-MM-DD` strings.
//!
//! # Invariants
//! - `slug` is URL-safe and never changes after creation.
//! - `tags` keeps caller order; an empty list stays an empty list.
//! - Stored `date` values are always `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,199}$").expect("valid slug regex"));
static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug separator regex"));

const POST_DATE_FORMAT: &str = "%Y-%m-%d";

/// Post content as submitted by the editing client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostDraft {
    pub slug: String,
    pub title: String,
    /// Calendar date; any RFC 3339 or `YYYY-MM-DD[ HH:MM:SS]` form is accepted.
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cover image URL, empty when absent.
    #[serde(default)]
    pub cover: String,
    /// Markdown body.
    pub content: String,
}

/// Post as returned by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    /// Always `YYYY-MM-DD`.
    pub date: String,
    pub tags: Vec<String>,
    pub cover: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Draft validation failures, raised before storage I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostValidationError {
    MissingField(&'static str),
    InvalidSlug(String),
    InvalidDate(String),
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field: {field}"),
            Self::InvalidSlug(slug) => write!(f, "slug is not URL-safe: `{slug}`"),
            Self::InvalidDate(date) => write!(f, "date is not a calendar date: `{date}`"),
        }
    }
}

impl Error for PostValidationError {}

impl BlogPostDraft {
    /// Checks required fields and returns the draft with its date normalized.
    pub fn validated(&self) -> Result<BlogPostDraft, PostValidationError> {
        validate_slug(&self.slug)?;
        if self.title.trim().is_empty() {
            return Err(PostValidationError::MissingField("title"));
        }
        if self.content.trim().is_empty() {
            return Err(PostValidationError::MissingField("content"));
        }
        if self.date.trim().is_empty() {
            return Err(PostValidationError::MissingField("date"));
        }
        let date = normalize_post_date(&self.date)
            .ok_or_else(|| PostValidationError::InvalidDate(self.date.clone()))?;

        Ok(BlogPostDraft {
            date,
            ..self.clone()
        })
    }
}

/// Rejects empty or non URL-safe slugs.
pub fn validate_slug(slug: &str) -> Result<(), PostValidationError> {
    if slug.trim().is_empty() {
        return Err(PostValidationError::MissingField("slug"));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(PostValidationError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Normalizes a stored or submitted date to `YYYY-MM-DD`.
///
/// Accepts plain dates, RFC 3339 timestamps and `YYYY-MM-DD HH:MM:SS` forms.
/// Returns `None` when the value is not a date.
pub fn normalize_post_date(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, POST_DATE_FORMAT) {
        return Some(date.format(POST_DATE_FORMAT).to_string());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive().format(POST_DATE_FORMAT).to_string());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(datetime.date().format(POST_DATE_FORMAT).to_string());
        }
    }
    None
}

/// Derives a unique slug from a title and a millisecond timestamp.
pub fn slug_from_title(title: &str, timestamp_ms: i64) -> String {
    let lowered = title.to_lowercase();
    let joined = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let stem: String = joined.trim_matches('-').chars().take(80).collect();
    let stem = stem.trim_end_matches('-');
    if stem.is_empty() {
        format!("post-{timestamp_ms}")
    } else {
        format!("{stem}-{timestamp_ms}")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_post_date, slug_from_title, validate_slug, BlogPostDraft, PostValidationError,
    };

    fn draft() -> BlogPostDraft {
        BlogPostDraft {
            slug: "first-post".to_string(),
            title: "First".to_string(),
            date: "2024-03-05".to_string(),
            tags: vec![],
            cover: String::new(),
            content: "Body".to_string(),
        }
    }

    #[test]
    fn normalizes_dates_from_timestamp_forms() {
        assert_eq!(normalize_post_date("2024-03-05").as_deref(), Some("2024-03-05"));
        assert_eq!(
            normalize_post_date("2024-03-05T00:00:00.000Z").as_deref(),
            Some("2024-03-05")
        );
        assert_eq!(
            normalize_post_date("2024-03-05 13:45:00").as_deref(),
            Some("2024-03-05")
        );
        assert_eq!(normalize_post_date("March 5th"), None);
    }

    #[test]
    fn validated_requires_title_content_and_slug() {
        let mut missing_title = draft();
        missing_title.title = "   ".to_string();
        assert_eq!(
            missing_title.validated().unwrap_err(),
            PostValidationError::MissingField("title")
        );

        let mut missing_content = draft();
        missing_content.content = String::new();
        assert_eq!(
            missing_content.validated().unwrap_err(),
            PostValidationError::MissingField("content")
        );

        let mut missing_slug = draft();
        missing_slug.slug = String::new();
        assert_eq!(
            missing_slug.validated().unwrap_err(),
            PostValidationError::MissingField("slug")
        );
    }

    #[test]
    fn rejects_path_like_slugs() {
        for slug in ["../etc", "a b", "post.md", "-leading"] {
            assert!(validate_slug(slug).is_err(), "{slug} should be rejected");
        }
    }

    #[test]
    fn slug_from_title_is_url_safe_and_suffixed() {
        let slug = slug_from_title("Hello, World! Notes", 1_700_000_000_000);
        assert_eq!(slug, "hello-world-notes-1700000000000");
        assert!(validate_slug(&slug).is_ok());
        assert_eq!(slug_from_title("???", 7), "post-7");
    }
}
