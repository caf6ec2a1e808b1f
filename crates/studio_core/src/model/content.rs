//! Content slot model.
//!
//! # Responsibility
//! - Name the content slots the site reads and the admin edits.
//! - Validate slot keys before they reach either backend.
//!
//! # Invariants
//! - At most one live record per key; writes replace the whole value.
//! - Keys are safe to use as a file stem in the fallback store.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static CONTENT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,127}$").expect("valid content key regex"));

pub const KEY_WELCOME: &str = "welcome";
pub const KEY_BELIEFS: &str = "beliefs";
pub const KEY_EXPLORE: &str = "explore";
pub const KEY_THEME: &str = "theme";
pub const KEY_SITE_CONTENT: &str = "site-content";
pub const KEY_LOGO: &str = "logo";
pub const KEY_FAVICON: &str = "favicon";

/// Slots edited by the admin CMS.
pub const KNOWN_CONTENT_KEYS: &[&str] = &[
    KEY_WELCOME,
    KEY_BELIEFS,
    KEY_EXPLORE,
    KEY_THEME,
    KEY_SITE_CONTENT,
    KEY_LOGO,
    KEY_FAVICON,
];

/// Rejected content slot key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidContentKey(pub String);

impl Display for InvalidContentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid content key `{}`; expected lowercase letters, digits, `-` or `_`",
            self.0
        )
    }
}

impl Error for InvalidContentKey {}

/// Accepts a key, stripping a trailing `.json` the way legacy callers name slots.
pub fn normalize_content_key(key: &str) -> Result<String, InvalidContentKey> {
    let trimmed = key.trim();
    let stem = trimmed.strip_suffix(".json").unwrap_or(trimmed);
    if CONTENT_KEY_RE.is_match(stem) {
        Ok(stem.to_string())
    } else {
        Err(InvalidContentKey(key.to_string()))
    }
}
