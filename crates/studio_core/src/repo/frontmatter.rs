//! Markdown header block codec for fallback blog post files.
//!
//! # Responsibility
//! - Render a post as `---` delimited header lines followed by the markdown
//!   body.
//! - Parse files written by this module and hand-edited files whose header
//!   is any YAML mapping.
//!
//! # Invariants
//! - The body after the closing delimiter is preserved byte for byte.
//! - Rendered scalars are JSON literals, which are also valid YAML.

use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DELIMITER: &str = "---";

/// Header fields carried by one post file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostHeader {
    pub title: String,
    /// Raw date text; callers normalize it.
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub cover: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Header parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterError {
    MissingHeader,
    UnterminatedHeader,
    Yaml(String),
    InvalidDate(String),
}

impl Display for FrontmatterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "post file does not start with a `---` header"),
            Self::UnterminatedHeader => write!(f, "post header is missing its closing `---`"),
            Self::Yaml(message) => write!(f, "invalid post header: {message}"),
            Self::InvalidDate(value) => write!(f, "post date must be a scalar, got `{value}`"),
        }
    }
}

impl Error for FrontmatterError {}

/// Header mapping as written on disk; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    #[serde(default)]
    title: Option<String>,
    /// Quoted text, a bare `2024-03-05`, or any other scalar.
    #[serde(default)]
    date: Option<serde_yaml::Value>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

/// Renders a header block and body into one file payload.
pub fn render_post_file(header: &PostHeader, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    out.push_str(DELIMITER);
    out.push('\n');
    push_field(&mut out, "title", &Value::from(header.title.as_str()));
    if let Some(date) = header.date.as_deref() {
        push_field(&mut out, "date", &Value::from(date));
    }
    push_field(&mut out, "tags", &Value::from(header.tags.clone()));
    push_field(&mut out, "cover", &Value::from(header.cover.as_str()));
    if let Some(created_at) = header.created_at {
        push_field(&mut out, "createdAt", &Value::from(created_at));
    }
    if let Some(updated_at) = header.updated_at {
        push_field(&mut out, "updatedAt", &Value::from(updated_at));
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    out
}

/// Splits a post file into its header and verbatim body.
pub fn parse_post_file(source: &str) -> Result<(PostHeader, String), FrontmatterError> {
    let rest = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
        .ok_or(FrontmatterError::MissingHeader)?;

    let mut header_lines = Vec::new();
    let mut body = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == DELIMITER {
            body = Some(&rest[offset..]);
            break;
        }
        header_lines.push(trimmed);
    }
    let body = body.ok_or(FrontmatterError::UnterminatedHeader)?;

    let header_text = header_lines.join("\n");
    let raw: RawHeader = if header_text.trim().is_empty() {
        RawHeader::default()
    } else {
        serde_yaml::from_str(&header_text).map_err(|err| FrontmatterError::Yaml(err.to_string()))?
    };

    let header = PostHeader {
        title: raw.title.map(|title| title.trim().to_string()).unwrap_or_default(),
        date: raw.date.map(date_text).transpose()?.flatten(),
        tags: raw.tags.unwrap_or_default(),
        cover: raw.cover.map(|cover| cover.trim().to_string()).unwrap_or_default(),
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    };

    Ok((header, body.to_string()))
}

fn push_field(out: &mut String, key: &str, value: &Value) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(&value.to_string());
    out.push('\n');
}

fn date_text(value: serde_yaml::Value) -> Result<Option<String>, FrontmatterError> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(text) => Ok(Some(text)),
        serde_yaml::Value::Number(number) => Ok(Some(number.to_string())),
        serde_yaml::Value::Tagged(tagged) => date_text(tagged.value),
        other => Err(FrontmatterError::InvalidDate(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_post_file, render_post_file, FrontmatterError, PostHeader};

    #[test]
    fn rendered_file_parses_back_with_verbatim_body() {
        let header = PostHeader {
            title: "Quotes \"and\" colons: fine".to_string(),
            date: Some("2024-03-05".to_string()),
            tags: vec!["b".to_string(), "a".to_string()],
            cover: String::new(),
            created_at: Some(10),
            updated_at: Some(20),
        };
        let body = "# Heading\n\n---\nnot a header\n";
        let (parsed, parsed_body) = parse_post_file(&render_post_file(&header, body)).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn parses_hand_written_yaml_subset() {
        let source = "---\ntitle: Hello there\ndate: '2024-01-02'\ntags:\n  - one\n  - 'two'\ncover: ''\n---\nBody";
        let (header, body) = parse_post_file(source).unwrap();
        assert_eq!(header.title, "Hello there");
        assert_eq!(header.date.as_deref(), Some("2024-01-02"));
        assert_eq!(header.tags, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(header.cover, "");
        assert_eq!(body, "Body");
    }

    #[test]
    fn empty_tag_forms_stay_empty_lists() {
        let (inline, _) = parse_post_file("---\ntitle: a\ntags: []\n---\n").unwrap();
        assert!(inline.tags.is_empty());
        let (bare, _) = parse_post_file("---\ntitle: a\ntags:\n---\n").unwrap();
        assert!(bare.tags.is_empty());
        let (absent, _) = parse_post_file("---\ntitle: a\n---\n").unwrap();
        assert!(absent.tags.is_empty());
    }

    #[test]
    fn quoted_commas_stay_inside_one_tag() {
        let source = "---\ntitle: T\ndate: 2024-03-05\ntags: [intro, \"rust, async\"]\n---\nbody";
        let (header, body) = parse_post_file(source).unwrap();
        assert_eq!(header.tags, vec!["intro".to_string(), "rust, async".to_string()]);
        assert_eq!(header.date.as_deref(), Some("2024-03-05"));
        assert_eq!(body, "body");
    }

    #[test]
    fn folded_and_literal_scalars_are_read() {
        let source = "---\ntitle: >\n  Long title\n  over two lines\ncover: |\n  https://cdn.example.com/a.png\n---\n";
        let (header, _) = parse_post_file(source).unwrap();
        assert_eq!(header.title, "Long title over two lines");
        assert_eq!(header.cover, "https://cdn.example.com/a.png");
    }

    #[test]
    fn unknown_keys_are_ignored_and_bad_yaml_is_reported() {
        let (header, _) = parse_post_file("---\ntitle: a\ndraft: true\n---\n").unwrap();
        assert_eq!(header.title, "a");

        assert!(matches!(
            parse_post_file("---\ntitle: [unclosed\n---\n").unwrap_err(),
            FrontmatterError::Yaml(_)
        ));
        assert!(matches!(
            parse_post_file("---\ntitle: a\ndate: [2024]\n---\n").unwrap_err(),
            FrontmatterError::InvalidDate(_)
        ));
    }

    #[test]
    fn rejects_missing_or_unterminated_header() {
        assert_eq!(
            parse_post_file("no header").unwrap_err(),
            FrontmatterError::MissingHeader
        );
        assert_eq!(
            parse_post_file("---\ntitle: a\n").unwrap_err(),
            FrontmatterError::UnterminatedHeader
        );
    }
}
