//! Aggregated read model for the public pages.
//!
//! # Responsibility
//! - Load the welcome, beliefs and explore slots plus post summaries in one
//!   call.
//!
//! # Invariants
//! - Missing list slots are empty lists; a missing welcome slot is `None`.
//! - Summaries keep the store's newest-first order.
//! - Cover URLs are upgraded to https.

use crate::model::blog_post::BlogPost;
use crate::model::content::{KEY_BELIEFS, KEY_EXPLORE, KEY_WELCOME};
use crate::model::url::normalize_to_https;
use crate::service::content_repository::{ContentRepository, RepositoryResult};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const EXCERPT_LINES: usize = 3;
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Welcome {
    pub title: String,
    pub subtitle: String,
    pub cta_text: String,
    pub cta_link: String,
    pub image: String,
}

/// One card in the beliefs or explore lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Card {
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub tags: Vec<String>,
    pub cover: String,
    pub excerpt: String,
    pub content: String,
}

impl From<BlogPost> for PostSummary {
    fn from(post: BlogPost) -> Self {
        Self {
            excerpt: excerpt(&post.content),
            cover: normalize_to_https(&post.cover),
            slug: post.slug,
            title: post.title,
            date: post.date,
            tags: post.tags,
            content: post.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub welcome: Option<Welcome>,
    pub beliefs: Vec<Card>,
    pub explore: Vec<Card>,
    pub blog_posts: Vec<PostSummary>,
}

impl PageData {
    pub fn load(repository: &ContentRepository) -> RepositoryResult<Self> {
        let welcome = decode_slot(KEY_WELCOME, repository.read(KEY_WELCOME)?);
        let beliefs = decode_slot(KEY_BELIEFS, repository.read(KEY_BELIEFS)?).unwrap_or_default();
        let explore = decode_slot(KEY_EXPLORE, repository.read(KEY_EXPLORE)?).unwrap_or_default();
        let blog_posts = repository
            .list_posts()?
            .into_iter()
            .map(PostSummary::from)
            .collect();

        Ok(Self {
            welcome,
            beliefs,
            explore,
            blog_posts,
        })
    }
}

/// First three body lines joined by spaces, cut to 200 characters.
pub fn excerpt(content: &str) -> String {
    let joined = content
        .split('\n')
        .take(EXCERPT_LINES)
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(EXCERPT_CHARS).collect()
}

fn decode_slot<T: DeserializeOwned>(key: &str, value: Option<Value>) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!("event=page_data_load module=service status=skip key={key} error={err}");
            None
        }
    }
}
