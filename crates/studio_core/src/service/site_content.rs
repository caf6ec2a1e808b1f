//! Site-wide labels: navigation, section headers, footer.
//!
//! Missing groups or fields in the stored `site-content` slot fall back to
//! the built-in defaults, so pages always have every label.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteContent {
    pub navigation: Navigation,
    pub sections: Sections,
    pub footer: Footer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Navigation {
    pub believe: String,
    pub explore: String,
    pub studio_notes: String,
    pub development: String,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            believe: "What We Believe".to_string(),
            explore: "What We Explore".to_string(),
            studio_notes: "Studio Notes".to_string(),
            development: "In Development".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sections {
    pub believe: SectionTitle,
    pub explore: SectionTitle,
    pub studio_notes: SectionTitle,
    pub development: DevelopmentSection,
}

impl Default for Sections {
    fn default() -> Self {
        Self {
            believe: SectionTitle::new("What We Believe"),
            explore: SectionTitle::new("What We Explore"),
            studio_notes: SectionTitle::new("Studio Notes"),
            development: DevelopmentSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SectionTitle {
    pub title: String,
}

impl SectionTitle {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentSection {
    pub title: String,
    pub intro: String,
    pub outro: String,
}

impl Default for DevelopmentSection {
    fn default() -> Self {
        Self {
            title: "In Development".to_string(),
            intro: "Thought Studios is being built with intention, not rushed. We're shaping \
                    the philosophy, approach, and future offerings. One-on-one sessions and \
                    workshops are possibilities we're considering."
                .to_string(),
            outro: "Curious? Follow our Studio notes and Instagram to explore on your own \
                    while we build."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Footer {
    pub tagline: String,
    pub copyright: String,
}

impl Default for Footer {
    fn default() -> Self {
        Self {
            tagline: "A place to think clearly".to_string(),
            copyright: "© 2025 RB & A Consulting LLC. Thought Studios™ is a brand of RB & A \
                        Consulting LLC. All rights reserved."
                .to_string(),
        }
    }
}

impl SiteContent {
    /// Overlays a stored value on the defaults.
    ///
    /// A value that is not shaped like site content yields the defaults.
    pub fn merged_over(stored: Option<&Value>) -> Self {
        let Some(stored) = stored else {
            return Self::default();
        };
        match serde_json::from_value(stored.clone()) {
            Ok(content) => content,
            Err(err) => {
                warn!("event=site_content_merge module=service status=fallback error={err}");
                Self::default()
            }
        }
    }
}
