//! Catalog items, scored results and queries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used when `test_type` is flattened into a single string.
pub const TAG_SEPARATOR: char = ',';

pub const DEFAULT_TOP_K: usize = 5;

/// An assessment from the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub url: String,
    #[serde(default)]
    pub name: String,
    pub description: String,
    pub duration: String,
    pub remote_support: bool,
    pub adaptive_support: bool,
    pub test_type: Vec<String>,
}

impl Item {
    /// The text handed to the embedder for this item.
    ///
    /// `keywords` is the catalog's optional free-text keyword field; it only
    /// ever influences the embedding, never the stored item.
    ///
    /// ```
    /// use assessrank::model::Item;
    ///
    /// let item = Item {
    ///     url: "https://example.com/verify".into(),
    ///     name: "Verify".into(),
    ///     description: "Numerical reasoning".into(),
    ///     duration: "20 minutes".into(),
    ///     remote_support: true,
    ///     adaptive_support: false,
    ///     test_type: vec!["Cognitive".into(), "Ability".into()],
    /// };
    /// let text = item.document_text(None);
    /// assert!(text.contains("Types: Cognitive, Ability"));
    /// assert!(text.contains("Remote: Yes"));
    /// assert!(text.contains("Adaptive: No"));
    /// ```
    pub fn document_text(&self, keywords: Option<&str>) -> String {
        let mut text = format!(
            "Assessment: {}\nName: {}\nTypes: {}\nDuration: {}\nRemote: {}\nAdaptive: {}",
            self.description,
            self.name,
            self.test_type.join(", "),
            self.duration,
            yes_no(self.remote_support),
            yes_no(self.adaptive_support),
        );
        if let Some(keywords) = keywords.filter(|k| !k.trim().is_empty()) {
            text.push_str("\nKeywords: ");
            text.push_str(keywords.trim());
        }
        text
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// An item together with its relevance to a particular query.
///
/// `score` is always within `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: Item,
    pub score: f32,
}

impl ScoredItem {
    pub fn new(item: Item, score: f32) -> Self {
        Self { item, score }
    }

    pub fn url(&self) -> &str {
        &self.item.url
    }

    /// Copy of this result with only the score replaced.
    pub fn rescored(&self, score: f32) -> Self {
        Self {
            item: self.item.clone(),
            score,
        }
    }
}

/// A recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "query")]
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Reject blank text and a zero `top_k`.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidQuery("query text is empty".into()));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be positive".into()));
        }
        Ok(())
    }
}

/// Flatten type tags into the stored comma-joined form.
///
/// Lossless only when no tag contains [`TAG_SEPARATOR`] and no tag carries
/// leading or trailing whitespace; [`split_tags`] trims each element. An
/// empty sequence and a sequence holding one empty tag both join to `""`,
/// which splits back to no tags.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(&TAG_SEPARATOR.to_string())
}

/// Inverse of [`join_tags`]. An empty string yields no tags.
pub fn split_tags(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined
        .split(TAG_SEPARATOR)
        .map(|t| t.trim().to_string())
        .collect()
}
