//! Label records and the input accepted by `LabelStore::save`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::identifier::elide;

/// Identifier string -> record. Ordered so exports are byte-stable.
pub type LabelMap = BTreeMap<String, LabelRecord>;

/// A user-assigned label for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
    /// Insertion-ordered, no repeats
    #[serde(default)]
    pub tags: Vec<String>,
    /// Six hex digits, no leading `#`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
}

impl LabelRecord {
    /// Visible replacement text: `name (first5...last5)`
    pub fn display_text(&self, id: &str) -> String {
        format!("{} ({})", self.name, elide(id))
    }

    /// Hover/title summary with name, tags and the full identifier
    pub fn summary(&self, id: &str) -> String {
        let mut out = self.name.clone();
        if !self.tags.is_empty() {
            out.push_str("\nTags: ");
            out.push_str(&self.tags.join(", "));
        }
        out.push('\n');
        out.push_str(id);
        out
    }

    /// Case-insensitive substring match over name, tags and the identifier.
    /// `query` must already be lowercase.
    pub(crate) fn matches_query(&self, id: &str, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
            || id.to_lowercase().contains(query)
    }
}

/// Fields supplied when saving a label. Missing tags/color clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInput {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl LabelInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Validate and build a record with the given timestamps
    pub(crate) fn into_record(self, created_at: i64, updated_at: i64) -> Result<LabelRecord> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidLabel("name must not be empty".to_string()));
        }
        let color = match self.color.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) => Some(normalize_color(c)?),
        };
        Ok(LabelRecord {
            name,
            tags: dedup_tags(self.tags),
            color,
            created_at,
            updated_at,
        })
    }
}

/// Strip an optional `#` and require exactly six hex digits
pub fn normalize_color(raw: &str) -> Result<String> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(hex.to_string())
    } else {
        Err(Error::InvalidLabel(format!("color must be 6 hex digits: {raw}")))
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
