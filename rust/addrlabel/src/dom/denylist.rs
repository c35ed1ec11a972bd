//! Container denylist
//!
//! Regions that must never be entered by either scanner: code, preformatted
//! and script-like content, plus anything flagged as a raw-data view. The
//! check walks the node and every ancestor, since nesting decides context.

use serde::{Deserialize, Serialize};

use super::Dom;
use crate::error::{Error, Result};

/// Default selectors: tags by name, raw-data views by class
pub const DEFAULT_DENYLIST: &[&str] = &[
    "code", "pre", "script", "style", "textarea", ".raw-data",
];

/// Parsed selector list. Only `tag` and `.class` forms are supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denylist {
    tags: Vec<String>,
    classes: Vec<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        // Built-in selectors are well-formed
        Self::parse(DEFAULT_DENYLIST.iter().copied()).unwrap_or(Self {
            tags: Vec::new(),
            classes: Vec::new(),
        })
    }
}

impl Denylist {
    /// Parse simple selectors. Comma-separated entries are split, so
    /// `["code, pre", ".raw-data"]` is accepted.
    pub fn parse<'a, I>(selectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tags = Vec::new();
        let mut classes = Vec::new();
        for raw in selectors.into_iter().flat_map(|s| s.split(',')) {
            let sel = raw.trim();
            if sel.is_empty() {
                continue;
            }
            if let Some(class) = sel.strip_prefix('.') {
                if !is_simple_name(class) {
                    return Err(Error::Config(format!("unsupported selector: {sel}")));
                }
                classes.push(class.to_string());
            } else if is_simple_name(sel) {
                tags.push(sel.to_ascii_lowercase());
            } else {
                return Err(Error::Config(format!("unsupported selector: {sel}")));
            }
        }
        Ok(Self { tags, classes })
    }

    /// True if this node itself matches a selector
    pub fn matches<D: Dom>(&self, dom: &D, node: &D::Node) -> bool {
        if let Some(tag) = dom.tag_name(node) {
            if self.tags.iter().any(|t| *t == tag) {
                return true;
            }
        }
        self.classes.iter().any(|c| dom.has_class(node, c))
    }

    /// True if the node or any ancestor matches
    pub fn covers<D: Dom>(&self, dom: &D, node: &D::Node) -> bool {
        self.matches(dom, node) || dom.ancestors(node).iter().any(|a| self.matches(dom, a))
    }
}

fn is_simple_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_default_covers_code_and_raw_data() {
        let deny = Denylist::default();
        let mut doc = Document::new();
        let root = doc.root();
        let pre = doc.append_element(&root, "pre", &[]);
        let inner = doc.append_element(&pre, "span", &[]);
        let text = doc.append_text(&inner, "x");
        let raw = doc.append_element(&root, "div", &[("class", "panel raw-data")]);
        let plain = doc.append_element(&root, "div", &[]);

        assert!(deny.covers(&doc, &text), "nested under pre");
        assert!(deny.covers(&doc, &raw));
        assert!(!deny.covers(&doc, &plain));
        assert!(!deny.matches(&doc, &inner), "only the ancestor matches");
    }

    #[test]
    fn test_parse_comma_separated() {
        let deny = Denylist::parse(["code, PRE", ".json-view"]).unwrap();
        assert_eq!(deny.tags, vec!["code", "pre"]);
        assert_eq!(deny.classes, vec!["json-view"]);
    }

    #[test]
    fn test_parse_rejects_complex_selectors() {
        assert!(Denylist::parse(["div > code"]).is_err());
        assert!(Denylist::parse(["[data-raw]"]).is_err());
        assert!(Denylist::parse(["."]).is_err());
    }
}
