//! LinkScanner: identifiers referenced by navigational links
//!
//! Looks at every `a[href]` under a root and pulls an identifier out of the
//! href when it follows one of the known path shapes:
//! - `/account/<id>`
//! - `/address/<id>`
//! - `/token/<id>`
//!
//! followed by end-of-string, `?`, `#` or `/`.
//!
//! Scanning is read-only. Links are marked processed by the annotator, never
//! here, so a link whose lookup failed is retried on a later pass.

use regex::Regex;

use super::matches::LinkMatch;
use crate::dom::{Denylist, Dom, NodeKind, MARK_PROCESSED};
use crate::identifier::{Identifier, CHAR_CLASS};

/// Path segments that precede an identifier in a link target
pub const LINK_PATH_SHAPES: &[&str] = &["account", "address", "token"];

pub struct LinkScanner {
    path_re: Regex,
    denylist: Denylist,
}

impl Default for LinkScanner {
    fn default() -> Self {
        Self::new(Denylist::default())
    }
}

impl LinkScanner {
    pub fn new(denylist: Denylist) -> Self {
        // Group 1: candidate run; the trailing group enforces the boundary
        let pattern = format!(
            r"/(?:{})/({}+)(?:[/?#]|$)",
            LINK_PATH_SHAPES.join("|"),
            CHAR_CLASS
        );
        let path_re = Regex::new(&pattern).expect("link path pattern is static");
        Self { path_re, denylist }
    }

    /// First valid identifier found in an href, if any
    pub fn extract_identifier(&self, href: &str) -> Option<Identifier> {
        self.path_re
            .captures_iter(href)
            .filter_map(|cap| cap.get(1))
            .find_map(|m| Identifier::parse(m.as_str()))
    }

    /// Collect link matches under `root` in document order
    pub fn scan<D: Dom>(&self, dom: &D, root: &D::Node) -> Vec<LinkMatch<D::Node>> {
        let mut out = Vec::new();
        for node in dom.descendants(root) {
            if dom.kind(&node) != NodeKind::Element || dom.tag_name(&node).as_deref() != Some("a") {
                continue;
            }
            let Some(href) = dom.attribute(&node, "href") else {
                continue;
            };
            if dom.has_attribute(&node, MARK_PROCESSED) {
                continue;
            }
            if self.denylist.covers(dom, &node) {
                continue;
            }
            if let Some(identifier) = self.extract_identifier(&href) {
                out.push(LinkMatch {
                    original_text: dom.text_content(&node),
                    element: node,
                    identifier,
                });
            }
        }
        out
    }
}
