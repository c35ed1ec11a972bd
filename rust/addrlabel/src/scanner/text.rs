//! TextScanner: identifiers appearing in plain text
//!
//! Two conservative patterns, applied in order:
//! 1. Full form - a maximal run of alphabet characters that passes the
//!    identifier check.
//! 2. Elided form - `prefix...suffix` (or `prefix…suffix`) with at least five
//!    alphabet characters on each side. Too short to validate; carried as a
//!    partial match for the annotator to reconcile against known labels.
//!
//! Text under a link, inside a denylisted container, inside an annotation
//! wrapper, or in a container already marked text-processed is skipped.

use regex::Regex;

use super::matches::{TextForm, TextMatch};
use crate::dom::{Denylist, Dom, NodeKind, ATTR_WRAPPER, MARK_TEXT_PROCESSED};
use crate::identifier::{Identifier, CHAR_CLASS};

/// Minimum characters on each side of an elided display
pub const ELIDED_MIN_EDGE: usize = 5;

/// A pattern hit inside a single string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHit {
    pub form: TextForm,
    pub start: usize,
    pub end: usize,
}

pub struct TextScanner {
    run_re: Regex,
    elided_re: Regex,
    denylist: Denylist,
}

impl Default for TextScanner {
    fn default() -> Self {
        Self::new(Denylist::default())
    }
}

impl TextScanner {
    pub fn new(denylist: Denylist) -> Self {
        // Leftmost-first + greedy quantifiers give maximal runs, which stands in
        // for the lookaround boundaries the regex crate lacks.
        let run_re = Regex::new(&format!("{CHAR_CLASS}+")).expect("run pattern is static");
        let elided_re = Regex::new(&format!(
            r"({c}{{{n},}})(?:\.\.\.|…)({c}{{{n},}})",
            c = CHAR_CLASS,
            n = ELIDED_MIN_EDGE
        ))
        .expect("elided pattern is static");
        Self {
            run_re,
            elided_re,
            denylist,
        }
    }

    /// All hits in `text`, ordered by start offset. Elided hits overlapping a
    /// full hit are dropped.
    pub fn find_in(&self, text: &str) -> Vec<TextHit> {
        let mut hits: Vec<TextHit> = self
            .run_re
            .find_iter(text)
            .filter_map(|m| {
                Identifier::parse(m.as_str()).map(|id| TextHit {
                    form: TextForm::Full(id),
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect();

        let full_spans: Vec<(usize, usize)> = hits.iter().map(|h| (h.start, h.end)).collect();
        for cap in self.elided_re.captures_iter(text) {
            let (Some(whole), Some(prefix), Some(suffix)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };
            let overlaps = full_spans
                .iter()
                .any(|&(s, e)| whole.start() < e && whole.end() > s);
            if overlaps {
                continue;
            }
            hits.push(TextHit {
                form: TextForm::Elided {
                    prefix: prefix.as_str().to_string(),
                    suffix: suffix.as_str().to_string(),
                },
                start: whole.start(),
                end: whole.end(),
            });
        }

        hits.sort_by_key(|h| h.start);
        hits
    }

    /// True if text under this node must not be scanned
    fn is_excluded<D: Dom>(&self, dom: &D, container: &D::Node) -> bool {
        if dom.has_attribute(container, MARK_TEXT_PROCESSED) {
            return true;
        }
        let mut chain = vec![container.clone()];
        chain.extend(dom.ancestors(container));
        chain.iter().any(|n| {
            let is_link = dom.tag_name(n).as_deref() == Some("a") && dom.has_attribute(n, "href");
            is_link || dom.has_attribute(n, ATTR_WRAPPER) || self.denylist.matches(dom, n)
        })
    }

    /// Collect text matches under `root` in document order
    pub fn scan<D: Dom>(&self, dom: &D, root: &D::Node) -> Vec<TextMatch<D::Node>> {
        let mut out = Vec::new();
        for node in dom.descendants(root) {
            if dom.kind(&node) != NodeKind::Text {
                continue;
            }
            let Some(data) = dom.text(&node) else {
                continue;
            };
            if data.trim().len() < ELIDED_MIN_EDGE * 2 {
                continue;
            }
            let Some(container) = dom.parent(&node) else {
                continue;
            };
            if self.is_excluded(dom, &container) {
                continue;
            }
            for hit in self.find_in(&data) {
                out.push(TextMatch {
                    node: node.clone(),
                    container: container.clone(),
                    original_text: data[hit.start..hit.end].to_string(),
                    form: hit.form,
                    start: hit.start,
                    end: hit.end,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    const ID_A: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const ID_B: &str = "So11111111111111111111111111111111111111112";

    fn full(id: &str) -> TextForm {
        TextForm::Full(Identifier::parse(id).unwrap())
    }

    #[test]
    fn test_find_full_form_with_offsets() {
        let scanner = TextScanner::default();
        let text = format!("from {ID_A} to {ID_B}.");
        let hits = scanner.find_in(&text);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].form, full(ID_A));
        assert_eq!(&text[hits[0].start..hits[0].end], ID_A);
        assert_eq!(hits[1].form, full(ID_B));
        assert_eq!(&text[hits[1].start..hits[1].end], ID_B);
    }

    #[test]
    fn test_full_form_requires_boundaries() {
        let scanner = TextScanner::default();
        // Run too long once glued to extra alphabet chars
        assert!(scanner.find_in(&format!("{ID_A}abc")).is_empty());
        // Non-alphabet chars are boundaries
        assert_eq!(scanner.find_in(&format!("({ID_A})")).len(), 1);
        assert_eq!(scanner.find_in(&format!("0{ID_A}0")).len(), 1);
        // Ordinary words are never long enough
        assert!(scanner.find_in("the quick brown fox jumps").is_empty());
    }

    #[test]
    fn test_find_elided_form() {
        let scanner = TextScanner::default();
        let hits = scanner.find_in("Signer: 9WzDX...tAWWM and 9WzDX…tAWWM, not ab...cd");
        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].form,
            TextForm::Elided { prefix: "9WzDX".into(), suffix: "tAWWM".into() }
        );
        assert_eq!(hits[1].end - hits[1].start, "9WzDX…tAWWM".len());
    }

    #[test]
    fn test_elided_overlapping_full_is_dropped() {
        let scanner = TextScanner::default();
        let hits = scanner.find_in(&format!("{ID_A}...tAWWM"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].form, full(ID_A));
    }

    #[test]
    fn test_scan_skips_links_denylist_wrappers_and_marked() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(&root, "p", &[]);
        let counted = doc.append_text(&p, &format!("owner {ID_A}"));
        doc.append_link(&root, "/somewhere", ID_A);
        let pre = doc.append_element(&root, "pre", &[]);
        doc.append_text(&pre, ID_A);
        let wrapper = doc.append_element(&root, "span", &[(ATTR_WRAPPER, "1")]);
        doc.append_text(&wrapper, ID_A);
        let marked = doc.append_element(&root, "div", &[(MARK_TEXT_PROCESSED, "1")]);
        doc.append_text(&marked, ID_A);

        let matches = TextScanner::default().scan(&doc, &root);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].node, counted);
        assert_eq!(matches[0].container, p);
        assert_eq!(matches[0].start, "owner ".len());
        assert_eq!(matches[0].original_text, ID_A);
    }

    #[test]
    fn test_scan_subtree_root_may_be_text_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(&root, "div", &[]);
        let t = doc.append_text(&div, &format!("{ID_B} "));
        let matches = TextScanner::default().scan(&doc, &t);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].container, div);
    }
}
