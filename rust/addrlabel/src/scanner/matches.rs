//! Scan matches: one located identifier occurrence awaiting label resolution
//!
//! Matches are ephemeral. They hold a node handle into the live document and
//! are consumed by the annotator in the same pass.

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Link,
    Text,
}

/// A link whose navigational target names an identifier
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMatch<N> {
    pub element: N,
    pub identifier: Identifier,
    /// Visible text at scan time
    pub original_text: String,
}

/// How an identifier appeared in free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextForm {
    /// Complete, validated identifier
    Full(Identifier),
    /// `prefix...suffix` display; unvalidated until reconciled
    Elided { prefix: String, suffix: String },
}

/// An occurrence inside a text node. Offsets are byte offsets into the
/// node's data at scan time.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch<N> {
    /// The text node holding the occurrence
    pub node: N,
    /// Element owning `node`; receives the text-processed marker
    pub container: N,
    pub form: TextForm,
    pub original_text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanMatch<N> {
    Link(LinkMatch<N>),
    Text(TextMatch<N>),
}

impl<N> ScanMatch<N> {
    pub fn kind(&self) -> MatchKind {
        match self {
            ScanMatch::Link(_) => MatchKind::Link,
            ScanMatch::Text(_) => MatchKind::Text,
        }
    }

    pub fn original_text(&self) -> &str {
        match self {
            ScanMatch::Link(m) => &m.original_text,
            ScanMatch::Text(m) => &m.original_text,
        }
    }
}

impl<N> From<LinkMatch<N>> for ScanMatch<N> {
    fn from(m: LinkMatch<N>) -> Self {
        ScanMatch::Link(m)
    }
}

impl<N> From<TextMatch<N>> for ScanMatch<N> {
    fn from(m: TextMatch<N>) -> Self {
        ScanMatch::Text(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn test_accessors_per_variant() {
        let id = Identifier::parse(ID).unwrap();
        let link: ScanMatch<u32> = LinkMatch { element: 1, identifier: id.clone(), original_text: "view".into() }.into();
        assert_eq!(link.kind(), MatchKind::Link);
        assert_eq!(link.original_text(), "view");

        let elided: ScanMatch<u32> = TextMatch {
            node: 2,
            container: 1,
            form: TextForm::Elided { prefix: "So111".into(), suffix: "11112".into() },
            original_text: "So111...11112".into(),
            start: 0,
            end: 13,
        }
        .into();
        assert_eq!(elided.kind(), MatchKind::Text);
        assert_eq!(elided.original_text(), "So111...11112");
    }
}
