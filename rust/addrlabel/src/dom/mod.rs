//! Host document contract
//!
//! Scanners read the document through `Dom`, the annotator writes through it.
//! Two implementations exist:
//! - `Document` - an arena tree used natively and in tests
//! - `web::WebDom` - the live browser DOM (wasm32 only)
//!
//! Every region the pipeline touches carries attribute-level markers so a
//! later pass can skip it without any side table.

pub mod document;
pub mod denylist;

pub use document::*;
pub use denylist::*;

use crate::error::Result;
use std::fmt::Debug;

// =============================================================================
// Marker attributes
// =============================================================================

/// Set on a link (or wrapper) once the link scanner's match was handled
pub const MARK_PROCESSED: &str = "data-addrlabel-processed";
/// Set on an element whose text children were annotated
pub const MARK_TEXT_PROCESSED: &str = "data-addrlabel-text-processed";
/// Resolved identifier of an annotated region
pub const ATTR_ID: &str = "data-addrlabel-id";
/// Label name of an annotated region
pub const ATTR_NAME: &str = "data-addrlabel-name";
/// Color token for the companion stylesheet
pub const ATTR_COLOR: &str = "data-addrlabel-color";
/// Visible text before annotation, used to restore on reset
pub const ATTR_ORIGINAL: &str = "data-addrlabel-original";
/// Marks an inline wrapper created around a text occurrence
pub const ATTR_WRAPPER: &str = "data-addrlabel-wrapper";
/// Host-provided `title` of an annotated link, restored on reset
pub const ATTR_ORIGINAL_TITLE: &str = "data-addrlabel-original-title";
/// Set on a wrapper whose occurrence was followed by text split off into a
/// new tail node
pub const ATTR_SPLIT_TAIL: &str = "data-addrlabel-split-tail";

/// Tag used for inline text wrappers
pub const WRAPPER_TAG: &str = "span";

// =============================================================================
// Dom trait
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// Minimal read/write surface over a live document tree.
///
/// Tag names are reported lowercase. Mutations return `Error::Detached`
/// when the target has left the document.
pub trait Dom {
    type Node: Clone + PartialEq + Debug;

    /// Top of the scannable tree (the body, or the arena root)
    fn root(&self) -> Self::Node;

    fn kind(&self, node: &Self::Node) -> NodeKind;
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<()>;
    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<()>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Data of a text node; `None` for other kinds
    fn text(&self, node: &Self::Node) -> Option<String>;
    fn set_text(&mut self, node: &Self::Node, data: &str) -> Result<()>;
    /// Concatenated text of an element's subtree
    fn text_content(&self, node: &Self::Node) -> String;
    /// Replace all children of an element with a single text node
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> Result<()>;

    fn create_element(&mut self, tag: &str) -> Result<Self::Node>;
    fn create_text(&mut self, data: &str) -> Self::Node;
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<()>;
    /// Put `new` where `old` is and detach `old`
    fn replace_node(&mut self, old: &Self::Node, new: &Self::Node) -> Result<()>;
    /// Detach a node from its parent
    fn remove(&mut self, node: &Self::Node) -> Result<()>;

    /// True while the node is reachable from the document root
    fn is_connected(&self, node: &Self::Node) -> bool;

    // -------------------------------------------------------------------------
    // Provided
    // -------------------------------------------------------------------------

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }

    /// Parent chain, nearest first, excluding `node`
    fn ancestors(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            cur = self.parent(&p);
            out.push(p);
        }
        out
    }

    /// Pre-order traversal of `root`'s subtree, `root` included
    fn descendants(&self, root: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let children = self.children(&node);
            stack.extend(children.into_iter().rev());
            out.push(node);
        }
        out
    }

    /// Insert `new` immediately after `node`
    fn insert_after(&mut self, node: &Self::Node, new: &Self::Node) -> Result<()> {
        let parent = self.parent(node).ok_or(crate::error::Error::Detached)?;
        let next = self.next_sibling(node);
        self.insert_before(&parent, new, next.as_ref())
    }
}

/// Lowest common ancestor (inclusive) of two nodes, `None` if they share no
/// tree or either has been detached.
pub fn common_ancestor<D: Dom>(dom: &D, a: &D::Node, b: &D::Node) -> Option<D::Node> {
    if !dom.is_connected(a) || !dom.is_connected(b) {
        return None;
    }
    let mut chain_a = vec![a.clone()];
    chain_a.extend(dom.ancestors(a));

    let mut cur = Some(b.clone());
    while let Some(node) = cur {
        if chain_a.contains(&node) {
            return Some(node);
        }
        cur = dom.parent(&node);
    }
    None
}
