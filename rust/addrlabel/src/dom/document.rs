//! Document: arena-backed document tree
//!
//! Nodes are never freed; detaching only clears the parent link, so a stale
//! `NodeId` held by a scan match stays safe to query and reports
//! `is_connected() == false`.

use serde::{Deserialize, Serialize};

use super::{Dom, NodeKind};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document. The root is a `body` element.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = NodeEntry {
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
        }
    }

    fn entry(&self, id: &NodeId) -> &NodeEntry {
        &self.nodes[id.0]
    }

    fn entry_mut(&mut self, id: &NodeId) -> &mut NodeEntry {
        &mut self.nodes[id.0]
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(NodeEntry {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn new_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    /// Create an element with attributes and append it under `parent`
    pub fn append_element(&mut self, parent: &NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.new_element(tag, attrs);
        self.attach(parent, id, None);
        id
    }

    /// Create a text node and append it under `parent`
    pub fn append_text(&mut self, parent: &NodeId, data: &str) -> NodeId {
        let id = self.push(NodeData::Text(data.to_string()));
        self.attach(parent, id, None);
        id
    }

    /// `<a href=..>text</a>` under `parent`; returns the anchor
    pub fn append_link(&mut self, parent: &NodeId, href: &str, text: &str) -> NodeId {
        let a = self.append_element(parent, "a", &[("href", href)]);
        self.append_text(&a, text);
        a
    }

    /// Detach a node (and its subtree) from its parent
    pub fn detach(&mut self, node: &NodeId) {
        if let Some(parent) = self.entry(node).parent {
            self.entry_mut(&parent).children.retain(|c| c != node);
            self.entry_mut(node).parent = None;
        }
    }

    fn attach(&mut self, parent: &NodeId, child: NodeId, before: Option<&NodeId>) {
        self.detach(&child);
        let children = &mut self.entry_mut(parent).children;
        let pos = before
            .and_then(|b| children.iter().position(|c| c == b))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.entry_mut(&child).parent = Some(*parent);
    }

    // -------------------------------------------------------------------------
    // Serialisation
    // -------------------------------------------------------------------------

    /// Serialise a subtree to HTML. Attributes keep insertion order; text is
    /// escaped minimally.
    pub fn to_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialise the children of a node (its "inner HTML")
    pub fn inner_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        for child in &self.entry(node).children {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: &NodeId, out: &mut String) {
        let entry = self.entry(node);
        match &entry.data {
            NodeData::Text(t) => out.push_str(&escape(t, false)),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", k, escape(v, true)));
                }
                out.push('>');
                for child in &entry.children {
                    self.write_html(child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

fn escape(s: &str, attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Dom implementation
// =============================================================================

impl Dom for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.entry(node).data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        }
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.entry(node).data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.entry(node).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<()> {
        match &mut self.entry_mut(node).data {
            NodeData::Element { attrs, .. } => {
                match attrs.iter_mut().find(|(k, _)| k == name) {
                    Some(slot) => slot.1 = value.to_string(),
                    None => attrs.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            NodeData::Text(_) => Err(Error::Dom(format!("cannot set {name} on a text node"))),
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<()> {
        if let NodeData::Element { attrs, .. } = &mut self.entry_mut(node).data {
            attrs.retain(|(k, _)| k != name);
        }
        Ok(())
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.entry(node).parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.entry(node).children.clone()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.entry(node).parent?;
        let siblings = &self.entry(&parent).children;
        let pos = siblings.iter().position(|c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn previous_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.entry(node).parent?;
        let siblings = &self.entry(&parent).children;
        let pos = siblings.iter().position(|c| c == node)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.entry(node).data {
            NodeData::Text(t) => Some(t.clone()),
            NodeData::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: &NodeId, data: &str) -> Result<()> {
        match &mut self.entry_mut(node).data {
            NodeData::Text(t) => {
                *t = data.to_string();
                Ok(())
            }
            NodeData::Element { .. } => Err(Error::Dom("set_text on an element".to_string())),
        }
    }

    fn text_content(&self, node: &NodeId) -> String {
        match &self.entry(node).data {
            NodeData::Text(t) => t.clone(),
            NodeData::Element { .. } => self
                .entry(node)
                .children
                .iter()
                .map(|c| self.text_content(c))
                .collect(),
        }
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> Result<()> {
        if self.kind(node) == NodeKind::Text {
            return self.set_text(node, text);
        }
        for child in self.children(node) {
            self.detach(&child);
        }
        self.append_text(node, text);
        Ok(())
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId> {
        Ok(self.new_element(tag, &[]))
    }

    fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeData::Text(data.to_string()))
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) -> Result<()> {
        if self.kind(parent) != NodeKind::Element {
            return Err(Error::Dom("parent must be an element".to_string()));
        }
        if let Some(r) = reference {
            if self.entry(r).parent != Some(*parent) {
                return Err(Error::Dom("reference is not a child of parent".to_string()));
            }
        }
        self.attach(parent, *child, reference);
        Ok(())
    }

    fn replace_node(&mut self, old: &NodeId, new: &NodeId) -> Result<()> {
        let parent = self.entry(old).parent.ok_or(Error::Detached)?;
        self.attach(&parent, *new, Some(old));
        self.detach(old);
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<()> {
        if self.entry(node).parent.is_none() {
            return Err(Error::Detached);
        }
        self.detach(node);
        Ok(())
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut cur = *node;
        loop {
            if cur == self.root {
                return true;
            }
            match self.entry(&cur).parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }
}
