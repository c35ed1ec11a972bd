//! WebDom: the live browser document behind the `Dom` trait

use wasm_bindgen::JsCast;
use web_sys::{Element, Node};

use super::js_message;
use crate::dom::{Dom, NodeKind};
use crate::error::{Error, Result};

pub struct WebDom {
    document: web_sys::Document,
    root: Node,
}

impl WebDom {
    /// Scan root is the document body
    pub fn new(document: web_sys::Document) -> Result<Self> {
        let body = document
            .body()
            .ok_or_else(|| Error::Dom("document has no body".to_string()))?;
        Ok(Self {
            root: body.into(),
            document,
        })
    }
}

fn element(node: &Node) -> Result<&Element> {
    node.dyn_ref::<Element>()
        .ok_or_else(|| Error::Dom("expected an element".to_string()))
}

fn dom_err(e: wasm_bindgen::JsValue) -> Error {
    Error::Dom(js_message(&e))
}

impl Dom for WebDom {
    type Node = Node;

    fn root(&self) -> Node {
        self.root.clone()
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>().map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>().and_then(|e| e.get_attribute(name))
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<()> {
        element(node)?.set_attribute(name, value).map_err(dom_err)
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<()> {
        match node.dyn_ref::<Element>() {
            Some(e) => e.remove_attribute(name).map_err(dom_err),
            None => Ok(()),
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn previous_sibling(&self, node: &Node) -> Option<Node> {
        node.previous_sibling()
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::TEXT_NODE {
            return None;
        }
        node.node_value()
    }

    fn set_text(&mut self, node: &Node, data: &str) -> Result<()> {
        if node.node_type() != Node::TEXT_NODE {
            return Err(Error::Dom("set_text on a non-text node".to_string()));
        }
        node.set_node_value(Some(data));
        Ok(())
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&mut self, node: &Node, text: &str) -> Result<()> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn create_element(&mut self, tag: &str) -> Result<Node> {
        self.document
            .create_element(tag)
            .map(Into::into)
            .map_err(dom_err)
    }

    fn create_text(&mut self, data: &str) -> Node {
        self.document.create_text_node(data).into()
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, reference: Option<&Node>) -> Result<()> {
        parent
            .insert_before(child, reference)
            .map(|_| ())
            .map_err(dom_err)
    }

    fn replace_node(&mut self, old: &Node, new: &Node) -> Result<()> {
        let parent = old.parent_node().ok_or(Error::Detached)?;
        parent.replace_child(new, old).map(|_| ()).map_err(dom_err)
    }

    fn remove(&mut self, node: &Node) -> Result<()> {
        let parent = node.parent_node().ok_or(Error::Detached)?;
        parent.remove_child(node).map(|_| ()).map_err(dom_err)
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }
}
