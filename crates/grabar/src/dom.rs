//! Observed document state for extraction and classification.
//!
//! The capture boundary (browser extension / devtools bridge) ships flattened
//! DOM snapshots with each interaction event. Nodes live in an arena and are
//! addressed by [`NodeId`], never by reference, so snapshots serialize cleanly
//! and element identity survives a round trip through the session dump.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a node within a [`DomSnapshot`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A single element in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomNode {
    /// Lower-case tag name
    pub tag: String,
    /// Attribute map (sorted for stable serialization)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Direct text content, trimmed
    #[serde(default)]
    pub text: String,
    /// Child node ids
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Parent node id (None for the root)
    #[serde(default)]
    pub parent: Option<NodeId>,
}

impl DomNode {
    /// Create a new element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the direct text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Get an attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Implicit ARIA role for a tag without an explicit `role` attribute.
fn implicit_role(tag: &str) -> Option<&'static str> {
    match tag {
        "button" => Some("button"),
        "select" => Some("combobox"),
        "input" | "textarea" => Some("textbox"),
        "a" => Some("link"),
        "table" => Some("grid"),
        "nav" => Some("navigation"),
        _ => None,
    }
}

/// A flattened snapshot of the document at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    /// Document URL at capture time
    pub url: String,
    /// Document title at capture time
    pub title: String,
    /// Node arena; node 0 is the root
    pub nodes: Vec<DomNode>,
}

impl DomSnapshot {
    /// Create a snapshot with an empty root element
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            nodes: vec![DomNode::new("body")],
        }
    }

    /// Root node id
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node under the given parent, returning its id
    pub fn add_node(&mut self, parent: NodeId, mut node: DomNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Get a node by id
    #[must_use]
    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id.0]
    }

    /// Iterate all node ids
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Nodes carrying an attribute with an exact value
    #[must_use]
    pub fn nodes_with_attribute(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.node(*id).attribute(name) == Some(value))
            .collect()
    }

    /// Effective ARIA role of a node (explicit attribute wins over the
    /// tag-implied role)
    #[must_use]
    pub fn role_of(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        node.attribute("role")
            .map(str::to_string)
            .or_else(|| implicit_role(&node.tag).map(str::to_string))
    }

    /// Accessible name of a node: `aria-label`, then an associated
    /// `<label for=...>`, then its own text content
    #[must_use]
    pub fn accessible_name_of(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        if let Some(label) = node.attribute("aria-label") {
            return Some(label.to_string());
        }
        if let Some(label) = self.label_text_for(id) {
            return Some(label);
        }
        let text = node.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Text of a `<label>` element associated with this node via `for`/`id`
    #[must_use]
    pub fn label_text_for(&self, id: NodeId) -> Option<String> {
        let element_id = self.node(id).attribute("id")?;
        self.ids()
            .filter(|candidate| self.node(*candidate).tag == "label")
            .find(|candidate| self.node(*candidate).attribute("for") == Some(element_id))
            .map(|label| self.node(label).text.trim().to_string())
    }

    /// Nodes whose effective role and accessible name both match
    #[must_use]
    pub fn nodes_with_role_and_name(&self, role: &str, name: &str) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.role_of(*id).as_deref() == Some(role))
            .filter(|id| self.accessible_name_of(*id).as_deref() == Some(name))
            .collect()
    }

    /// Form fields associated with a label text
    #[must_use]
    pub fn nodes_with_label(&self, label: &str) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.label_text_for(*id).as_deref() == Some(label))
            .collect()
    }

    /// Nodes whose own trimmed text content matches exactly
    #[must_use]
    pub fn nodes_with_text(&self, text: &str) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.node(*id).text.trim() == text)
            .collect()
    }

    /// Structural XPath for a node, e.g. `/body[1]/div[2]/input[1]`
    #[must_use]
    pub fn xpath_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current);
            let position = node.parent.map_or(1, |parent| {
                self.node(parent)
                    .children
                    .iter()
                    .filter(|child| self.node(**child).tag == node.tag)
                    .position(|child| *child == current)
                    .map_or(1, |index| index + 1)
            });
            segments.push(format!("{}[{}]", node.tag, position));
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Nearest ancestor (inclusive) carrying the given attribute
    #[must_use]
    pub fn ancestor_with_attribute(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if self.node(node_id).attribute(name).is_some() {
                return Some(node_id);
            }
            current = self.node(node_id).parent;
        }
        None
    }

    /// Whether the node is a form field (fillable/selectable)
    #[must_use]
    pub fn is_form_field(&self, id: NodeId) -> bool {
        matches!(self.node(id).tag.as_str(), "input" | "textarea" | "select")
            || matches!(
                self.role_of(id).as_deref(),
                Some("textbox" | "combobox" | "listbox" | "checkbox")
            )
    }
}
