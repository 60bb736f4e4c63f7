//! Arena-backed IDR tree
//!
//! Nodes live in a growable arena and refer to each other through integer
//! handles, which keeps the cyclic parent/child/sibling link structure out
//! of the ownership graph. Handles are never reused within a tree; a
//! detached subtree keeps its handles until the arena is dropped.

use crate::{Error, Result};

/// Handle to a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index backing this handle.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a node in the IDR tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a working document; has no parent.
    DocumentRoot,
    /// Named element; may carry children of any non-root kind.
    Element,
    /// Leaf text value.
    Text,
    /// Named attribute with a text value; never has children.
    Attribute,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    name: Option<String>,
    text: Option<String>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, name: Option<String>, text: Option<String>) -> Self {
        Self {
            kind,
            name,
            text,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Arena-backed tree of typed nodes.
///
/// The tree is created with a [`NodeKind::DocumentRoot`] already in place;
/// the ingester attaches an assembling subtree below it, the transformer
/// reads it, and the subtree is detached once the output record is emitted.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding only a document root.
    pub fn new() -> Self {
        let root_data = NodeData::new(NodeKind::DocumentRoot, None, None);
        Self {
            nodes: vec![root_data],
            root: NodeId(0),
        }
    }

    /// The document root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated in this tree, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds only the document root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Append a new element node under `parent`.
    pub fn add_element(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        self.add_child(parent, NodeKind::Element, Some(name.into()), None)
    }

    /// Append a new text node under `parent`.
    pub fn add_text(&mut self, parent: NodeId, value: impl Into<String>) -> Result<NodeId> {
        self.add_child(parent, NodeKind::Text, None, Some(value.into()))
    }

    /// Append a new attribute node under `parent`.
    pub fn add_attribute(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<NodeId> {
        self.add_child(parent, NodeKind::Attribute, Some(name.into()), Some(value.into()))
    }

    /// Append a new child node of the given kind under `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: Option<String>,
        text: Option<String>,
    ) -> Result<NodeId> {
        if self.node(parent).kind == NodeKind::Attribute {
            return Err(Error::InvalidOperation(
                "attribute nodes cannot have children".to_string(),
            ));
        }
        if kind == NodeKind::DocumentRoot {
            return Err(Error::InvalidOperation(
                "a tree has exactly one document root".to_string(),
            ));
        }
        let id = self.alloc(NodeData::new(kind, name, text));
        self.attach(parent, id);
        Ok(id)
    }

    /// Link an already-allocated, currently detached node as the last child
    /// of `parent`.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let prev_last = self.node(parent).last_child;
        {
            let c = self.node_mut(child);
            c.parent = Some(parent);
            c.prev_sibling = prev_last;
            c.next_sibling = None;
        }
        match prev_last {
            Some(last) => self.node_mut(last).next_sibling = Some(child),
            None => self.node_mut(parent).first_child = Some(child),
        }
        self.node_mut(parent).last_child = Some(child);
    }

    /// Unlink `node` (and its whole subtree) from the tree.
    ///
    /// The subtree keeps its internal links and all of its handles; only the
    /// connection to the parent and siblings is severed. Detaching the
    /// document root is an error.
    pub fn remove_from_tree(&mut self, node: NodeId) -> Result<()> {
        let (parent, prev, next) = {
            let n = self.node(node);
            (n.parent, n.prev_sibling, n.next_sibling)
        };
        let Some(parent) = parent else {
            if node == self.root {
                return Err(Error::InvalidOperation(
                    "cannot detach the document root".to_string(),
                ));
            }
            return Ok(()); // already detached
        };

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(nx) => self.node_mut(nx).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        let n = self.node_mut(node);
        n.parent = None;
        n.prev_sibling = None;
        n.next_sibling = None;
        Ok(())
    }

    /// Copy `node` into a new detached node with a fresh handle.
    ///
    /// With `deep` set, the entire subtree is copied; otherwise only the node
    /// itself. The copy is not attached anywhere.
    pub fn copy(&mut self, node: NodeId, deep: bool) -> NodeId {
        let data = {
            let n = self.node(node);
            NodeData::new(n.kind, n.name.clone(), n.text.clone())
        };
        let copy_id = self.alloc(data);
        if deep {
            let mut child = self.node(node).first_child;
            while let Some(c) = child {
                let next = self.node(c).next_sibling;
                let child_copy = self.copy(c, true);
                self.attach(copy_id, child_copy);
                child = next;
            }
        }
        copy_id
    }

    /// Kind tag of `node`.
    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.node(node).kind
    }

    /// Name of `node`, if it has one.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node).name.as_deref()
    }

    /// Text value of `node`, if it has one.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.node(node).text.as_deref()
    }

    /// Parent handle of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    /// Next sibling of `node`.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).next_sibling
    }

    /// First child of `node`.
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).first_child
    }

    /// Children of `node` in insertion order.
    pub fn children(&self, node: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            next: self.node(node).first_child,
        }
    }

    /// Child elements of `node` in insertion order.
    pub fn child_elements(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .filter(|&c| self.kind(c) == NodeKind::Element)
    }

    /// Attribute children of `node` in insertion order.
    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node)
            .filter(|&c| self.kind(c) == NodeKind::Attribute)
    }

    /// Value of the named attribute of `node`, if present.
    pub fn attribute_value(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .find(|&a| self.name(a) == Some(name))
            .and_then(|a| self.text(a))
    }

    /// Concatenated text content of the direct text children of `node`.
    ///
    /// For text and attribute nodes this is their own value.
    pub fn text_content(&self, node: NodeId) -> String {
        match self.node(node).kind {
            NodeKind::Text | NodeKind::Attribute => {
                self.text(node).unwrap_or_default().to_string()
            }
            _ => {
                let mut out = String::new();
                for c in self.children(node) {
                    if self.kind(c) == NodeKind::Text {
                        out.push_str(self.text(c).unwrap_or_default());
                    }
                }
                out
            }
        }
    }

    /// Subtree of `node` in document order, `node` included.
    pub fn descendants_or_self(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_subtree(node, &mut out);
        out
    }

    fn collect_subtree(&self, node: NodeId, out: &mut Vec<NodeId>) {
        out.push(node);
        let mut child = self.node(node).first_child;
        while let Some(c) = child {
            self.collect_subtree(c, out);
            child = self.node(c).next_sibling;
        }
    }

    /// Slash-separated name path from the root to `node`, for diagnostics.
    pub fn path_of(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(node);
        while let Some(n) = cur {
            match self.node(n).kind {
                NodeKind::DocumentRoot => parts.push(String::new()),
                NodeKind::Attribute => {
                    parts.push(format!("@{}", self.name(n).unwrap_or_default()));
                }
                _ => parts.push(self.name(n).unwrap_or("#text").to_string()),
            }
            cur = self.node(n).parent;
        }
        parts.reverse();
        parts.join("/")
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the direct children of a node.
pub struct ChildIter<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(current)
    }
}
