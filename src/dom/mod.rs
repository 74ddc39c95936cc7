//! Owned HTML document model.
//!
//! An arena-backed tree over a fixed node variant set (element, text,
//! comment). Parsing keeps the raw source span of every untouched region so
//! serialization can reproduce the input byte-for-byte wherever no transform
//! intervened.
//!
//! # Modules
//!
//! - `node`: arena node types (`NodeId`, `Node`, `Element`, `Attrs`)
//! - `parse`: tolerant HTML parsing with standard error recovery
//! - `serialize`: fidelity-preserving rendering back to bytes
//! - `query`: selector parsing and lazy matching
//! - `html`: escaping and tag classification helpers

pub mod error;
mod html;
mod node;
mod parse;
mod query;
mod serialize;

pub use error::{ParseError, SelectorError, SerializeError};
pub use node::{Attrs, Comment, Element, Node, NodeId, Text};
pub use query::{Select, Selector};

// =============================================================================
// Document
// =============================================================================

/// A parsed HTML page: one `html` root with unique `head` and `body`.
///
/// Created by [`Document::parse`], mutated in place by transforms, consumed
/// by [`Document::serialize`]. Never reused across pipeline runs. `Clone` is
/// a flat arena copy and backs the pipeline's pre-apply snapshots.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    /// BOM, doctype, and anything else before the root element, verbatim.
    pub(crate) prologue: String,
    /// Trailing bytes after the root element closes, verbatim.
    pub(crate) epilogue: String,
}

impl Document {
    /// Build an empty document shell: `<html><head></head><body></body></html>`,
    /// all synthesized. The parser grafts parsed nodes onto this.
    pub(crate) fn shell() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            parents: Vec::new(),
            root: NodeId::new(0),
            head: NodeId::new(0),
            body: NodeId::new(0),
            prologue: String::new(),
            epilogue: String::new(),
        };
        doc.root = doc.push(Node::Element(Element::new("html")));
        doc.head = doc.push(Node::Element(Element::new("head")));
        doc.body = doc.push(Node::Element(Element::new("body")));
        doc.append_child(doc.root, doc.head);
        doc.append_child(doc.root, doc.body);
        doc
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The `html` root element.
    pub fn html(&self) -> NodeId {
        self.root
    }

    /// The unique `head` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The unique `body` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.nodes[id.index()].as_element()
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes[id.index()].as_element_mut()
    }

    /// Navigational parent link; `None` for the root and detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    /// Children of an element, empty for text/comment nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map_or(&[], |e| e.children.as_slice())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Concatenated raw text beneath a node. Test and debugging aid.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match self.node(id) {
                Node::Text(t) => out.push_str(&t.raw),
                Node::Element(e) => stack.extend(e.children.iter().rev().copied()),
                Node::Comment(_) => {}
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Add a node to the arena without attaching it anywhere.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        self.parents.push(None);
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::Element(Element::new(tag)))
    }

    /// Create a detached raw text node.
    pub fn create_text(&mut self, text: Text) -> NodeId {
        self.push(Node::Text(text))
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first. No-op if `parent` is not an element.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, usize::MAX, child);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped to the
    /// end), detaching it from any previous parent first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(self.element(parent).is_some(), "parent must be an element");
        self.detach(child);
        let Some(elem) = self.nodes[parent.index()].as_element_mut() else {
            return;
        };
        let index = index.min(elem.children.len());
        elem.children.insert(index, child);
        self.parents[child.index()] = Some(parent);
    }

    /// Remove a node from its parent's child list. The node and its subtree
    /// stay in the arena; ids into it remain readable but detached.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parents[id.index()].take() else {
            return;
        };
        if let Some(elem) = self.nodes[parent.index()].as_element_mut() {
            elem.children.retain(|&c| c != id);
        }
    }

    /// Wrap `target` in a new element of `tag`, keeping its exact sibling
    /// position: the wrapper takes the target's slot and the target becomes
    /// the wrapper's sole child. Returns the wrapper id.
    pub fn wrap_in_element(&mut self, target: NodeId, tag: &str) -> NodeId {
        let wrapper = self.create_element(tag);
        if let Some(parent) = self.parents[target.index()] {
            if let Some(elem) = self.nodes[parent.index()].as_element_mut()
                && let Some(pos) = elem.children.iter().position(|&c| c == target)
            {
                elem.children[pos] = wrapper;
            }
            self.parents[wrapper.index()] = Some(parent);
            self.parents[target.index()] = None;
        }
        self.append_child(wrapper, target);
        wrapper
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Lazily iterate element ids matching `selector`, in document order.
    ///
    /// Never mutates. The borrow rules make the snapshot semantics literal:
    /// collect the ids first, then mutate, and requery after structural
    /// changes rather than trusting stale ids.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> Select<'a> {
        Select::new(self, selector)
    }

    /// First match for `selector`, if any.
    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.select(selector).next()
    }
}

// =============================================================================
// Tests
// =============================================================================
