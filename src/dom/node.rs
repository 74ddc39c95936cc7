//! Node types for the document arena.
//!
//! Nodes live in a flat arena owned by [`Document`](super::Document) and
//! reference each other by [`NodeId`]. Parent links are navigational only;
//! ownership always flows root -> children, so the tree can never alias.

use smallvec::SmallVec;

use super::html;

// =============================================================================
// NodeId
// =============================================================================

/// Copyable handle into the document arena.
///
/// Ids stay valid for the lifetime of the document, including across
/// mutations. Using an id that points into a detached subtree is allowed
/// for reads but structurally unspecified - requery after structural edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[allow(clippy::cast_possible_truncation)] // Arenas never reach u32::MAX nodes
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Node
// =============================================================================

/// A single node in the tree: element, text, or comment.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    /// True for text nodes containing only whitespace.
    pub fn is_blank_text(&self) -> bool {
        match self {
            Node::Text(t) => t.raw.trim().is_empty(),
            _ => false,
        }
    }
}

// =============================================================================
// Element
// =============================================================================

/// An element node: lowercased tag, ordered attributes, ordered children.
#[derive(Debug, Clone)]
pub struct Element {
    /// Tag name, always lowercase.
    pub tag: String,
    attrs: Attrs,
    /// Ordered children, owned exclusively by this element.
    pub(crate) children: Vec<NodeId>,
    /// Raw source of the start tag, kept while attributes are untouched.
    pub(crate) open_raw: Option<String>,
    /// Raw source of the end tag; `None` for void, auto-closed, or
    /// synthesized elements.
    pub(crate) close_raw: Option<String>,
}

impl Element {
    /// Create a synthesized element (no source spans, rendered canonically).
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Attrs::default(),
            children: Vec::new(),
            open_raw: None,
            close_raw: None,
        }
    }

    pub(crate) fn parsed(tag: String, attrs: Attrs, open_raw: String) -> Self {
        Self {
            tag,
            attrs,
            children: Vec::new(),
            open_raw: Some(open_raw),
            close_raw: None,
        }
    }

    /// Attribute value by case-insensitive name. Boolean attributes
    /// (`defer`, `async`) report an empty value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.has(name)
    }

    /// Set an attribute, replacing any existing value. Invalidates the raw
    /// start-tag span: a mutated element is re-rendered canonically.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.open_raw = None;
        self.attrs.set(name, Some(value.into()));
    }

    /// Set a boolean attribute (rendered as the bare name).
    pub fn set_flag(&mut self, name: &str) {
        self.open_raw = None;
        self.attrs.set(name, None);
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let removed = self.attrs.remove(name);
        if removed {
            self.open_raw = None;
        }
        removed
    }

    /// Attributes in source/insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.attrs.iter()
    }

    /// Whitespace-separated class list membership test.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn is_void(&self) -> bool {
        html::is_void_element(&self.tag)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

// =============================================================================
// Attrs
// =============================================================================

/// Ordered attribute map with case-insensitive, unique names.
///
/// Names are lowercased on insert and lookup; the first occurrence of a
/// duplicated source attribute wins (HTML5 rule). `None` values are boolean
/// attributes.
#[derive(Debug, Clone, Default)]
pub struct Attrs {
    entries: SmallVec<[(String, Option<String>); 4]>,
}

impl Attrs {
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn set(&mut self, name: &str, value: Option<String>) {
        let name = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Insert only if absent (parser path: first source occurrence wins).
    pub(crate) fn insert_first(&mut self, name: String, value: Option<String>) {
        if !self.has(&name) {
            self.entries.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Text & Comment
// =============================================================================

/// A text node, stored as raw source bytes and emitted verbatim.
#[derive(Debug, Clone)]
pub struct Text {
    pub raw: String,
}

impl Text {
    /// Raw text, emitted as-is. The caller is responsible for any escaping;
    /// parsed source arrives here already well-formed.
    pub fn raw(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// A comment node including its `<!-- -->` delimiters, emitted verbatim.
#[derive(Debug, Clone)]
pub struct Comment {
    pub raw: String,
}

impl Comment {
    pub fn new(body: &str) -> Self {
        Self {
            raw: format!("<!--{body}-->"),
        }
    }

    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

// =============================================================================
// Tests
// =============================================================================
