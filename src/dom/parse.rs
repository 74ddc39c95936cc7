//! Tolerant HTML parsing.
//!
//! A hand-written tokenizer and tree builder tuned for one job: taking the
//! rendered output of a web framework and producing a mutable tree that can
//! be serialized back byte-for-byte wherever nothing touched it. Every
//! token therefore keeps its raw source span.
//!
//! Recovery follows the standard rules: mismatched end tags auto-close the
//! elements above them, unclosed elements close at end of input, stray end
//! tags are dropped, and a missing `html`/`head`/`body` is synthesized.
//! Parsing only fails for input that is not HTML text at all.

use super::error::ParseError;
use super::html::{is_raw_text_element, is_void_element, unescape};
use super::node::{Attrs, Comment, Element, Node, NodeId, Text};
use super::Document;

/// Entry point, called via [`Document::parse`].
pub(crate) fn parse(bytes: &[u8]) -> Result<Document, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    if bytes.contains(&0) {
        return Err(ParseError::Binary);
    }
    let src = std::str::from_utf8(bytes).map_err(|_| ParseError::Binary)?;

    let mut prologue = String::new();
    let src = match src.strip_prefix('\u{feff}') {
        Some(rest) => {
            prologue.push('\u{feff}');
            rest
        }
        None => src,
    };
    if src.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser {
        src,
        pos: 0,
        nodes: Vec::new(),
        parents: Vec::new(),
        stack: Vec::new(),
        top: Vec::new(),
        prologue,
        pre_root: true,
    };
    parser.run();
    Ok(parser.finish())
}

impl Document {
    /// Parse raw page bytes into a document.
    ///
    /// Recovers from malformed markup; fails only for empty or binary
    /// (non-UTF-8 / NUL-bearing) input.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        parse(bytes)
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    /// Open elements awaiting their end tag.
    stack: Vec<NodeId>,
    /// Nodes with no parent (document level).
    top: Vec<NodeId>,
    /// Raw bytes before the first content: BOM, doctype, leading comments.
    prologue: String,
    /// True until the first element or non-blank text is seen; while set,
    /// doctype, comments, and blank text accrete onto the prologue.
    pre_root: bool,
}

impl<'s> Parser<'s> {
    fn run(&mut self) {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if rest.starts_with("</") {
                self.end_tag();
            } else if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.declaration();
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag();
            } else {
                self.text();
            }
        }
        // End of input: everything still open auto-closes (no end-tag span).
        self.stack.clear();
    }

    // -------------------------------------------------------------------------
    // Arena helpers
    // -------------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        self.parents.push(None);
        id
    }

    fn append_to(&mut self, parent: NodeId, child: NodeId) {
        self.parents[child.index()] = Some(parent);
        if let Some(elem) = self.nodes[parent.index()].as_element_mut() {
            elem.children.push(child);
        }
    }

    fn set_children(&mut self, parent: NodeId, ids: Vec<NodeId>) {
        for &id in &ids {
            self.parents[id.index()] = Some(parent);
        }
        if let Some(elem) = self.nodes[parent.index()].as_element_mut() {
            elem.children = ids;
        }
    }

    /// Attach a node under the innermost open element, or at document level.
    fn attach(&mut self, node: Node) -> NodeId {
        let id = self.alloc(node);
        match self.stack.last().copied() {
            Some(parent) => self.append_to(parent, id),
            None => self.top.push(id),
        }
        id
    }

    fn is_elem(&self, id: NodeId, tag: &str) -> bool {
        self.nodes[id.index()].as_element().is_some_and(|e| e.tag == tag)
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    fn text(&mut self) {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut cursor = self.pos + 1; // current byte is text, even if '<'
        loop {
            match bytes[cursor..].iter().position(|&b| b == b'<') {
                Some(offset) => {
                    let lt = cursor + offset;
                    // '<' only ends text when it opens a tag-like construct
                    let tag_like = matches!(
                        bytes.get(lt + 1),
                        Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?')
                    );
                    if tag_like {
                        self.pos = lt;
                        break;
                    }
                    cursor = lt + 1;
                }
                None => {
                    self.pos = self.src.len();
                    break;
                }
            }
        }

        let raw = &self.src[start..self.pos];
        if self.pre_root && raw.trim().is_empty() {
            self.prologue.push_str(raw);
            return;
        }
        self.pre_root = false;
        self.attach(Node::Text(Text::raw(raw)));
    }

    fn comment(&mut self) {
        let start = self.pos;
        let end = match self.src[self.pos + 4..].find("-->") {
            Some(i) => self.pos + 4 + i + 3,
            None => self.src.len(),
        };
        self.pos = end;
        let raw = &self.src[start..end];
        if self.pre_root {
            self.prologue.push_str(raw);
        } else {
            self.attach(Node::Comment(Comment::from_raw(raw)));
        }
    }

    /// `<!doctype>`, `<![CDATA[`, `<?xml` - anything declaration-shaped.
    /// Before the root it joins the prologue; elsewhere it is preserved as
    /// a comment-like raw node.
    fn declaration(&mut self) {
        let start = self.pos;
        let end = match self.src[self.pos..].find('>') {
            Some(i) => self.pos + i + 1,
            None => self.src.len(),
        };
        self.pos = end;
        let raw = &self.src[start..end];
        if self.pre_root {
            self.prologue.push_str(raw);
        } else {
            self.attach(Node::Comment(Comment::from_raw(raw)));
        }
    }

    fn start_tag(&mut self) {
        let start = self.pos;
        let Some(end) = scan_tag_end(self.src, self.pos) else {
            // Unterminated tag at end of input: keep the bytes as text.
            let raw = &self.src[start..];
            self.pos = self.src.len();
            self.pre_root = false;
            self.attach(Node::Text(Text::raw(raw)));
            return;
        };
        self.pos = end;

        let raw = &self.src[start..end];
        let mut inner = &raw[1..raw.len() - 1];
        let self_closing = inner.ends_with('/');
        if self_closing {
            inner = &inner[..inner.len() - 1];
        }

        let name_len = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        let tag = inner[..name_len].to_ascii_lowercase();
        let attrs = parse_attrs(&inner[name_len..]);

        self.pre_root = false;
        let id = self.attach(Node::Element(Element::parsed(
            tag.clone(),
            attrs,
            raw.to_string(),
        )));

        if is_raw_text_element(&tag) {
            self.raw_text_content(id, &tag);
        } else if !is_void_element(&tag) && !self_closing {
            self.stack.push(id);
        }
        // Void and self-closed elements never open.
    }

    /// Consume everything up to `</tag>` as a single raw text child.
    fn raw_text_content(&mut self, id: NodeId, tag: &str) {
        let needle = format!("</{tag}");
        let haystack = self.src[self.pos..].to_ascii_lowercase();
        match haystack.find(&needle) {
            Some(i) => {
                if i > 0 {
                    let text = self.alloc(Node::Text(Text::raw(&self.src[self.pos..self.pos + i])));
                    self.append_to(id, text);
                }
                let close_start = self.pos + i;
                let close_end = match self.src[close_start..].find('>') {
                    Some(j) => close_start + j + 1,
                    None => self.src.len(),
                };
                if let Some(elem) = self.nodes[id.index()].as_element_mut() {
                    elem.close_raw = Some(self.src[close_start..close_end].to_string());
                }
                self.pos = close_end;
            }
            None => {
                // Never closed: the rest of the input is its content.
                let text = self.alloc(Node::Text(Text::raw(&self.src[self.pos..])));
                self.append_to(id, text);
                self.pos = self.src.len();
            }
        }
    }

    fn end_tag(&mut self) {
        let start = self.pos;
        let end = match self.src[self.pos..].find('>') {
            Some(i) => self.pos + i + 1,
            None => self.src.len(),
        };
        self.pos = end;
        let raw = &self.src[start..end];

        let name: String = raw[2..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match self
            .stack
            .iter()
            .rposition(|&id| self.is_elem(id, &name))
        {
            Some(depth) => {
                // Elements above the match auto-close without an end tag.
                self.stack.truncate(depth + 1);
                if let Some(id) = self.stack.pop()
                    && let Some(elem) = self.nodes[id.index()].as_element_mut()
                {
                    elem.close_raw = Some(raw.to_string());
                }
            }
            None => {
                // Stray end tag: dropped (standard recovery).
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tree normalization
    // -------------------------------------------------------------------------

    /// Enforce the document invariants: one `html` root with unique,
    /// present `head` and `body`. Well-formed input takes the fast path
    /// and nothing moves.
    fn finish(mut self) -> Document {
        // Trailing document-level blanks and comments after a parsed root
        // belong to the epilogue.
        let root_pos = self.top.iter().position(|&id| self.is_elem(id, "html"));
        let mut epilogue = String::new();
        if let Some(rp) = root_pos {
            while self.top.len() > rp + 1 {
                let last = *self.top.last().expect("non-empty");
                let raw = match &self.nodes[last.index()] {
                    Node::Comment(c) => c.raw.clone(),
                    Node::Text(t) if t.raw.trim().is_empty() => t.raw.clone(),
                    _ => break,
                };
                epilogue.insert_str(0, &raw);
                self.top.pop();
            }
        }

        let (root, parsed_root) = match root_pos {
            Some(rp) => (self.top[rp], true),
            None => (self.alloc(Node::Element(Element::new("html"))), false),
        };
        let mut content: Vec<NodeId> = self
            .top
            .iter()
            .copied()
            .filter(|&id| id != root)
            .collect();

        let mut head = None;
        let mut body = None;
        for &child in self.child_ids(root).iter() {
            if head.is_none() && self.is_elem(child, "head") {
                head = Some(child);
            } else if body.is_none() && self.is_elem(child, "body") {
                body = Some(child);
            }
        }
        if !parsed_root {
            // A shell-less fragment may still carry bare head/body elements.
            let (mut h, mut b) = (head, body);
            content.retain(|&id| {
                if h.is_none() && self.is_elem(id, "head") {
                    h = Some(id);
                    false
                } else if b.is_none() && self.is_elem(id, "body") {
                    b = Some(id);
                    false
                } else {
                    true
                }
            });
            head = h;
            body = b;
        }

        let head = head.unwrap_or_else(|| self.alloc(Node::Element(Element::new("head"))));
        let body = match body {
            Some(b) => b,
            None => {
                // Everything under the root that is not the head becomes
                // body content.
                let b = self.alloc(Node::Element(Element::new("body")));
                let displaced: Vec<NodeId> = self
                    .child_ids(root)
                    .into_iter()
                    .filter(|&c| c != head)
                    .collect();
                self.set_children(b, displaced);
                self.set_children(root, vec![head, b]);
                b
            }
        };

        if !self.child_ids(root).contains(&head) {
            let at = self
                .child_ids(root)
                .iter()
                .position(|&c| c == body)
                .unwrap_or(0);
            if let Some(elem) = self.nodes[root.index()].as_element_mut() {
                elem.children.insert(at, head);
            }
            self.parents[head.index()] = Some(root);
        }
        if !self.child_ids(root).contains(&body) {
            self.append_to(root, body);
        }

        // Stray document-level nodes recover into the body, in order.
        for id in content {
            self.append_to(body, id);
        }

        Document {
            nodes: self.nodes,
            parents: self.parents,
            root,
            head,
            body,
            prologue: self.prologue,
            epilogue,
        }
    }

    fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.index()]
            .as_element()
            .map_or_else(Vec::new, |e| e.children.clone())
    }
}

// =============================================================================
// Token scanning
// =============================================================================

/// Find the byte offset just past the `>` that closes the tag starting at
/// `start`, honoring quoted attribute values that contain `>`.
fn scan_tag_end(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

/// Parse the attribute section of a start tag.
///
/// Names are lowercased, the first occurrence of a duplicate wins, entity
/// references in values are decoded, and bare names become boolean
/// attributes.
fn parse_attrs(s: &str) -> Attrs {
    let mut attrs = Attrs::default();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        let mut name = String::new();
        name.push(c);
        while let Some(&next) = chars.peek() {
            if next == '=' || next.is_whitespace() {
                break;
            }
            name.push(next);
            chars.next();
        }
        name.make_ascii_lowercase();

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            attrs.insert_first(name, None);
            continue;
        }
        chars.next(); // consume '='
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let value = match chars.peek() {
            Some(&q) if q == '"' || q == '\'' => {
                chars.next();
                let mut val = String::new();
                for c in chars.by_ref() {
                    if c == q {
                        break;
                    }
                    val.push(c);
                }
                val
            }
            _ => {
                let mut val = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    val.push(c);
                    chars.next();
                }
                val
            }
        };
        attrs.insert_first(name, Some(unescape(&value).into_owned()));
    }

    attrs
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(s: &str) -> Document {
        Document::parse(s.as_bytes()).expect("should parse")
    }

    #[test]
    fn test_rejects_empty_and_binary() {
        assert!(matches!(Document::parse(b""), Err(ParseError::Empty)));
        assert!(matches!(Document::parse(b"   \n  "), Err(ParseError::Empty)));
        assert!(matches!(
            Document::parse(b"\x89PNG\x00\x1a"),
            Err(ParseError::Binary)
        ));
        assert!(matches!(
            Document::parse(&[0xff, 0xfe, 0x41]),
            Err(ParseError::Binary)
        ));
    }

    #[test]
    fn test_well_formed_structure() {
        let doc = parse_str("<html><head><title>t</title></head><body><p>hi</p></body></html>");
        assert_eq!(doc.element(doc.html()).unwrap().tag, "html");
        assert_eq!(doc.parent(doc.head()), Some(doc.html()));
        assert_eq!(doc.parent(doc.body()), Some(doc.html()));
        assert_eq!(doc.text_content(doc.body()), "hi");
    }

    #[test]
    fn test_doctype_goes_to_prologue() {
        let doc = parse_str("<!DOCTYPE html>\n<!-- generator -->\n<html><head></head><body></body></html>");
        assert_eq!(doc.prologue, "<!DOCTYPE html>\n<!-- generator -->\n");
    }

    #[test]
    fn test_unclosed_tags_auto_close() {
        let doc = parse_str("<html><body><div>");
        let body_kids = doc.children(doc.body());
        assert_eq!(body_kids.len(), 1);
        assert_eq!(doc.element(body_kids[0]).unwrap().tag, "div");
        // head was synthesized
        assert_eq!(doc.element(doc.head()).unwrap().tag, "head");
    }

    #[test]
    fn test_mismatched_end_tag_auto_closes_inner() {
        let doc = parse_str("<html><head></head><body><b><i>x</b></body></html>");
        let b = doc.children(doc.body())[0];
        assert_eq!(doc.element(b).unwrap().tag, "b");
        let i = doc.children(b)[0];
        assert_eq!(doc.element(i).unwrap().tag, "i");
        assert_eq!(doc.text_content(i), "x");
    }

    #[test]
    fn test_fragment_recovers_into_body() {
        let doc = parse_str("hello <b>world</b>");
        assert_eq!(doc.text_content(doc.body()), "hello world");
        assert_eq!(doc.children(doc.head()).len(), 0);
    }

    #[test]
    fn test_stray_end_tag_dropped() {
        let doc = parse_str("<html><head></head><body></span><p>x</p></body></html>");
        let kids = doc.children(doc.body());
        assert_eq!(kids.len(), 1);
        assert_eq!(doc.element(kids[0]).unwrap().tag, "p");
    }

    #[test]
    fn test_void_elements_never_open() {
        let doc = parse_str("<html><head><link rel=\"stylesheet\" href=\"a.css\"><meta charset=\"utf-8\"></head><body></body></html>");
        let kids = doc.children(doc.head());
        assert_eq!(kids.len(), 2);
        assert_eq!(doc.element(kids[0]).unwrap().tag, "link");
        assert_eq!(doc.element(kids[1]).unwrap().tag, "meta");
    }

    #[test]
    fn test_script_content_is_raw_text() {
        let doc = parse_str(
            "<html><head><script>if (a < b) { x(\"</div>\"); }</script></head><body></body></html>",
        );
        let script = doc.children(doc.head())[0];
        assert_eq!(doc.element(script).unwrap().tag, "script");
        assert_eq!(doc.text_content(script), "if (a < b) { x(\"</div>\"); }");
    }

    #[test]
    fn test_attr_parsing() {
        let doc = parse_str(
            "<html><head></head><body><link REL=\"stylesheet\" href='a.css' media=print defer></body></html>",
        );
        let link = doc.children(doc.body())[0];
        let elem = doc.element(link).unwrap();
        assert_eq!(elem.attr("rel"), Some("stylesheet"));
        assert_eq!(elem.attr("href"), Some("a.css"));
        assert_eq!(elem.attr("media"), Some("print"));
        assert_eq!(elem.attr("defer"), Some(""));
        assert!(!elem.has_attr("async"));
    }

    #[test]
    fn test_attr_entities_decoded() {
        let doc = parse_str(
            "<html><head></head><body><a href=\"?a=1&amp;b=2\">x</a></body></html>",
        );
        let a = doc.children(doc.body())[0];
        assert_eq!(doc.element(a).unwrap().attr("href"), Some("?a=1&b=2"));
    }

    #[test]
    fn test_quoted_gt_in_attr() {
        let doc = parse_str(
            "<html><head></head><body><img alt=\"a > b\" src=\"x.png\"></body></html>",
        );
        let img = doc.children(doc.body())[0];
        assert_eq!(doc.element(img).unwrap().attr("alt"), Some("a > b"));
    }

    #[test]
    fn test_bom_preserved_in_prologue() {
        let src = "\u{feff}<!doctype html><html><head></head><body></body></html>";
        let doc = parse_str(src);
        assert!(doc.prologue.starts_with('\u{feff}'));
    }

    #[test]
    fn test_bare_head_and_body_adopted() {
        let doc = parse_str("<head><title>t</title></head><body><p>x</p></body>");
        assert_eq!(doc.text_content(doc.head()), "t");
        assert_eq!(doc.text_content(doc.body()), "x");
    }
}
