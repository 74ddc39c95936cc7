//! Rendering a document back to bytes.
//!
//! Untouched regions come straight from their raw source spans, so a parse
//! followed by an immediate serialize reproduces well-formed input
//! byte-for-byte. Only synthesized elements and elements whose attributes a
//! transform rewrote are rendered canonically: lowercase tag, attributes in
//! stored order, double-quoted escaped values. Auto-closed elements gain
//! their missing end tag.

use super::error::SerializeError;
use super::html::escape_attr;
use super::node::{Element, Node, NodeId};
use super::Document;

/// Nesting guard. Real pages stay far below this; a tree deeper than the
/// limit indicates a corrupted or adversarial structure.
const MAX_DEPTH: usize = 512;

enum Frame {
    Enter(NodeId),
    Close(NodeId),
}

impl Document {
    /// Serialize the tree, prologue and epilogue included.
    ///
    /// Deterministic: attribute order is the stored order, text is emitted
    /// exactly as held by the nodes, entities are never re-encoded.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut out = String::with_capacity(self.prologue.len() + self.node_count() * 16);
        out.push_str(&self.prologue);

        let mut stack = vec![Frame::Enter(self.html())];
        let mut depth = 0usize;

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => match self.node(id) {
                    Node::Text(t) => out.push_str(&t.raw),
                    Node::Comment(c) => out.push_str(&c.raw),
                    Node::Element(elem) => {
                        depth += 1;
                        if depth > MAX_DEPTH {
                            return Err(SerializeError::TooDeep);
                        }
                        write_open_tag(&mut out, elem);
                        stack.push(Frame::Close(id));
                        for &child in elem.children().iter().rev() {
                            stack.push(Frame::Enter(child));
                        }
                    }
                },
                Frame::Close(id) => {
                    depth -= 1;
                    if let Some(elem) = self.element(id) {
                        match &elem.close_raw {
                            Some(raw) => out.push_str(raw),
                            None if !elem.is_void() => {
                                out.push_str("</");
                                out.push_str(&elem.tag);
                                out.push('>');
                            }
                            None => {}
                        }
                    }
                }
            }
        }

        out.push_str(&self.epilogue);
        Ok(out.into_bytes())
    }
}

fn write_open_tag(out: &mut String, elem: &Element) {
    if let Some(raw) = &elem.open_raw {
        out.push_str(raw);
        return;
    }
    out.push('<');
    out.push_str(&elem.tag);
    for (name, value) in elem.attrs() {
        out.push(' ');
        out.push_str(name);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
    }
    out.push('>');
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Text;

    fn round_trip(src: &str) {
        let doc = Document::parse(src.as_bytes()).expect("should parse");
        let out = doc.serialize().expect("should serialize");
        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            src,
            "well-formed input must round-trip byte-for-byte"
        );
    }

    #[test]
    fn test_round_trip_minimal() {
        round_trip("<html><head></head><body></body></html>");
    }

    #[test]
    fn test_round_trip_realistic_page() {
        round_trip(concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n",
            "  <meta charset=\"UTF-8\">\n",
            "  <title>Cached &amp; Served</title>\n",
            "  <link rel=\"stylesheet\" href=\"/css/main.css?v=3\">\n",
            "  <style>body { margin: 0 }</style>\n",
            "  <script>window.a = 1 < 2;</script>\n",
            "</head>\n",
            "<body class=\"Home Page\">\n",
            "  <!-- served from cache -->\n",
            "  <DIV id=\"app\" data-x='1'>hello &mdash; world</DIV>\n",
            "  <img src=\"hero.jpg\" alt=\"a > b\">\n",
            "</body>\n",
            "</html>\n",
        ));
    }

    #[test]
    fn test_round_trip_preserves_bom_and_doctype() {
        round_trip("\u{feff}<!doctype HTML>\n<!-- keep me -->\n<html><head></head><body></body></html>\n\n");
    }

    #[test]
    fn test_auto_closed_tags_gain_end_tags() {
        let doc = Document::parse(b"<html><body><div>").unwrap();
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.ends_with("</div></body></html>"), "got: {out}");
        assert!(out.contains("<head></head>"));
    }

    #[test]
    fn test_mutated_element_renders_canonically() {
        let src = "<html><head></head><body><LINK REL=\"stylesheet\" HREF=\"a.css\"></body></html>";
        let mut doc = Document::parse(src.as_bytes()).unwrap();
        let link = doc.children(doc.body())[0];
        doc.element_mut(link).unwrap().set_attr("rel", "preload");
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        // Rewritten tag is canonical, attribute order preserved
        assert!(out.contains("<link rel=\"preload\" href=\"a.css\">"), "got: {out}");
        // The rest of the page is untouched
        assert!(out.starts_with("<html><head></head><body>"));
    }

    #[test]
    fn test_attr_escaping_on_rewrite() {
        let mut doc = Document::parse(b"<html><head></head><body></body></html>").unwrap();
        let a = doc.create_element("a");
        doc.element_mut(a).unwrap().set_attr("href", "?a=1&b=\"2\"");
        doc.append_child(doc.body(), a);
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("<a href=\"?a=1&amp;b=&quot;2&quot;\"></a>"));
    }

    #[test]
    fn test_boolean_attr_renders_bare() {
        let mut doc = Document::parse(b"<html><head></head><body></body></html>").unwrap();
        let script = doc.create_element("script");
        doc.element_mut(script).unwrap().set_attr("src", "x.js");
        doc.element_mut(script).unwrap().set_flag("defer");
        doc.append_child(doc.body(), script);
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("<script src=\"x.js\" defer></script>"));
    }

    #[test]
    fn test_wrap_then_serialize() {
        let src = "<html><head></head><body><link rel=\"stylesheet\" href=\"a.css\"><p>x</p></body></html>";
        let mut doc = Document::parse(src.as_bytes()).unwrap();
        let link = doc.children(doc.body())[0];
        doc.wrap_in_element(link, "noscript");
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains(
            "<noscript><link rel=\"stylesheet\" href=\"a.css\"></noscript><p>x</p>"
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = Document::parse(b"<html><head></head><body></body></html>").unwrap();
        let mut parent = doc.body();
        for _ in 0..600 {
            let div = doc.create_element("div");
            doc.append_child(parent, div);
            parent = div;
        }
        assert!(matches!(doc.serialize(), Err(SerializeError::TooDeep)));
    }

    #[test]
    fn test_created_text_is_verbatim() {
        let mut doc = Document::parse(b"<html><head></head><body></body></html>").unwrap();
        let style = doc.create_element("style");
        let css = doc.create_text(Text::raw("a>b{color:red}"));
        doc.append_child(style, css);
        doc.append_child(doc.head(), style);
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("<style>a>b{color:red}</style>"));
    }
}
