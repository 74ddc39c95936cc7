//! Critical CSS inliner.
//!
//! Drops the pre-resolved above-the-fold CSS into `<head>` as a `<style>`
//! element so the first paint needs no stylesheet fetch. The element is
//! placed ahead of the first stylesheet link, and its fixed `id` doubles
//! as the idempotence marker.

use crate::config::CriticalCssOptions;
use crate::core::Priority;
use crate::dom::{Document, Selector, Text};

use super::{Transform, TransformError, TransformId, CRITICAL_STYLE_ID};

pub struct CriticalCss {
    options: CriticalCssOptions,
}

impl CriticalCss {
    pub fn new(options: CriticalCssOptions) -> Self {
        Self { options }
    }

    fn marker_selector() -> Selector {
        Selector::parse(&format!("style[id={CRITICAL_STYLE_ID}]"))
            .expect("marker selector is well-formed")
    }
}

impl Transform for CriticalCss {
    fn id(&self) -> TransformId {
        TransformId::CriticalCss
    }

    fn priority(&self) -> Priority {
        Priority::Head
    }

    fn applicable(&self, doc: &Document) -> bool {
        !self.options.css.trim().is_empty()
            && doc.select_first(&Self::marker_selector()).is_none()
    }

    fn apply(&self, doc: &mut Document) -> Result<(), TransformError> {
        let css = self.options.css.trim();
        if css.contains("</style") {
            // A premature close inside the inlined text would truncate the
            // style element and leak the remainder as markup.
            return Err(TransformError::new(
                "critical CSS contains a style end tag",
            ));
        }

        let style = doc.create_element("style");
        if let Some(elem) = doc.element_mut(style) {
            elem.set_attr("id", CRITICAL_STYLE_ID);
        }
        let text = doc.create_text(Text::raw(css));
        doc.append_child(style, text);

        // Ahead of the first stylesheet so the fold styles win the race.
        let first_link = Selector::parse("link[rel=stylesheet]")
            .ok()
            .and_then(|sel| {
                let head = doc.head();
                doc.select(&sel).find(|&id| doc.parent(id) == Some(head))
            });
        match first_link {
            Some(link) => {
                let at = doc
                    .children(doc.head())
                    .iter()
                    .position(|&c| c == link)
                    .unwrap_or(0);
                doc.insert_child(doc.head(), at, style);
            }
            None => doc.append_child(doc.head(), style),
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn options(css: &str) -> CriticalCssOptions {
        CriticalCssOptions { css: css.to_string() }
    }

    fn parse(src: &str) -> Document {
        Document::parse(src.as_bytes()).expect("should parse")
    }

    #[test]
    fn test_inlines_before_first_stylesheet() {
        let mut doc = parse(
            "<html><head><meta charset=\"utf-8\"><link rel=\"stylesheet\" href=\"a.css\"></head><body></body></html>",
        );
        let transform = CriticalCss::new(options("body{margin:0}"));
        assert!(transform.applicable(&doc));
        transform.apply(&mut doc).expect("should apply");

        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        let style_at = out.find("reflow-critical-css").unwrap();
        let link_at = out.find("a.css").unwrap();
        assert!(style_at < link_at, "critical CSS must precede the stylesheet");
        assert!(out.contains("body{margin:0}"));
    }

    #[test]
    fn test_appends_when_no_stylesheet() {
        let mut doc = parse("<html><head><title>t</title></head><body></body></html>");
        CriticalCss::new(options(".x{}")).apply(&mut doc).unwrap();
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("<style id=\"reflow-critical-css\">.x{}</style></head>"));
    }

    #[test]
    fn test_idempotent_via_marker() {
        let mut doc = parse("<html><head></head><body></body></html>");
        let transform = CriticalCss::new(options("a{}"));
        transform.apply(&mut doc).unwrap();
        assert!(
            !transform.applicable(&doc),
            "second application must be gated off"
        );
    }

    #[test]
    fn test_not_applicable_without_css() {
        let doc = parse("<html><head></head><body></body></html>");
        assert!(!CriticalCss::new(options("  ")).applicable(&doc));
    }

    #[test]
    fn test_rejects_style_breakout() {
        let mut doc = parse("<html><head></head><body></body></html>");
        let result = CriticalCss::new(options("a{}</style><script>x()</script>")).apply(&mut doc);
        assert!(result.is_err());
    }
}
