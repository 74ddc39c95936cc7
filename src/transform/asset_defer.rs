//! Render-blocking asset deferral.
//!
//! Stylesheet links become preload-and-swap (`rel="preload" as="style"`
//! with an onload handler restoring `rel="stylesheet"`), so the browser
//! paints without waiting on them. Optionally, ordinary external scripts
//! gain `defer`. Every rewritten link carries a marker attribute that the
//! noscript fallback transform keys off.
//!
//! Never touched: anything inside `noscript`, print stylesheets, inline
//! scripts, module scripts, and URLs on the exclusion list.

use crate::config::AssetDeferOptions;
use crate::core::Priority;
use crate::dom::{Document, NodeId, Selector};

use super::{in_noscript, Transform, TransformError, TransformId, DEFER_MARKER};

/// `onload` swap restoring the real rel once the stylesheet arrives.
const ONLOAD_SWAP: &str = "this.onload=null;this.rel='stylesheet'";

pub struct AssetDefer {
    options: AssetDeferOptions,
}

impl AssetDefer {
    pub fn new(options: AssetDeferOptions) -> Self {
        Self { options }
    }

    fn stylesheet_candidates(&self, doc: &Document) -> Vec<NodeId> {
        let Ok(sel) = Selector::parse("link[rel=stylesheet]") else {
            return Vec::new();
        };
        doc.select(&sel)
            .filter(|&id| {
                let Some(elem) = doc.element(id) else {
                    return false;
                };
                let Some(href) = elem.attr("href") else {
                    return false;
                };
                !elem.has_attr(DEFER_MARKER)
                    && elem.attr("media") != Some("print")
                    && !self.options.is_excluded(href)
                    && !in_noscript(doc, id)
            })
            .collect()
    }

    fn script_candidates(&self, doc: &Document) -> Vec<NodeId> {
        if !self.options.defer_scripts {
            return Vec::new();
        }
        let Ok(sel) = Selector::parse("script[src]") else {
            return Vec::new();
        };
        doc.select(&sel)
            .filter(|&id| {
                let Some(elem) = doc.element(id) else {
                    return false;
                };
                let Some(src) = elem.attr("src") else {
                    return false;
                };
                let plain_js = match elem.attr("type") {
                    None => true,
                    Some(t) => t.is_empty() || t == "text/javascript",
                };
                plain_js
                    && !elem.has_attr("defer")
                    && !elem.has_attr("async")
                    && !self.options.is_excluded(src)
                    && !in_noscript(doc, id)
            })
            .collect()
    }
}

impl Transform for AssetDefer {
    fn id(&self) -> TransformId {
        TransformId::AssetDefer
    }

    fn priority(&self) -> Priority {
        Priority::Rewrite
    }

    fn applicable(&self, doc: &Document) -> bool {
        !self.stylesheet_candidates(doc).is_empty() || !self.script_candidates(doc).is_empty()
    }

    fn apply(&self, doc: &mut Document) -> Result<(), TransformError> {
        for id in self.stylesheet_candidates(doc) {
            let Some(elem) = doc.element_mut(id) else {
                return Err(TransformError::new("stylesheet candidate vanished"));
            };
            elem.set_attr("rel", "preload");
            elem.set_attr("as", "style");
            elem.set_attr("onload", ONLOAD_SWAP);
            elem.set_flag(DEFER_MARKER);
        }
        for id in self.script_candidates(doc) {
            let Some(elem) = doc.element_mut(id) else {
                return Err(TransformError::new("script candidate vanished"));
            };
            elem.set_flag("defer");
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

    fn parse(src: &str) -> Document {
        Document::parse(src.as_bytes()).expect("should parse")
    }

    fn apply(doc: &mut Document, options: AssetDeferOptions) {
        AssetDefer::new(options).apply(doc).expect("should apply");
    }

    #[test]
    fn test_rewrites_stylesheet_to_preload() {
        let mut doc = parse(
            "<html><head><link rel=\"stylesheet\" href=\"a.css\"></head><body></body></html>",
        );
        apply(&mut doc, AssetDeferOptions::default());
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("rel=\"preload\""));
        assert!(out.contains("as=\"style\""));
        assert!(out.contains("href=\"a.css\""));
        assert!(out.contains(DEFER_MARKER));
        assert!(out.contains("onload="));
    }

    #[test]
    fn test_idempotent_second_pass_not_applicable() {
        let mut doc = parse(
            "<html><head><link rel=\"stylesheet\" href=\"a.css\"></head><body></body></html>",
        );
        let transform = AssetDefer::new(AssetDeferOptions::default());
        assert!(transform.applicable(&doc));
        transform.apply(&mut doc).unwrap();
        assert!(!transform.applicable(&doc));
    }

    #[test]
    fn test_skips_print_and_excluded_and_noscript() {
        let mut doc = parse(concat!(
            "<html><head>",
            "<link rel=\"stylesheet\" href=\"print.css\" media=\"print\">",
            "<link rel=\"stylesheet\" href=\"/wp-admin/admin.css\">",
            "</head><body>",
            "<noscript><link rel=\"stylesheet\" href=\"fallback.css\"></noscript>",
            "</body></html>",
        ));
        let transform = AssetDefer::new(AssetDeferOptions {
            defer_scripts: false,
            exclude: vec!["/wp-admin/".to_string()],
        });
        assert!(!transform.applicable(&doc));
        transform.apply(&mut doc).unwrap();
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(!out.contains("preload"));
    }

    #[test]
    fn test_defers_plain_scripts_only() {
        let mut doc = parse(concat!(
            "<html><head>",
            "<script src=\"app.js\"></script>",
            "<script src=\"already.js\" defer></script>",
            "<script src=\"mod.js\" type=\"module\"></script>",
            "<script>inline();</script>",
            "</head><body></body></html>",
        ));
        apply(
            &mut doc,
            AssetDeferOptions {
                defer_scripts: true,
                exclude: vec![],
            },
        );
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        // app.js was rewritten canonically with defer
        assert!(out.contains("<script src=\"app.js\" defer>"), "got: {out}");
        // untouched ones keep their raw spans
        assert!(out.contains("<script src=\"already.js\" defer>"));
        assert!(out.contains("<script src=\"mod.js\" type=\"module\">"));
        assert!(out.contains("<script>inline();</script>"));
    }

    #[test]
    fn test_scripts_ignored_by_default() {
        let doc = parse(
            "<html><head><script src=\"app.js\"></script></head><body></body></html>",
        );
        assert!(!AssetDefer::new(AssetDeferOptions::default()).applicable(&doc));
    }

    #[test]
    fn test_media_attr_preserved_on_rewrite() {
        let mut doc = parse(
            "<html><head><link rel=\"stylesheet\" href=\"wide.css\" media=\"(min-width: 60em)\"></head><body></body></html>",
        );
        apply(&mut doc, AssetDeferOptions::default());
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains("media=\"(min-width: 60em)\""));
    }
}
