//! Noscript fallbacks for deferred stylesheets.
//!
//! The preload-and-swap rewrite relies on JavaScript to restore
//! `rel="stylesheet"`. For script-less visitors, every deferred link gets
//! a plain `<link rel="stylesheet">` clone wrapped in `<noscript>` and
//! appended to `body`. The resource URL is the stable key: a fallback
//! that already exists for an URL - ours or hand-written - is never
//! duplicated, no matter how often the pipeline re-runs over its own
//! output.

use rustc_hash::FxHashSet;

use crate::core::Priority;
use crate::dom::{Document, NodeId, Selector};

use super::{in_noscript, Transform, TransformError, TransformId, DEFER_MARKER, NOSCRIPT_MARKER};

#[derive(Default)]
pub struct NoscriptFallback;

impl NoscriptFallback {
    pub fn new() -> Self {
        Self
    }

    /// URLs already covered by a fallback anywhere in the document.
    fn covered_urls(doc: &Document) -> FxHashSet<String> {
        let Ok(sel) = Selector::parse("noscript link[href]") else {
            return FxHashSet::default();
        };
        doc.select(&sel)
            .filter_map(|id| doc.element(id).and_then(|e| e.attr("href")))
            .map(str::to_string)
            .collect()
    }

    /// Candidate links still missing a fallback, with their href/media.
    ///
    /// Candidates are links the defer rewrite tagged, plus plain
    /// stylesheet links (the transform also runs standalone, ahead of an
    /// external async loader). Print stylesheets never block rendering
    /// and get no fallback.
    fn pending(doc: &Document) -> Vec<(NodeId, String, Option<String>)> {
        let Ok(sel) = Selector::parse(&format!("link[{DEFER_MARKER}], link[rel=stylesheet]"))
        else {
            return Vec::new();
        };
        let covered = Self::covered_urls(doc);
        doc.select(&sel)
            .filter_map(|id| {
                let elem = doc.element(id)?;
                let href = elem.attr("href")?;
                if covered.contains(href)
                    || elem.attr("media") == Some("print")
                    || in_noscript(doc, id)
                {
                    return None;
                }
                Some((id, href.to_string(), elem.attr("media").map(str::to_string)))
            })
            .collect()
    }
}

impl Transform for NoscriptFallback {
    fn id(&self) -> TransformId {
        TransformId::NoscriptFallback
    }

    fn priority(&self) -> Priority {
        Priority::Fallback
    }

    fn applicable(&self, doc: &Document) -> bool {
        !Self::pending(doc).is_empty()
    }

    fn apply(&self, doc: &mut Document) -> Result<(), TransformError> {
        let pending = Self::pending(doc);
        // Dedupe within this batch as well: two deferred links may share
        // one URL.
        let mut appended: FxHashSet<String> = FxHashSet::default();

        for (_, href, media) in pending {
            if !appended.insert(href.clone()) {
                continue;
            }
            let noscript = doc.create_element("noscript");
            let Some(elem) = doc.element_mut(noscript) else {
                return Err(TransformError::new("noscript element vanished"));
            };
            elem.set_flag(NOSCRIPT_MARKER);

            let link = doc.create_element("link");
            let Some(elem) = doc.element_mut(link) else {
                return Err(TransformError::new("fallback link vanished"));
            };
            elem.set_attr("rel", "stylesheet");
            elem.set_attr("href", href);
            if let Some(media) = media {
                elem.set_attr("media", media);
            }

            doc.append_child(noscript, link);
            doc.append_child(doc.body(), noscript);
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
    use crate::config::AssetDeferOptions;
    use crate::transform::AssetDefer;

    fn parse(src: &str) -> Document {
        Document::parse(src.as_bytes()).expect("should parse")
    }

    /// Defer first, as the pipeline would.
    fn deferred_page(links: &str) -> Document {
        let mut doc = parse(&format!(
            "<html><head>{links}</head><body><p>content</p></body></html>"
        ));
        AssetDefer::new(AssetDeferOptions::default())
            .apply(&mut doc)
            .expect("defer should apply");
        doc
    }

    #[test]
    fn test_appends_fallback_to_body() {
        let mut doc = deferred_page("<link rel=\"stylesheet\" href=\"a.css\">");
        let transform = NoscriptFallback::new();
        assert!(transform.applicable(&doc));
        transform.apply(&mut doc).unwrap();

        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        // Original (rewritten) link still present
        assert!(out.contains("rel=\"preload\""));
        // Fallback appended inside body
        assert!(out.contains(
            "<noscript data-reflow-noscript><link rel=\"stylesheet\" href=\"a.css\"></noscript></body>"
        ), "got: {out}");
    }

    #[test]
    fn test_exactly_once_across_two_runs() {
        let mut doc = deferred_page("<link rel=\"stylesheet\" href=\"a.css\">");
        let transform = NoscriptFallback::new();
        transform.apply(&mut doc).unwrap();
        assert!(
            !transform.applicable(&doc),
            "fallback for a.css already exists"
        );

        // Whole-pipeline re-entry: parse the serialized output and run again
        let bytes = doc.serialize().unwrap();
        let doc2 = Document::parse(&bytes).unwrap();
        assert!(!transform.applicable(&doc2));
        let out = String::from_utf8(doc2.serialize().unwrap()).unwrap();
        assert_eq!(out.matches("<noscript").count(), 1);
    }

    #[test]
    fn test_respects_hand_written_fallback() {
        let mut doc = parse(concat!(
            "<html><head>",
            "<link rel=\"stylesheet\" href=\"a.css\">",
            "</head><body>",
            "<noscript><link rel=\"stylesheet\" href=\"a.css\"></noscript>",
            "</body></html>",
        ));
        AssetDefer::new(AssetDeferOptions::default())
            .apply(&mut doc)
            .unwrap();
        assert!(!NoscriptFallback::new().applicable(&doc));
    }

    #[test]
    fn test_batch_dedupes_shared_url() {
        let mut doc = deferred_page(concat!(
            "<link rel=\"stylesheet\" href=\"a.css\">",
            "<link rel=\"stylesheet\" href=\"a.css\" media=\"screen\">",
        ));
        NoscriptFallback::new().apply(&mut doc).unwrap();
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert_eq!(out.matches("<noscript").count(), 1);
    }

    #[test]
    fn test_media_carried_into_fallback() {
        let mut doc = deferred_page(
            "<link rel=\"stylesheet\" href=\"wide.css\" media=\"(min-width: 60em)\">",
        );
        NoscriptFallback::new().apply(&mut doc).unwrap();
        let out = String::from_utf8(doc.serialize().unwrap()).unwrap();
        assert!(out.contains(
            "<link rel=\"stylesheet\" href=\"wide.css\" media=\"(min-width: 60em)\"></noscript>"
        ));
    }

    #[test]
    fn test_nothing_deferred_nothing_applicable() {
        let doc = parse("<html><head></head><body></body></html>");
        assert!(!NoscriptFallback::new().applicable(&doc));
    }
}
