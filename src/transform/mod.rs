//! Document transforms.
//!
//! Each transform is one idempotent operation over a [`Document`]: it
//! declares whether it applies, then mutates the tree. Ordering between
//! transforms is the pipeline's job (via [`Priority`]); a transform never
//! assumes anything about sibling transforms beyond its documented inputs.
//!
//! # Modules
//!
//! - `critical_css`: inlines pre-resolved critical CSS into `<head>`
//! - `asset_defer`: rewrites render-blocking stylesheets/scripts to load late
//! - `noscript`: appends `<noscript>` fallbacks for deferred stylesheets

mod asset_defer;
mod critical_css;
mod noscript;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::Priority;
use crate::dom::Document;

pub use asset_defer::AssetDefer;
pub use critical_css::CriticalCss;
pub use noscript::NoscriptFallback;

// =============================================================================
// Markers
// =============================================================================

/// `id` of the inlined critical CSS `<style>` element.
pub const CRITICAL_STYLE_ID: &str = "reflow-critical-css";

/// Marker attribute left on every stylesheet link rewritten to preload.
pub const DEFER_MARKER: &str = "data-reflow-defer";

/// Marker attribute on `<noscript>` fallbacks this pipeline appended.
pub const NOSCRIPT_MARKER: &str = "data-reflow-noscript";

/// True when the node sits anywhere under a `noscript` element.
///
/// Shared guard: transforms never touch fallback markup.
pub(crate) fn in_noscript(doc: &Document, id: crate::dom::NodeId) -> bool {
    let mut current = doc.parent(id);
    while let Some(ancestor) = current {
        if doc.element(ancestor).is_some_and(|e| e.tag == "noscript") {
            return true;
        }
        current = doc.parent(ancestor);
    }
    false
}

// =============================================================================
// Transform
// =============================================================================

/// A single idempotent operation over a document.
pub trait Transform {
    fn id(&self) -> TransformId;

    /// Ordering level; the pipeline applies ascending levels, stable
    /// within a level.
    fn priority(&self) -> Priority;

    /// Cheap predicate: false means "nothing to do here", which the
    /// pipeline treats as a skip, never an error. Also the idempotence
    /// gate: a transform that already ran reports false.
    fn applicable(&self, doc: &Document) -> bool;

    /// Mutate the document. On error the pipeline restores its pre-apply
    /// snapshot, so implementations may bail at any point.
    fn apply(&self, doc: &mut Document) -> Result<(), TransformError>;
}

/// Closed identifier set for the configured transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformId {
    CriticalCss,
    AssetDefer,
    NoscriptFallback,
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformId::CriticalCss => "critical-css",
            TransformId::AssetDefer => "asset-defer",
            TransformId::NoscriptFallback => "noscript-fallback",
        };
        f.write_str(name)
    }
}

/// One transform failed; recovered by the pipeline, run continues.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Instantiate the transform for an id, with its options from the config.
///
/// Dispatch on the closed enum happens here, outside the pipeline loop.
pub fn build(id: TransformId, config: &PipelineConfig) -> Box<dyn Transform> {
    match id {
        TransformId::CriticalCss => Box::new(CriticalCss::new(config.critical_css.clone())),
        TransformId::AssetDefer => Box::new(AssetDefer::new(config.asset_defer.clone())),
        TransformId::NoscriptFallback => Box::new(NoscriptFallback::new()),
    }
}

// =============================================================================
// Tests
// =============================================================================
