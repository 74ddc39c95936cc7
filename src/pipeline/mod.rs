//! The post-processing pipeline.
//!
//! One run moves through `Pending -> Parsing -> Transforming(i) ->
//! Serializing -> Done`, where `i` walks the configured transforms in
//! ascending priority order; any step may divert to `Failed(reason)`.
//!
//! The failure policy bounds blast radius:
//!
//! - a transform whose `applicable` is false is skipped, not failed
//! - a transform whose `apply` errors is rolled back to its pre-apply
//!   snapshot and recorded; the run continues with the next transform
//! - parse errors, serialize errors, guard rejection, and cancellation are
//!   terminal - the caller gets the original bytes back, unchanged
//!
//! Either way the caller always receives bytes to deliver: `Done` yields
//! the transformed page, `Failed` yields the input verbatim, and nothing
//! half-applied ever escapes.

use serde::Serialize;
use std::fmt;

use crate::config::PipelineConfig;
use crate::core::CancelToken;
use crate::dom::{Document, ParseError, SerializeError};
use crate::transform::{self, TransformId};
use crate::{debug, log};

// =============================================================================
// Outcome types
// =============================================================================

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Transformed bytes were produced.
    Done,
    /// The run aborted; the outcome carries the original input.
    Failed(FailReason),
}

impl PipelineStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, PipelineStatus::Done)
    }
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// The entry guard declined to build a DOM for this input.
    Rejected,
    Parse(ParseError),
    Serialize(SerializeError),
    Cancelled,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Rejected => write!(f, "rejected by entry guard"),
            FailReason::Parse(e) => write!(f, "parse failed: {e}"),
            FailReason::Serialize(e) => write!(f, "serialize failed: {e}"),
            FailReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One recovered transform failure, kept for observability.
#[derive(Debug, Clone, Serialize)]
pub struct TransformFailure {
    pub transform: TransformId,
    pub reason: String,
}

/// What the caller gets back, whatever happened.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    /// Transformed page on `Done`, the untouched input on `Failed`.
    pub bytes: Vec<u8>,
    /// Soft failures, in application order. Never silently dropped.
    pub failures: Vec<TransformFailure>,
}

// =============================================================================
// Pipeline
// =============================================================================

/// A configured pipeline, reusable across documents.
///
/// Each `run` call processes one document in isolation; sharing a pipeline
/// between threads is fine since runs only read the config.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    cancel: CancelToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a shared cancellation token, checked at every transform
    /// boundary.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process one page. Never panics, never returns without bytes.
    pub fn run(&self, input: &[u8]) -> PipelineOutcome {
        let mut failures = Vec::new();
        match self.process(input, &mut failures) {
            Ok(bytes) => PipelineOutcome {
                status: PipelineStatus::Done,
                bytes,
                failures,
            },
            Err(reason) => {
                debug!("pipeline"; "run failed ({reason}), falling back to original bytes");
                PipelineOutcome {
                    status: PipelineStatus::Failed(reason),
                    bytes: input.to_vec(),
                    failures,
                }
            }
        }
    }

    fn process(
        &self,
        input: &[u8],
        failures: &mut Vec<TransformFailure>,
    ) -> Result<Vec<u8>, FailReason> {
        if !self.config.guard.allows(input) {
            return Err(FailReason::Rejected);
        }

        let mut doc = Document::parse(input).map_err(FailReason::Parse)?;

        let mut transforms: Vec<_> = self
            .config
            .transforms
            .iter()
            .map(|&id| transform::build(id, self.config))
            .collect();
        // Stable: configured order survives within a priority level
        transforms.sort_by_key(|t| t.priority());

        for (i, t) in transforms.iter().enumerate() {
            // Cooperative cancellation checkpoint at each step boundary
            if self.cancel.is_cancelled() {
                return Err(FailReason::Cancelled);
            }
            if !t.applicable(&doc) {
                debug!("pipeline"; "transforming[{i}] {}: skipped (not applicable)", t.id());
                continue;
            }
            debug!("pipeline"; "transforming[{i}] {}", t.id());

            let snapshot = doc.clone();
            if let Err(e) = t.apply(&mut doc) {
                log!("pipeline"; "transform {} failed: {e}; document restored", t.id());
                doc = snapshot;
                failures.push(TransformFailure {
                    transform: t.id(),
                    reason: e.to_string(),
                });
            }
        }

        if self.cancel.is_cancelled() {
            return Err(FailReason::Cancelled);
        }
        doc.serialize().map_err(FailReason::Serialize)
    }
}

// =============================================================================
// Tests
// =============================================================================
