//! Reflow - HTML post-processing pipeline for full-page caches.
//!
//! A cached page is rendered once and served many times, so it is worth
//! spending a few milliseconds after render to make it paint faster:
//! inline the critical CSS, defer the rest, and leave `<noscript>`
//! fallbacks for script-less visitors. Reflow parses the rendered HTML,
//! applies an ordered list of idempotent transforms, and re-serializes
//! the page with byte-for-byte fidelity for everything it did not touch.
//!
//! # Architecture
//!
//! ```text
//! raw bytes -> Document::parse -> Pipeline (ordered transforms) -> serialize
//! ```
//!
//! A hard failure anywhere (parse, serialize, cancellation) falls back to
//! the original bytes - the pipeline never withholds a page from delivery.

pub mod config;
pub mod core;
pub mod dom;
pub mod logger;
pub mod pipeline;
pub mod transform;
