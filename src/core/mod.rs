//! Core types - pure abstractions shared across the codebase.

mod priority;
mod state;

pub use priority::Priority;
pub use state::CancelToken;
