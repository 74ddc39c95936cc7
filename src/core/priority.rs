//! Priority levels for transform ordering.

/// Priority level for transform ordering
///
/// Lower value = applied earlier in the pipeline. Transforms sharing a
/// level keep their configured order (stable sort).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Head content injection - runs before anything inspects the head
    Head = 0,
    /// Attribute rewrites on existing elements
    Rewrite = 1,
    /// Fallback markup that depends on earlier rewrites - runs last
    Fallback = 2,
}
