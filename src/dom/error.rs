//! Document model error types.

use thiserror::Error;

/// Input could not be turned into a document at all.
///
/// Parsing is deliberately forgiving - unclosed tags, stray text, and a
/// missing `head`/`body` are all recovered. Only input that is not HTML
/// text in the first place is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("binary or non-UTF-8 input")]
    Binary,
}

/// Serialization failed for a structurally pathological tree.
///
/// Should not occur for any tree produced by parsing plus transforms; the
/// pipeline treats it as fatal and falls back to the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("document nesting exceeds the serializer depth limit")]
    TooDeep,
}

/// A selector string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unclosed attribute selector")]
    UnclosedBracket,

    #[error("unexpected character `{0}` in selector")]
    Unexpected(char),
}
