//! Selector parsing and lazy matching.
//!
//! Supports the subset the transforms need: tag names, `#id`, `.class`,
//! `[attr]` / `[attr=value]`, compound simple selectors, the descendant
//! combinator, and comma-separated lists. Matching walks the tree in
//! document order and never mutates.

use super::error::SelectorError;
use super::node::{Element, NodeId};
use super::Document;

// =============================================================================
// Selector
// =============================================================================

/// A parsed selector: one or more descendant chains, any of which may match.
#[derive(Debug, Clone)]
pub struct Selector {
    alternatives: Vec<Chain>,
}

/// Compounds in ancestor-to-target order, joined by the descendant
/// combinator.
#[derive(Debug, Clone)]
struct Chain {
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone)]
struct AttrTest {
    name: String,
    value: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(SelectorError::Empty);
            }
            let compounds = part
                .split_whitespace()
                .map(parse_compound)
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(Chain { compounds });
        }
        Ok(Self { alternatives })
    }

    pub(crate) fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(doc, id))
    }
}

impl Chain {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(elem) = doc.element(id) else {
            return false;
        };
        let Some((target, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !target.matches(elem) {
            return false;
        }

        // Remaining compounds must match successively higher ancestors.
        let mut current = doc.parent(id);
        for compound in ancestors.iter().rev() {
            loop {
                let Some(ancestor) = current else {
                    return false;
                };
                current = doc.parent(ancestor);
                if doc.element(ancestor).is_some_and(|e| compound.matches(e)) {
                    break;
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches(&self, elem: &Element) -> bool {
        if let Some(tag) = &self.tag
            && elem.tag != *tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && elem.attr("id") != Some(id.as_str())
        {
            return false;
        }
        if self.classes.iter().any(|c| !elem.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|test| {
            match (elem.attr(&test.name), &test.value) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(actual), Some(wanted)) => actual == wanted,
            }
        })
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(s: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    let mut chars = s.chars().peekable();

    if chars.peek() == Some(&'*') {
        chars.next();
    } else if chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
        let mut tag = String::new();
        while chars.peek().copied().is_some_and(is_ident_char) {
            tag.push(chars.next().expect("peeked"));
        }
        compound.tag = Some(tag.to_ascii_lowercase());
    }

    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                chars.next();
                let ident = take_ident(&mut chars);
                if ident.is_empty() {
                    return Err(SelectorError::Unexpected('#'));
                }
                compound.id = Some(ident);
            }
            '.' => {
                chars.next();
                let ident = take_ident(&mut chars);
                if ident.is_empty() {
                    return Err(SelectorError::Unexpected('.'));
                }
                compound.classes.push(ident);
            }
            '[' => {
                chars.next();
                compound.attrs.push(parse_attr_test(&mut chars)?);
            }
            other => return Err(SelectorError::Unexpected(other)),
        }
    }

    Ok(compound)
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while chars.peek().copied().is_some_and(is_ident_char) {
        ident.push(chars.next().expect("peeked"));
    }
    ident
}

fn parse_attr_test(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<AttrTest, SelectorError> {
    let name = take_ident(chars).to_ascii_lowercase();
    if name.is_empty() {
        return Err(SelectorError::Unexpected('['));
    }

    match chars.next() {
        Some(']') => Ok(AttrTest { name, value: None }),
        Some('=') => {
            let quote = match chars.peek() {
                Some(&q) if q == '"' || q == '\'' => {
                    chars.next();
                    Some(q)
                }
                _ => None,
            };
            let mut value = String::new();
            let mut closed = false;
            if let Some(q) = quote {
                let mut quote_ended = false;
                for c in chars.by_ref() {
                    if !quote_ended {
                        if c == q {
                            quote_ended = true;
                        } else {
                            value.push(c);
                        }
                    } else if c == ']' {
                        closed = true;
                        break;
                    } else {
                        return Err(SelectorError::Unexpected(c));
                    }
                }
            } else {
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
            }
            if !closed {
                return Err(SelectorError::UnclosedBracket);
            }
            Ok(AttrTest {
                name,
                value: Some(value),
            })
        }
        _ => Err(SelectorError::UnclosedBracket),
    }
}

// =============================================================================
// Select iterator
// =============================================================================

/// Lazy document-order iterator over matching element ids.
///
/// Finite and not restartable: create a fresh one per query.
pub struct Select<'a> {
    doc: &'a Document,
    selector: &'a Selector,
    stack: Vec<NodeId>,
}

impl<'a> Select<'a> {
    pub(crate) fn new(doc: &'a Document, selector: &'a Selector) -> Self {
        Self {
            doc,
            selector,
            stack: vec![doc.html()],
        }
    }
}

impl Iterator for Select<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            if let Some(elem) = self.doc.element(id) {
                self.stack.extend(elem.children().iter().rev().copied());
                if self.selector.matches(self.doc, id) {
                    return Some(id);
                }
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
