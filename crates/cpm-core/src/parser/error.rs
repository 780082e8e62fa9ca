//! Parser error types for XML documents

use crate::lexer::{LexError, Location, Span, TokenKind};
use thiserror::Error;

/// A parse error with its position in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    /// Line and column of `span.start`
    pub location: Location,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, span: Span, location: Location) -> Self {
        Self {
            kind,
            span,
            location,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}", self.kind, self.location)
    }
}

impl std::error::Error for ParseError {}

/// The kind of parse error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("{0}")]
    Lex(LexError),

    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: TokenKind,
        expected: &'static str,
    },

    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedCloseTag { expected: String, found: String },

    #[error("closing tag </{0}> has no matching start tag")]
    UnmatchedCloseTag(String),

    #[error("element <{0}> is never closed")]
    UnclosedElement(String),

    #[error("attribute '{0}' appears more than once")]
    DuplicateAttribute(String),

    #[error("text outside the root element")]
    TextOutsideRoot,

    #[error("document has no root element")]
    MissingRoot,

    #[error("document has more than one root element")]
    MultipleRoots,
}
