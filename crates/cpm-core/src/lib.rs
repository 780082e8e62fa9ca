//! cpm-core - format-preserving XML for MSBuild project files
//!
//! This crate provides:
//! - Lexer: two-mode tokenization of XML with exact byte spans
//! - Parser: construction of an element tree that keeps the original text
//! - Document: navigation by local name, attribute lookup, removal spans
//! - Edits: byte-range removals and insertions applied to the original text
//!
//! Nothing here re-serializes a document. Every rewrite is expressed as an
//! [`EditSet`] over the source, so bytes outside an edit never change.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lexer module - tokenization of XML source text
pub mod lexer;

/// Parser module - builds a [`Document`] from tokens
pub mod parser;

/// Parsed document tree
pub mod document;

/// Byte-range edits
pub mod edit;

/// Entity escaping
pub mod escape;

pub use document::{Attribute, Document, Element, ElementId, Node, QName};
pub use edit::{Edit, EditError, EditSet};
pub use escape::{escape, unescape};
pub use lexer::{LineIndex, Location, Span};
pub use parser::{ParseError, ParseErrorKind};
