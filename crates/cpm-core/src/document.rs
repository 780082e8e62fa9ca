//! Parsed XML documents that keep their original text.
//!
//! A [`Document`] owns the source string and an arena of [`Element`]s in
//! document order. Every element, attribute and text node records the byte
//! span it came from, so callers can locate exactly what to remove without
//! re-serializing anything.

use crate::escape::unescape;
use crate::lexer::{LineIndex, Location, Span};
use crate::parser::{ParseError, Parser};

/// Index of an element in its document's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

/// A possibly prefixed XML name such as `ItemGroup` or `msb:ItemGroup`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    raw: String,
}

impl QName {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The name exactly as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The name without its namespace prefix
    #[must_use]
    pub fn local(&self) -> &str {
        self.raw
            .split_once(':')
            .map_or(self.raw.as_str(), |(_, local)| local)
    }
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An attribute on a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    /// Value with entities decoded
    pub value: String,
    /// From the first byte of the name to the closing quote
    pub span: Span,
    /// `span` plus the whitespace that separates it from the previous token
    pub removal: Span,
}

/// A child of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Element(ElementId),
    Text(Span),
    /// Whole `<![CDATA[...]]>` section
    CData(Span),
    Comment(Span),
    Instruction(Span),
}

/// An element and its position in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub parent: Option<ElementId>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// `<Name ...>` or `<Name ... />`
    pub start_tag: Span,
    /// `</Name>`, absent for empty-element tags
    pub end_tag: Option<Span>,
}

impl Element {
    /// From the start tag's `<` to the end tag's `>`
    #[must_use]
    pub fn span(&self) -> Span {
        self.end_tag
            .map_or(self.start_tag, |end| self.start_tag.merge(end))
    }

    /// Returns true if written as `<Name ... />`
    #[must_use]
    pub fn is_empty_tag(&self) -> bool {
        self.end_tag.is_none()
    }

    /// Look up an attribute by its exact name (case-sensitive)
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.as_str() == name)
    }
}

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    elements: Vec<Element>,
    line_index: LineIndex,
}

impl Document {
    /// Parse `source` into a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not well-formed XML.
    pub fn parse(source: impl Into<String>) -> Result<Self, ParseError> {
        let source = source.into();
        let line_index = LineIndex::new(&source);
        let elements = Parser::new(&source, &line_index).parse()?;
        Ok(Self {
            source,
            elements,
            line_index,
        })
    }

    /// The original text, unchanged
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The document element
    #[must_use]
    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Look up an element by id
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to another document.
    #[must_use]
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    /// Look up an element by id, returning `None` if it is not in this document
    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    /// All elements in document order
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (ElementId(i), e))
    }

    /// Elements whose local name is `local`, anywhere in the document
    pub fn elements_named<'a>(
        &'a self,
        local: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.elements()
            .filter(move |(_, e)| e.name.local() == local)
            .map(|(id, _)| id)
    }

    /// Direct child elements of `id`
    pub fn children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.element(id).children.iter().filter_map(|node| match node {
            Node::Element(child) => Some(*child),
            _ => None,
        })
    }

    /// Direct child elements of `id` whose local name is `local`
    pub fn children_named<'a>(
        &'a self,
        id: ElementId,
        local: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.children(id)
            .filter(move |child| self.element(*child).name.local() == local)
    }

    /// Character data directly inside `id`, entities decoded and CDATA unwrapped
    #[must_use]
    pub fn text(&self, id: ElementId) -> String {
        let mut text = String::new();
        for node in &self.element(id).children {
            match node {
                Node::Text(span) => text.push_str(&unescape(span.slice(&self.source))),
                Node::CData(span) => {
                    let raw = span.slice(&self.source);
                    text.push_str(&raw["<![CDATA[".len()..raw.len() - "]]>".len()]);
                }
                _ => {}
            }
        }
        text
    }

    /// Whitespace that precedes `id` on its own line, if it starts a line
    #[must_use]
    pub fn indentation(&self, id: ElementId) -> Option<&str> {
        let start = self.element(id).start_tag.start as usize;
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let indent = &self.source[line_start..start];
        indent
            .chars()
            .all(|c| c == ' ' || c == '\t')
            .then_some(indent)
    }

    /// Bytes to delete to remove `id` from the document.
    ///
    /// When the element sits alone on its line the span also covers the
    /// indentation and the line break before it, so no blank line is left.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn removal_span(&self, id: ElementId) -> Span {
        let span = self.element(id).span();
        let before = &self.source[..span.start as usize];
        let trimmed = before.trim_end_matches([' ', '\t']);
        let after = &self.source[span.end as usize..];
        let line_ends_after = after
            .trim_start_matches([' ', '\t'])
            .starts_with(['\r', '\n'])
            || after.trim_start_matches([' ', '\t']).is_empty();

        if line_ends_after {
            if let Some(stripped) = trimmed.strip_suffix('\n') {
                let start = stripped.strip_suffix('\r').unwrap_or(stripped).len();
                return Span::new(start as u32, span.end);
            }
        }
        span
    }

    /// Line and column of a byte offset
    #[must_use]
    pub fn location(&self, offset: u32) -> Location {
        self.line_index.location(offset)
    }
}
