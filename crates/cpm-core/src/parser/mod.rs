//! Tree builder for XML documents
//!
//! The parser consumes the lexer's token stream and fills an element arena
//! in document order. It is strict about structure (tags must nest and
//! match, one root element) and lenient about everything it does not need:
//! DOCTYPE, processing instructions and comments are kept as opaque spans.
//!
//! ```
//! use cpm_core::Document;
//!
//! let doc = Document::parse(r#"<Project><ItemGroup/></Project>"#).unwrap();
//! assert_eq!(doc.element(doc.root()).name.as_str(), "Project");
//! ```

mod error;

pub use error::{ParseError, ParseErrorKind};

use crate::document::{Attribute, Element, ElementId, Node, QName};
use crate::escape::unescape;
use crate::lexer::{Lexer, LineIndex, Span, Token, TokenKind};

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

pub(crate) struct Parser<'a> {
    source: &'a str,
    line_index: &'a LineIndex,
    tokens: Vec<Token>,
    position: usize,
    elements: Vec<Element>,
    /// Elements whose end tag has not been seen yet
    open: Vec<ElementId>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, line_index: &'a LineIndex) -> Self {
        Self {
            source,
            line_index,
            tokens: Vec::new(),
            position: 0,
            elements: Vec::new(),
            open: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> ParseResult<Vec<Element>> {
        self.tokens = Lexer::tokenize(self.source)
            .map_err(|e| self.error(ParseErrorKind::Lex(e.error), e.span))?;

        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Text => {
                    if self.open.is_empty() {
                        if !is_blank(token.text(self.source)) {
                            return Err(self.error(ParseErrorKind::TextOutsideRoot, token.span));
                        }
                    } else {
                        self.push_node(Node::Text(token.span));
                    }
                }
                TokenKind::CData => {
                    if self.open.is_empty() {
                        return Err(self.error(ParseErrorKind::TextOutsideRoot, token.span));
                    }
                    self.push_node(Node::CData(token.span));
                }
                TokenKind::Comment => self.push_node(Node::Comment(token.span)),
                TokenKind::Instruction => self.push_node(Node::Instruction(token.span)),
                TokenKind::Doctype if self.elements.is_empty() => {}
                TokenKind::TagStart => self.start_tag(token)?,
                TokenKind::CloseTagStart => self.end_tag(token)?,
                found => {
                    return Err(self.error(
                        ParseErrorKind::UnexpectedToken {
                            found,
                            expected: "markup or text",
                        },
                        token.span,
                    ))
                }
            }
        }

        if let Some(&id) = self.open.last() {
            let element = &self.elements[id.0];
            return Err(self.error(
                ParseErrorKind::UnclosedElement(element.name.to_string()),
                element.start_tag,
            ));
        }
        if self.elements.is_empty() {
            #[allow(clippy::cast_possible_truncation)]
            let end = Span::at(self.source.len() as u32);
            return Err(self.error(ParseErrorKind::MissingRoot, end));
        }
        Ok(self.elements)
    }

    // ==================== Token Management ====================

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position.min(self.tokens.len() - 1)];
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> ParseResult<Token> {
        let token = self.advance();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.error(
                ParseErrorKind::UnexpectedToken {
                    found: token.kind,
                    expected,
                },
                token.span,
            ))
        }
    }

    fn error(&self, kind: ParseErrorKind, span: Span) -> ParseError {
        ParseError::new(kind, span, self.line_index.location(span.start))
    }

    // ==================== Tree Building ====================

    fn push_node(&mut self, node: Node) {
        // Comments and instructions outside the root are not part of the tree
        if let Some(&parent) = self.open.last() {
            self.elements[parent.0].children.push(node);
        }
    }

    fn start_tag(&mut self, open: Token) -> ParseResult<()> {
        let name_token = self.expect(TokenKind::Name, "element name")?;
        let name = QName::new(name_token.text(self.source));

        let mut attributes: Vec<Attribute> = Vec::new();
        let mut previous_end = name_token.span.end;
        let close = loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Name => {
                    self.expect(TokenKind::Eq, "'=' after attribute name")?;
                    let value = self.expect(TokenKind::Value, "quoted attribute value")?;
                    let attr_name = token.text(self.source);
                    if attributes.iter().any(|a| a.name.as_str() == attr_name) {
                        return Err(self.error(
                            ParseErrorKind::DuplicateAttribute(attr_name.to_string()),
                            token.span,
                        ));
                    }
                    let quoted = value.text(self.source);
                    attributes.push(Attribute {
                        name: QName::new(attr_name),
                        value: unescape(&quoted[1..quoted.len() - 1]).into_owned(),
                        span: Span::new(token.span.start, value.span.end),
                        removal: Span::new(previous_end, value.span.end),
                    });
                    previous_end = value.span.end;
                }
                TokenKind::TagEnd | TokenKind::EmptyTagEnd => break token,
                found => {
                    return Err(self.error(
                        ParseErrorKind::UnexpectedToken {
                            found,
                            expected: "attribute or end of tag",
                        },
                        token.span,
                    ))
                }
            }
        };

        let parent = self.open.last().copied();
        if parent.is_none() && !self.elements.is_empty() {
            return Err(self.error(ParseErrorKind::MultipleRoots, open.span));
        }

        let id = ElementId(self.elements.len());
        self.elements.push(Element {
            name,
            parent,
            attributes,
            children: Vec::new(),
            start_tag: Span::new(open.span.start, close.span.end),
            end_tag: None,
        });
        if let Some(parent) = parent {
            self.elements[parent.0].children.push(Node::Element(id));
        }
        if close.kind == TokenKind::TagEnd {
            self.open.push(id);
        }
        Ok(())
    }

    fn end_tag(&mut self, open: Token) -> ParseResult<()> {
        let name_token = self.expect(TokenKind::Name, "element name")?;
        let close = self.expect(TokenKind::TagEnd, "'>'")?;
        let found = name_token.text(self.source);

        let Some(id) = self.open.pop() else {
            return Err(self.error(
                ParseErrorKind::UnmatchedCloseTag(found.to_string()),
                open.span,
            ));
        };

        let expected = self.elements[id.0].name.as_str();
        if expected != found {
            return Err(self.error(
                ParseErrorKind::MismatchedCloseTag {
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
                open.span,
            ));
        }

        self.elements[id.0].end_tag = Some(Span::new(open.span.start, close.span.end));
        Ok(())
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{feff}')
}
