//! Lossless lexer for XML build files
//!
//! The lexer never rewrites or drops input: every byte of the source belongs
//! to exactly one token span or to inter-token whitespace inside a tag. This
//! is what lets later stages remove a single attribute or element and leave
//! every other byte where it was.
//!
//! Two modes are used:
//! - content mode, between tags: text, comments, CDATA, processing
//!   instructions, DOCTYPE, and the `<` / `</` that open a tag
//! - tag mode, inside `<...>`: names, `=`, quoted values, `>` and `/>`

#![allow(clippy::cast_possible_truncation)] // Spans are u32; descriptors over 4GB are unsupported

mod span;
mod token;

pub use span::{LineIndex, Location, Span};
pub use token::TokenKind;

use logos::Logos;
use thiserror::Error;
use token::{ContentToken, TagToken};

/// A token with its kind and location in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The source text covered by this token
    #[must_use]
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        self.span.slice(source)
    }
}

/// Lexer error types
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated CDATA section")]
    UnterminatedCData,
    #[error("unterminated processing instruction")]
    UnterminatedInstruction,
    #[error("unterminated DOCTYPE")]
    UnterminatedDoctype,
    #[error("unterminated attribute value")]
    UnterminatedValue,
    #[error("unterminated tag")]
    UnterminatedTag,
}

/// A lexer error with the span where it was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpannedError {
    pub error: LexError,
    pub span: Span,
}

impl SpannedError {
    #[must_use]
    pub const fn new(error: LexError, span: Span) -> Self {
        Self { error, span }
    }
}

impl std::fmt::Display for SpannedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.error, self.span)
    }
}

impl std::error::Error for SpannedError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexerMode {
    Content,
    Tag,
}

/// The XML lexer
pub struct Lexer<'source> {
    source: &'source str,
    /// Current byte offset
    position: usize,
    mode: LexerMode,
}

impl<'source> Lexer<'source> {
    #[must_use]
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            position: 0,
            mode: LexerMode::Content,
        }
    }

    /// Tokenize the entire source, stopping at the first error
    ///
    /// The returned stream always ends with an `Eof` token.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, SpannedError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            tokens.push(token);
            if token.kind == TokenKind::Eof {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, SpannedError> {
        let remaining = &self.source[self.position..];
        let lexed = match self.mode {
            LexerMode::Content => {
                let mut lex = ContentToken::lexer(remaining);
                lex.next()
                    .map(|result| (result.map(TokenKind::from), lex.span()))
            }
            LexerMode::Tag => {
                let mut lex = TagToken::lexer(remaining);
                lex.next()
                    .map(|result| (result.map(TokenKind::from), lex.span()))
            }
        };

        match lexed {
            Some((Ok(kind), range)) => {
                // Spans are relative to `remaining` and already account for skipped whitespace
                let start = self.position + range.start;
                let end = self.position + range.end;
                self.position = end;

                if kind.opens_tag() {
                    self.mode = LexerMode::Tag;
                } else if kind.closes_tag() {
                    self.mode = LexerMode::Content;
                }

                Ok(Token::new(kind, Span::new(start as u32, end as u32)))
            }
            Some((Err(()), range)) => {
                let start = self.position + range.start;
                let error = self.classify_error(&self.source[start..]);
                Err(SpannedError::new(
                    error,
                    Span::new(start as u32, (self.position + range.end) as u32),
                ))
            }
            None if self.mode == LexerMode::Tag => Err(SpannedError::new(
                LexError::UnterminatedTag,
                Span::at(self.source.len() as u32),
            )),
            None => {
                let end = self.source.len() as u32;
                Ok(Token::new(TokenKind::Eof, Span::at(end)))
            }
        }
    }

    /// Work out why logos rejected the input starting at `rest`
    fn classify_error(&self, rest: &str) -> LexError {
        match self.mode {
            LexerMode::Content if rest.starts_with("<!--") => LexError::UnterminatedComment,
            LexerMode::Content if rest.starts_with("<![CDATA[") => LexError::UnterminatedCData,
            LexerMode::Content if rest.starts_with("<!DOCTYPE") => LexError::UnterminatedDoctype,
            LexerMode::Content if rest.starts_with("<?") => LexError::UnterminatedInstruction,
            LexerMode::Tag if rest.starts_with(['"', '\'']) => LexError::UnterminatedValue,
            _ => LexError::UnexpectedChar,
        }
    }
}
