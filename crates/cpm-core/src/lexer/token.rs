//! Token types for the XML lexer
//!
//! XML needs two token sets: one for character content between tags and one
//! for the inside of a tag. Each set is its own logos enum; the lexer in
//! `mod.rs` switches between them and reports a unified [`TokenKind`].

use logos::{Lexer, Logos};

/// Tokens recognised between tags
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentToken {
    #[token("<!--", |lex| bump_past(lex, "-->"))]
    Comment,

    #[token("<![CDATA[", |lex| bump_past(lex, "]]>"))]
    CData,

    /// Processing instruction, including the `<?xml ...?>` declaration
    #[token("<?", |lex| bump_past(lex, "?>"))]
    Instruction,

    #[token("<!DOCTYPE", doctype)]
    Doctype,

    #[token("</")]
    CloseTagStart,

    #[token("<")]
    TagStart,

    #[regex(r"[^<]+")]
    Text,
}

/// Tokens recognised inside a start or end tag
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum TagToken {
    #[regex(r"[\p{L}_:][\p{L}\p{N}_:.\-]*")]
    Name,

    #[token("=")]
    Eq,

    /// Quoted attribute value, quotes included
    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Value,

    #[token(">")]
    TagEnd,

    #[token("/>")]
    EmptyTagEnd,
}

/// Advance the lexer past `terminator`, failing if it never appears
fn bump_past(lex: &mut Lexer<'_, ContentToken>, terminator: &str) -> bool {
    match lex.remainder().find(terminator) {
        Some(index) => {
            lex.bump(index + terminator.len());
            true
        }
        None => false,
    }
}

/// DOCTYPE may carry a bracketed internal subset containing `>`
fn doctype(lex: &mut Lexer<'_, ContentToken>) -> bool {
    let rest = lex.remainder();
    let close = rest.find('>');
    let end = match (rest.find('['), close) {
        (Some(open), Some(close)) if open < close => rest[open..]
            .find(']')
            .and_then(|bracket| {
                let after = open + bracket;
                rest[after..].find('>').map(|gt| after + gt + 1)
            }),
        (_, Some(close)) => Some(close + 1),
        _ => None,
    };
    match end {
        Some(end) => {
            lex.bump(end);
            true
        }
        None => false,
    }
}

/// The kind of token produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Content mode
    Comment,
    CData,
    Instruction,
    Doctype,
    /// `</`
    CloseTagStart,
    /// `<`
    TagStart,
    Text,

    // Tag mode
    Name,
    Eq,
    Value,
    /// `>`
    TagEnd,
    /// `/>`
    EmptyTagEnd,

    Eof,
}

impl From<ContentToken> for TokenKind {
    fn from(token: ContentToken) -> Self {
        match token {
            ContentToken::Comment => Self::Comment,
            ContentToken::CData => Self::CData,
            ContentToken::Instruction => Self::Instruction,
            ContentToken::Doctype => Self::Doctype,
            ContentToken::CloseTagStart => Self::CloseTagStart,
            ContentToken::TagStart => Self::TagStart,
            ContentToken::Text => Self::Text,
        }
    }
}

impl From<TagToken> for TokenKind {
    fn from(token: TagToken) -> Self {
        match token {
            TagToken::Name => Self::Name,
            TagToken::Eq => Self::Eq,
            TagToken::Value => Self::Value,
            TagToken::TagEnd => Self::TagEnd,
            TagToken::EmptyTagEnd => Self::EmptyTagEnd,
        }
    }
}

impl TokenKind {
    /// Returns true if this token opens a tag and switches the lexer into tag mode
    #[must_use]
    pub const fn opens_tag(&self) -> bool {
        matches!(self, Self::TagStart | Self::CloseTagStart)
    }

    /// Returns true if this token closes a tag and switches back to content mode
    #[must_use]
    pub const fn closes_tag(&self) -> bool {
        matches!(self, Self::TagEnd | Self::EmptyTagEnd)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Comment => "comment",
            Self::CData => "CDATA section",
            Self::Instruction => "processing instruction",
            Self::Doctype => "DOCTYPE",
            Self::CloseTagStart => "'</'",
            Self::TagStart => "'<'",
            Self::Text => "text",
            Self::Name => "name",
            Self::Eq => "'='",
            Self::Value => "quoted value",
            Self::TagEnd => "'>'",
            Self::EmptyTagEnd => "'/>'",
            Self::Eof => "end of file",
        };
        f.write_str(text)
    }
}
