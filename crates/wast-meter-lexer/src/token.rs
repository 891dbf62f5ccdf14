//! Token types for the text-format lexer.

use std::fmt;

use wast_meter_types::Span;

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Every token kind of the S-expression text format.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// A bare atom starting with a letter: `module`, `i32.add`, `offset=8`.
    Keyword(String),
    /// `$name`, carried without the `$`.
    Id(String),
    /// A quoted string with escapes resolved.
    String(String),
    /// An integer literal. Wide enough for both signed and unsigned 64-bit
    /// spellings; range checks happen in the parser against the operand type.
    Integer(i128),
    /// A float literal, including `inf` and `nan`.
    Float(f64),
    Eof,
}

impl TokenKind {
    /// The keyword text, if this is a keyword token.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            TokenKind::Keyword(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::Keyword(text) => f.write_str(text),
            TokenKind::Id(name) => write!(f, "${name}"),
            TokenKind::String(text) => write!(f, "{text:?}"),
            TokenKind::Integer(value) => write!(f, "{value}"),
            TokenKind::Float(value) => write!(f, "{value}"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}
