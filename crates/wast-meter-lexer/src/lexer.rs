//! Text-format lexer.
//!
//! Features:
//! - Parentheses, keyword atoms, `$ids`, strings, integer and float literals
//! - Line comments (`;;`) and nested block comments (`(; ... ;)`)
//! - Error recovery: collects up to 20 errors instead of stopping at the first

use wast_meter_types::{CompileErrors, ErrorCode, SourceFile, Span, WastError};

use crate::token::{Token, TokenKind};

/// The text-format lexer.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    col: u32,
    errors: CompileErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

/// Characters allowed in keywords, ids and numbers.
fn is_idchar(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'/'
                | b':'
                | b'<'
                | b'='
                | b'>'
                | b'?'
                | b'@'
                | b'\\'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_full() {
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.line).unwrap_or("").to_string();
        let err = WastError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace and comments until the next significant character.
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r'), _) => {
                    self.advance();
                }
                (Some(b';'), Some(b';')) => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some(b'('), Some(b';')) => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Skip a possibly nested `(; ... ;)` comment.
    fn skip_block_comment(&mut self) {
        let start_line = self.line;
        let start_col = self.col;
        let mut depth = 0u32;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(ErrorCode::UNTERMINATED, "unterminated block comment", span);
                    return;
                }
                (Some(b'('), Some(b';')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some(b';'), Some(b')')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        self.skip_trivia();

        let start_line = self.line;
        let start_col = self.col;
        let Some(ch) = self.peek() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        match ch {
            b'(' => {
                self.advance();
                Token::new(TokenKind::LParen, self.span_from(start_line, start_col))
            }
            b')' => {
                self.advance();
                Token::new(TokenKind::RParen, self.span_from(start_line, start_col))
            }
            b'"' => self.scan_string(start_line, start_col),
            ch if is_idchar(ch) => self.scan_atom(start_line, start_col),
            other => {
                self.advance();
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected character '{}'", other as char),
                    span,
                );
                self.scan_token()
            }
        }
    }

    /// Scan a run of id characters and classify it.
    fn scan_atom(&mut self, start_line: u32, start_col: u32) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(is_idchar) {
            self.advance();
        }
        let span = self.span_from(start_line, start_col);
        // idchars are all ASCII.
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();

        let kind = match text.as_bytes()[0] {
            b'$' if text.len() > 1 => TokenKind::Id(text[1..].to_string()),
            b'$' => {
                self.emit_error(ErrorCode::UNEXPECTED_TOKEN, "empty identifier '$'", span);
                return self.scan_token();
            }
            b'0'..=b'9' | b'+' | b'-' => match parse_number(&text) {
                Some(kind) => kind,
                None => {
                    self.emit_error(
                        ErrorCode::INVALID_LITERAL,
                        format!("invalid number literal '{text}'"),
                        span,
                    );
                    TokenKind::Integer(0)
                }
            },
            _ if is_float_keyword(&text) => {
                parse_number(&text).unwrap_or(TokenKind::Float(f64::NAN))
            }
            b'a'..=b'z' | b'A'..=b'Z' => TokenKind::Keyword(text),
            _ => {
                self.emit_error(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("unexpected token '{text}'"),
                    span,
                );
                return self.scan_token();
            }
        };
        Token::new(kind, span)
    }

    /// Scan a string literal starting at the opening `"`.
    fn scan_string(&mut self, start_line: u32, start_col: u32) -> Token {
        self.advance(); // consume '"'
        let mut bytes = Vec::new();
        loop {
            match self.advance() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(ErrorCode::UNTERMINATED, "unterminated string literal", span);
                    break;
                }
                Some(b'"') => break,
                Some(b'\\') => {
                    if let Some(byte) = self.scan_escape() {
                        bytes.push(byte);
                    }
                }
                Some(byte) => bytes.push(byte),
            }
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Token::new(TokenKind::String(text), self.span_from(start_line, start_col))
    }

    /// Resolve an escape after the `\`.
    fn scan_escape(&mut self) -> Option<u8> {
        let start_line = self.line;
        let start_col = self.col.saturating_sub(1);
        match self.advance() {
            Some(b'n') => Some(b'\n'),
            Some(b't') => Some(b'\t'),
            Some(b'r') => Some(b'\r'),
            Some(b'"') => Some(b'"'),
            Some(b'\'') => Some(b'\''),
            Some(b'\\') => Some(b'\\'),
            Some(high) if high.is_ascii_hexdigit() => {
                let low = self.peek().filter(u8::is_ascii_hexdigit);
                match low {
                    Some(low) => {
                        self.advance();
                        Some(hex_value(high) << 4 | hex_value(low))
                    }
                    None => {
                        let span = self.span_from(start_line, start_col);
                        self.emit_error(
                            ErrorCode::INVALID_LITERAL,
                            "hex escape needs two digits",
                            span,
                        );
                        None
                    }
                }
            }
            Some(other) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::INVALID_LITERAL,
                    format!("invalid escape sequence '\\{}'", other as char),
                    span,
                );
                Some(other)
            }
            None => None,
        }
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn is_float_keyword(text: &str) -> bool {
    text == "inf" || text == "nan" || text.starts_with("nan:")
}

/// Parse a numeric atom: optional sign, decimal or `0x` hex integers,
/// decimal floats, `inf`, `nan`. Underscores between digits are ignored.
fn parse_number(text: &str) -> Option<TokenKind> {
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let sign = if negative { -1.0 } else { 1.0 };

    if body == "inf" {
        return Some(TokenKind::Float(sign * f64::INFINITY));
    }
    if is_float_keyword(body) {
        return Some(TokenKind::Float(f64::NAN));
    }

    let digits = body.replace('_', "");
    if digits.is_empty() {
        return None;
    }

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let magnitude = i128::from_str_radix(hex, 16).ok()?;
        return Some(TokenKind::Integer(if negative { -magnitude } else { magnitude }));
    }

    if digits.bytes().all(|b| b.is_ascii_digit()) {
        let magnitude: i128 = digits.parse().ok()?;
        return Some(TokenKind::Integer(if negative { -magnitude } else { magnitude }));
    }

    if digits.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        let value: f64 = digits.parse().ok()?;
        return Some(TokenKind::Float(sign * value));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_forms() {
        assert_eq!(parse_number("42"), Some(TokenKind::Integer(42)));
        assert_eq!(parse_number("-7"), Some(TokenKind::Integer(-7)));
        assert_eq!(parse_number("0xff"), Some(TokenKind::Integer(255)));
        assert_eq!(parse_number("1_000"), Some(TokenKind::Integer(1000)));
        assert_eq!(parse_number("2.5"), Some(TokenKind::Float(2.5)));
        assert_eq!(parse_number("-1e3"), Some(TokenKind::Float(-1000.0)));
        assert_eq!(parse_number("-inf"), Some(TokenKind::Float(f64::NEG_INFINITY)));
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn test_u64_max_fits() {
        assert_eq!(
            parse_number("0xffffffffffffffff"),
            Some(TokenKind::Integer(u64::MAX as i128))
        );
    }
}
