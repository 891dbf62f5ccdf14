//! Core parser infrastructure: token cursor, error reporting, helpers.

use wast_meter_lexer::{Lexer, Token, TokenKind};
use wast_meter_types::ast::{Script, ValueType, Var};
use wast_meter_types::{CompileErrors, ErrorCode, SourceFile, Span, WastError};

/// The text-format parser.
///
/// Consumes the lexer's token stream and builds a [`Script`]. Errors are
/// collected; after an error inside a form the parser skips to the form's
/// closing paren and carries on with its siblings.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    errors: CompileErrors,
}

/// Result of parsing. `script` is `None` whenever any error was reported.
pub struct ParseResult {
    pub script: Option<Script>,
    pub errors: CompileErrors,
}

/// Lex and parse a whole source file.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut result = Parser::new(lexed.tokens, source_file).parse();
    if lexed.errors.has_errors() {
        let mut errors = lexed.errors;
        errors.extend(result.errors);
        result.errors = errors;
        result.script = None;
    }
    result
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: CompileErrors::empty(),
        }
    }

    /// Parse the token stream into a [`Script`].
    pub fn parse(mut self) -> ParseResult {
        let script = self.parse_script();
        let script = if self.errors.has_errors() {
            None
        } else {
            Some(script)
        };
        ParseResult {
            script,
            errors: self.errors,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        // The stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos {
            0 => Span::point(1, 1),
            pos => self.tokens[pos - 1].span,
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `true` if the next two tokens are `(` followed by `keyword`.
    pub(crate) fn at_form(&self, keyword: &str) -> bool {
        self.check(&TokenKind::LParen) && self.look_ahead(1).keyword() == Some(keyword)
    }

    /// The keyword following a `(` at the cursor, if any.
    pub(crate) fn form_keyword(&self) -> Option<&str> {
        if self.check(&TokenKind::LParen) {
            self.look_ahead(1).keyword()
        } else {
            None
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Option<Span> {
        if self.peek_kind().keyword() == Some(keyword) {
            Some(self.advance().span)
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", keyword, self.peek_kind()),
            );
            None
        }
    }

    /// Consume an optional `$id`.
    pub(crate) fn eat_id(&mut self) -> Option<String> {
        match self.peek_kind() {
            TokenKind::Id(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    pub(crate) fn expect_string(&mut self) -> Option<String> {
        match self.peek_kind() {
            TokenKind::String(text) => {
                let text = text.clone();
                self.advance();
                Some(text)
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected string literal, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    pub(crate) fn expect_u32(&mut self) -> Option<u32> {
        match *self.peek_kind() {
            TokenKind::Integer(value) => match u32::try_from(value) {
                Ok(value) => {
                    self.advance();
                    Some(value)
                }
                Err(_) => {
                    self.error_at_current(
                        ErrorCode::INVALID_LITERAL,
                        format!("{value} is out of range for an index"),
                    );
                    None
                }
            },
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected integer, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// `$name` or a numeric index.
    pub(crate) fn expect_var(&mut self) -> Option<Var> {
        if let Some(name) = self.eat_id() {
            return Some(Var::Name(name));
        }
        match self.peek_kind() {
            TokenKind::Integer(_) => self.expect_u32().map(Var::Index),
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected index or $name, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    pub(crate) fn expect_value_type(&mut self) -> Option<ValueType> {
        let ty = self.peek_kind().keyword().and_then(ValueType::from_name);
        match ty {
            Some(ty) => {
                self.advance();
                Some(ty)
            }
            None => {
                self.error_at_current(
                    ErrorCode::UNKNOWN_TYPE,
                    format!("expected value type, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.line).unwrap_or("").to_string();
        let error = WastError::new(&self.source_file.name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_full()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to just past the `)` closing the innermost open form.
    pub(crate) fn skip_form_rest(&mut self) {
        let mut depth = 0u32;
        while !self.at_end() {
            match self.advance().kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen if depth == 0 => return,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
        }
    }

    /// Parse the remainder of a form with `body`, which is called after the
    /// opening `(` has been consumed. On failure the rest of the form is
    /// skipped so the caller can resume at the next sibling.
    pub(crate) fn within_form<T>(&mut self, body: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let result = body(self);
        if result.is_none() {
            self.skip_form_rest();
        }
        result
    }
}
