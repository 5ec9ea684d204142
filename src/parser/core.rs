//! Core parser struct and helper methods.

use tracing::debug;

use crate::ast::*;
use crate::error::{ErrorLog, ParserError};
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Iodine.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) current: usize,
    pub(crate) errors: Vec<ParserError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::eof(end.end, end.line, end.column));
        }
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse a complete program.
    ///
    /// A statement that fails to parse is reported to `log`, the parser skips
    /// ahead to the next statement boundary and carries on.
    pub fn parse(&mut self, log: &mut ErrorLog) -> Program {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            let start = self.current;
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize(start);
                }
            }
        }

        debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        for err in self.errors.drain(..) {
            log.push(err);
        }
        Program::new(statements)
    }

    /// Skip tokens until something that looks like the start of a statement.
    /// `start` is where the failed statement began; at least one token is
    /// always consumed past it.
    pub(crate) fn synchronize(&mut self, start: usize) {
        if self.current == start && !self.is_at_end() {
            self.advance();
        }

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Func
                | TokenKind::Class
                | TokenKind::Enum
                | TokenKind::Interface
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Return
                | TokenKind::Raise
                | TokenKind::Try
                | TokenKind::Switch
                | TokenKind::Use
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ===== Token manipulation =====

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current.saturating_sub(1)].clone()
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.is_at_end() {
            Err(ParserError::unexpected_eof(self.current_span()))
        } else {
            Err(ParserError::unexpected_token(
                format!("'{}'", kind),
                format!("{}", self.peek().kind),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Eof => Err(ParserError::unexpected_eof(self.current_span())),
            _ => Err(ParserError::unexpected_token(
                "identifier",
                format!("{}", self.peek().kind),
                self.current_span(),
            )),
        }
    }

    /// Dotted name such as `a.b.c`.
    pub(crate) fn dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_identifier()?;
        while self.match_token(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    /// Statement terminators are optional.
    pub(crate) fn skip_semicolons(&mut self) {
        while self.match_token(&TokenKind::Semicolon) {}
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous().span
    }
}
