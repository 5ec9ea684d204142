//! Statement parsing: control flow, blocks and expression statements.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        let stmt = match self.peek().kind {
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Foreach => self.foreach_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Raise => self.raise_statement(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::Break => self.keyword_statement(StmtKind::Break),
            TokenKind::Continue => self.keyword_statement(StmtKind::Continue),
            TokenKind::LeftBrace => self.block_statement(),
            _ => self.expression_statement(),
        }?;
        self.skip_semicolons();
        Ok(stmt)
    }

    fn keyword_statement(&mut self, kind: StmtKind) -> ParseResult<Stmt> {
        let span = self.advance().span;
        Ok(Stmt::new(kind, span))
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let expr = self.expression()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::If)?;

        let condition = self.parenthesized()?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::While)?;

        let condition = self.parenthesized()?;
        let body = Box::new(self.statement()?);

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    /// `for (init; cond; step) body`, every clause optional.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LeftParen)?;

        let initializer = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            let expr = self.expression()?;
            let span = expr.span;
            Some(Box::new(Stmt::new(StmtKind::Expression(expr), span)))
        };
        self.expect(&TokenKind::Semicolon)?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let step = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.statement()?);
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::For {
                initializer,
                condition,
                step,
                body,
            },
            span,
        ))
    }

    fn foreach_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Foreach)?;
        self.expect(&TokenKind::LeftParen)?;
        let variable = self.expect_identifier()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.expression()?;
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.statement()?);
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Foreach {
                variable,
                iterable,
                body,
            },
            span,
        ))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Return)?;

        let value = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn raise_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Raise)?;
        let value = self.expression()?;
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Raise(value), span))
    }

    /// `try stmt except [(name)] stmt`
    fn try_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Try)?;
        let body = Box::new(self.statement()?);

        self.expect(&TokenKind::Except)?;
        let exception = if self.match_token(&TokenKind::LeftParen) {
            let name = self.expect_identifier()?;
            self.expect(&TokenKind::RightParen)?;
            Some(name)
        } else {
            None
        };
        let handler = Box::new(self.statement()?);

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Try {
                body,
                exception,
                handler,
            },
            span,
        ))
    }

    fn switch_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Switch)?;
        let value = self.parenthesized()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let case_span = self.current_span();
            if self.match_token(&TokenKind::Case) {
                let mut values = vec![self.expression()?];
                while self.match_token(&TokenKind::Comma) {
                    values.push(self.expression()?);
                }
                let body = Box::new(self.block_statement()?);
                cases.push(SwitchCase {
                    values,
                    body,
                    span: case_span.merge(&self.previous_span()),
                });
            } else if self.match_token(&TokenKind::Default) {
                if default.is_some() {
                    return Err(ParserError::general(
                        "switch has more than one default case",
                        case_span,
                    ));
                }
                default = Some(Box::new(self.block_statement()?));
            } else {
                return Err(ParserError::unexpected_token(
                    "'case' or 'default'",
                    format!("{}", self.peek().kind),
                    self.current_span(),
                ));
            }
            self.skip_semicolons();
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Switch {
                value,
                cases,
                default,
            },
            span,
        ))
    }

    pub(crate) fn block_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::LeftBrace)?;
        let statements = self.block_statements()?;
        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Block(statements), span))
    }

    /// Statements up to and including the closing `}`; the opening brace has
    /// already been consumed. Broken statements are recorded and skipped.
    pub(crate) fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let start = self.current;
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize(start);
                }
            }
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }
}
