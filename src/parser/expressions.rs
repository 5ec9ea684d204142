//! Expression parsing using Pratt precedence.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{get_precedence, Precedence};

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.peek().kind);
            if precedence == Precedence::None || precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        if self.is_at_end() {
            return Err(ParserError::unexpected_eof(self.current_span()));
        }
        let token = self.advance();
        let start_span = token.span;

        match &token.kind {
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntLiteral(*n), start_span)),
            TokenKind::FloatLiteral(n) => Ok(Expr::new(ExprKind::FloatLiteral(*n), start_span)),
            TokenKind::StringLiteral(s) => {
                Ok(Expr::new(ExprKind::StringLiteral(s.clone()), start_span))
            }
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(*b), start_span)),
            TokenKind::Null => Ok(Expr::new(ExprKind::Null, start_span)),

            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Identifier(name.clone()), start_span))
            }

            TokenKind::SelfKw => Ok(Expr::new(ExprKind::SelfRef, start_span)),

            TokenKind::Super => {
                self.expect(&TokenKind::LeftParen)?;
                let arguments = self.parse_arguments(&TokenKind::RightParen)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(ExprKind::SuperCall(arguments), span))
            }

            TokenKind::LeftParen => self.parse_group_or_tuple(start_span),
            TokenKind::LeftBracket => {
                let elements = self.parse_arguments(&TokenKind::RightBracket)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(ExprKind::List(elements), span))
            }
            TokenKind::LeftBrace => self.parse_hash(start_span),

            TokenKind::Minus => self.unary_expr(UnaryOp::Negate, start_span),
            TokenKind::Bang => self.unary_expr(UnaryOp::Not, start_span),
            TokenKind::Tilde => self.unary_expr(UnaryOp::BitNot, start_span),

            TokenKind::Lambda => self.parse_lambda(start_span),

            _ => Err(ParserError::unexpected_token(
                "expression",
                format!("{}", token.kind),
                token.span,
            )),
        }
    }

    fn unary_expr(&mut self, operator: UnaryOp, start_span: Span) -> ParseResult<Expr> {
        let operand = self.parse_precedence(Precedence::Unary)?;
        let span = start_span.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `()` and `(a, b)` are tuples, `(a)` is grouping, `(a,)` a one-element tuple.
    fn parse_group_or_tuple(&mut self, start_span: Span) -> ParseResult<Expr> {
        if self.match_token(&TokenKind::RightParen) {
            let span = start_span.merge(&self.previous_span());
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), span));
        }

        let first = self.expression()?;
        if self.match_token(&TokenKind::RightParen) {
            let span = start_span.merge(&self.previous_span());
            return Ok(Expr::new(ExprKind::Grouping(Box::new(first)), span));
        }

        self.expect(&TokenKind::Comma)?;
        let mut elements = vec![first];
        elements.extend(self.parse_arguments(&TokenKind::RightParen)?);
        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(ExprKind::Tuple(elements), span))
    }

    fn parse_hash(&mut self, start_span: Span) -> ParseResult<Expr> {
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = self.expression()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(ExprKind::Hash(entries), span))
    }

    /// `lambda (a, b) => a + b` or `lambda (a) { ... }`
    fn parse_lambda(&mut self, start_span: Span) -> ParseResult<Expr> {
        let (params, variadic) = self.parse_parameters()?;

        let body = if self.match_token(&TokenKind::FatArrow) {
            let value = self.expression()?;
            let span = value.span;
            vec![Stmt::new(StmtKind::Return(Some(value)), span)]
        } else {
            self.expect(&TokenKind::LeftBrace)?;
            self.block_statements()?
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Lambda(Box::new(FunctionDecl {
                name: "<lambda>".to_string(),
                params,
                variadic,
                body,
                span,
            })),
            span,
        ))
    }

    /// Comma separated expressions up to and including `close`.
    pub(crate) fn parse_arguments(&mut self, close: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        while !self.check(close) {
            arguments.push(self.expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(arguments)
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance();
        let start_span = left.span;

        match &token.kind {
            // Binary operators
            TokenKind::Plus => self.binary_expr(left, BinaryOp::Add, precedence),
            TokenKind::Minus => self.binary_expr(left, BinaryOp::Subtract, precedence),
            TokenKind::Star => self.binary_expr(left, BinaryOp::Multiply, precedence),
            TokenKind::Slash => self.binary_expr(left, BinaryOp::Divide, precedence),
            TokenKind::Percent => self.binary_expr(left, BinaryOp::Modulo, precedence),
            TokenKind::EqualEqual => self.binary_expr(left, BinaryOp::Equal, precedence),
            TokenKind::BangEqual => self.binary_expr(left, BinaryOp::NotEqual, precedence),
            TokenKind::Is => self.binary_expr(left, BinaryOp::InstanceOf, precedence),
            TokenKind::Less => self.binary_expr(left, BinaryOp::Less, precedence),
            TokenKind::LessEqual => self.binary_expr(left, BinaryOp::LessEqual, precedence),
            TokenKind::Greater => self.binary_expr(left, BinaryOp::Greater, precedence),
            TokenKind::GreaterEqual => self.binary_expr(left, BinaryOp::GreaterEqual, precedence),
            TokenKind::LessLess => self.binary_expr(left, BinaryOp::ShiftLeft, precedence),
            TokenKind::GreaterGreater => self.binary_expr(left, BinaryOp::ShiftRight, precedence),
            TokenKind::Ampersand => self.binary_expr(left, BinaryOp::BitAnd, precedence),
            TokenKind::Pipe => self.binary_expr(left, BinaryOp::BitOr, precedence),
            TokenKind::Caret => self.binary_expr(left, BinaryOp::BitXor, precedence),

            // Logical operators
            TokenKind::And => {
                let right = self.parse_precedence(precedence.next())?;
                let span = start_span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::LogicalAnd {
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }
            TokenKind::Or => {
                let right = self.parse_precedence(precedence.next())?;
                let span = start_span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::LogicalOr {
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }

            // Assignment
            TokenKind::Equal => self.assignment(left, None, token.span),
            TokenKind::PlusEqual => self.assignment(left, Some(BinaryOp::Add), token.span),
            TokenKind::MinusEqual => self.assignment(left, Some(BinaryOp::Subtract), token.span),
            TokenKind::StarEqual => self.assignment(left, Some(BinaryOp::Multiply), token.span),
            TokenKind::SlashEqual => self.assignment(left, Some(BinaryOp::Divide), token.span),
            TokenKind::PercentEqual => self.assignment(left, Some(BinaryOp::Modulo), token.span),

            // Call
            TokenKind::LeftParen => {
                let arguments = self.parse_arguments(&TokenKind::RightParen)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(
                    ExprKind::Call {
                        callee: Box::new(left),
                        arguments,
                    },
                    span,
                ))
            }

            // Attribute access
            TokenKind::Dot => {
                let name = self.expect_identifier()?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(
                    ExprKind::Attribute {
                        object: Box::new(left),
                        name,
                    },
                    span,
                ))
            }

            // Index
            TokenKind::LeftBracket => {
                let index = self.expression()?;
                self.expect(&TokenKind::RightBracket)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(
                    ExprKind::Index {
                        object: Box::new(left),
                        index: Box::new(index),
                    },
                    span,
                ))
            }

            _ => Err(ParserError::unexpected_token(
                "operator",
                format!("{}", token.kind),
                token.span,
            )),
        }
    }

    fn binary_expr(
        &mut self,
        left: Expr,
        operator: BinaryOp,
        precedence: Precedence,
    ) -> ParseResult<Expr> {
        let right = self.parse_precedence(precedence.next())?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    /// `x op= y` becomes `x = x op y`.
    fn assignment(
        &mut self,
        target: Expr,
        compound: Option<BinaryOp>,
        operator_span: Span,
    ) -> ParseResult<Expr> {
        if !target.is_assignable() {
            return Err(ParserError::invalid_assignment_target(operator_span));
        }

        let value = self.parse_precedence(Precedence::Assignment)?;
        let span = target.span.merge(&value.span);
        let value = match compound {
            Some(operator) => Expr::new(
                ExprKind::Binary {
                    left: Box::new(target.clone()),
                    operator,
                    right: Box::new(value),
                },
                span,
            ),
            None => value,
        };

        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }
}
