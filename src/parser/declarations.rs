//! Declaration parsing: functions, classes, enums, interfaces, imports.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn declaration(&mut self) -> ParseResult<Stmt> {
        let stmt = match self.peek().kind {
            TokenKind::Func => {
                let decl = self.function_declaration()?;
                let span = decl.span;
                Stmt::new(StmtKind::Function(decl), span)
            }
            TokenKind::Class => {
                let decl = self.class_declaration()?;
                let span = decl.span;
                Stmt::new(StmtKind::Class(decl), span)
            }
            TokenKind::Enum => {
                let decl = self.enum_declaration()?;
                let span = decl.span;
                Stmt::new(StmtKind::Enum(decl), span)
            }
            TokenKind::Interface => {
                let decl = self.interface_declaration()?;
                let span = decl.span;
                Stmt::new(StmtKind::Interface(decl), span)
            }
            TokenKind::Use => self.use_declaration()?,
            _ => return self.statement(),
        };
        self.skip_semicolons();
        Ok(stmt)
    }

    /// `func name(params) { body }`
    pub(crate) fn function_declaration(&mut self) -> ParseResult<FunctionDecl> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Func)?;
        let name = self.expect_identifier()?;
        let (params, variadic) = self.parse_parameters()?;
        self.expect(&TokenKind::LeftBrace)?;
        let body = self.block_statements()?;

        Ok(FunctionDecl {
            name,
            params,
            variadic,
            body,
            span: start_span.merge(&self.previous_span()),
        })
    }

    /// `(a, b, *rest)`; returns the parameters and whether the last one is variadic.
    pub(crate) fn parse_parameters(&mut self) -> ParseResult<(Vec<Parameter>, bool)> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        let mut variadic = false;

        while !self.check(&TokenKind::RightParen) {
            if variadic {
                return Err(ParserError::general(
                    "variadic parameter must be the last parameter",
                    self.current_span(),
                ));
            }
            variadic = self.match_token(&TokenKind::Star);
            let span = self.current_span();
            let name = self.expect_identifier()?;
            params.push(Parameter { name, span });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightParen)?;
        Ok((params, variadic))
    }

    /// `class Name [: Base, pkg.Other] { members }`
    pub(crate) fn class_declaration(&mut self) -> ParseResult<ClassDecl> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Class)?;
        let name = self.expect_identifier()?;

        let mut bases = Vec::new();
        if self.match_token(&TokenKind::Colon) {
            loop {
                bases.push(self.base_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::LeftBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            members.push(self.class_member(&name)?);
            self.skip_semicolons();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(ClassDecl {
            name,
            bases,
            members,
            span: start_span.merge(&self.previous_span()),
        })
    }

    fn base_expression(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        let name = self.expect_identifier()?;
        let mut expr = Expr::new(ExprKind::Identifier(name), span);
        while self.match_token(&TokenKind::Dot) {
            let attribute = self.expect_identifier()?;
            let span = expr.span.merge(&self.previous_span());
            expr = Expr::new(
                ExprKind::Attribute {
                    object: Box::new(expr),
                    name: attribute,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn class_member(&mut self, class_name: &str) -> ParseResult<ClassMember> {
        match self.peek().kind {
            TokenKind::Func => {
                let decl = self.function_declaration()?;
                if decl.name == class_name {
                    Ok(ClassMember::Constructor(decl))
                } else {
                    Ok(ClassMember::Method(decl))
                }
            }
            TokenKind::Static => {
                let start_span = self.advance().span;
                if self.check(&TokenKind::Func) {
                    return Ok(ClassMember::StaticMethod(self.function_declaration()?));
                }
                let name = self.expect_identifier()?;
                self.expect(&TokenKind::Equal)?;
                let value = self.expression()?;
                Ok(ClassMember::StaticField {
                    name,
                    value,
                    span: start_span.merge(&self.previous_span()),
                })
            }
            TokenKind::Class => Ok(ClassMember::Class(self.class_declaration()?)),
            TokenKind::Enum => Ok(ClassMember::Enum(self.enum_declaration()?)),
            TokenKind::Interface => Ok(ClassMember::Interface(self.interface_declaration()?)),
            _ => Err(ParserError::unexpected_token(
                "class member",
                format!("{}", self.peek().kind),
                self.current_span(),
            )),
        }
    }

    /// `enum Name { A, B = 10, C }`
    pub(crate) fn enum_declaration(&mut self) -> ParseResult<EnumDecl> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Enum)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut members = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let span = self.current_span();
            let member = self.expect_identifier()?;
            let value = if self.match_token(&TokenKind::Equal) {
                let negative = self.match_token(&TokenKind::Minus);
                match self.advance().kind {
                    TokenKind::IntLiteral(n) => Some(if negative { -n } else { n }),
                    other => {
                        return Err(ParserError::unexpected_token(
                            "integer",
                            format!("{}", other),
                            self.previous_span(),
                        ))
                    }
                }
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
                span: span.merge(&self.previous_span()),
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(EnumDecl {
            name,
            members,
            span: start_span.merge(&self.previous_span()),
        })
    }

    /// `interface Name { func area() func scale(f) }`
    pub(crate) fn interface_declaration(&mut self) -> ParseResult<InterfaceDecl> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Interface)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let span = self.current_span();
            self.expect(&TokenKind::Func)?;
            let method = self.expect_identifier()?;
            let (params, variadic) = self.parse_parameters()?;
            methods.push(InterfaceMethod {
                name: method,
                params,
                variadic,
                span: span.merge(&self.previous_span()),
            });
            self.skip_semicolons();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(InterfaceDecl {
            name,
            methods,
            span: start_span.merge(&self.previous_span()),
        })
    }

    /// Parse a `use` statement.
    /// Syntax:
    ///   use a.b              -- bind the module as `b`
    ///   use x, y from a.b    -- bind selected attributes
    ///   use * from a.b       -- bind every attribute
    fn use_declaration(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();
        self.expect(&TokenKind::Use)?;

        let (module, items) = if self.match_token(&TokenKind::Star) {
            self.expect(&TokenKind::From)?;
            (self.dotted_name()?, UseItems::All)
        } else {
            let mut names = vec![self.dotted_name()?];
            while self.match_token(&TokenKind::Comma) {
                names.push(self.dotted_name()?);
            }

            if self.match_token(&TokenKind::From) {
                if let Some(dotted) = names.iter().find(|n| n.contains('.')) {
                    return Err(ParserError::general(
                        format!("cannot import dotted name '{}' from a module", dotted),
                        start_span,
                    ));
                }
                (self.dotted_name()?, UseItems::Names(names))
            } else if names.len() == 1 {
                (names.remove(0), UseItems::Module)
            } else {
                return Err(ParserError::unexpected_token(
                    "'from'",
                    format!("{}", self.peek().kind),
                    self.current_span(),
                ));
            }
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Stmt::new(
            StmtKind::Use(UseDecl {
                module,
                items,
                span,
            }),
            span,
        ))
    }
}
