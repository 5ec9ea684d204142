//! Statement compilation: AST statements to bytecode.

use std::rc::Rc;

use super::analyser::ITERATOR_SLOT;
use super::compiler::{CompileResult, Compiler, LoopContext};
use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind, SwitchCase, UseDecl, UseItems};
use crate::bytecode::instruction::encode_binary;
use crate::bytecode::{Label, MethodKind, Opcode};
use crate::error::CompileError;
use crate::object::Value;
use crate::span::Span;

impl Compiler<'_> {
    /// Compile a statement.
    pub fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Expression(expr) => match &expr.kind {
                ExprKind::Assign { target, value } => {
                    self.compile_assign(target, value, false, expr.span)?;
                }
                _ => {
                    self.compile_expr(expr)?;
                    self.emit_simple(Opcode::Pop, span);
                }
            },
            StmtKind::Block(statements) => self.compile_statements(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.compile_if(condition, then_branch, else_branch.as_deref(), span)?,
            StmtKind::While { condition, body } => self.compile_while(condition, body, span)?,
            StmtKind::For {
                initializer,
                condition,
                step,
                body,
            } => self.compile_for(
                initializer.as_deref(),
                condition.as_ref(),
                step.as_ref(),
                body,
                span,
            )?,
            StmtKind::Foreach {
                variable,
                iterable,
                body,
            } => self.compile_foreach(variable, iterable, body, span)?,
            StmtKind::Break => self.compile_break(span)?,
            StmtKind::Continue => self.compile_continue(span)?,
            StmtKind::Return(value) => {
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => {
                        self.emit_simple(Opcode::LoadNull, span);
                    }
                }
                self.emit_simple(Opcode::Return, span);
            }
            StmtKind::Raise(value) => {
                self.compile_expr(value)?;
                self.emit_simple(Opcode::Raise, span);
            }
            StmtKind::Try {
                body,
                exception,
                handler,
            } => self.compile_try(body, exception.as_deref(), handler, span)?,
            StmtKind::Switch {
                value,
                cases,
                default,
            } => self.compile_switch(value, cases, default.as_deref(), span)?,
            StmtKind::Function(decl) => {
                let method = self.compile_function(decl, MethodKind::Function);
                self.bind_declaration(&decl.name, Value::Method(method), span)?;
            }
            StmtKind::Class(decl) => {
                let (class, index) = self.compile_class(decl);
                if self.at_module_level() {
                    self.define(&decl.name, Value::Class(class), span)?;
                } else {
                    self.emit(Opcode::LoadConst, index, span);
                    self.emit_store(&decl.name, span);
                }
            }
            StmtKind::Enum(decl) => {
                let value = Value::Enum(Rc::new(self.build_enum(decl)));
                self.bind_declaration(&decl.name, value, span)?;
            }
            StmtKind::Interface(decl) => {
                let value = Value::Interface(Rc::new(self.build_interface(decl)));
                self.bind_declaration(&decl.name, value, span)?;
            }
            StmtKind::Use(decl) => self.compile_use(decl),
        }
        Ok(())
    }

    /// Module-level declarations become module attributes at compile time;
    /// inside a function they are stored into their local slot.
    fn bind_declaration(&mut self, name: &str, value: Value, span: Span) -> CompileResult<()> {
        if self.at_module_level() {
            return self.define(name, value, span);
        }
        self.emit_constant(value, span);
        self.emit_store(name, span);
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        let else_label = self.create_label();
        self.compile_expr(condition)?;
        self.emit_jump(Opcode::JumpIfFalse, else_label, span);
        self.compile_stmt(then_branch)?;

        match else_branch {
            Some(else_branch) => {
                let end = self.create_label();
                self.emit_jump(Opcode::Jump, end, span);
                self.mark_label(else_label);
                self.compile_stmt(else_branch)?;
                self.mark_label(end);
            }
            None => self.mark_label(else_label),
        }
        Ok(())
    }

    /// Run `body` with `context` as the innermost break/continue target.
    fn with_loop(&mut self, context: LoopContext, body: &Stmt) -> CompileResult<()> {
        self.current().loops.push(context);
        let result = self.compile_stmt(body);
        self.current().loops.pop();
        result
    }

    fn loop_context(&mut self, break_label: Label, continue_label: Option<Label>) -> LoopContext {
        LoopContext {
            break_label,
            continue_label,
            try_depth: self.current().try_depth,
        }
    }

    fn compile_while(&mut self, condition: &Expr, body: &Stmt, span: Span) -> CompileResult<()> {
        let top = self.create_label();
        let exit = self.create_label();
        self.mark_label(top);
        self.compile_expr(condition)?;
        self.emit_jump(Opcode::JumpIfFalse, exit, span);
        let context = self.loop_context(exit, Some(top));
        self.with_loop(context, body)?;
        self.emit_jump(Opcode::Jump, top, span);
        self.mark_label(exit);
        Ok(())
    }

    fn compile_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
        span: Span,
    ) -> CompileResult<()> {
        if let Some(initializer) = initializer {
            self.compile_stmt(initializer)?;
        }
        let top = self.create_label();
        let next = self.create_label();
        let exit = self.create_label();

        self.mark_label(top);
        if let Some(condition) = condition {
            self.compile_expr(condition)?;
            self.emit_jump(Opcode::JumpIfFalse, exit, span);
        }
        let context = self.loop_context(exit, Some(next));
        self.with_loop(context, body)?;
        self.mark_label(next);
        if let Some(step) = step {
            self.compile_effect(step)?;
        }
        self.emit_jump(Opcode::Jump, top, span);
        self.mark_label(exit);
        Ok(())
    }

    /// Evaluate an expression for its side effects only.
    fn compile_effect(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Assign { target, value } => {
                self.compile_assign(target, value, false, expr.span)
            }
            _ => {
                self.compile_expr(expr)?;
                self.emit_simple(Opcode::Pop, expr.span);
                Ok(())
            }
        }
    }

    fn compile_foreach(
        &mut self,
        variable: &str,
        iterable: &Expr,
        body: &Stmt,
        span: Span,
    ) -> CompileResult<()> {
        self.compile_expr(iterable)?;
        self.symbols.next_scope();
        let result = self.compile_foreach_body(variable, body, span);
        self.symbols.leave_scope();
        result
    }

    fn compile_foreach_body(
        &mut self,
        variable: &str,
        body: &Stmt,
        span: Span,
    ) -> CompileResult<()> {
        let iterator = self
            .resolve_local(ITERATOR_SLOT)
            .expect("foreach scope binds its iterator");
        let item = self
            .resolve_local(variable)
            .expect("foreach scope binds its variable");

        self.emit_simple(Opcode::GetIter, span);
        self.emit(Opcode::StoreLocal, iterator, span);

        let top = self.create_label();
        let exit = self.create_label();
        self.mark_label(top);
        self.emit(Opcode::LoadLocal, iterator, span);
        self.emit_simple(Opcode::IterMoveNext, span);
        self.emit_jump(Opcode::JumpIfFalse, exit, span);
        self.emit(Opcode::LoadLocal, iterator, span);
        self.emit_simple(Opcode::IterGetNext, span);
        self.emit(Opcode::StoreLocal, item, span);

        let context = self.loop_context(exit, Some(top));
        self.with_loop(context, body)?;
        self.emit_jump(Opcode::Jump, top, span);
        self.mark_label(exit);
        Ok(())
    }

    /// Pop the handlers of every `try` entered since `context` began.
    fn unwind_handlers(&mut self, context: LoopContext, span: Span) {
        let depth = self.current().try_depth;
        for _ in context.try_depth..depth {
            self.emit_simple(Opcode::PopExceptionHandler, span);
        }
    }

    fn compile_break(&mut self, span: Span) -> CompileResult<()> {
        let context = self
            .current()
            .loops
            .last()
            .copied()
            .ok_or_else(|| CompileError::new("'break' outside of a loop or switch", span))?;
        self.unwind_handlers(context, span);
        self.emit_jump(Opcode::Jump, context.break_label, span);
        Ok(())
    }

    fn compile_continue(&mut self, span: Span) -> CompileResult<()> {
        let (context, target) = self
            .current()
            .loops
            .iter()
            .rev()
            .find_map(|c| c.continue_label.map(|label| (*c, label)))
            .ok_or_else(|| CompileError::new("'continue' outside of a loop", span))?;
        self.unwind_handlers(context, span);
        self.emit_jump(Opcode::Jump, target, span);
        Ok(())
    }

    fn compile_try(
        &mut self,
        body: &Stmt,
        exception: Option<&str>,
        handler: &Stmt,
        span: Span,
    ) -> CompileResult<()> {
        let catch = self.create_label();
        let end = self.create_label();

        self.emit_jump(Opcode::PushExceptionHandler, catch, span);
        self.current().try_depth += 1;
        let result = self.compile_stmt(body);
        self.current().try_depth -= 1;
        result?;
        self.emit_simple(Opcode::PopExceptionHandler, span);
        self.emit_jump(Opcode::Jump, end, span);

        self.mark_label(catch);
        self.symbols.next_scope();
        self.emit_simple(Opcode::LoadException, span);
        match exception.and_then(|name| self.resolve_local(name)) {
            Some(slot) => {
                self.emit(Opcode::StoreLocal, slot, span);
            }
            None => {
                self.emit_simple(Opcode::Pop, span);
            }
        }
        let result = self.compile_stmt(handler);
        self.symbols.leave_scope();
        result?;
        self.mark_label(end);
        Ok(())
    }

    /// The switch value stays on the stack while cases are compared and is
    /// popped on entry to whichever body runs.
    fn compile_switch(
        &mut self,
        value: &Expr,
        cases: &[SwitchCase],
        default: Option<&Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        let end = self.create_label();
        self.compile_expr(value)?;

        let context = self.loop_context(end, None);
        self.current().loops.push(context);
        let result = self.compile_cases(cases, default, end, span);
        self.current().loops.pop();
        result?;

        self.mark_label(end);
        Ok(())
    }

    fn compile_cases(
        &mut self,
        cases: &[SwitchCase],
        default: Option<&Stmt>,
        end: Label,
        span: Span,
    ) -> CompileResult<()> {
        let equal = encode_binary(BinaryOp::Equal);
        for case in cases {
            let body = self.create_label();
            let next = self.create_label();
            for value in &case.values {
                self.emit_simple(Opcode::Dup, case.span);
                self.compile_expr(value)?;
                self.emit(Opcode::BinOp, equal as usize, value.span);
                self.emit_jump(Opcode::JumpIfTrue, body, case.span);
            }
            self.emit_jump(Opcode::Jump, next, case.span);
            self.mark_label(body);
            self.emit_simple(Opcode::Pop, case.span);
            self.compile_stmt(&case.body)?;
            self.emit_jump(Opcode::Jump, end, case.span);
            self.mark_label(next);
        }

        self.emit_simple(Opcode::Pop, span);
        if let Some(default) = default {
            self.compile_stmt(default)?;
        }
        Ok(())
    }

    fn compile_use(&mut self, decl: &UseDecl) {
        let span = decl.span;
        let module = self.name_constant(&decl.module);
        self.module.add_import(&decl.module);
        match &decl.items {
            UseItems::Module => {
                self.emit(Opcode::Import, module, span);
            }
            UseItems::Names(names) => {
                let names = self.module.add_names(names);
                self.emit(Opcode::LoadConst, names, span);
                self.emit(Opcode::ImportFrom, module, span);
            }
            UseItems::All => {
                self.emit(Opcode::ImportAll, module, span);
            }
        }
    }
}
