//! Expression compilation.

use super::compiler::{CompileResult, Compiler};
use crate::ast::{Expr, ExprKind};
use crate::bytecode::instruction::{encode_binary, encode_unary};
use crate::bytecode::{Label, Opcode};
use crate::error::CompileError;
use crate::object::Value;
use crate::span::Span;

impl Compiler<'_> {
    /// Compile an expression, leaving exactly one value on the stack.
    pub fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLiteral(n) => self.emit_constant(Value::Int(*n), span),
            ExprKind::FloatLiteral(n) => self.emit_constant(Value::Float(*n), span),
            ExprKind::StringLiteral(s) => self.emit_constant(Value::from(s.as_str()), span),
            ExprKind::BoolLiteral(true) => {
                self.emit_simple(Opcode::LoadTrue, span);
            }
            ExprKind::BoolLiteral(false) => {
                self.emit_simple(Opcode::LoadFalse, span);
            }
            ExprKind::Null => {
                self.emit_simple(Opcode::LoadNull, span);
            }
            ExprKind::Identifier(name) => self.compile_identifier(name, span),
            ExprKind::SelfRef => {
                self.emit_simple(Opcode::LoadSelf, span);
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(Opcode::BinOp, encode_binary(*operator) as usize, span);
            }
            ExprKind::Unary { operator, operand } => {
                self.compile_expr(operand)?;
                self.emit(Opcode::UnaryOp, encode_unary(*operator) as usize, span);
            }
            ExprKind::LogicalAnd { left, right } => {
                self.compile_short_circuit(left, right, Opcode::JumpIfFalse, span)?
            }
            ExprKind::LogicalOr { left, right } => {
                self.compile_short_circuit(left, right, Opcode::JumpIfTrue, span)?
            }
            ExprKind::Grouping(inner) => self.compile_expr(inner)?,
            ExprKind::Call { callee, arguments } => {
                self.compile_expr(callee)?;
                self.compile_arguments(arguments)?;
                self.emit(Opcode::Invoke, arguments.len(), span);
            }
            ExprKind::SuperCall(arguments) => {
                let class = *self
                    .classes
                    .last()
                    .ok_or_else(|| CompileError::new("'super' outside of a class", span))?;
                self.emit(Opcode::LoadConst, class, span);
                self.compile_arguments(arguments)?;
                self.emit(Opcode::InvokeSuper, arguments.len(), span);
            }
            ExprKind::Attribute { object, name } => {
                self.compile_expr(object)?;
                let index = self.name_constant(name);
                self.emit(Opcode::LoadAttribute, index, span);
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit_simple(Opcode::LoadIndex, span);
            }
            ExprKind::List(items) => {
                self.compile_arguments(items)?;
                self.emit(Opcode::BuildList, items.len(), span);
            }
            ExprKind::Tuple(items) => {
                self.compile_arguments(items)?;
                self.emit(Opcode::BuildTuple, items.len(), span);
            }
            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Opcode::BuildHash, pairs.len(), span);
            }
            ExprKind::Lambda(decl) => self.compile_lambda(decl, span),
            ExprKind::Assign { target, value } => self.compile_assign(target, value, true, span)?,
        }
        Ok(())
    }

    fn compile_identifier(&mut self, name: &str, span: Span) {
        match self.resolve_local(name) {
            Some(slot) => {
                self.emit(Opcode::LoadLocal, slot, span);
            }
            None => {
                let index = self.name_constant(name);
                self.emit(Opcode::LoadGlobal, index, span);
            }
        }
    }

    fn compile_arguments(&mut self, arguments: &[Expr]) -> CompileResult<()> {
        for argument in arguments {
            self.compile_expr(argument)?;
        }
        Ok(())
    }

    /// `left; DUP; JUMP_IF_x end; POP; right; end:`
    fn compile_short_circuit(
        &mut self,
        left: &Expr,
        right: &Expr,
        jump: Opcode,
        span: Span,
    ) -> CompileResult<()> {
        let end: Label = self.create_label();
        self.compile_expr(left)?;
        self.emit_simple(Opcode::Dup, span);
        self.emit_jump(jump, end, span);
        self.emit_simple(Opcode::Pop, span);
        self.compile_expr(right)?;
        self.mark_label(end);
        Ok(())
    }

    /// Compile `target = value`. With `keep` the assigned value is left on the
    /// stack as the result of the expression.
    pub(crate) fn compile_assign(
        &mut self,
        target: &Expr,
        value: &Expr,
        keep: bool,
        span: Span,
    ) -> CompileResult<()> {
        self.compile_expr(value)?;
        if keep {
            self.emit_simple(Opcode::Dup, span);
        }

        match &target.kind {
            ExprKind::Identifier(name) => self.emit_store(name, span),
            ExprKind::Attribute { object, name } => {
                self.compile_expr(object)?;
                let index = self.name_constant(name);
                self.emit(Opcode::StoreAttribute, index, span);
            }
            ExprKind::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit_simple(Opcode::StoreIndex, span);
            }
            _ => return Err(CompileError::new("Invalid assignment target", target.span)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::{Module, Opcode};
    use crate::config::Config;
    use crate::object::Value;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn compile(source: &str) -> Rc<Module> {
        let config = Config {
            optimize: false,
            ..Config::default()
        };
        crate::compile_with(source, "test", &config).expect("source should compile")
    }

    fn opcodes(module: &Module, name: &str) -> Vec<Opcode> {
        match module.get_attribute(name) {
            Some(Value::Method(method)) => method.instructions.iter().map(|i| i.opcode).collect(),
            other => panic!("expected method '{}', found {:?}", name, other),
        }
    }

    #[test]
    fn test_attribute_store_order() {
        let module = compile("func f(o) { o.x = 1 }");
        assert_eq!(
            opcodes(&module, "f"),
            vec![
                Opcode::LoadConst,
                Opcode::LoadLocal,
                Opcode::StoreAttribute,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_index_store_order() {
        let module = compile("func f(xs, i) { xs[i] = 2 }");
        assert_eq!(
            opcodes(&module, "f"),
            vec![
                Opcode::LoadConst,
                Opcode::LoadLocal,
                Opcode::LoadLocal,
                Opcode::StoreIndex,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_method_call_loads_attribute_then_invokes() {
        let module = compile("func f(o) { return o.m(1, 2) }");
        let code = opcodes(&module, "f");
        assert_eq!(
            &code[..5],
            &[
                Opcode::LoadLocal,
                Opcode::LoadAttribute,
                Opcode::LoadConst,
                Opcode::LoadConst,
                Opcode::Invoke
            ]
        );
        let method = match module.get_attribute("f") {
            Some(Value::Method(m)) => m,
            _ => unreachable!(),
        };
        assert_eq!(method.instructions[4].argument, 2);
    }

    #[test]
    fn test_unknown_names_are_globals() {
        let module = compile("func f() { return print }");
        assert_eq!(
            opcodes(&module, "f"),
            vec![Opcode::LoadGlobal, Opcode::Return, Opcode::LoadNull]
        );
    }

    #[test]
    fn test_hash_literal_pairs() {
        let module = compile("func f() { return { \"a\" : 1, \"b\" : 2 } }");
        let method = match module.get_attribute("f") {
            Some(Value::Method(m)) => m,
            _ => unreachable!(),
        };
        let build = &method.instructions[4];
        assert_eq!(build.opcode, Opcode::BuildHash);
        assert_eq!(build.argument, 2);
    }
}
