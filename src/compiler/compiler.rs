//! AST-to-bytecode compiler.
//!
//! Replays the scopes the analyser recorded and emits one [`Method`] per
//! function body into a shared [`ModuleBuilder`]. Locals resolve to slots,
//! everything else to module globals.

use std::rc::Rc;

use tracing::debug;

use super::symbols::SymbolTable;
use crate::ast::{FunctionDecl, Parameter, Program, Stmt};
use crate::bytecode::{Label, Method, MethodBuilder, MethodKind, Module, ModuleBuilder, Opcode};
use crate::error::{CompileError, ErrorLog};
use crate::object::Value;
use crate::span::Span;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Jump targets for `break` and `continue` inside a loop or switch.
#[derive(Debug, Clone, Copy)]
pub struct LoopContext {
    pub break_label: Label,
    /// `None` for a switch, which only `break` applies to.
    pub continue_label: Option<Label>,
    /// Exception handlers active when the construct began.
    pub try_depth: usize,
}

/// Per-method compilation state.
#[derive(Debug)]
pub struct FunctionState {
    pub builder: MethodBuilder,
    pub loops: Vec<LoopContext>,
    pub try_depth: usize,
}

impl FunctionState {
    fn new(builder: MethodBuilder) -> Self {
        Self {
            builder,
            loops: Vec::new(),
            try_depth: 0,
        }
    }
}

/// The compiler: transforms an analysed program into a module.
pub struct Compiler<'a> {
    pub(crate) module: ModuleBuilder,
    pub(crate) symbols: SymbolTable,
    pub(crate) functions: Vec<FunctionState>,
    /// Pool indices of the classes whose members are being compiled.
    pub(crate) classes: Vec<usize>,
    optimize: bool,
    pub(crate) log: &'a mut ErrorLog,
}

impl<'a> Compiler<'a> {
    pub fn new(
        name: &str,
        symbols: SymbolTable,
        optimize: bool,
        log: &'a mut ErrorLog,
    ) -> Self {
        Self {
            module: ModuleBuilder::new(name),
            symbols,
            functions: Vec::new(),
            classes: Vec::new(),
            optimize,
            log,
        }
    }

    /// Compile a full program into a module.
    ///
    /// Statement-level errors are logged and compilation continues with the
    /// next statement.
    pub fn compile(mut self, program: &Program) -> Rc<Module> {
        self.symbols.reset();
        let name = self.module.name().to_string();
        self.functions.push(FunctionState::new(MethodBuilder::new(
            name,
            MethodKind::Initializer,
        )));

        self.compile_statements(&program.statements);
        let end = program
            .statements
            .last()
            .map(|stmt| stmt.span)
            .unwrap_or_default();
        self.emit(Opcode::LoadNull, 0, end);

        let local_count = self.symbols.local_count();
        self.symbols.finish_replay();
        let state = self.pop_function();
        let initializer = state.builder.build(local_count, self.optimize);
        let module = self.module.finish(initializer);
        debug!(
            module = %module.name,
            constants = module.constants.len(),
            "compiled module"
        );
        module
    }

    // ===== Emission helpers =====

    pub(crate) fn current(&mut self) -> &mut FunctionState {
        self.functions
            .last_mut()
            .expect("compiler has no method under construction")
    }

    fn pop_function(&mut self) -> FunctionState {
        self.functions
            .pop()
            .expect("compiler has no method under construction")
    }

    /// Whether code is being emitted into the module initializer.
    pub(crate) fn at_module_level(&self) -> bool {
        self.functions.len() == 1
    }

    pub(crate) fn emit(&mut self, opcode: Opcode, argument: usize, span: Span) -> usize {
        self.current().builder.emit(opcode, argument as i32, span)
    }

    pub(crate) fn emit_simple(&mut self, opcode: Opcode, span: Span) -> usize {
        self.current().builder.emit_simple(opcode, span)
    }

    pub(crate) fn emit_jump(&mut self, opcode: Opcode, label: Label, span: Span) {
        self.current().builder.emit_jump(opcode, label, span);
    }

    pub(crate) fn create_label(&mut self) -> Label {
        self.current().builder.create_label()
    }

    pub(crate) fn mark_label(&mut self, label: Label) {
        self.current().builder.mark_label(label);
    }

    pub(crate) fn emit_constant(&mut self, value: Value, span: Span) {
        let index = self.module.add_constant(value);
        self.emit(Opcode::LoadConst, index, span);
    }

    pub(crate) fn name_constant(&mut self, name: &str) -> usize {
        self.module.add_name(name)
    }

    /// Slot of a local visible from the current scope.
    pub(crate) fn resolve_local(&self, name: &str) -> Option<usize> {
        self.symbols.lookup(name)
    }

    /// Store the top of the stack into `name`, local or global.
    pub(crate) fn emit_store(&mut self, name: &str, span: Span) {
        match self.resolve_local(name) {
            Some(slot) => {
                self.emit(Opcode::StoreLocal, slot, span);
            }
            None => {
                let index = self.name_constant(name);
                self.emit(Opcode::StoreGlobal, index, span);
            }
        }
    }

    // ===== Methods =====

    fn bind_parameters(&mut self, params: &[Parameter], variadic: bool) {
        for param in params {
            let slot = self
                .resolve_local(&param.name)
                .expect("parameters are bound by the analyser");
            self.current().builder.add_parameter(param.name.clone(), slot);
        }
        self.current().builder.set_variadic(variadic);
    }

    /// Compile statements, logging failures so every recorded scope is still
    /// replayed.
    pub(crate) fn compile_statements(&mut self, body: &[Stmt]) {
        for stmt in body {
            if let Err(err) = self.compile_stmt(stmt) {
                self.log.push(err);
            }
        }
    }

    fn compile_body(&mut self, body: &[Stmt], end: Span) {
        self.compile_statements(body);
        self.emit(Opcode::LoadNull, 0, end);
    }

    /// Compile a function, method, constructor or static method body in the
    /// next recorded function-boundary scope.
    pub(crate) fn compile_function(
        &mut self,
        decl: &FunctionDecl,
        kind: MethodKind,
    ) -> Rc<Method> {
        self.symbols.next_scope();
        self.functions
            .push(FunctionState::new(MethodBuilder::new(decl.name.clone(), kind)));
        self.bind_parameters(&decl.params, decl.variadic);
        self.compile_body(&decl.body, decl.span);
        let local_count = self.symbols.local_count();
        self.symbols.leave_scope();

        let state = self.pop_function();
        let method = state.builder.build(local_count, self.optimize);
        self.module.register_method(method)
    }

    /// Compile a lambda and emit the closure that captures the current frame.
    pub(crate) fn compile_lambda(&mut self, decl: &FunctionDecl, span: Span) {
        self.symbols.next_scope();
        self.functions.push(FunctionState::new(MethodBuilder::new(
            decl.name.clone(),
            MethodKind::Lambda,
        )));
        self.bind_parameters(&decl.params, decl.variadic);
        self.compile_body(&decl.body, decl.span);
        // Slot numbers continue the creator's, so the count is the creator's.
        let local_count = self.symbols.local_count();
        let own_slots = self.symbols.slot_range();
        self.symbols.leave_scope();

        let state = self.pop_function();
        let method = self.module.register_method(
            state
                .builder
                .build(local_count, self.optimize)
                .with_own_slots(own_slots),
        );
        let index = self.module.add_constant(Value::Method(method));
        self.emit(Opcode::BuildClosure, index, span);
    }

    /// Bind a compile-time module attribute, rejecting redefinitions.
    pub(crate) fn define(&mut self, name: &str, value: Value, span: Span) -> CompileResult<()> {
        if self.module.define(name, value) {
            Ok(())
        } else {
            Err(CompileError::DuplicateDefinition(name.to_string(), span))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::Opcode;
    use crate::config::Config;
    use crate::object::Value;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> std::rc::Rc<crate::bytecode::Module> {
        let config = Config {
            optimize: false,
            ..Config::default()
        };
        crate::compile_with(source, "test", &config).expect("source should compile")
    }

    fn function_opcodes(source: &str, name: &str) -> Vec<Opcode> {
        let module = compile(source);
        match module.get_attribute(name) {
            Some(Value::Method(method)) => method.instructions.iter().map(|i| i.opcode).collect(),
            other => panic!("expected method '{}', found {:?}", name, other),
        }
    }

    #[test]
    fn test_add_function_optimizes_to_four_instructions() {
        let module = crate::compile("func add(a, b) { return a + b }").expect("source should compile");
        let Some(Value::Method(method)) = module.get_attribute("add") else {
            panic!("expected method 'add'");
        };
        assert_eq!(method.arity(), 2);
        assert_eq!(method.parameters.get("b"), Some(&1));
        let opcodes: Vec<Opcode> = method.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![Opcode::LoadLocal, Opcode::LoadLocal, Opcode::BinOp, Opcode::Return]
        );
    }

    #[test]
    fn test_statement_assignment_has_no_dup() {
        assert_eq!(
            function_opcodes("func f() { x = 1 }", "f"),
            vec![Opcode::LoadConst, Opcode::StoreLocal, Opcode::LoadNull]
        );
    }

    #[test]
    fn test_expression_assignment_keeps_value() {
        assert_eq!(
            function_opcodes("func f() { return x = 1 }", "f"),
            vec![
                Opcode::LoadConst,
                Opcode::Dup,
                Opcode::StoreLocal,
                Opcode::Return,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_module_assignment_is_global() {
        let module = compile("x = 1");
        let opcodes: Vec<_> = module.initializer.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![Opcode::LoadConst, Opcode::StoreGlobal, Opcode::LoadNull]
        );
    }

    #[test]
    fn test_and_short_circuits() {
        assert_eq!(
            function_opcodes("func f(a, b) { return a && b }", "f"),
            vec![
                Opcode::LoadLocal,
                Opcode::Dup,
                Opcode::JumpIfFalse,
                Opcode::Pop,
                Opcode::LoadLocal,
                Opcode::Return,
                Opcode::LoadNull
            ]
        );
    }

    #[test]
    fn test_while_loop_shape() {
        let module = compile("func f(n) { while (n) { n = n - 1 } }");
        let method = match module.get_attribute("f") {
            Some(Value::Method(m)) => m,
            other => panic!("unexpected {:?}", other),
        };
        let code = &method.instructions;
        assert_eq!(code[0].opcode, Opcode::LoadLocal);
        assert_eq!(code[1].opcode, Opcode::JumpIfFalse);
        let exit = code[1].argument as usize;
        assert_eq!(code[exit - 1].opcode, Opcode::Jump);
        assert_eq!(code[exit - 1].argument, 0);
        assert_eq!(code[exit].opcode, Opcode::LoadNull);
    }

    #[test]
    fn test_break_inside_try_pops_handler() {
        let opcodes = function_opcodes(
            "func f() { while (true) { try { break } except { } } }",
            "f",
        );
        let pop = opcodes
            .iter()
            .position(|op| *op == Opcode::PopExceptionHandler)
            .unwrap();
        assert_eq!(opcodes[pop + 1], Opcode::Jump);
    }

    #[test]
    fn test_duplicate_definitions_are_errors() {
        let err = crate::compile_with("func f() { }\nfunc f() { }", "test", &Config::default())
            .unwrap_err();
        assert!(err.to_string().contains("'f' is already defined"));
    }

    #[test]
    fn test_lambda_builds_closure() {
        let module = compile("double = lambda (x) => x * 2");
        let opcodes: Vec<_> = module.initializer.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![Opcode::BuildClosure, Opcode::StoreGlobal, Opcode::LoadNull]
        );
        assert_eq!(module.initializer.local_count, 1);
    }
}
