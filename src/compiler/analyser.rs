//! Semantic analysis: structural checks and local binding.
//!
//! Walks the program once, in exactly the order the compiler emits code, and
//! records every scope and local slot in a [`SymbolTable`]. Misuse is logged
//! and the walk carries on so one run reports as many errors as possible.

use tracing::debug;

use super::symbols::SymbolTable;
use crate::ast::*;
use crate::error::{ErrorLog, SemanticError};

/// Name of the hidden local holding a `foreach` iterator.
pub const ITERATOR_SLOT: &str = "<iterator>";

/// Where the walk currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Top-level statements: assignments create globals.
    Module,
    /// Body of a function, method, constructor or static method.
    Function,
    /// Body of a lambda.
    Lambda,
}

/// What the enclosing method may refer to.
#[derive(Debug, Clone, Copy, Default)]
struct Receiver {
    has_self: bool,
    in_constructor: bool,
}

/// The class whose members are being walked.
#[derive(Debug, Clone)]
struct ClassInfo {
    name: String,
    has_base: bool,
}

pub struct SemanticAnalyser<'a> {
    symbols: SymbolTable,
    log: &'a mut ErrorLog,
    context: Context,
    receiver: Receiver,
    class: Option<ClassInfo>,
    loop_depth: usize,
    switch_depth: usize,
}

impl<'a> SemanticAnalyser<'a> {
    pub fn new(log: &'a mut ErrorLog) -> Self {
        Self {
            symbols: SymbolTable::new(),
            log,
            context: Context::Module,
            receiver: Receiver::default(),
            class: None,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    /// Analyse `program` and hand back the populated symbol table.
    pub fn analyse(mut self, program: &Program) -> SymbolTable {
        for stmt in &program.statements {
            self.statement(stmt);
        }
        debug!(
            scopes = self.symbols.scope_count(),
            errors = self.log.len(),
            "analysed program"
        );
        self.symbols
    }

    fn error(&mut self, error: SemanticError) {
        self.log.push(error);
    }

    fn at_module_level(&self) -> bool {
        self.context == Context::Module
    }

    /// Bind an assigned name as a local unless it already resolves.
    fn bind(&mut self, name: &str) {
        if !self.at_module_level() && !self.symbols.is_defined(name) {
            self.symbols.add_symbol(name);
        }
    }

    // ===== Statements =====

    fn statement(&mut self, stmt: &Stmt) {
        if self.at_module_level() && self.requires_function(&stmt.kind) {
            self.error(SemanticError::StatementOutsideFunction(
                stmt.kind.keyword(),
                stmt.span,
            ));
            return;
        }

        match &stmt.kind {
            StmtKind::Expression(expr) => self.expression(expr),
            StmtKind::Block(statements) => {
                for stmt in statements {
                    self.statement(stmt);
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expression(condition);
                self.statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.statement(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.expression(condition);
                self.loop_body(body);
            }
            StmtKind::For {
                initializer,
                condition,
                step,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.statement(initializer);
                }
                if let Some(condition) = condition {
                    self.expression(condition);
                }
                self.loop_body(body);
                if let Some(step) = step {
                    self.expression(step);
                }
            }
            StmtKind::Foreach {
                variable,
                iterable,
                body,
            } => {
                self.expression(iterable);
                self.symbols.begin_scope(false);
                self.symbols.add_symbol(ITERATOR_SLOT);
                self.symbols.add_symbol(variable);
                self.loop_body(body);
                self.symbols.end_scope(false);
            }
            StmtKind::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.error(SemanticError::BreakOutsideLoop(stmt.span));
                }
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(SemanticError::ContinueOutsideLoop(stmt.span));
                }
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            StmtKind::Raise(value) => self.expression(value),
            StmtKind::Try {
                body,
                exception,
                handler,
            } => {
                self.statement(body);
                self.symbols.begin_scope(false);
                if let Some(name) = exception {
                    self.symbols.add_symbol(name);
                }
                self.statement(handler);
                self.symbols.end_scope(false);
            }
            StmtKind::Switch {
                value,
                cases,
                default,
            } => {
                self.expression(value);
                self.switch_depth += 1;
                for case in cases {
                    for value in &case.values {
                        self.expression(value);
                    }
                    self.statement(&case.body);
                }
                if let Some(default) = default {
                    self.statement(default);
                }
                self.switch_depth -= 1;
            }
            StmtKind::Function(decl) => {
                if !self.at_module_level() {
                    self.error(SemanticError::NestedFunction(decl.name.clone(), decl.span));
                }
                self.function(decl, Receiver::default());
            }
            StmtKind::Class(decl) => {
                self.bind(&decl.name);
                self.class(decl);
            }
            StmtKind::Enum(decl) => self.bind(&decl.name),
            StmtKind::Interface(decl) => self.bind(&decl.name),
            StmtKind::Use(decl) => {
                if !self.at_module_level() {
                    self.error(SemanticError::UseOutsideModule(decl.span));
                }
            }
        }
    }

    fn requires_function(&self, kind: &StmtKind) -> bool {
        matches!(
            kind,
            StmtKind::If { .. }
                | StmtKind::While { .. }
                | StmtKind::For { .. }
                | StmtKind::Foreach { .. }
                | StmtKind::Break
                | StmtKind::Continue
                | StmtKind::Raise(_)
                | StmtKind::Try { .. }
                | StmtKind::Switch { .. }
        )
    }

    fn loop_body(&mut self, body: &Stmt) {
        self.loop_depth += 1;
        self.statement(body);
        self.loop_depth -= 1;
    }

    /// Parameters are bound first, in order, in a fresh scope.
    fn parameters(&mut self, params: &[Parameter]) {
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                self.error(SemanticError::DuplicateParameter(
                    param.name.clone(),
                    param.span,
                ));
            }
            self.symbols.add_symbol(&param.name);
        }
    }

    /// Walk a body with fresh loop state, restoring the caller's afterwards.
    fn body(&mut self, context: Context, receiver: Receiver, body: &[Stmt]) {
        let saved = (self.context, self.receiver, self.loop_depth, self.switch_depth);
        self.context = context;
        self.receiver = receiver;
        self.loop_depth = 0;
        self.switch_depth = 0;
        for stmt in body {
            self.statement(stmt);
        }
        (self.context, self.receiver, self.loop_depth, self.switch_depth) = saved;
    }

    fn function(&mut self, decl: &FunctionDecl, receiver: Receiver) {
        self.symbols.begin_scope(true);
        self.parameters(&decl.params);
        self.body(Context::Function, receiver, &decl.body);
        self.symbols.end_scope(true);
    }

    /// Methods first, then base expressions, then static field initializers.
    fn class(&mut self, decl: &ClassDecl) {
        let saved = self.class.replace(ClassInfo {
            name: decl.name.clone(),
            has_base: !decl.bases.is_empty(),
        });

        for member in &decl.members {
            match member {
                ClassMember::Constructor(f) => self.function(
                    f,
                    Receiver {
                        has_self: true,
                        in_constructor: true,
                    },
                ),
                ClassMember::Method(f) => self.function(
                    f,
                    Receiver {
                        has_self: true,
                        in_constructor: false,
                    },
                ),
                ClassMember::StaticMethod(f) => self.function(f, Receiver::default()),
                ClassMember::Class(nested) => self.class(nested),
                ClassMember::StaticField { .. }
                | ClassMember::Enum(_)
                | ClassMember::Interface(_) => {}
            }
        }

        // Bases and static fields run in the declaring context.
        self.class = saved;
        for base in &decl.bases {
            self.expression(base);
        }
        for member in &decl.members {
            if let ClassMember::StaticField { value, .. } = member {
                self.expression(value);
            }
        }
    }

    // ===== Expressions =====

    fn expression(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Null
            | ExprKind::Identifier(_) => {}
            ExprKind::SelfRef => {
                if !self.receiver.has_self {
                    self.error(SemanticError::SelfOutsideMethod(expr.span));
                }
            }
            ExprKind::Binary { left, right, .. }
            | ExprKind::LogicalAnd { left, right }
            | ExprKind::LogicalOr { left, right } => {
                self.expression(left);
                self.expression(right);
            }
            ExprKind::Unary { operand, .. } => self.expression(operand),
            ExprKind::Grouping(inner) => self.expression(inner),
            ExprKind::Call { callee, arguments } => {
                self.expression(callee);
                for argument in arguments {
                    self.expression(argument);
                }
            }
            ExprKind::SuperCall(arguments) => {
                if !self.receiver.in_constructor {
                    self.error(SemanticError::SuperOutsideConstructor(expr.span));
                } else if let Some(class) = self.class.as_ref().filter(|c| !c.has_base) {
                    let name = class.name.clone();
                    self.error(SemanticError::NoBaseClass(name, expr.span));
                }
                for argument in arguments {
                    self.expression(argument);
                }
            }
            ExprKind::Attribute { object, .. } => self.expression(object),
            ExprKind::Index { object, index } => {
                self.expression(object);
                self.expression(index);
            }
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                for item in items {
                    self.expression(item);
                }
            }
            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    self.expression(key);
                    self.expression(value);
                }
            }
            ExprKind::Lambda(decl) => {
                self.symbols.begin_scope(false);
                self.parameters(&decl.params);
                let receiver = Receiver {
                    has_self: self.receiver.has_self,
                    in_constructor: false,
                };
                self.body(Context::Lambda, receiver, &decl.body);
                self.symbols.end_scope(false);
            }
            ExprKind::Assign { target, value } => {
                self.expression(value);
                match &target.kind {
                    ExprKind::Identifier(name) => self.bind(name),
                    _ => self.expression(target),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IodineError;

    fn analyse(source: &str) -> (SymbolTable, ErrorLog) {
        let program = crate::parse(source).expect("source should parse");
        let mut log = ErrorLog::new();
        let symbols = SemanticAnalyser::new(&mut log).analyse(&program);
        (symbols, log)
    }

    fn messages(log: &ErrorLog) -> Vec<String> {
        log.iter().map(IodineError::to_string).collect()
    }

    #[test]
    fn test_module_level_control_flow_is_rejected_once() {
        let (_, log) = analyse("x = 1\nwhile (x) { x = x - 1 }\nif (x) { }");
        assert_eq!(log.len(), 2);
        let text = messages(&log).join("\n");
        assert!(text.contains("'while'"));
        assert!(text.contains("'if'"));
    }

    #[test]
    fn test_module_assignments_are_globals() {
        let (symbols, log) = analyse("x = 1\ny = x + 2");
        assert!(log.is_empty());
        assert_eq!(symbols.scope_count(), 1);
        assert_eq!(symbols.local_count(), 0);
    }

    #[test]
    fn test_function_locals_bind_once() {
        let (mut symbols, log) = analyse("func f(a) { b = a\n b = b + 1\n c = b }");
        assert!(log.is_empty());
        symbols.reset();
        symbols.next_scope();
        assert_eq!(symbols.lookup("a"), Some(0));
        assert_eq!(symbols.lookup("b"), Some(1));
        assert_eq!(symbols.lookup("c"), Some(2));
        assert_eq!(symbols.local_count(), 3);
    }

    #[test]
    fn test_nested_func_is_rejected() {
        let (_, log) = analyse("func outer() { func inner() { } }");
        assert_eq!(log.len(), 1);
        assert!(messages(&log)[0].contains("inner"));
    }

    #[test]
    fn test_lambda_opens_non_boundary_scope() {
        let (mut symbols, log) =
            analyse("func f(a) { g = lambda (x) => x + a\n return g(1) }");
        assert!(log.is_empty());
        symbols.reset();
        symbols.next_scope();
        assert_eq!(symbols.lookup("x"), None);
        symbols.next_scope();
        // The lambda is walked before `g` is bound.
        assert_eq!(symbols.lookup("x"), Some(1));
        assert_eq!(symbols.lookup("a"), Some(0));
        symbols.leave_scope();
        assert_eq!(symbols.lookup("g"), Some(2));
    }

    #[test]
    fn test_break_and_continue_placement() {
        let (_, log) = analyse(
            "func f(x) { break\n switch (x) { case 1 { break } }\n switch (x) { case 1 { continue } } }",
        );
        let text = messages(&log);
        assert_eq!(text.len(), 2);
        assert!(text[0].contains("'break'"));
        assert!(text[1].contains("'continue'"));
    }

    #[test]
    fn test_self_and_super_rules() {
        let source = "func f() { return self }\n\
                      class A { func A() { super() } func m() { return self } }\n\
                      class B : A { func B() { super() } static func s() { return self } }";
        let (_, log) = analyse(source);
        let text = messages(&log);
        assert_eq!(text.len(), 3);
        assert!(text[0].contains("'self'"));
        assert!(text[1].contains("Class 'A' has no base class"));
        assert!(text[2].contains("'self'"));
    }

    #[test]
    fn test_duplicate_parameters() {
        let (_, log) = analyse("func f(a, b, a) { }");
        assert_eq!(log.len(), 1);
        assert!(messages(&log)[0].contains("Duplicate parameter 'a'"));
    }

    #[test]
    fn test_use_inside_function_is_rejected() {
        let (_, log) = analyse("use math\nfunc f() { use math }");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_foreach_and_except_bind_in_their_own_scopes() {
        let (mut symbols, log) =
            analyse("func f(xs) { foreach (x in xs) { y = x }\n try { } except (e) { } }");
        assert!(log.is_empty());
        symbols.reset();
        symbols.next_scope();
        assert_eq!(symbols.lookup("x"), None);
        symbols.next_scope();
        assert_eq!(symbols.lookup(ITERATOR_SLOT), Some(1));
        assert_eq!(symbols.lookup("x"), Some(2));
        assert_eq!(symbols.lookup("y"), Some(3));
        symbols.leave_scope();
        symbols.next_scope();
        assert_eq!(symbols.lookup("e"), Some(4));
        assert_eq!(symbols.local_count(), 5);
    }
}
