//! Statement and declaration AST nodes.

use crate::ast::expr::Expr;
use crate::span::Span;

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: expr;
    Expression(Expr),

    /// Block: { statements }
    Block(Vec<Stmt>),

    /// If statement: if (cond) { ... } else { ... }
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// While loop: while (cond) { ... }
    While { condition: Expr, body: Box<Stmt> },

    /// C-style loop: for (init; cond; step) { ... }
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },

    /// Iteration: foreach (x in xs) { ... }
    Foreach {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
    },

    Break,
    Continue,

    /// Return statement: return expr;
    Return(Option<Expr>),

    /// Raise statement: raise expr;
    Raise(Expr),

    /// try { ... } except (e) { ... }
    Try {
        body: Box<Stmt>,
        exception: Option<String>,
        handler: Box<Stmt>,
    },

    /// switch (value) { case a, b { ... } default { ... } }
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Box<Stmt>>,
    },

    /// Function declaration
    Function(FunctionDecl),

    /// Class declaration
    Class(ClassDecl),

    /// Enum declaration
    Enum(EnumDecl),

    /// Interface declaration
    Interface(InterfaceDecl),

    /// Module import: use a.b / use x, y from a.b / use * from a.b
    Use(UseDecl),
}

impl StmtKind {
    /// Keyword used in diagnostics for control statements.
    pub fn keyword(&self) -> &'static str {
        match self {
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::For { .. } => "for",
            StmtKind::Foreach { .. } => "foreach",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Return(_) => "return",
            StmtKind::Raise(_) => "raise",
            StmtKind::Try { .. } => "try",
            StmtKind::Switch { .. } => "switch",
            StmtKind::Function(_) => "func",
            StmtKind::Class(_) => "class",
            StmtKind::Enum(_) => "enum",
            StmtKind::Interface(_) => "interface",
            StmtKind::Use(_) => "use",
            StmtKind::Expression(_) | StmtKind::Block(_) => "statement",
        }
    }
}

/// One `case` arm of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub span: Span,
}

/// Function, method, constructor or lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    /// The last parameter collects surplus arguments: `func f(a, *rest)`.
    pub variadic: bool,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub bases: Vec<Expr>,
    /// Members in source order.
    pub members: Vec<ClassMember>,
    pub span: Span,
}

impl ClassDecl {
    pub fn constructor(&self) -> Option<&FunctionDecl> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Constructor(decl) => Some(decl),
            _ => None,
        })
    }
}

/// Declarations allowed in a class body.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Constructor(FunctionDecl),
    Method(FunctionDecl),
    StaticMethod(FunctionDecl),
    StaticField {
        name: String,
        value: Expr,
        span: Span,
    },
    Class(ClassDecl),
    Enum(EnumDecl),
    Interface(InterfaceDecl),
}

/// Enum declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<i64>,
    pub span: Span,
}

/// Interface declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<InterfaceMethod>,
    pub span: Span,
}

/// Method signature in an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethod {
    pub name: String,
    pub params: Vec<Parameter>,
    pub variadic: bool,
    pub span: Span,
}

/// What a `use` statement brings into scope.
#[derive(Debug, Clone, PartialEq)]
pub enum UseItems {
    /// `use a.b` binds the module itself under its last segment.
    Module,
    /// `use x, y from a.b`
    Names(Vec<String>),
    /// `use * from a.b`
    All,
}

/// Import declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    /// Dotted module path.
    pub module: String,
    pub items: UseItems,
    pub span: Span,
}

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}
