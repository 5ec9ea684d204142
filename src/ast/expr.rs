//! Expression AST nodes.

use crate::ast::stmt::FunctionDecl;
use crate::span::Span;

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Identifier(_) | ExprKind::Attribute { .. } | ExprKind::Index { .. }
        )
    }
}

/// All expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: 42
    IntLiteral(i64),
    /// Float literal: 3.14
    FloatLiteral(f64),
    /// String literal: "hello"
    StringLiteral(String),
    /// Boolean literal: true, false
    BoolLiteral(bool),
    /// Null literal
    Null,

    /// Name reference: foo
    Identifier(String),

    /// self reference
    SelfRef,

    /// Binary operation: a + b
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation: -x, !x, ~x
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },

    /// Logical and: a && b
    LogicalAnd { left: Box<Expr>, right: Box<Expr> },

    /// Logical or: a || b
    LogicalOr { left: Box<Expr>, right: Box<Expr> },

    /// Grouping expression: (expr)
    Grouping(Box<Expr>),

    /// Call: foo(a, b)
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// Base constructor call: super(a, b)
    SuperCall(Vec<Expr>),

    /// Attribute access: obj.name
    Attribute { object: Box<Expr>, name: String },

    /// Index: obj[index]
    Index { object: Box<Expr>, index: Box<Expr> },

    /// List literal: [1, 2, 3]
    List(Vec<Expr>),

    /// Tuple literal: (1, 2) or (1,)
    Tuple(Vec<Expr>),

    /// Hash literal: { "key" : value, ... }
    Hash(Vec<(Expr, Expr)>),

    /// Anonymous function: lambda (x) => x * 2
    Lambda(Box<FunctionDecl>),

    /// Assignment expression: x = 5
    Assign { target: Box<Expr>, value: Box<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    InstanceOf,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
            BinaryOp::Modulo => write!(f, "%"),
            BinaryOp::Equal => write!(f, "=="),
            BinaryOp::NotEqual => write!(f, "!="),
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::LessEqual => write!(f, "<="),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::GreaterEqual => write!(f, ">="),
            BinaryOp::ShiftLeft => write!(f, "<<"),
            BinaryOp::ShiftRight => write!(f, ">>"),
            BinaryOp::BitAnd => write!(f, "&"),
            BinaryOp::BitOr => write!(f, "|"),
            BinaryOp::BitXor => write!(f, "^"),
            BinaryOp::InstanceOf => write!(f, "is"),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNot,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Negate => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::BitNot => write!(f, "~"),
        }
    }
}
