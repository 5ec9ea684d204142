//! Abstract Syntax Tree for Iodine.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use stmt::{
    ClassDecl, ClassMember, EnumDecl, EnumMember, FunctionDecl, InterfaceDecl, InterfaceMethod,
    Parameter, Program, Stmt, StmtKind, SwitchCase, UseDecl, UseItems,
};
