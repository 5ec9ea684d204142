//! Front half of the back end: semantic analysis and bytecode generation.
//!
//! The [`SemanticAnalyser`] records scopes into a [`SymbolTable`]; the
//! [`Compiler`] replays them while emitting code.

pub mod analyser;
#[allow(clippy::module_inception)]
pub mod compiler;
pub mod compiler_classes;
pub mod compiler_exprs;
pub mod compiler_stmts;
pub mod symbols;

pub use analyser::{SemanticAnalyser, ITERATOR_SLOT};
pub use compiler::Compiler;
pub use symbols::SymbolTable;
