//! Stack-based virtual machine executing compiled modules.
//!
//! Split by concern: the dispatch loop and frames (`vm`), calls
//! (`vm_calls`), attribute access and `is` (`vm_classes`), operators,
//! indexing and iteration (`vm_ops`), exception unwinding (`vm_exceptions`),
//! global builtins and the module loader.

pub mod builtins;
pub mod loader;
#[allow(clippy::module_inception)]
pub mod vm;
pub mod vm_calls;
pub mod vm_classes;
pub mod vm_exceptions;
pub mod vm_ops;

#[cfg(test)]
mod tests;

pub use loader::ModuleLoader;
pub use vm::{ExceptionHandler, Frame, Vm};
