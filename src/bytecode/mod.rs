//! Bytecode representation for the Iodine VM.
//!
//! # Architecture
//!
//! - `instruction`: opcodes and the `(opcode, argument, span)` instruction
//! - `method`: compiled methods and the label-patching `MethodBuilder`
//! - `module`: compiled modules and the `ModuleBuilder` build context
//! - `disassembler`: debug output for bytecode inspection

pub mod disassembler;
pub mod instruction;
pub mod method;
pub mod module;

pub use disassembler::{disassemble_method, disassemble_module};
pub use instruction::{Instruction, Opcode};
pub use method::{Label, Method, MethodBuilder, MethodKind};
pub use module::{Module, ModuleBuilder};
