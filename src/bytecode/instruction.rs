//! Bytecode instruction definitions for the Iodine VM.

use crate::ast::{BinaryOp, UnaryOp};
use crate::span::Span;

/// Opcodes for the bytecode virtual machine.
///
/// Every instruction carries one signed integer argument whose meaning depends
/// on the opcode: a constant-pool index, a local slot, an operand count, an
/// operator code, or an absolute instruction index for jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Does nothing; only exists between optimizer passes.
    Nop = 0,

    // ============ Stack ============
    /// Pop the top value from the stack
    Pop,
    /// Duplicate the top value on the stack
    Dup,

    // ============ Loads & Stores ============
    /// Push a constant: LOAD_CONST <constant>
    LoadConst,
    LoadNull,
    LoadTrue,
    LoadFalse,
    /// Push the receiver of the running method
    LoadSelf,
    /// Push a local: LOAD_LOCAL <slot>
    LoadLocal,
    /// Pop into a local: STORE_LOCAL <slot>
    StoreLocal,
    /// Push a module attribute or builtin: LOAD_GLOBAL <name constant>
    LoadGlobal,
    /// Pop into a module attribute: STORE_GLOBAL <name constant>
    StoreGlobal,
    /// [obj] -> [obj.name]: LOAD_ATTRIBUTE <name constant>
    LoadAttribute,
    /// [value, obj] -> []: STORE_ATTRIBUTE <name constant>
    StoreAttribute,
    /// [obj, index] -> [obj[index]]
    LoadIndex,
    /// [value, obj, index] -> []
    StoreIndex,

    // ============ Operators ============
    /// [a, b] -> [a op b]: BIN_OP <operator>
    BinOp,
    /// [a] -> [op a]: UNARY_OP <operator>
    UnaryOp,

    // ============ Calls ============
    /// [callee, args...] -> [result]: INVOKE <argc>
    Invoke,
    /// [class, args...] -> [result], runs the base constructor on self: INVOKE_SUPER <argc>
    InvokeSuper,
    /// Return the top of the stack to the caller
    Return,

    // ============ Control Flow ============
    /// JUMP <target>
    Jump,
    /// Pop and jump if truthy: JUMP_IF_TRUE <target>
    JumpIfTrue,
    /// Pop and jump if falsy: JUMP_IF_FALSE <target>
    JumpIfFalse,

    // ============ Exceptions ============
    /// Install a handler: PUSH_EXCEPTION_HANDLER <target>
    PushExceptionHandler,
    PopExceptionHandler,
    /// Push the exception caught by the innermost handler of this frame
    LoadException,
    /// Pop and raise
    Raise,

    // ============ Construction ============
    /// BUILD_LIST <count>
    BuildList,
    /// BUILD_TUPLE <count>
    BuildTuple,
    /// [k1, v1, ... kn, vn] -> [hash]: BUILD_HASH <pairs>
    BuildHash,
    /// Capture the current frame for a lambda: BUILD_CLOSURE <method constant>
    BuildClosure,
    /// [class, bases...] -> []: INHERIT <base count>
    Inherit,

    // ============ Iteration ============
    /// [iterable] -> [iterator]
    GetIter,
    /// [iterator] -> [bool]
    IterMoveNext,
    /// [iterator] -> [current item]
    IterGetNext,

    // ============ Modules ============
    /// IMPORT <module name constant>
    Import,
    /// [names tuple] -> []: IMPORT_FROM <module name constant>
    ImportFrom,
    /// IMPORT_ALL <module name constant>
    ImportAll,
}

impl Opcode {
    /// Whether the argument is an absolute instruction index.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpIfTrue | Opcode::JumpIfFalse | Opcode::PushExceptionHandler
        )
    }

    /// Whether the argument indexes the module constant pool.
    pub fn uses_constant(self) -> bool {
        matches!(
            self,
            Opcode::LoadConst
                | Opcode::LoadGlobal
                | Opcode::StoreGlobal
                | Opcode::LoadAttribute
                | Opcode::StoreAttribute
                | Opcode::BuildClosure
                | Opcode::Import
                | Opcode::ImportFrom
                | Opcode::ImportAll
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::LoadNull => "LOAD_NULL",
            Opcode::LoadTrue => "LOAD_TRUE",
            Opcode::LoadFalse => "LOAD_FALSE",
            Opcode::LoadSelf => "LOAD_SELF",
            Opcode::LoadLocal => "LOAD_LOCAL",
            Opcode::StoreLocal => "STORE_LOCAL",
            Opcode::LoadGlobal => "LOAD_GLOBAL",
            Opcode::StoreGlobal => "STORE_GLOBAL",
            Opcode::LoadAttribute => "LOAD_ATTRIBUTE",
            Opcode::StoreAttribute => "STORE_ATTRIBUTE",
            Opcode::LoadIndex => "LOAD_INDEX",
            Opcode::StoreIndex => "STORE_INDEX",
            Opcode::BinOp => "BIN_OP",
            Opcode::UnaryOp => "UNARY_OP",
            Opcode::Invoke => "INVOKE",
            Opcode::InvokeSuper => "INVOKE_SUPER",
            Opcode::Return => "RETURN",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfTrue => "JUMP_IF_TRUE",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::PushExceptionHandler => "PUSH_HANDLER",
            Opcode::PopExceptionHandler => "POP_HANDLER",
            Opcode::LoadException => "LOAD_EXCEPTION",
            Opcode::Raise => "RAISE",
            Opcode::BuildList => "BUILD_LIST",
            Opcode::BuildTuple => "BUILD_TUPLE",
            Opcode::BuildHash => "BUILD_HASH",
            Opcode::BuildClosure => "BUILD_CLOSURE",
            Opcode::Inherit => "INHERIT",
            Opcode::GetIter => "GET_ITER",
            Opcode::IterMoveNext => "ITER_MOVE_NEXT",
            Opcode::IterGetNext => "ITER_GET_NEXT",
            Opcode::Import => "IMPORT",
            Opcode::ImportFrom => "IMPORT_FROM",
            Opcode::ImportAll => "IMPORT_ALL",
        }
    }
}

/// A single instruction: opcode, argument and the source it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub argument: i32,
    pub span: Span,
}

impl Instruction {
    pub fn new(opcode: Opcode, argument: i32, span: Span) -> Self {
        Self {
            opcode,
            argument,
            span,
        }
    }

    pub fn simple(opcode: Opcode, span: Span) -> Self {
        Self::new(opcode, 0, span)
    }

    /// Jump target, for jump-style opcodes.
    pub fn target(&self) -> Option<usize> {
        if self.opcode.is_jump() {
            Some(self.argument as usize)
        } else {
            None
        }
    }
}

/// Operator codes carried by `BIN_OP`, indexed by argument.
pub const BINARY_OPERATORS: [BinaryOp; 17] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Multiply,
    BinaryOp::Divide,
    BinaryOp::Modulo,
    BinaryOp::Equal,
    BinaryOp::NotEqual,
    BinaryOp::Less,
    BinaryOp::LessEqual,
    BinaryOp::Greater,
    BinaryOp::GreaterEqual,
    BinaryOp::ShiftLeft,
    BinaryOp::ShiftRight,
    BinaryOp::BitAnd,
    BinaryOp::BitOr,
    BinaryOp::BitXor,
    BinaryOp::InstanceOf,
];

/// Operator codes carried by `UNARY_OP`, indexed by argument.
pub const UNARY_OPERATORS: [UnaryOp; 3] = [UnaryOp::Negate, UnaryOp::Not, UnaryOp::BitNot];

pub fn encode_binary(op: BinaryOp) -> i32 {
    BINARY_OPERATORS
        .iter()
        .position(|candidate| *candidate == op)
        .unwrap_or_default() as i32
}

pub fn decode_binary(argument: i32) -> Option<BinaryOp> {
    BINARY_OPERATORS.get(usize::try_from(argument).ok()?).copied()
}

pub fn encode_unary(op: UnaryOp) -> i32 {
    UNARY_OPERATORS
        .iter()
        .position(|candidate| *candidate == op)
        .unwrap_or_default() as i32
}

pub fn decode_unary(argument: i32) -> Option<UnaryOp> {
    UNARY_OPERATORS.get(usize::try_from(argument).ok()?).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_codes() {
        assert_eq!(encode_binary(BinaryOp::InstanceOf), 16);
        assert_eq!(decode_unary(encode_unary(UnaryOp::BitNot)), Some(UnaryOp::BitNot));
        assert_eq!(decode_binary(-1), None);
        assert_eq!(decode_binary(99), None);
    }

    #[test]
    fn test_jump_classification() {
        let span = Span::default();
        assert_eq!(Instruction::new(Opcode::Jump, 7, span).target(), Some(7));
        assert_eq!(
            Instruction::new(Opcode::PushExceptionHandler, 3, span).target(),
            Some(3)
        );
        assert_eq!(Instruction::new(Opcode::LoadLocal, 7, span).target(), None);
    }
}
