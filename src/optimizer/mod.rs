//! Bytecode optimizer.
//!
//! Runs over one method's finalized instructions. Each pass takes the whole
//! instruction vector and returns a replacement in which every jump-style
//! argument is a valid index in `[0, len]`.

pub mod control_flow;
pub mod instruction;

use tracing::trace;

use crate::bytecode::{Instruction, Opcode};

pub use control_flow::ControlFlowPass;
pub use instruction::InstructionPass;

/// One transformation over a method body.
pub trait OptimizationPass {
    fn name(&self) -> &'static str;
    fn run(&self, instructions: Vec<Instruction>) -> Vec<Instruction>;
}

/// The pass pipeline: dead code first, then redundant instructions.
pub struct Optimizer {
    passes: Vec<Box<dyn OptimizationPass>>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            passes: vec![Box::new(ControlFlowPass), Box::new(InstructionPass)],
        }
    }

    pub fn with_passes(passes: Vec<Box<dyn OptimizationPass>>) -> Self {
        Self { passes }
    }

    pub fn run(&self, mut instructions: Vec<Instruction>) -> Vec<Instruction> {
        for pass in &self.passes {
            let before = instructions.len();
            instructions = pass.run(instructions);
            trace!(
                pass = pass.name(),
                removed = before - instructions.len(),
                "optimizer pass"
            );
        }
        instructions
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop every instruction whose `keep` flag is false and retarget jumps.
///
/// A jump to a removed instruction lands on the next surviving one; a jump to
/// `len` stays at the end.
pub(crate) fn compact(instructions: Vec<Instruction>, keep: &[bool]) -> Vec<Instruction> {
    debug_assert_eq!(instructions.len(), keep.len());
    let mut remap = Vec::with_capacity(instructions.len() + 1);
    let mut next = 0usize;
    for kept in keep {
        remap.push(next);
        if *kept {
            next += 1;
        }
    }
    remap.push(next);

    instructions
        .into_iter()
        .zip(keep)
        .filter(|(_, kept)| **kept)
        .map(|(mut instruction, _)| {
            if let Some(target) = instruction.target() {
                let target = target.min(remap.len() - 1);
                instruction.argument = remap[target] as i32;
            }
            instruction
        })
        .collect()
}

/// Indices some jump-style instruction points at.
pub(crate) fn jump_targets(instructions: &[Instruction]) -> Vec<bool> {
    let mut targets = vec![false; instructions.len() + 1];
    for instruction in instructions {
        if let Some(target) = instruction.target() {
            if let Some(slot) = targets.get_mut(target) {
                *slot = true;
            }
        }
    }
    targets
}

/// Whether every jump target is within `[0, len]`.
pub fn targets_valid(instructions: &[Instruction]) -> bool {
    instructions.iter().all(|instruction| {
        instruction.opcode != Opcode::Nop
            && instruction
                .target()
                .map_or(true, |target| target <= instructions.len())
    })
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::bytecode::{Instruction, Opcode};
    use crate::span::Span;

    pub fn ins(opcode: Opcode, argument: i32) -> Instruction {
        Instruction::new(opcode, argument, Span::default())
    }

    pub fn opcodes(instructions: &[Instruction]) -> Vec<Opcode> {
        instructions.iter().map(|i| i.opcode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::{ins, opcodes};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compact_retargets_jumps() {
        let code = vec![
            ins(Opcode::Jump, 3),
            ins(Opcode::Nop, 0),
            ins(Opcode::Nop, 0),
            ins(Opcode::LoadNull, 0),
            ins(Opcode::JumpIfFalse, 5),
        ];
        let keep: Vec<bool> = code.iter().map(|i| i.opcode != Opcode::Nop).collect();
        let out = compact(code, &keep);
        assert_eq!(
            opcodes(&out),
            vec![Opcode::Jump, Opcode::LoadNull, Opcode::JumpIfFalse]
        );
        assert_eq!(out[0].argument, 1);
        assert_eq!(out[2].argument, 3);
    }

    #[test]
    fn test_pipeline_removes_dead_code_then_redundancy() {
        let code = vec![
            ins(Opcode::LoadLocal, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadConst, 1),
            ins(Opcode::Return, 0),
            ins(Opcode::LoadConst, 2),
            ins(Opcode::Pop, 0),
        ];
        let out = Optimizer::new().run(code);
        assert_eq!(opcodes(&out), vec![Opcode::LoadConst, Opcode::Return]);
        assert!(targets_valid(&out));
    }

    #[test]
    fn test_optimizer_is_idempotent() {
        let code = vec![
            ins(Opcode::LoadTrue, 0),
            ins(Opcode::JumpIfFalse, 4),
            ins(Opcode::LoadLocal, 0),
            ins(Opcode::Jump, 5),
            ins(Opcode::LoadLocal, 1),
            ins(Opcode::Return, 0),
        ];
        let once = Optimizer::new().run(code);
        let twice = Optimizer::new().run(once.clone());
        assert_eq!(once, twice);
    }
}
