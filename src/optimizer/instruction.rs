//! Local redundancy removal, repeated until nothing changes.

use super::{compact, jump_targets, OptimizationPass};
use crate::bytecode::{Instruction, Opcode};

/// Collapses `load; POP` pairs and jumps to the next instruction.
///
/// Only loads without side effects are elided; `LOAD_GLOBAL` can raise and is
/// kept. A pair is left alone when its `POP` is a jump target.
pub struct InstructionPass;

fn is_pure_load(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::LoadLocal
            | Opcode::LoadConst
            | Opcode::LoadNull
            | Opcode::LoadTrue
            | Opcode::LoadFalse
            | Opcode::LoadSelf
    )
}

impl InstructionPass {
    /// One sweep. Returns `None` when nothing was rewritten.
    fn sweep(instructions: &[Instruction]) -> Option<Vec<bool>> {
        let targets = jump_targets(instructions);
        let mut keep = vec![true; instructions.len()];
        let mut changed = false;

        let mut i = 0;
        while i < instructions.len() {
            let instruction = &instructions[i];
            if instruction.opcode == Opcode::Nop {
                keep[i] = false;
                changed = true;
            } else if instruction.opcode == Opcode::Jump && instruction.argument as usize == i + 1
            {
                keep[i] = false;
                changed = true;
            } else if is_pure_load(instruction.opcode)
                && instructions.get(i + 1).map(|next| next.opcode) == Some(Opcode::Pop)
                && !targets[i + 1]
            {
                keep[i] = false;
                keep[i + 1] = false;
                changed = true;
                i += 2;
                continue;
            }
            i += 1;
        }

        changed.then_some(keep)
    }
}

impl OptimizationPass for InstructionPass {
    fn name(&self) -> &'static str {
        "instruction"
    }

    fn run(&self, mut instructions: Vec<Instruction>) -> Vec<Instruction> {
        while let Some(keep) = Self::sweep(&instructions) {
            instructions = compact(instructions, &keep);
        }
        instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::test_util::{ins, opcodes};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_pop_pairs_collapse() {
        let code = vec![
            ins(Opcode::LoadLocal, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadSelf, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadNull, 0),
        ];
        let out = InstructionPass.run(code);
        assert_eq!(opcodes(&out), vec![Opcode::LoadNull]);
    }

    #[test]
    fn test_global_loads_are_kept() {
        let code = vec![ins(Opcode::LoadGlobal, 0), ins(Opcode::Pop, 0)];
        assert_eq!(InstructionPass.run(code.clone()), code);
    }

    #[test]
    fn test_pop_that_is_a_jump_target_is_kept() {
        // `a && b` as a statement: the short-circuit path jumps onto the POP.
        let code = vec![
            ins(Opcode::LoadLocal, 0),
            ins(Opcode::Dup, 0),
            ins(Opcode::JumpIfFalse, 5),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadLocal, 1),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadNull, 0),
        ];
        let out = InstructionPass.run(code.clone());
        assert_eq!(out, code);
    }

    #[test]
    fn test_jump_to_next_is_removed_and_targets_shift() {
        let code = vec![
            ins(Opcode::LoadTrue, 0),
            ins(Opcode::JumpIfFalse, 4),
            ins(Opcode::Jump, 3),
            ins(Opcode::LoadConst, 0),
            ins(Opcode::LoadNull, 0),
        ];
        let out = InstructionPass.run(code);
        assert_eq!(
            opcodes(&out),
            vec![
                Opcode::LoadTrue,
                Opcode::JumpIfFalse,
                Opcode::LoadConst,
                Opcode::LoadNull
            ]
        );
        assert_eq!(out[1].argument, 3);
    }

    #[test]
    fn test_reaches_fixed_point() {
        // Removing the inner pair exposes an outer jump-to-next.
        let code = vec![
            ins(Opcode::Jump, 3),
            ins(Opcode::LoadNull, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadTrue, 0),
        ];
        let out = InstructionPass.run(code);
        assert_eq!(opcodes(&out), vec![Opcode::LoadTrue]);
    }
}
