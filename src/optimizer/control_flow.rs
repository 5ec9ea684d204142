//! Dead code removal by reachability from the method entry.

use super::{compact, OptimizationPass};
use crate::bytecode::{Instruction, Opcode};

/// Removes instructions no execution path from index 0 can reach.
///
/// Unconditional jumps continue only at their target, conditional jumps and
/// handler pushes continue at both the target and the next instruction, and
/// `RETURN` ends a path. `RAISE` is treated as falling through.
pub struct ControlFlowPass;

impl ControlFlowPass {
    pub fn reachable(instructions: &[Instruction]) -> Vec<bool> {
        let len = instructions.len();
        let mut reached = vec![false; len];
        let mut pending = vec![0usize];

        while let Some(mut ip) = pending.pop() {
            while ip < len && !reached[ip] {
                reached[ip] = true;
                let instruction = &instructions[ip];
                match instruction.opcode {
                    Opcode::Jump => {
                        ip = instruction.argument as usize;
                        continue;
                    }
                    Opcode::JumpIfTrue | Opcode::JumpIfFalse | Opcode::PushExceptionHandler => {
                        pending.push(instruction.argument as usize);
                    }
                    Opcode::Return => break,
                    _ => {}
                }
                ip += 1;
            }
        }
        reached
    }
}

impl OptimizationPass for ControlFlowPass {
    fn name(&self) -> &'static str {
        "control-flow"
    }

    fn run(&self, instructions: Vec<Instruction>) -> Vec<Instruction> {
        let reached = Self::reachable(&instructions);
        if reached.iter().all(|r| *r) {
            return instructions;
        }
        compact(instructions, &reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::targets_valid;
    use crate::optimizer::test_util::{ins, opcodes};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_after_return_is_removed() {
        let code = vec![
            ins(Opcode::LoadConst, 0),
            ins(Opcode::Return, 0),
            ins(Opcode::LoadConst, 1),
            ins(Opcode::LoadNull, 0),
        ];
        let out = ControlFlowPass.run(code);
        assert_eq!(opcodes(&out), vec![Opcode::LoadConst, Opcode::Return]);
    }

    #[test]
    fn test_unconditional_jump_skips_dead_region() {
        let code = vec![
            ins(Opcode::Jump, 3),
            ins(Opcode::LoadConst, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadNull, 0),
            ins(Opcode::Return, 0),
        ];
        let out = ControlFlowPass.run(code);
        assert_eq!(
            opcodes(&out),
            vec![Opcode::Jump, Opcode::LoadNull, Opcode::Return]
        );
        assert_eq!(out[0].argument, 1);
    }

    #[test]
    fn test_branches_and_handlers_keep_both_paths() {
        let code = vec![
            ins(Opcode::PushExceptionHandler, 5),
            ins(Opcode::LoadTrue, 0),
            ins(Opcode::JumpIfFalse, 4),
            ins(Opcode::LoadConst, 0),
            ins(Opcode::PopExceptionHandler, 0),
            ins(Opcode::LoadException, 0),
            ins(Opcode::Return, 0),
        ];
        let out = ControlFlowPass.run(code.clone());
        assert_eq!(out, code);
    }

    #[test]
    fn test_loops_terminate() {
        let code = vec![
            ins(Opcode::LoadTrue, 0),
            ins(Opcode::JumpIfFalse, 3),
            ins(Opcode::Jump, 0),
            ins(Opcode::LoadNull, 0),
        ];
        let reached = ControlFlowPass::reachable(&code);
        assert!(reached.iter().all(|r| *r));
    }

    #[test]
    fn test_jump_to_end_stays_valid() {
        let code = vec![
            ins(Opcode::Jump, 4),
            ins(Opcode::LoadConst, 0),
            ins(Opcode::Pop, 0),
            ins(Opcode::LoadNull, 0),
        ];
        let out = ControlFlowPass.run(code);
        assert_eq!(opcodes(&out), vec![Opcode::Jump]);
        assert_eq!(out[0].argument, 1);
        assert!(targets_valid(&out));
    }

    #[test]
    fn test_raise_falls_through() {
        let code = vec![
            ins(Opcode::LoadConst, 0),
            ins(Opcode::Raise, 0),
            ins(Opcode::LoadNull, 0),
        ];
        assert_eq!(ControlFlowPass.run(code.clone()), code);
    }
}
