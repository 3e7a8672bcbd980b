//! Constant Folding and Propagation
//!
//! A variable with exactly one definition of the form `v = <constant>` is
//! replaced by that constant at every read. Binary and unary operations
//! whose operands are all constant are then evaluated at compile time.
//! Both steps repeat until nothing changes, so running the folder again on
//! its own output is a no-op.
//!
//! Only integers are propagated into index paths. An operation whose
//! evaluation fails (division by zero, mixing text with numbers) is left
//! for the VM to report.

use crate::ir::{BlockId, IrArena, IrInstr, IrProgram, Operand, Rvalue, VarId};
use cinder_bytecode::Value;

/// Constant folding optimizer
pub struct ConstantFolder;

impl ConstantFolder {
    pub fn new() -> Self {
        Self
    }

    /// Fold the globals block and every function. Returns the number of
    /// instructions rewritten.
    pub fn fold(&self, program: &mut IrProgram) -> usize {
        let mut folded = self.fold_blocks(&mut program.arena, &[program.globals]);
        for function in &program.functions {
            folded += self.fold_blocks(&mut program.arena, &function.blocks);
        }
        tracing::trace!(folded, "folded constants");
        folded
    }

    /// Fold `blocks` to a fixpoint
    pub fn fold_blocks(&self, arena: &mut IrArena, blocks: &[BlockId]) -> usize {
        let mut total = 0;
        loop {
            let mut changed = 0;
            for &block in blocks {
                for inst in arena.block(block).insts.clone() {
                    let mut instr = arena.instr(inst).clone();
                    if self.fold_instr(arena, &mut instr) {
                        arena.update_inst(inst, |slot| *slot = instr);
                        changed += 1;
                    }
                }
            }
            if changed == 0 {
                return total;
            }
            total += changed;
        }
    }

    /// Propagate known constants into `instr`, then evaluate it if it became
    /// constant. Returns whether anything changed.
    fn fold_instr(&self, arena: &IrArena, instr: &mut IrInstr) -> bool {
        let mut changed = false;
        instr.visit_operands_mut(|operand, in_index| {
            let Some(var) = operand.as_plain_var() else {
                return;
            };
            let Some(value) = known_constant(arena, var) else {
                return;
            };
            if in_index && !matches!(value, Value::Int(_)) {
                return;
            }
            *operand = Operand::Const(value);
            changed = true;
        });

        if let IrInstr::Assign { src, .. } = instr {
            if let Some(value) = evaluate(src) {
                *src = Rvalue::Use(Operand::Const(value));
                changed = true;
            }
        }
        changed
    }
}

impl Default for ConstantFolder {
    fn default() -> Self {
        Self::new()
    }
}

/// The constant `var` always holds, if its only definition assigns one
fn known_constant(arena: &IrArena, var: VarId) -> Option<Value> {
    let data = arena.var(var);
    if data.is_global {
        return None;
    }
    match arena.instr(data.def()?) {
        IrInstr::Assign {
            dest,
            src: Rvalue::Use(Operand::Const(value)),
        } if !dest.is_indexed() && dest.var == var => Some(value.clone()),
        _ => None,
    }
}

fn evaluate(src: &Rvalue) -> Option<Value> {
    let result = match src {
        Rvalue::Binary {
            op,
            lhs: Operand::Const(lhs),
            rhs: Operand::Const(rhs),
        } => op.evaluate(lhs, rhs),
        Rvalue::Unary {
            op,
            operand: Operand::Const(operand),
        } => op.evaluate(operand),
        _ => return None,
    };
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::trace!(error = %err, "leaving operation unfolded");
            None
        }
    }
}
