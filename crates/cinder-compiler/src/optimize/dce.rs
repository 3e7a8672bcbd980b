//! Dead Code Elimination (DCE)
//!
//! Removes assignments whose destination is never read. Calls, indexed
//! stores, jumps, branches and returns are always kept, as is every write
//! to a global. Blocks are swept back to front so a removal that leaves an
//! operand dead is usually picked up in the same sweep.

use crate::ir::{BlockId, InstId, IrArena, IrProgram};

/// Dead code eliminator
pub struct DeadCodeEliminator;

impl DeadCodeEliminator {
    pub fn new() -> Self {
        Self
    }

    /// Eliminate dead code in the globals block and every function.
    /// Returns the number of instructions removed.
    pub fn eliminate(&self, program: &mut IrProgram) -> usize {
        let mut removed = self.eliminate_blocks(&mut program.arena, &[program.globals]);
        for function in &program.functions {
            removed += self.eliminate_blocks(&mut program.arena, &function.blocks);
        }
        tracing::trace!(removed, "eliminated dead code");
        removed
    }

    /// Sweep `blocks` until no more instructions die
    pub fn eliminate_blocks(&self, arena: &mut IrArena, blocks: &[BlockId]) -> usize {
        let mut total = 0;
        loop {
            let mut removed = 0;
            for &block in blocks.iter().rev() {
                for inst in arena.block(block).insts.clone().into_iter().rev() {
                    if is_dead(arena, inst) {
                        arena.remove_inst(inst);
                        removed += 1;
                    }
                }
            }
            if removed == 0 {
                return total;
            }
            total += removed;
        }
    }
}

impl Default for DeadCodeEliminator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_dead(arena: &IrArena, inst: InstId) -> bool {
    let instr = arena.instr(inst);
    if instr.has_side_effects() {
        return false;
    }
    match instr.def_var() {
        Some(var) => {
            let var = arena.var(var);
            !var.is_global && !var.is_used()
        }
        None => false,
    }
}
