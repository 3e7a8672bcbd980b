//! PHI Node Elimination
//!
//! Replaces every phi with copies on the incoming edges. A copy for the edge
//! `pred -> block` goes at the end of `pred` (before its terminator) when
//! `pred` has a single successor. When `pred` branches, the edge is split
//! first: a new block holding only `jump block` is placed on it and the
//! copies go there, so the other successor never sees them.
//!
//! The copies feeding one block from one predecessor happen in parallel.
//! When a copy reads a variable another copy of the same group writes, the
//! source is saved to a fresh temporary before any copy runs. An empty
//! argument only survives renaming on a phi nothing reads, so it gets no copy.
//!
//! ## Example
//!
//! Before:
//! ```text
//! L0:
//!   y.0 = 0
//!   branch c.0, L1, L2
//! L1:
//!   y.1 = 1
//!   jump L2
//! L2:
//!   y.2 = phi [L0: y.0, L1: y.1]
//!   return y.2
//! ```
//!
//! After:
//! ```text
//! L0:
//!   y.0 = 0
//!   branch c.0, L1, L3
//! L1:
//!   y.1 = 1
//!   y.2 = y.1
//!   jump L2
//! L3:
//!   y.2 = y.0
//!   jump L2
//! L2:
//!   return y.2
//! ```

use crate::context::CompileContext;
use crate::error::{CompileError, CompileResult};
use crate::ir::block::replace_in;
use crate::ir::{BlockId, IrArena, IrFunction, IrInstr, IrProgram, IrVar, Operand, VarId};

/// Counts reported by phi elimination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhiStats {
    pub phis_removed: usize,
    pub edges_split: usize,
    pub copies_inserted: usize,
}

/// PHI elimination pass
pub struct PhiEliminator;

impl PhiEliminator {
    pub fn new() -> Self {
        Self
    }

    /// Eliminate all phis in every function
    pub fn eliminate(
        &self,
        program: &mut IrProgram,
        ctx: &mut CompileContext,
    ) -> CompileResult<PhiStats> {
        let mut stats = PhiStats::default();
        for function in &mut program.functions {
            let local = self.eliminate_in_function(&mut program.arena, function, ctx)?;
            stats.phis_removed += local.phis_removed;
            stats.edges_split += local.edges_split;
            stats.copies_inserted += local.copies_inserted;
        }
        tracing::debug!(
            phis = stats.phis_removed,
            split = stats.edges_split,
            copies = stats.copies_inserted,
            "eliminated phis"
        );
        Ok(stats)
    }

    /// Eliminate phis in one function
    pub fn eliminate_in_function(
        &self,
        arena: &mut IrArena,
        function: &mut IrFunction,
        ctx: &mut CompileContext,
    ) -> CompileResult<PhiStats> {
        let mut stats = PhiStats::default();
        let phi_blocks: Vec<BlockId> = function
            .blocks
            .iter()
            .copied()
            .filter(|block| !arena.block(*block).phis.is_empty())
            .collect();

        for block in phi_blocks {
            let phis = std::mem::take(&mut arena.block_mut(block).phis);
            stats.phis_removed += phis.len();

            for pred in arena.block(block).preds.clone() {
                let copies: Vec<(VarId, VarId)> = phis
                    .iter()
                    .filter_map(|phi| phi.arg_for(pred).map(|src| (phi.dest, src)))
                    .filter(|(dest, src)| dest != src)
                    .collect();
                if copies.is_empty() {
                    continue;
                }

                let at = if arena.block(pred).succs.len() > 1 {
                    stats.edges_split += 1;
                    split_edge(arena, ctx, function, pred, block)?
                } else {
                    pred
                };
                for copy in sequentialize(arena, ctx, copies) {
                    arena.insert_before_terminator(at, copy);
                    stats.copies_inserted += 1;
                }
            }
        }

        arena.rebuild_def_use(&function.blocks);
        Ok(stats)
    }
}

impl Default for PhiEliminator {
    fn default() -> Self {
        Self::new()
    }
}

/// Place a new block on the edge `from -> to` and return it
fn split_edge(
    arena: &mut IrArena,
    ctx: &mut CompileContext,
    function: &mut IrFunction,
    from: BlockId,
    to: BlockId,
) -> CompileResult<BlockId> {
    let terminator = arena.terminator(from).ok_or_else(|| {
        CompileError::internal(
            function.name.as_str(),
            arena.block(from).name.as_str(),
            "branching block without a terminator",
        )
    })?;

    let split = arena.new_block(ctx);
    arena.push_inst(split, IrInstr::Jump(to));
    arena.update_inst(terminator, |instr| instr.retarget(to, split));

    replace_in(&mut arena.block_mut(from).succs, to, split);
    replace_in(&mut arena.block_mut(to).preds, from, split);
    let data = arena.block_mut(split);
    data.preds.push(from);
    data.succs.push(to);

    function.blocks.push(split);
    tracing::trace!(
        from = %arena.block(from).name,
        to = %arena.block(to).name,
        split = %arena.block(split).name,
        "split critical edge"
    );
    Ok(split)
}

/// Order a group of parallel copies so no source is overwritten before
/// it is read
fn sequentialize(
    arena: &mut IrArena,
    ctx: &mut CompileContext,
    copies: Vec<(VarId, VarId)>,
) -> Vec<IrInstr> {
    let mut saves = Vec::new();
    let mut ordered = Vec::with_capacity(copies.len());
    for &(dest, src) in &copies {
        let clobbered = copies.iter().any(|(other, _)| *other == src);
        let src = if clobbered {
            let temp = arena.new_var(IrVar::new(ctx.next_temp(), true, false));
            saves.push(IrInstr::copy(temp, Operand::var(src)));
            temp
        } else {
            src
        };
        ordered.push(IrInstr::copy(dest, Operand::var(src)));
    }
    saves.extend(ordered);
    saves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Phi;
    use cinder_bytecode::Value;

    fn var(arena: &mut IrArena, name: &str, version: u32) -> VarId {
        let mut v = IrVar::new(name, false, false);
        v.version = Some(version);
        arena.new_var(v)
    }

    fn instrs(arena: &IrArena, block: BlockId) -> Vec<IrInstr> {
        arena
            .block(block)
            .insts
            .iter()
            .map(|i| arena.instr(*i).clone())
            .collect()
    }

    #[test]
    fn test_copies_land_in_single_successor_preds() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        let b: Vec<BlockId> = (0..4).map(|_| arena.new_block(&mut ctx)).collect();
        let c = var(&mut arena, "c", 0);
        let y0 = var(&mut arena, "y", 0);
        let y1 = var(&mut arena, "y", 1);
        let y2 = var(&mut arena, "y", 2);

        arena.push_inst(
            b[0],
            IrInstr::Branch {
                cond: Operand::var(c),
                then_block: b[1],
                else_block: b[2],
            },
        );
        arena.add_edge(b[0], b[1]);
        arena.add_edge(b[0], b[2]);
        for (block, dest, value) in [(b[1], y0, 1), (b[2], y1, 2)] {
            arena.push_inst(block, IrInstr::copy(dest, Operand::Const(Value::Int(value))));
            arena.push_inst(block, IrInstr::Jump(b[3]));
            arena.add_edge(block, b[3]);
        }
        arena.block_mut(b[3]).phis.push(Phi {
            name: "y".to_string(),
            dest: y2,
            args: vec![(b[1], Some(y0)), (b[2], Some(y1))],
        });
        arena.push_inst(b[3], IrInstr::Return(Some(Operand::var(y2))));

        let mut function = IrFunction::new("f", vec![c]);
        function.blocks = b.clone();
        let stats = PhiEliminator::new()
            .eliminate_in_function(&mut arena, &mut function, &mut ctx)
            .unwrap();

        assert_eq!(stats.edges_split, 0);
        assert_eq!(stats.copies_inserted, 2);
        assert!(arena.block(b[3]).phis.is_empty());
        assert_eq!(
            instrs(&arena, b[1]),
            vec![
                IrInstr::copy(y0, Operand::Const(Value::Int(1))),
                IrInstr::copy(y2, Operand::var(y0)),
                IrInstr::Jump(b[3]),
            ]
        );
        assert_eq!(arena.var(y2).defs.len(), 2);
    }

    #[test]
    fn test_critical_edge_is_split() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        // 0 -> 1, 0 -> 2, 1 -> 2; the edge 0 -> 2 is critical
        let b: Vec<BlockId> = (0..3).map(|_| arena.new_block(&mut ctx)).collect();
        let c = var(&mut arena, "c", 0);
        let x0 = var(&mut arena, "x", 0);
        let x1 = var(&mut arena, "x", 1);
        let x2 = var(&mut arena, "x", 2);

        arena.push_inst(b[0], IrInstr::copy(x0, Operand::Const(Value::Int(0))));
        arena.push_inst(
            b[0],
            IrInstr::Branch {
                cond: Operand::var(c),
                then_block: b[1],
                else_block: b[2],
            },
        );
        arena.add_edge(b[0], b[1]);
        arena.add_edge(b[0], b[2]);
        arena.push_inst(b[1], IrInstr::copy(x1, Operand::Const(Value::Int(1))));
        arena.push_inst(b[1], IrInstr::Jump(b[2]));
        arena.add_edge(b[1], b[2]);
        arena.block_mut(b[2]).phis.push(Phi {
            name: "x".to_string(),
            dest: x2,
            args: vec![(b[0], Some(x0)), (b[1], Some(x1))],
        });
        arena.push_inst(b[2], IrInstr::Return(Some(Operand::var(x2))));

        let mut function = IrFunction::new("f", vec![c]);
        function.blocks = b.clone();
        let stats = PhiEliminator::new()
            .eliminate_in_function(&mut arena, &mut function, &mut ctx)
            .unwrap();

        assert_eq!(stats.edges_split, 1);
        assert_eq!(function.blocks.len(), 4);
        let split = function.blocks[3];
        assert_eq!(
            instrs(&arena, b[0]).last(),
            Some(&IrInstr::Branch {
                cond: Operand::var(c),
                then_block: b[1],
                else_block: split,
            })
        );
        assert_eq!(
            instrs(&arena, split),
            vec![IrInstr::copy(x2, Operand::var(x0)), IrInstr::Jump(b[2])]
        );
        assert_eq!(arena.block(b[0]).succs, vec![b[1], split]);
        assert_eq!(arena.block(b[2]).preds, vec![split, b[1]]);
        assert_eq!(arena.block(split).preds, vec![b[0]]);
    }

    #[test]
    fn test_swapped_sources_are_saved_first() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        let a = var(&mut arena, "a", 1);
        let b = var(&mut arena, "b", 1);

        // a = b and b = a in parallel
        let ordered = sequentialize(&mut arena, &mut ctx, vec![(a, b), (b, a)]);
        assert_eq!(ordered.len(), 4);
        let saved: Vec<VarId> = ordered[..2]
            .iter()
            .filter_map(|instr| instr.def_var())
            .collect();
        assert!(saved.iter().all(|t| arena.var(*t).is_generated));
        assert_eq!(ordered[2], IrInstr::copy(a, Operand::var(saved[0])));
        assert_eq!(ordered[3], IrInstr::copy(b, Operand::var(saved[1])));
        assert_eq!(ordered[0], IrInstr::copy(saved[0], Operand::var(b)));
    }
}
