//! SSA Construction
//!
//! Converts each lowered function into SSA form:
//!
//! 1. Unreachable blocks are removed
//! 2. Blocks are numbered in depth-first preorder
//! 3. Immediate dominators are computed with Lengauer–Tarjan
//! 4. Dominance frontiers are computed from the dominator tree
//! 5. Phis are placed on the iterated frontier of every variable assigned in
//!    more than one block
//! 6. Variables are renamed along the dominator tree
//!
//! The globals block is left alone: globals are shared slots, never renamed.

pub(crate) mod dfs;
pub mod dominators;
pub(crate) mod frontier;
pub(crate) mod phi;
pub(crate) mod rename;

pub use dominators::dominates;

use crate::error::CompileResult;
use crate::ir::{BlockId, IrArena, IrFunction, IrProgram};
use rustc_hash::FxHashSet;

/// Counts reported by SSA construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SsaStats {
    /// Blocks dropped because the entry cannot reach them
    pub unreachable_blocks_removed: usize,
    /// Phis placed before renaming
    pub phis_inserted: usize,
}

impl std::ops::AddAssign for SsaStats {
    fn add_assign(&mut self, other: Self) {
        self.unreachable_blocks_removed += other.unreachable_blocks_removed;
        self.phis_inserted += other.phis_inserted;
    }
}

/// Bring every function of `program` into SSA form
#[tracing::instrument(level = "debug", skip_all, fields(functions = program.functions.len()))]
pub fn build(program: &mut IrProgram) -> CompileResult<SsaStats> {
    let mut stats = SsaStats::default();
    for function in &mut program.functions {
        stats += construct(&mut program.arena, function)?;
    }
    tracing::debug!(
        phis = stats.phis_inserted,
        unreachable = stats.unreachable_blocks_removed,
        "built SSA form"
    );
    Ok(stats)
}

/// Bring one function into SSA form
#[tracing::instrument(level = "debug", skip_all, fields(function = %function.name))]
pub fn construct(arena: &mut IrArena, function: &mut IrFunction) -> CompileResult<SsaStats> {
    let unreachable_blocks_removed = remove_unreachable(arena, function);

    let order = dfs::number(arena, function);
    dominators::compute(arena, &function.name, &order)?;
    frontier::compute(arena, &order);
    let phis_inserted = phi::insert(arena, function);
    rename::rename(arena, function)?;

    tracing::trace!(
        blocks = function.blocks.len(),
        phis = phis_inserted,
        "renamed function"
    );
    Ok(SsaStats {
        unreachable_blocks_removed,
        phis_inserted,
    })
}

/// Drop blocks the entry cannot reach, unlinking their instructions.
/// Returns the number of blocks removed.
pub fn remove_unreachable(arena: &mut IrArena, function: &mut IrFunction) -> usize {
    let Some(entry) = function.entry() else {
        return 0;
    };
    let (order, _) = dfs::preorder(arena, entry);
    let reachable: FxHashSet<BlockId> = order.into_iter().collect();

    let dead: Vec<BlockId> = function
        .blocks
        .iter()
        .copied()
        .filter(|block| !reachable.contains(block))
        .collect();
    if dead.is_empty() {
        return 0;
    }

    for &block in &dead {
        for inst in arena.block(block).insts.clone() {
            arena.remove_inst(inst);
        }
        for succ in arena.block(block).succs.clone() {
            arena.remove_edge(block, succ);
        }
        for pred in arena.block(block).preds.clone() {
            arena.remove_edge(pred, block);
        }
    }
    function.blocks.retain(|block| reachable.contains(block));

    for &block in &function.blocks {
        let data = arena.block_mut(block);
        if data.loop_end.is_some_and(|end| dead.contains(&end)) {
            data.loop_end = None;
        }
        if data.loop_start.is_some_and(|start| dead.contains(&start)) {
            data.loop_start = None;
        }
    }

    tracing::trace!(function = %function.name, removed = dead.len(), "removed unreachable blocks");
    dead.len()
}
