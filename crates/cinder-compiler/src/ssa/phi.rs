//! Phi placement on the iterated dominance frontier

use crate::ir::{BlockId, IrArena, IrFunction, Phi, VarId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Blocks assigning each local variable, in layout order. Parameters count
/// as assigned in the entry block.
pub(crate) fn def_sites(arena: &IrArena, function: &IrFunction) -> Vec<(VarId, Vec<BlockId>)> {
    let mut sites: FxHashMap<VarId, Vec<BlockId>> = FxHashMap::default();
    if let Some(entry) = function.entry() {
        for &param in &function.params {
            sites.entry(param).or_default().push(entry);
        }
    }
    for &block in &function.blocks {
        for &inst in &arena.block(block).insts {
            let Some(var) = arena.instr(inst).def_var() else {
                continue;
            };
            if arena.var(var).is_global {
                continue;
            }
            let blocks = sites.entry(var).or_default();
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
    }
    let mut sites: Vec<_> = sites.into_iter().collect();
    sites.sort_by_key(|(var, _)| *var);
    sites
}

/// Iterated dominance frontier of `blocks`
pub(crate) fn iterated_frontier(arena: &IrArena, blocks: &[BlockId]) -> Vec<BlockId> {
    let mut result = FxHashSet::default();
    let mut queued: FxHashSet<BlockId> = blocks.iter().copied().collect();
    let mut worklist: Vec<BlockId> = blocks.to_vec();
    while let Some(block) = worklist.pop() {
        for &frontier in &arena.block(block).dom.frontier {
            if result.insert(frontier) && queued.insert(frontier) {
                worklist.push(frontier);
            }
        }
    }
    let mut result: Vec<BlockId> = result.into_iter().collect();
    result.sort();
    result
}

/// Insert an empty phi for every variable assigned in two or more blocks at
/// each block of the iterated frontier of its assignments. Returns the
/// number of phis placed.
pub(crate) fn insert(arena: &mut IrArena, function: &IrFunction) -> usize {
    let mut placed = 0;
    for (var, blocks) in def_sites(arena, function) {
        if blocks.len() < 2 {
            continue;
        }
        let name = arena.var(var).name.clone();
        for join in iterated_frontier(arena, &blocks) {
            let args = arena
                .block(join)
                .preds
                .iter()
                .map(|pred| (*pred, None))
                .collect();
            arena.block_mut(join).phis.push(Phi {
                name: name.clone(),
                dest: var,
                args,
            });
            placed += 1;
        }
    }
    tracing::trace!(function = %function.name, placed, "placed phis");
    placed
}
