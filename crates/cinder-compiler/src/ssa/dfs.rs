//! Depth-first numbering of the CFG

use crate::ir::{BlockId, Dominance, IrArena, IrFunction};

/// Preorder of the blocks reachable from `entry`, with DFS-tree parents.
/// `order[n]` is the block numbered `n`; `parents[n]` is its tree parent.
pub(crate) fn preorder(arena: &IrArena, entry: BlockId) -> (Vec<BlockId>, Vec<Option<BlockId>>) {
    let mut order = Vec::new();
    let mut parents = Vec::new();
    let mut visited = vec![false; arena.block_count()];

    // (block, next successor to visit)
    let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
    visited[entry.index()] = true;
    order.push(entry);
    parents.push(None);

    while let Some(top) = stack.last_mut() {
        let (block, next) = *top;
        let succs = &arena.block(block).succs;
        if next >= succs.len() {
            stack.pop();
            continue;
        }
        top.1 += 1;
        let succ = succs[next];
        if !visited[succ.index()] {
            visited[succ.index()] = true;
            order.push(succ);
            parents.push(Some(block));
            stack.push((succ, 0));
        }
    }
    (order, parents)
}

/// Record DFS numbers and parents on every block of `function`.
/// Unreachable blocks are left unnumbered.
pub(crate) fn number(arena: &mut IrArena, function: &IrFunction) -> Vec<BlockId> {
    for &block in &function.blocks {
        arena.block_mut(block).dom = Dominance::default();
    }
    let Some(entry) = function.entry() else {
        return Vec::new();
    };
    let (order, parents) = preorder(arena, entry);
    for (dfnum, (&block, parent)) in order.iter().zip(parents).enumerate() {
        let dom = &mut arena.block_mut(block).dom;
        dom.dfnum = Some(dfnum);
        dom.parent = parent;
    }
    order
}
