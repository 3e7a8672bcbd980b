//! Dominance frontiers
//!
//! For every join point (a block with two or more predecessors) walk up the
//! dominator tree from each predecessor until reaching the join point's
//! immediate dominator; every block passed on the way has the join point in
//! its frontier.

use crate::ir::{block::insert_unique, BlockId, IrArena};

pub(crate) fn compute(arena: &mut IrArena, order: &[BlockId]) {
    for &block in order {
        arena.block_mut(block).dom.frontier.clear();
    }

    for &join in order {
        let preds: Vec<BlockId> = arena
            .block(join)
            .preds
            .iter()
            .copied()
            .filter(|p| arena.block(*p).dom.dfnum.is_some())
            .collect();
        if preds.len() < 2 {
            continue;
        }
        let stop = arena.block(join).dom.idom;
        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == stop {
                    break;
                }
                insert_unique(&mut arena.block_mut(current).dom.frontier, join);
                runner = arena.block(current).dom.idom;
            }
        }
    }

    for &block in order {
        arena.block_mut(block).dom.frontier.sort();
    }
}
