//! Dominator tree construction
//!
//! Lengauer–Tarjan with path compression. All working state is indexed by
//! DFS number and lives only for the duration of one call; the results are
//! written back to each block's [`Dominance`](crate::ir::Dominance).

use crate::error::{CompileError, CompileResult};
use crate::ir::{BlockId, IrArena};

struct Forest {
    /// Semidominator, as a DFS number
    semi: Vec<usize>,
    /// Link in the spanning forest built so far
    ancestor: Vec<Option<usize>>,
    /// Node with the smallest semidominator on the compressed path
    best: Vec<usize>,
}

impl Forest {
    fn link(&mut self, parent: usize, node: usize) {
        self.ancestor[node] = Some(parent);
        self.best[node] = node;
    }

    /// Node with the lowest semidominator on the forest path above `node`,
    /// compressing the path as it goes
    fn eval(&mut self, node: usize) -> Option<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(ancestor) = self.ancestor[current] {
            if self.ancestor[ancestor].is_none() {
                break;
            }
            path.push(current);
            if path.len() > self.semi.len() {
                return None;
            }
            current = ancestor;
        }

        for &w in path.iter().rev() {
            let Some(a) = self.ancestor[w] else { continue };
            let b = self.best[a];
            self.ancestor[w] = self.ancestor[a];
            if self.semi[b] < self.semi[self.best[w]] {
                self.best[w] = b;
            }
        }
        Some(self.best[node])
    }
}

/// Compute immediate dominators for blocks numbered by [`super::dfs::number`].
/// `order[n]` must be the block with DFS number `n`.
pub(crate) fn compute(arena: &mut IrArena, function: &str, order: &[BlockId]) -> CompileResult<()> {
    let n = order.len();
    if n == 0 {
        return Ok(());
    }

    let mut parent = vec![0usize; n];
    for (i, &block) in order.iter().enumerate().skip(1) {
        let p = arena
            .block(block)
            .dom
            .parent
            .and_then(|p| arena.block(p).dom.dfnum)
            .ok_or_else(|| internal(arena, function, block, "numbered block without a parent"))?;
        parent[i] = p;
    }

    let mut forest = Forest {
        semi: (0..n).collect(),
        ancestor: vec![None; n],
        best: (0..n).collect(),
    };
    let mut idom: Vec<Option<usize>> = vec![None; n];
    let mut samedom: Vec<Option<usize>> = vec![None; n];
    let mut bucket: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in (1..n).rev() {
        let p = parent[i];
        let mut s = p;
        for pred in arena.block(order[i]).preds.clone() {
            let Some(v) = arena.block(pred).dom.dfnum else {
                continue;
            };
            let candidate = if v <= i {
                v
            } else {
                let lowest = forest
                    .eval(v)
                    .ok_or_else(|| internal(arena, function, order[i], "cycle in dominator forest"))?;
                forest.semi[lowest]
            };
            if candidate < s {
                s = candidate;
            }
        }
        forest.semi[i] = s;
        bucket[s].push(i);
        forest.link(p, i);

        for v in std::mem::take(&mut bucket[p]) {
            let y = forest
                .eval(v)
                .ok_or_else(|| internal(arena, function, order[v], "cycle in dominator forest"))?;
            if forest.semi[y] == forest.semi[v] {
                idom[v] = Some(p);
            } else {
                samedom[v] = Some(y);
            }
        }
    }

    for i in 1..n {
        if let Some(same) = samedom[i] {
            idom[i] = idom[same];
        }
    }

    for i in 0..n {
        let dom = &mut arena.block_mut(order[i]).dom;
        dom.semi = Some(order[forest.semi[i]]);
        dom.idom = idom[i].map(|d| order[d]);
        if i > 0 && dom.idom.is_none() {
            return Err(internal(arena, function, order[i], "block without an immediate dominator"));
        }
    }
    Ok(())
}

fn internal(arena: &IrArena, function: &str, block: BlockId, message: &str) -> CompileError {
    CompileError::internal(function, arena.block(block).name.as_str(), message)
}

/// Whether `a` dominates `b`, walking `b`'s dominator chain
pub fn dominates(arena: &IrArena, a: BlockId, b: BlockId) -> bool {
    let mut current = Some(b);
    while let Some(block) = current {
        if block == a {
            return true;
        }
        current = arena.block(block).dom.idom;
    }
    false
}
