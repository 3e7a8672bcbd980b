//! Basic Blocks and Control Flow
//!
//! A block is an ordered list of instruction ids. Control leaves a block
//! only through its final `Jump`, `Branch` or `Return`; edges are mirrored
//! in `preds`/`succs`.

use super::instr::InstId;
use super::var::VarId;

/// Basic block identifier, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A phi node selecting one incoming version per predecessor
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// Source name the phi merges
    pub name: String,
    /// Version defined by this phi
    pub dest: VarId,
    /// Incoming version per predecessor; `None` when no definition reaches
    pub args: Vec<(BlockId, Option<VarId>)>,
}

impl Phi {
    pub fn arg_for(&self, pred: BlockId) -> Option<VarId> {
        self.args
            .iter()
            .find(|(block, _)| *block == pred)
            .and_then(|(_, var)| *var)
    }
}

/// Dominance bookkeeping filled in by the SSA builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dominance {
    /// Depth-first preorder number; `None` when unreachable
    pub dfnum: Option<usize>,
    /// DFS tree parent
    pub parent: Option<BlockId>,
    /// Semidominator
    pub semi: Option<BlockId>,
    /// Immediate dominator; `None` for the entry block
    pub idom: Option<BlockId>,
    /// Dominance frontier, in ascending block order
    pub frontier: Vec<BlockId>,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Label used for relocation
    pub name: String,
    pub insts: Vec<InstId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub phis: Vec<Phi>,
    pub dom: Dominance,
    /// Set on a loop's exit block, pointing at the loop header
    pub loop_start: Option<BlockId>,
    /// Set on a loop header, pointing at the loop's exit block
    pub loop_end: Option<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            insts: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            phis: Vec::new(),
            dom: Dominance::default(),
            loop_start: None,
            loop_end: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn last(&self) -> Option<InstId> {
        self.insts.last().copied()
    }
}

/// Insert into an ordered set kept as a vector
pub(crate) fn insert_unique(set: &mut Vec<BlockId>, block: BlockId) {
    if !set.contains(&block) {
        set.push(block);
    }
}

/// Replace `from` with `to` in place, keeping position
pub(crate) fn replace_in(set: &mut Vec<BlockId>, from: BlockId, to: BlockId) {
    if let Some(slot) = set.iter_mut().find(|b| **b == from) {
        *slot = to;
    }
    let mut seen = Vec::with_capacity(set.len());
    set.retain(|b| {
        if seen.contains(b) {
            false
        } else {
            seen.push(*b);
            true
        }
    });
}
