//! IR Functions
//!
//! A function owns no storage itself: its blocks live in the [`IrArena`]
//! and the function keeps their ids in layout order.

use super::arena::IrArena;
use super::block::BlockId;
use super::instr::InstId;
use super::var::VarId;

#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    /// Parameter variables, in declaration order
    pub params: Vec<VarId>,
    /// Blocks in layout order; the first one is the entry
    pub blocks: Vec<BlockId>,
}

impl IrFunction {
    pub fn new(name: impl Into<String>, params: Vec<VarId>) -> Self {
        Self {
            name: name.into(),
            params,
            blocks: Vec::new(),
        }
    }

    /// Entry block; `None` only while the function is being built
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// Every instruction, in layout order
    pub fn insts<'a>(&'a self, arena: &'a IrArena) -> impl Iterator<Item = InstId> + 'a {
        self.blocks
            .iter()
            .flat_map(move |block| arena.block(*block).insts.iter().copied())
    }
}
