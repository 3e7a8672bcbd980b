//! IR storage
//!
//! Variables, instructions and blocks live in flat vectors owned by one
//! compilation and are referenced by index. The arena keeps def-use chains
//! in sync: every mutation of an instruction goes through [`IrArena`] so the
//! variables it reads and writes are unlinked before and relinked after.

use super::block::{insert_unique, BasicBlock, BlockId};
use super::instr::{Inst, InstId, IrInstr};
use super::var::{IrVar, UseSite, VarId};
use crate::context::CompileContext;
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct IrArena {
    vars: Vec<IrVar>,
    insts: Vec<Inst>,
    blocks: Vec<BasicBlock>,
}

impl IrArena {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Variables =====

    pub fn new_var(&mut self, var: IrVar) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(var);
        id
    }

    pub fn var(&self, id: VarId) -> &IrVar {
        &self.vars[id.index()]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut IrVar {
        &mut self.vars[id.index()]
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    // ===== Blocks =====

    /// Create a block with a fresh `L<n>` label
    pub fn new_block(&mut self, ctx: &mut CompileContext) -> BlockId {
        let name = ctx.next_label();
        self.new_named_block(ctx, name)
    }

    pub fn new_named_block(&mut self, ctx: &mut CompileContext, name: impl Into<String>) -> BlockId {
        let index = ctx.next_block_index();
        debug_assert_eq!(index as usize, self.blocks.len());
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, name));
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        insert_unique(&mut self.block_mut(from).succs, to);
        insert_unique(&mut self.block_mut(to).preds, from);
    }

    pub fn remove_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.retain(|b| *b != to);
        self.block_mut(to).preds.retain(|b| *b != from);
    }

    /// Last instruction of the block, if it transfers control
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.block(block)
            .last()
            .filter(|id| self.instr(*id).is_terminator())
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }

    // ===== Instructions =====

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    pub fn instr(&self, id: InstId) -> &IrInstr {
        &self.insts[id.index()].kind
    }

    fn alloc_inst(&mut self, block: BlockId, kind: IrInstr) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(Inst { kind, block });
        self.link_inst(id);
        id
    }

    /// Append an instruction to the end of a block
    pub fn push_inst(&mut self, block: BlockId, kind: IrInstr) -> InstId {
        let id = self.alloc_inst(block, kind);
        self.block_mut(block).insts.push(id);
        id
    }

    pub fn insert_inst(&mut self, block: BlockId, pos: usize, kind: IrInstr) -> InstId {
        let id = self.alloc_inst(block, kind);
        self.block_mut(block).insts.insert(pos, id);
        id
    }

    /// Insert before the block's terminator, or append when it has none
    pub fn insert_before_terminator(&mut self, block: BlockId, kind: IrInstr) -> InstId {
        let pos = match self.terminator(block) {
            Some(_) => self.block(block).insts.len() - 1,
            None => self.block(block).insts.len(),
        };
        self.insert_inst(block, pos, kind)
    }

    /// Detach an instruction from its block and from every def-use chain
    pub fn remove_inst(&mut self, id: InstId) {
        self.unlink_inst(id);
        let block = self.insts[id.index()].block;
        self.block_mut(block).insts.retain(|i| *i != id);
    }

    /// Mutate an instruction in place, keeping def-use chains in sync
    pub fn update_inst(&mut self, id: InstId, f: impl FnOnce(&mut IrInstr)) {
        self.unlink_inst(id);
        f(&mut self.insts[id.index()].kind);
        self.link_inst(id);
    }

    fn link_inst(&mut self, id: InstId) {
        let kind = &self.insts[id.index()].kind;
        let uses = kind.uses();
        let def = kind.def_var();
        for var in uses {
            let var = &mut self.vars[var.index()];
            if !var.is_global {
                var.uses.push(UseSite::Inst(id));
            }
        }
        if let Some(def) = def {
            let var = &mut self.vars[def.index()];
            if !var.is_global {
                var.defs.push(id);
            }
        }
    }

    fn unlink_inst(&mut self, id: InstId) {
        let kind = &self.insts[id.index()].kind;
        let uses = kind.uses();
        let def = kind.def_var();
        for var in uses {
            self.vars[var.index()].kill_use(UseSite::Inst(id));
        }
        if let Some(def) = def {
            self.vars[def.index()].kill_def(id);
        }
    }

    fn link_phis(&mut self, block: BlockId) {
        let args: Vec<VarId> = self
            .block(block)
            .phis
            .iter()
            .flat_map(|phi| phi.args.iter().filter_map(|(_, arg)| *arg))
            .collect();
        for var in args {
            self.vars[var.index()].uses.push(UseSite::Phi(block));
        }
    }

    /// Recompute def-use chains for every variable mentioned in `blocks`
    pub fn rebuild_def_use(&mut self, blocks: &[BlockId]) {
        let mut touched = FxHashSet::default();
        for &block in blocks {
            for &inst in &self.block(block).insts {
                let kind = self.instr(inst);
                touched.extend(kind.uses());
                touched.extend(kind.def_var());
            }
            for phi in &self.block(block).phis {
                touched.insert(phi.dest);
                touched.extend(phi.args.iter().filter_map(|(_, arg)| *arg));
            }
        }
        for var in touched {
            let var = &mut self.vars[var.index()];
            var.defs.clear();
            var.uses.clear();
        }
        for &block in blocks {
            let insts = self.block(block).insts.clone();
            for inst in insts {
                self.insts[inst.index()].block = block;
                self.link_inst(inst);
            }
            self.link_phis(block);
        }
    }
}
