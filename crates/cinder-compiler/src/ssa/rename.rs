//! SSA renaming
//!
//! A preorder walk of the dominator tree keeps, per variable, a stack of
//! the versions currently in scope. Uses take the top of their stack; every
//! definition (phi or assignment) pushes a fresh version, popped again when
//! the walk leaves the defining block's subtree. Globals are never renamed.

use crate::error::{CompileError, CompileResult};
use crate::ir::{BlockId, IrArena, IrFunction, IrVar, UseSite, VarId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Version counters and scope stacks, keyed by the pre-SSA variable so two
/// variables that happen to share a name never share versions
struct Renamer {
    counters: FxHashMap<VarId, u32>,
    stacks: FxHashMap<VarId, Vec<VarId>>,
    /// Each fresh version mapped back to the variable it renames
    origin: FxHashMap<VarId, VarId>,
}

enum Visit {
    Enter(BlockId),
    Exit(Vec<VarId>),
}

impl Renamer {
    fn base(&self, var: VarId) -> VarId {
        self.origin.get(&var).copied().unwrap_or(var)
    }

    fn top(&self, base: VarId) -> Option<VarId> {
        self.stacks.get(&base).and_then(|stack| stack.last().copied())
    }

    /// New version of `base`, pushed on its stack
    fn fresh(&mut self, arena: &mut IrArena, base: VarId) -> VarId {
        let (name, is_generated) = {
            let var = arena.var(base);
            (var.name.clone(), var.is_generated)
        };
        let counter = self.counters.entry(base).or_insert(0);
        let version = *counter;
        *counter += 1;

        let mut var = IrVar::new(name, is_generated, false);
        var.version = Some(version);
        let id = arena.new_var(var);
        self.stacks.entry(base).or_default().push(id);
        self.origin.insert(id, base);
        id
    }
}

/// Dominator-tree children of every block, in ascending block order
fn dominator_children(arena: &IrArena, function: &IrFunction) -> FxHashMap<BlockId, Vec<BlockId>> {
    let mut children: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
    for &block in &function.blocks {
        if let Some(idom) = arena.block(block).dom.idom {
            children.entry(idom).or_default().push(block);
        }
    }
    for list in children.values_mut() {
        list.sort();
    }
    children
}

pub(crate) fn rename(arena: &mut IrArena, function: &IrFunction) -> CompileResult<()> {
    let Some(entry) = function.entry() else {
        return Ok(());
    };
    let mut renamer = Renamer {
        counters: FxHashMap::default(),
        stacks: FxHashMap::default(),
        origin: FxHashMap::default(),
    };

    for &param in &function.params {
        arena.var_mut(param).version = Some(0);
        renamer.counters.insert(param, 1);
        renamer.stacks.entry(param).or_default().push(param);
    }

    let children = dominator_children(arena, function);
    let mut walk = vec![Visit::Enter(entry)];
    while let Some(visit) = walk.pop() {
        match visit {
            Visit::Enter(block) => {
                let pushed = rename_block(arena, function, &mut renamer, block)?;
                walk.push(Visit::Exit(pushed));
                if let Some(kids) = children.get(&block) {
                    for &child in kids.iter().rev() {
                        walk.push(Visit::Enter(child));
                    }
                }
            }
            Visit::Exit(pushed) => {
                for base in pushed {
                    if let Some(stack) = renamer.stacks.get_mut(&base) {
                        stack.pop();
                    }
                }
            }
        }
    }

    arena.rebuild_def_use(&function.blocks);
    check_live_phis(arena, function)
}

/// Rename definitions and uses in one block and fill its successors' phi
/// arguments. Returns the variables whose stacks grew.
fn rename_block(
    arena: &mut IrArena,
    function: &IrFunction,
    renamer: &mut Renamer,
    block: BlockId,
) -> CompileResult<Vec<VarId>> {
    let mut pushed = Vec::new();

    for index in 0..arena.block(block).phis.len() {
        let base = arena.block(block).phis[index].dest;
        let fresh = renamer.fresh(arena, base);
        pushed.push(base);
        arena.block_mut(block).phis[index].dest = fresh;
    }

    for inst in arena.block(block).insts.clone() {
        let mut instr = arena.instr(inst).clone();

        let mut missing = None;
        instr.visit_uses_mut(|var| {
            let current = arena.var(*var);
            if current.is_global {
                return;
            }
            match renamer.top(*var) {
                Some(top) => *var = top,
                None => {
                    if missing.is_none() {
                        missing = Some((current.name.clone(), current.is_generated));
                    }
                }
            }
        });
        if let Some((name, is_generated)) = missing {
            return Err(if is_generated {
                CompileError::internal(
                    function.name.as_str(),
                    arena.block(block).name.as_str(),
                    format!("temporary {} read before its definition", name),
                )
            } else {
                CompileError::UninitializedVariable { name }
            });
        }

        if let Some(def) = instr.def_var() {
            if !arena.var(def).is_global {
                let fresh = renamer.fresh(arena, def);
                pushed.push(def);
                if let Some(slot) = instr.def_var_mut() {
                    *slot = fresh;
                }
            }
        }

        arena.update_inst(inst, |slot| *slot = instr);
    }

    for succ in arena.block(block).succs.clone() {
        for index in 0..arena.block(succ).phis.len() {
            let base = renamer.base(arena.block(succ).phis[index].dest);
            let current = renamer.top(base);
            for arg in arena.block_mut(succ).phis[index].args.iter_mut() {
                if arg.0 == block {
                    arg.1 = current;
                }
            }
        }
    }

    Ok(pushed)
}

/// Reject a phi missing an incoming value when its result can reach a real
/// read. Phis feeding only other unread phis may stay incomplete; phi
/// elimination emits no copy for their empty arguments.
fn check_live_phis(arena: &IrArena, function: &IrFunction) -> CompileResult<()> {
    let mut owner: FxHashMap<VarId, (BlockId, usize)> = FxHashMap::default();
    for &block in &function.blocks {
        for (index, phi) in arena.block(block).phis.iter().enumerate() {
            owner.insert(phi.dest, (block, index));
        }
    }

    let mut live: FxHashSet<VarId> = FxHashSet::default();
    let mut worklist: Vec<VarId> = owner
        .keys()
        .copied()
        .filter(|dest| {
            arena
                .var(*dest)
                .uses
                .iter()
                .any(|site| matches!(site, UseSite::Inst(_)))
        })
        .collect();
    while let Some(dest) = worklist.pop() {
        if !live.insert(dest) {
            continue;
        }
        let (block, index) = owner[&dest];
        for (_, arg) in &arena.block(block).phis[index].args {
            if let Some(arg) = arg {
                if owner.contains_key(arg) && !live.contains(arg) {
                    worklist.push(*arg);
                }
            }
        }
    }

    for &block in &function.blocks {
        for phi in &arena.block(block).phis {
            if !live.contains(&phi.dest) || phi.args.iter().all(|(_, arg)| arg.is_some()) {
                continue;
            }
            let var = arena.var(phi.dest);
            return Err(if var.is_generated {
                CompileError::internal(
                    function.name.as_str(),
                    arena.block(block).name.as_str(),
                    format!("temporary {} merged without a definition on every path", var.name),
                )
            } else {
                CompileError::UninitializedVariable {
                    name: var.name.clone(),
                }
            });
        }
    }
    Ok(())
}
