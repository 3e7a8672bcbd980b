//! Peephole cleanups run right after lowering
//!
//! Both rewrites work on the pre-SSA IR of one function (or the globals
//! block) and keep def-use chains exact through the arena.

use crate::ir::{BlockId, InstId, IrArena, IrInstr, Rvalue};

/// Collapse copy chains, then drop dead stores
pub(super) fn simplify(arena: &mut IrArena, blocks: &[BlockId]) {
    let collapsed = collapse_copies(arena, blocks);
    let removed = remove_dead_stores(arena, blocks);
    tracing::trace!(collapsed, removed, "cleaned lowered IR");
}

/// `t = expr; x = t` becomes `x = expr` when `t` is a generated temporary
/// read only by the copy right after its definition
fn collapse_copies(arena: &mut IrArena, blocks: &[BlockId]) -> usize {
    let mut collapsed = 0;
    for &block in blocks {
        let mut pos = 1;
        while pos < arena.block(block).insts.len() {
            let insts = &arena.block(block).insts;
            let (def, copy) = (insts[pos - 1], insts[pos]);
            match collapsible(arena, def, copy) {
                Some(src) => {
                    arena.remove_inst(def);
                    arena.update_inst(copy, |instr| {
                        if let IrInstr::Assign { src: slot, .. } = instr {
                            *slot = src;
                        }
                    });
                    collapsed += 1;
                }
                None => pos += 1,
            }
        }
    }
    collapsed
}

fn collapsible(arena: &IrArena, def: InstId, copy: InstId) -> Option<Rvalue> {
    let IrInstr::Assign { src: Rvalue::Use(operand), .. } = arena.instr(copy) else {
        return None;
    };
    let temp = operand.as_plain_var()?;
    let var = arena.var(temp);
    if !var.is_generated || var.uses.len() != 1 || var.def() != Some(def) {
        return None;
    }
    match arena.instr(def) {
        IrInstr::Assign { src, .. } => Some(src.clone()),
        _ => None,
    }
}

/// Remove assignments to variables nobody reads, last first, until nothing
/// changes. Indexed stores, globals and calls are kept.
fn remove_dead_stores(arena: &mut IrArena, blocks: &[BlockId]) -> usize {
    let mut removed = 0;
    loop {
        let mut changed = false;
        for &block in blocks.iter().rev() {
            let insts = arena.block(block).insts.clone();
            for inst in insts.into_iter().rev() {
                if is_dead_store(arena, inst) {
                    arena.remove_inst(inst);
                    removed += 1;
                    changed = true;
                }
            }
        }
        if !changed {
            return removed;
        }
    }
}

fn is_dead_store(arena: &IrArena, inst: InstId) -> bool {
    let instr = arena.instr(inst);
    if instr.has_side_effects() {
        return false;
    }
    match instr.def_var() {
        Some(var) => {
            let var = arena.var(var);
            !var.is_global && !var.is_used()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileContext;
    use crate::ir::{BinaryOp, IrVar, Operand, Place};
    use cinder_bytecode::Value;

    #[test]
    fn test_collapse_requires_adjacency() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        let bb = arena.new_block(&mut ctx);
        let x = arena.new_var(IrVar::new("x", false, false));
        let t = arena.new_var(IrVar::new("%t0", true, false));

        // %t0 = x; x = x + 1; y = %t0 must keep %t0
        arena.push_inst(bb, IrInstr::copy(t, Operand::var(x)));
        arena.push_inst(
            bb,
            IrInstr::assign(
                x,
                Rvalue::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::var(x),
                    rhs: Operand::Const(Value::Int(1)),
                },
            ),
        );
        let y = arena.new_var(IrVar::new("y", false, false));
        arena.push_inst(bb, IrInstr::copy(y, Operand::var(t)));
        arena.push_inst(bb, IrInstr::Return(Some(Operand::var(y))));

        assert_eq!(collapse_copies(&mut arena, &[bb]), 0);
        assert_eq!(arena.block(bb).insts.len(), 4);
    }

    #[test]
    fn test_collapse_adjacent_copy() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        let bb = arena.new_block(&mut ctx);
        let a = arena.new_var(IrVar::new("a", false, false));
        let t = arena.new_var(IrVar::new("%t0", true, false));
        let sum = Rvalue::Binary {
            op: BinaryOp::Mul,
            lhs: Operand::Const(Value::Int(2)),
            rhs: Operand::Const(Value::Int(3)),
        };
        arena.push_inst(bb, IrInstr::assign(t, sum.clone()));
        let copy = arena.push_inst(bb, IrInstr::copy(a, Operand::var(t)));
        arena.push_inst(bb, IrInstr::Return(Some(Operand::var(a))));

        assert_eq!(collapse_copies(&mut arena, &[bb]), 1);
        assert_eq!(arena.block(bb).insts.len(), 2);
        assert_eq!(arena.instr(copy), &IrInstr::assign(a, sum));
        assert!(arena.var(t).defs.is_empty());
    }

    #[test]
    fn test_dead_stores_cascade() {
        let mut ctx = CompileContext::new();
        let mut arena = IrArena::new();
        let bb = arena.new_block(&mut ctx);
        let a = arena.new_var(IrVar::new("a", false, false));
        let b = arena.new_var(IrVar::new("b", false, false));
        let arr = arena.new_var(IrVar::new("arr", false, false));
        let g = arena.new_var(IrVar::new("g", false, true));

        arena.push_inst(bb, IrInstr::copy(a, Operand::Const(Value::Int(1))));
        arena.push_inst(bb, IrInstr::copy(b, Operand::var(a)));
        arena.push_inst(bb, IrInstr::copy(g, Operand::Const(Value::Int(2))));
        arena.push_inst(bb, IrInstr::copy(arr, Operand::Const(Value::Int(0))));
        arena.push_inst(
            bb,
            IrInstr::Assign {
                dest: Place::indexed(arr, vec![Operand::Const(Value::Int(0))]),
                src: Rvalue::Use(Operand::Const(Value::Int(5))),
            },
        );

        // b is dead, which makes a dead; the global and the indexed store stay
        assert_eq!(remove_dead_stores(&mut arena, &[bb]), 2);
        assert_eq!(arena.block(bb).insts.len(), 3);
    }
}
