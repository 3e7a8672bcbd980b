//! Structural properties of the SSA and optimization stages, checked by
//! brute force over a set of programs with branches, loops and switches

mod common;

use cinder_compiler::ir::{BlockId, IrArena, IrFunction, IrInstr, IrProgram, Rvalue, VarId};
use cinder_compiler::optimize::{ConstantFolder, DeadCodeEliminator};
use cinder_compiler::{lower, ssa, CompileContext, Optimizer};
use rustc_hash::{FxHashMap, FxHashSet};

fn build_ssa(tree: &cinder_compiler::Tree) -> IrProgram {
    let mut ctx = CompileContext::new();
    let mut ir = lower::generate(tree, &mut ctx).unwrap();
    ssa::build(&mut ir).unwrap();
    ir
}

/// Whether `to` can be reached from the entry without passing through `avoid`
fn reachable_avoiding(arena: &IrArena, entry: BlockId, to: BlockId, avoid: BlockId) -> bool {
    if entry == avoid {
        return false;
    }
    let mut seen = FxHashSet::default();
    let mut stack = vec![entry];
    while let Some(block) = stack.pop() {
        if block == to {
            return true;
        }
        if !seen.insert(block) {
            continue;
        }
        for &succ in &arena.block(block).succs {
            if succ != avoid {
                stack.push(succ);
            }
        }
    }
    false
}

fn brute_dominates(arena: &IrArena, function: &IrFunction, a: BlockId, b: BlockId) -> bool {
    a == b || !reachable_avoiding(arena, function.blocks[0], b, a)
}

fn frontier_by_definition(arena: &IrArena, function: &IrFunction, x: BlockId) -> Vec<BlockId> {
    let mut frontier: Vec<BlockId> = function
        .blocks
        .iter()
        .copied()
        .filter(|&y| {
            let strictly = x != y && brute_dominates(arena, function, x, y);
            !strictly
                && arena
                    .block(y)
                    .preds
                    .iter()
                    .any(|&pred| brute_dominates(arena, function, x, pred))
        })
        .collect();
    frontier.sort();
    frontier
}

fn iterated_frontier(arena: &IrArena, blocks: &[BlockId]) -> FxHashSet<BlockId> {
    let mut result = FxHashSet::default();
    let mut worklist = blocks.to_vec();
    while let Some(block) = worklist.pop() {
        for &next in &arena.block(block).dom.frontier {
            if result.insert(next) {
                worklist.push(next);
            }
        }
    }
    result
}

#[derive(Debug, Clone, Copy)]
enum DefSite {
    Phi(BlockId),
    Inst(BlockId, usize),
}

fn def_sites(arena: &IrArena, function: &IrFunction) -> FxHashMap<VarId, Vec<DefSite>> {
    let mut sites: FxHashMap<VarId, Vec<DefSite>> = FxHashMap::default();
    for &block in &function.blocks {
        for phi in &arena.block(block).phis {
            sites.entry(phi.dest).or_default().push(DefSite::Phi(block));
        }
        for (pos, inst) in arena.block(block).insts.iter().enumerate() {
            if let Some(var) = arena.instr(*inst).def_var() {
                if !arena.var(var).is_global {
                    sites.entry(var).or_default().push(DefSite::Inst(block, pos));
                }
            }
        }
    }
    sites
}

fn param_names(arena: &IrArena, function: &IrFunction) -> Vec<String> {
    function
        .params
        .iter()
        .map(|p| arena.var(*p).name.clone())
        .collect()
}

fn site_dominates(arena: &IrArena, site: DefSite, block: BlockId, pos: Option<usize>) -> bool {
    match site {
        DefSite::Phi(def_block) => ssa::dominates(arena, def_block, block),
        DefSite::Inst(def_block, def_pos) if def_block == block => match pos {
            Some(pos) => def_pos < pos,
            None => true,
        },
        DefSite::Inst(def_block, _) => ssa::dominates(arena, def_block, block),
    }
}

#[test]
fn test_dominators_match_brute_force() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let ir = build_ssa(&tree);
        for function in &ir.functions {
            let arena = &ir.arena;
            for &a in &function.blocks {
                for &b in &function.blocks {
                    assert_eq!(
                        ssa::dominates(arena, a, b),
                        brute_dominates(arena, function, a, b),
                        "{}::{}: {} dom {}",
                        name,
                        function.name,
                        arena.block(a).name,
                        arena.block(b).name
                    );
                }
            }
            assert_eq!(arena.block(function.blocks[0]).dom.idom, None);
            for &b in &function.blocks[1..] {
                let idom = arena.block(b).dom.idom.unwrap();
                assert_ne!(idom, b);
                // every strict dominator of b also dominates its idom
                for &d in &function.blocks {
                    if d != b && ssa::dominates(arena, d, b) {
                        assert!(ssa::dominates(arena, d, idom), "{}::{}", name, function.name);
                    }
                }
            }
        }
    }
}

#[test]
fn test_frontiers_match_definition() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let ir = build_ssa(&tree);
        for function in &ir.functions {
            for &x in &function.blocks {
                let mut stored = ir.arena.block(x).dom.frontier.clone();
                stored.sort();
                assert_eq!(
                    stored,
                    frontier_by_definition(&ir.arena, function, x),
                    "{}::{} at {}",
                    name,
                    function.name,
                    ir.arena.block(x).name
                );
            }
        }
    }
}

#[test]
fn test_every_variable_has_one_dominating_definition() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let ir = build_ssa(&tree);
        let arena = &ir.arena;
        for function in &ir.functions {
            let sites = def_sites(arena, function);
            for (var, defs) in &sites {
                assert_eq!(defs.len(), 1, "{}::{} {}", name, function.name, arena.var(*var).ssa_name());
            }
            let params = param_names(arena, function);
            let defined_at = |var: VarId| -> Option<DefSite> {
                sites.get(&var).map(|defs| defs[0])
            };

            for &block in &function.blocks {
                for (pos, inst) in arena.block(block).insts.iter().enumerate() {
                    for used in arena.instr(*inst).uses() {
                        let data = arena.var(used);
                        if data.is_global {
                            continue;
                        }
                        match defined_at(used) {
                            Some(site) => assert!(
                                site_dominates(arena, site, block, Some(pos)),
                                "{}::{} use of {} is not dominated by its definition",
                                name,
                                function.name,
                                data.ssa_name()
                            ),
                            None => assert!(params.contains(&data.name), "{}", data.ssa_name()),
                        }
                    }
                }
                for phi in &arena.block(block).phis {
                    let mut preds: Vec<BlockId> = phi.args.iter().map(|(pred, _)| *pred).collect();
                    preds.sort();
                    let mut expected = arena.block(block).preds.clone();
                    expected.sort();
                    assert_eq!(preds, expected, "{}::{}", name, function.name);
                    for (pred, arg) in &phi.args {
                        let Some(arg) = arg else { continue };
                        assert_eq!(arena.var(*arg).name, phi.name);
                        if let Some(site) = defined_at(*arg) {
                            assert!(site_dominates(arena, site, *pred, None));
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_phis_sit_exactly_on_the_iterated_frontier() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let ir = build_ssa(&tree);
        let arena = &ir.arena;
        for function in &ir.functions {
            let entry = function.blocks[0];
            let mut assigned: FxHashMap<String, Vec<BlockId>> = FxHashMap::default();
            for param in param_names(arena, function) {
                assigned.entry(param).or_default().push(entry);
            }
            for &block in &function.blocks {
                for inst in &arena.block(block).insts {
                    let Some(var) = arena.instr(*inst).def_var() else {
                        continue;
                    };
                    let data = arena.var(var);
                    if data.is_global {
                        continue;
                    }
                    let blocks = assigned.entry(data.name.clone()).or_default();
                    if !blocks.contains(&block) {
                        blocks.push(block);
                    }
                }
            }

            for (var_name, blocks) in &assigned {
                let expected = if blocks.len() < 2 {
                    FxHashSet::default()
                } else {
                    iterated_frontier(arena, blocks)
                };
                let placed: FxHashSet<BlockId> = function
                    .blocks
                    .iter()
                    .copied()
                    .filter(|b| arena.block(*b).phis.iter().any(|phi| &phi.name == var_name))
                    .collect();
                assert_eq!(placed, expected, "{}::{} phis for {}", name, function.name, var_name);
            }
        }
    }
}

#[test]
fn test_slot_names_identify_one_variable() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let ir = build_ssa(&tree);
        let arena = &ir.arena;
        for function in &ir.functions {
            let mut vars: Vec<VarId> = function.params.clone();
            for inst in function.insts(arena) {
                vars.extend(arena.instr(inst).uses());
                vars.extend(arena.instr(inst).def_var());
            }
            for &block in &function.blocks {
                for phi in &arena.block(block).phis {
                    vars.push(phi.dest);
                    vars.extend(phi.args.iter().filter_map(|(_, arg)| *arg));
                }
            }

            let mut slots: FxHashMap<String, VarId> = FxHashMap::default();
            for var in vars {
                let slot = arena.var(var).ssa_name();
                let owner = *slots.entry(slot.clone()).or_insert(var);
                assert_eq!(owner, var, "{}::{} slot {} is shared", name, function.name, slot);
            }
        }
    }
}

fn effect_counts(ir: &IrProgram) -> Vec<(String, usize, usize, usize)> {
    ir.functions
        .iter()
        .map(|function| {
            let (mut calls, mut branches, mut returns) = (0, 0, 0);
            for inst in function.insts(&ir.arena) {
                match ir.arena.instr(inst) {
                    IrInstr::Assign {
                        src: Rvalue::Call { .. },
                        ..
                    } => calls += 1,
                    IrInstr::Branch { .. } => branches += 1,
                    IrInstr::Return(_) => returns += 1,
                    _ => {}
                }
            }
            (function.name.clone(), calls, branches, returns)
        })
        .collect()
}

#[test]
fn test_optimized_ir_is_stable_and_keeps_effects() {
    common::init_tracing();
    for (name, tree) in common::all() {
        let mut ctx = CompileContext::new();
        let mut ir = lower::generate(&tree, &mut ctx).unwrap();
        ssa::build(&mut ir).unwrap();
        let before = effect_counts(&ir);

        Optimizer::basic().optimize(&mut ir, &mut ctx).unwrap();
        assert_eq!(effect_counts(&ir), before, "{}", name);

        for function in &ir.functions {
            for &block in &function.blocks {
                assert!(ir.arena.block(block).phis.is_empty(), "{}", name);
                assert!(ir.arena.is_terminated(block), "{}", name);
            }
            let params = param_names(&ir.arena, function);
            for inst in function.insts(&ir.arena) {
                for used in ir.arena.instr(inst).uses() {
                    let data = ir.arena.var(used);
                    assert!(
                        data.is_global || !data.defs.is_empty() || params.contains(&data.name),
                        "{}::{} reads {} which is never written",
                        name,
                        function.name,
                        data.ssa_name()
                    );
                }
            }
        }

        assert_eq!(ConstantFolder::new().fold(&mut ir), 0, "{}", name);
        assert_eq!(DeadCodeEliminator::new().eliminate(&mut ir), 0, "{}", name);
    }
}
