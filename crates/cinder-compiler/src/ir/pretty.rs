//! Pretty-printing for IR
//!
//! Provides human-readable output for debugging IR structures. Variables are
//! printed by their storage name, so versions show up once SSA is built.

use super::arena::IrArena;
use super::block::BlockId;
use super::function::IrFunction;
use super::instr::{IrInstr, Operand, Place, Rvalue};
use super::IrProgram;
use std::fmt::Write;

/// Trait for pretty-printing IR constructs that live in an arena
pub trait PrettyPrint {
    fn pretty_print(&self, arena: &IrArena) -> String;
}

impl PrettyPrint for IrProgram {
    fn pretty_print(&self, arena: &IrArena) -> String {
        let mut output = String::new();
        writeln!(output, "globals:").unwrap();
        output.push_str(&format_block(arena, self.globals, 2));
        writeln!(output).unwrap();

        for func in &self.functions {
            output.push_str(&func.pretty_print(arena));
            writeln!(output).unwrap();
        }
        output
    }
}

impl PrettyPrint for IrFunction {
    fn pretty_print(&self, arena: &IrArena) -> String {
        let mut output = String::new();
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| arena.var(*p).ssa_name())
            .collect();
        writeln!(output, "fn {}({}) {{", self.name, params.join(", ")).unwrap();
        for block in &self.blocks {
            output.push_str(&format_block(arena, *block, 2));
        }
        writeln!(output, "}}").unwrap();
        output
    }
}

impl PrettyPrint for IrInstr {
    fn pretty_print(&self, arena: &IrArena) -> String {
        match self {
            IrInstr::Assign { dest, src } => {
                format!("{} = {}", format_place(arena, dest), format_rvalue(arena, src))
            }
            IrInstr::Jump(target) => format!("jump {}", arena.block(*target).name),
            IrInstr::Branch {
                cond,
                then_block,
                else_block,
            } => format!(
                "branch {}, {}, {}",
                format_operand(arena, cond),
                arena.block(*then_block).name,
                arena.block(*else_block).name
            ),
            IrInstr::Return(Some(value)) => format!("return {}", format_operand(arena, value)),
            IrInstr::Return(None) => "return".to_string(),
        }
    }
}

fn format_block(arena: &IrArena, id: BlockId, indent: usize) -> String {
    let mut output = String::new();
    let prefix = " ".repeat(indent);
    let block = arena.block(id);

    let preds: Vec<&str> = block
        .preds
        .iter()
        .map(|p| arena.block(*p).name.as_str())
        .collect();
    if preds.is_empty() {
        writeln!(output, "{}{}:", prefix, block.name).unwrap();
    } else {
        writeln!(output, "{}{}: ; preds {}", prefix, block.name, preds.join(", ")).unwrap();
    }

    for phi in &block.phis {
        let args: Vec<String> = phi
            .args
            .iter()
            .map(|(pred, arg)| {
                let value = arg.map_or_else(|| "_".to_string(), |v| arena.var(v).ssa_name());
                format!("[{}: {}]", arena.block(*pred).name, value)
            })
            .collect();
        writeln!(
            output,
            "{}  {} = phi {}",
            prefix,
            arena.var(phi.dest).ssa_name(),
            args.join(" ")
        )
        .unwrap();
    }

    for inst in &block.insts {
        writeln!(output, "{}  {}", prefix, arena.instr(*inst).pretty_print(arena)).unwrap();
    }
    output
}

fn format_place(arena: &IrArena, place: &Place) -> String {
    let mut out = arena.var(place.var).ssa_name();
    for index in &place.index {
        write!(out, "[{}]", format_operand(arena, index)).unwrap();
    }
    out
}

fn format_operand(arena: &IrArena, operand: &Operand) -> String {
    match operand {
        Operand::Const(value) => format!("{:?}", value),
        Operand::Var(place) => format_place(arena, place),
    }
}

fn format_operands(arena: &IrArena, operands: &[Operand]) -> String {
    operands
        .iter()
        .map(|op| format_operand(arena, op))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_rvalue(arena: &IrArena, rvalue: &Rvalue) -> String {
    match rvalue {
        Rvalue::Use(op) => format_operand(arena, op),
        Rvalue::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            format_operand(arena, lhs),
            op,
            format_operand(arena, rhs)
        ),
        Rvalue::Unary { op, operand } => format!("{}{}", op, format_operand(arena, operand)),
        Rvalue::Call { callee, args } => format!("call {}({})", callee, format_operands(arena, args)),
        Rvalue::Array(elements) => format!("[{}]", format_operands(arena, elements)),
    }
}
