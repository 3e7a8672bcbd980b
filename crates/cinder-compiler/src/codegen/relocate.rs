//! Relocation
//!
//! Lays out the globals block followed by every function, in generation
//! order, then rewrites symbolic targets to absolute instruction indices:
//! jumps through the owning function's block table, calls through the
//! function table. Built-ins are seeded into the function table with their
//! negative sentinels.

use super::builtins::{self, BUILTINS};
use super::{BytecodeBlock, BytecodeUnit};
use crate::error::{CompileError, CompileResult};
use cinder_bytecode::{Header, Instruction, Program, Target};
use rustc_hash::FxHashMap;

/// Offsets assigned during layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    /// Function name to its `Func` marker; built-ins map to their sentinel
    pub functions: FxHashMap<String, i64>,
    /// Per function, block label to the index of its first instruction
    pub blocks: FxHashMap<String, FxHashMap<String, i64>>,
    /// Per function, the index of its last instruction
    pub function_ends: FxHashMap<String, i64>,
}

impl SymbolTable {
    fn seeded() -> Self {
        let mut table = Self::default();
        for (name, id) in BUILTINS {
            table
                .functions
                .insert((*name).to_string(), builtins::sentinel(*id));
        }
        table
    }
}

/// Lay out `unit`, resolve its targets and fill in the header for `entry`
#[tracing::instrument(level = "debug", skip(unit), fields(functions = unit.functions.len()))]
pub fn relocate(unit: &BytecodeUnit, entry: &str) -> CompileResult<(Program, SymbolTable)> {
    let mut symbols = SymbolTable::seeded();

    let global_section_len = unit.globals.instructions.len() as i64;
    let mut offset = global_section_len;
    for function in &unit.functions {
        symbols.functions.insert(function.name.clone(), offset);
        let table = symbols.blocks.entry(function.name.clone()).or_default();
        for block in &function.blocks {
            table.insert(block.name.clone(), offset);
            offset += block.instructions.len() as i64;
        }
        symbols.function_ends.insert(function.name.clone(), offset - 1);
    }

    let mut instructions = Vec::with_capacity(offset as usize);
    let no_blocks = FxHashMap::default();
    resolve_block(
        &unit.globals,
        crate::lower::GLOBALS_BLOCK,
        &no_blocks,
        &symbols.functions,
        &mut instructions,
    )?;
    for function in &unit.functions {
        let table = symbols.blocks.get(&function.name).unwrap_or(&no_blocks);
        for block in &function.blocks {
            resolve_block(block, &function.name, table, &symbols.functions, &mut instructions)?;
        }
    }

    let (entry_offset, entry_end_offset) = unit
        .functions
        .iter()
        .find(|function| function.name == entry)
        .and_then(|function| {
            Some((
                *symbols.functions.get(&function.name)?,
                *symbols.function_ends.get(&function.name)?,
            ))
        })
        .ok_or_else(|| CompileError::MissingEntry {
            name: entry.to_string(),
        })?;

    tracing::debug!(
        instructions = instructions.len(),
        functions = unit.functions.len(),
        entry_offset,
        entry_end_offset,
        global_section_len,
        "relocated program"
    );
    let header = Header {
        entry_offset,
        entry_end_offset,
        global_section_len,
    };
    Ok((Program::new(header, instructions), symbols))
}

fn resolve_block(
    block: &BytecodeBlock,
    function: &str,
    blocks: &FxHashMap<String, i64>,
    functions: &FxHashMap<String, i64>,
    out: &mut Vec<Instruction>,
) -> CompileResult<()> {
    let jump = |target: &Target| -> CompileResult<Target> {
        match target {
            Target::Label(label) => blocks
                .get(label)
                .map(|offset| Target::Offset(*offset))
                .ok_or_else(|| {
                    CompileError::internal(
                        function,
                        block.name.as_str(),
                        format!("unknown block label {}", label),
                    )
                }),
            Target::Offset(_) => Ok(target.clone()),
        }
    };

    for instruction in &block.instructions {
        let resolved = match instruction {
            Instruction::Jmp { target } => Instruction::Jmp {
                target: jump(target)?,
            },
            Instruction::Jif {
                then_target,
                else_target,
            } => Instruction::Jif {
                then_target: jump(then_target)?,
                else_target: jump(else_target)?,
            },
            Instruction::Call {
                target: Target::Label(callee),
            } => {
                let offset = functions
                    .get(callee)
                    .ok_or_else(|| CompileError::UndefinedFunction {
                        name: callee.clone(),
                    })?;
                Instruction::Call {
                    target: Target::Offset(*offset),
                }
            }
            other => other.clone(),
        };
        out.push(resolved);
    }
    Ok(())
}
