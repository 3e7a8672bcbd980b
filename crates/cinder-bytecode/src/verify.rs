//! Bytecode verification

use crate::instruction::{Instruction, Target, REGISTER_COUNT};
use crate::program::Program;
use crate::Opcode;

/// Bytecode verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// A target was left symbolic
    #[error("Unresolved target `{label}` at offset {offset}")]
    UnresolvedTarget {
        /// Symbolic label
        label: String,
        /// Instruction index
        offset: usize,
    },

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Resolved target
        target: i64,
        /// Instruction index
        offset: usize,
    },

    /// Call target is neither a built-in nor a function prologue
    #[error("Invalid call target {target} at offset {offset}")]
    InvalidCallTarget {
        /// Resolved target
        target: i64,
        /// Instruction index
        offset: usize,
    },

    /// Register index outside the register file
    #[error("Invalid register r{register} at offset {offset}")]
    InvalidRegister {
        /// Register index
        register: u8,
        /// Instruction index
        offset: usize,
    },

    /// Header offsets disagree with the instruction stream
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Verify a relocated program
pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    verify_header(program)?;

    let len = program.instructions.len() as i64;
    for (offset, instruction) in program.instructions.iter().enumerate() {
        for register in instruction.registers() {
            if register >= REGISTER_COUNT {
                return Err(VerifyError::InvalidRegister { register, offset });
            }
        }

        match instruction {
            Instruction::Jmp { target } => check_jump(target, len, offset)?,
            Instruction::Jif {
                then_target,
                else_target,
            } => {
                check_jump(then_target, len, offset)?;
                check_jump(else_target, len, offset)?;
            }
            Instruction::Call { target } => {
                let target = resolved(target, offset)?;
                // negative targets are built-in primitives
                if target >= 0 {
                    let is_prologue = usize::try_from(target)
                        .ok()
                        .and_then(|t| program.instructions.get(t))
                        .is_some_and(|i| i.opcode() == Opcode::Func);
                    if !is_prologue {
                        return Err(VerifyError::InvalidCallTarget { target, offset });
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn verify_header(program: &Program) -> Result<(), VerifyError> {
    let header = &program.header;
    let len = program.instructions.len() as i64;

    if header.global_section_len < 0 || header.global_section_len > len {
        return Err(VerifyError::InvalidHeader(format!(
            "global section length {} exceeds {} instructions",
            header.global_section_len, len
        )));
    }
    if header.entry_offset < header.global_section_len || header.entry_offset >= len {
        return Err(VerifyError::InvalidHeader(format!(
            "entry offset {} outside function area {}..{}",
            header.entry_offset, header.global_section_len, len
        )));
    }
    if header.entry_end_offset < header.entry_offset || header.entry_end_offset >= len {
        return Err(VerifyError::InvalidHeader(format!(
            "entry end offset {} outside {}..{}",
            header.entry_end_offset, header.entry_offset, len
        )));
    }
    let entry = &program.instructions[header.entry_offset as usize];
    if entry.opcode() != Opcode::Func {
        return Err(VerifyError::InvalidHeader(format!(
            "entry offset {} points at {}, not FUNC",
            header.entry_offset,
            entry.opcode()
        )));
    }
    Ok(())
}

fn resolved(target: &Target, offset: usize) -> Result<i64, VerifyError> {
    match target {
        Target::Offset(t) => Ok(*t),
        Target::Label(label) => Err(VerifyError::UnresolvedTarget {
            label: label.clone(),
            offset,
        }),
    }
}

fn check_jump(target: &Target, len: i64, offset: usize) -> Result<(), VerifyError> {
    let target = resolved(target, offset)?;
    if target < 0 || target >= len {
        return Err(VerifyError::InvalidJumpTarget { target, offset });
    }
    Ok(())
}
