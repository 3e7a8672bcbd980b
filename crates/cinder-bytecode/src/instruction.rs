//! Bytecode instructions
//!
//! The VM has a tiny register file: operands of an operator are loaded into
//! registers 1 and 2, comparison and logical results land in the state
//! register 0, and everything else is written back into register 1. Values
//! live in named storage slots between instructions.

use crate::opcode::Opcode;
use crate::value::Value;
use std::fmt;

/// Register holding comparison and logical results, read by `Jif`
pub const STATE_REGISTER: u8 = 0;
/// Left operand and general result register
pub const LHS_REGISTER: u8 = 1;
/// Right operand register, also used to build array literals
pub const RHS_REGISTER: u8 = 2;
/// Size of the register file
pub const REGISTER_COUNT: u8 = 3;

/// One step of an index path
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    /// Static index
    Int(i64),
    /// Index read from a named slot
    Name(String),
}

/// A jump or call destination
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Symbolic block or function name, before relocation
    Label(String),
    /// Absolute instruction index, or a negative built-in id for calls
    Offset(i64),
}

impl Target {
    /// Resolved offset, if relocation already ran
    pub fn offset(&self) -> Option<i64> {
        match self {
            Target::Offset(offset) => Some(*offset),
            Target::Label(_) => None,
        }
    }
}

/// A call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Pass the contents of a named slot
    ByName {
        /// Slot name
        name: String,
        /// Optional index path into the slot
        index: Vec<IndexEntry>,
    },
    /// Pass an embedded literal
    ByValue(Value),
}

/// A single bytecode instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Two-register operator
    Binary {
        /// Operator opcode
        op: Opcode,
        /// Left register
        lhs: u8,
        /// Right register
        rhs: u8,
    },
    /// Single-register operator
    Unary {
        /// Operator opcode
        op: Opcode,
        /// Operand register
        reg: u8,
    },
    /// Load an integer immediate
    LoadI {
        /// Destination register
        reg: u8,
        /// Immediate
        value: i64,
    },
    /// Load a float immediate
    LoadD {
        /// Destination register
        reg: u8,
        /// Immediate
        value: f64,
    },
    /// Load a text immediate
    LoadS {
        /// Destination register
        reg: u8,
        /// Immediate
        value: String,
    },
    /// Load a named slot, optionally indexed
    LoadX {
        /// Slot name
        name: String,
        /// Index path
        index: Vec<IndexEntry>,
        /// Destination register
        reg: u8,
    },
    /// Load an array literal; absent elements are filled by `LoadXA`
    LoadA {
        /// Destination register
        reg: u8,
        /// Literal elements
        elements: Vec<Value>,
    },
    /// Copy a named slot into position `position` of the array in `reg`
    LoadXA {
        /// Array register
        reg: u8,
        /// Element position
        position: i64,
        /// Source slot
        name: String,
    },
    /// Store an integer immediate
    StoreI {
        /// Slot name
        name: String,
        /// Immediate
        value: i64,
    },
    /// Store a float immediate
    StoreD {
        /// Slot name
        name: String,
        /// Immediate
        value: f64,
    },
    /// Store a text immediate
    StoreS {
        /// Slot name
        name: String,
        /// Immediate
        value: String,
    },
    /// Store a register into a named slot, optionally indexed
    StoreX {
        /// Slot name
        name: String,
        /// Index path
        index: Vec<IndexEntry>,
        /// Source register
        reg: u8,
    },
    /// Store a tagged immediate into a named slot, optionally indexed
    StoreA {
        /// Slot name
        name: String,
        /// Index path
        index: Vec<IndexEntry>,
        /// Immediate
        value: Value,
    },
    /// Call marker; arguments follow as `Arg` instructions
    Call {
        /// Function entry or built-in sentinel
        target: Target,
    },
    /// Function prologue
    Func {
        /// Number of `Param` instructions that follow
        params: u8,
    },
    /// Parameter slot declaration
    Param {
        /// Slot name
        name: String,
    },
    /// Argument push
    Arg(Argument),
    /// Return; the value, if any, is in register 1
    Ret,
    /// Unconditional jump
    Jmp {
        /// Destination
        target: Target,
    },
    /// Conditional jump on the state register
    Jif {
        /// Destination when the state register is truthy
        then_target: Target,
        /// Destination otherwise
        else_target: Target,
    },
}

impl Instruction {
    /// Opcode byte this instruction encodes to
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Binary { op, .. } | Instruction::Unary { op, .. } => *op,
            Instruction::LoadI { .. } => Opcode::LoadI,
            Instruction::LoadD { .. } => Opcode::LoadD,
            Instruction::LoadS { .. } => Opcode::LoadS,
            Instruction::LoadX { .. } => Opcode::LoadX,
            Instruction::LoadA { .. } => Opcode::LoadA,
            Instruction::LoadXA { .. } => Opcode::LoadXA,
            Instruction::StoreI { .. } => Opcode::StoreI,
            Instruction::StoreD { .. } => Opcode::StoreD,
            Instruction::StoreS { .. } => Opcode::StoreS,
            Instruction::StoreX { .. } => Opcode::StoreX,
            Instruction::StoreA { .. } => Opcode::StoreA,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Func { .. } => Opcode::Func,
            Instruction::Param { .. } => Opcode::Param,
            Instruction::Arg(_) => Opcode::Arg,
            Instruction::Ret => Opcode::Ret,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jif { .. } => Opcode::Jif,
        }
    }

    /// Registers read or written by this instruction
    pub fn registers(&self) -> Vec<u8> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::Unary { reg, .. }
            | Instruction::LoadI { reg, .. }
            | Instruction::LoadD { reg, .. }
            | Instruction::LoadS { reg, .. }
            | Instruction::LoadX { reg, .. }
            | Instruction::LoadA { reg, .. }
            | Instruction::LoadXA { reg, .. }
            | Instruction::StoreX { reg, .. } => vec![*reg],
            _ => Vec::new(),
        }
    }
}

fn write_index(f: &mut fmt::Formatter<'_>, index: &[IndexEntry]) -> fmt::Result {
    for entry in index {
        match entry {
            IndexEntry::Int(i) => write!(f, "[{}]", i)?,
            IndexEntry::Name(name) => write!(f, "[{}]", name)?,
        }
    }
    Ok(())
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(label) => write!(f, "{}", label),
            Target::Offset(offset) => write!(f, "@{}", offset),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match self {
            Instruction::Binary { lhs, rhs, .. } => write!(f, "{} r{}, r{}", name, lhs, rhs),
            Instruction::Unary { reg, .. } => write!(f, "{} r{}", name, reg),
            Instruction::LoadI { reg, value } => write!(f, "{} r{}, {}", name, reg, value),
            Instruction::LoadD { reg, value } => write!(f, "{} r{}, {:?}", name, reg, value),
            Instruction::LoadS { reg, value } => write!(f, "{} r{}, {:?}", name, reg, value),
            Instruction::LoadX {
                name: slot,
                index,
                reg,
            } => {
                write!(f, "{} r{}, {}", name, reg, slot)?;
                write_index(f, index)
            }
            Instruction::LoadA { reg, elements } => {
                write!(f, "{} r{}, [", name, reg)?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Instruction::LoadXA {
                reg,
                position,
                name: slot,
            } => write!(f, "{} r{}[{}], {}", name, reg, position, slot),
            Instruction::StoreI { name: slot, value } => write!(f, "{} {}, {}", name, slot, value),
            Instruction::StoreD { name: slot, value } => {
                write!(f, "{} {}, {:?}", name, slot, value)
            }
            Instruction::StoreS { name: slot, value } => {
                write!(f, "{} {}, {:?}", name, slot, value)
            }
            Instruction::StoreX {
                name: slot,
                index,
                reg,
            } => {
                write!(f, "{} {}", name, slot)?;
                write_index(f, index)?;
                write!(f, ", r{}", reg)
            }
            Instruction::StoreA {
                name: slot,
                index,
                value,
            } => {
                write!(f, "{} {}", name, slot)?;
                write_index(f, index)?;
                write!(f, ", {}", value)
            }
            Instruction::Call { target } => write!(f, "{} {}", name, target),
            Instruction::Func { params } => write!(f, "{} {}", name, params),
            Instruction::Param { name: slot } => write!(f, "{} {}", name, slot),
            Instruction::Arg(Argument::ByName { name: slot, index }) => {
                write!(f, "{} {}", name, slot)?;
                write_index(f, index)
            }
            Instruction::Arg(Argument::ByValue(value)) => write!(f, "{} {}", name, value),
            Instruction::Ret => write!(f, "{}", name),
            Instruction::Jmp { target } => write!(f, "{} {}", name, target),
            Instruction::Jif {
                then_target,
                else_target,
            } => write!(f, "{} {}, {}", name, then_target, else_target),
        }
    }
}
