//! Intermediate Representation (IR) for Cinder
//!
//! The IR sits between the syntax tree and bytecode generation. It is a
//! three-address code over basic blocks whose storage lives in one
//! [`IrArena`].
//!
//! # Structure
//!
//! - `IrProgram` - The globals block plus every function, in declaration order
//! - `IrFunction` - Parameters and an ordered list of blocks
//! - `BasicBlock` - Instructions, phis, CFG edges and dominance data
//! - `IrInstr` - Assign, Jump, Branch and Return
//! - `IrVar` - A source variable or temporary with def-use chains

pub mod arena;
pub mod block;
pub mod function;
pub mod instr;
pub mod pretty;
pub mod var;

pub use arena::IrArena;
pub use block::{BasicBlock, BlockId, Dominance, Phi};
pub use function::IrFunction;
pub use instr::{BinaryOp, Inst, InstId, IrInstr, Operand, Place, Rvalue, UnaryOp};
pub use pretty::PrettyPrint;
pub use var::{IrVar, UseSite, VarId};

/// A lowered compilation unit
#[derive(Debug)]
pub struct IrProgram {
    pub arena: IrArena,
    /// Block holding every top-level global initializer
    pub globals: BlockId,
    pub functions: Vec<IrFunction>,
}

impl IrProgram {
    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Human-readable dump of the whole program
    pub fn dump(&self) -> String {
        self.pretty_print(&self.arena)
    }
}
