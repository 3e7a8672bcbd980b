//! Cinder VM Bytecode Definitions
//!
//! This crate provides the scalar value type, the instruction set, the
//! binary program format and a structural verifier for the Cinder virtual
//! machine.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod value;
pub mod verify;

pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError, EncodeError};
pub use instruction::{
    Argument, IndexEntry, Instruction, Target, LHS_REGISTER, REGISTER_COUNT, RHS_REGISTER,
    STATE_REGISTER,
};
pub use opcode::Opcode;
pub use program::{Header, Program, MAGIC, VERSION};
pub use value::{TypeTag, Value, ValueError};
pub use verify::{verify_program, VerifyError};
