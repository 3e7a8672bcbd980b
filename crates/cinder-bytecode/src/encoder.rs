//! Bytecode encoding and decoding utilities
//!
//! All integers are little-endian. Payload layouts per opcode:
//!
//! | opcode            | payload                                              |
//! |-------------------|------------------------------------------------------|
//! | binary operators  | lhs reg, rhs reg                                     |
//! | unary operators   | reg                                                  |
//! | `LOADI/D/S`       | reg, raw i64 / f64 / text                            |
//! | `LOADX`, `STOREX` | name, index path, reg                                |
//! | `LOADA`           | reg, i64 count, tagged values                        |
//! | `LOADXA`          | reg, i64 position, name                              |
//! | `STOREI/D/S`      | name, raw i64 / f64 / text                           |
//! | `STOREA`          | name, index path, tagged value                       |
//! | `CALL`, `JMP`     | i64 target                                           |
//! | `JIF`             | i64 true-target, i64 false-target                    |
//! | `FUNC`            | u8 parameter count                                   |
//! | `PARAM`           | name                                                 |
//! | `ARG`             | 0 + name + index path, or 1 + tagged value           |
//! | `RET`             | (none)                                               |
//!
//! Text is an i64 byte length followed by UTF-8 bytes. An index path is an
//! i64 entry count followed by entries tagged as int or text.

use crate::instruction::{Argument, IndexEntry, Instruction, Target};
use crate::opcode::Opcode;
use crate::value::{TypeTag, Value};
use thiserror::Error;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// Invalid value type tag
    #[error("Invalid type tag {0} at offset {1}")]
    InvalidTypeTag(u8, usize),

    /// Invalid argument kind byte
    #[error("Invalid argument kind {0} at offset {1}")]
    InvalidArgumentKind(u8, usize),

    /// Negative or oversized length prefix
    #[error("Invalid length {0} at offset {1}")]
    InvalidLength(i64, usize),

    /// Invalid magic byte
    #[error("Invalid magic byte: expected {expected:#04x}, got {actual:#04x}")]
    InvalidMagic {
        /// Expected magic
        expected: u8,
        /// Magic found in the buffer
        actual: u8,
    },

    /// Unsupported version byte
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),
}

/// Errors that can occur during bytecode encoding
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A jump or call target was never relocated
    #[error("Unresolved target `{label}` in {opcode} instruction")]
    UnresolvedTarget {
        /// Opcode carrying the target
        opcode: Opcode,
        /// Symbolic label left in place
        label: String,
    },

    /// The opcode does not fit the instruction shape
    #[error("Unsupported opcode {0} for this instruction shape")]
    UnsupportedOpcode(Opcode),

    /// Index paths cannot hold this value
    #[error("Index entries must be integers or names, got {0}")]
    InvalidIndexEntry(&'static str),
}

/// Argument kind byte for slot references
const ARG_BY_NAME: u8 = 0;
/// Argument kind byte for embedded literals
const ARG_BY_VALUE: u8 = 1;

/// Bytecode writer for encoding instructions
///
/// Provides methods for emitting opcodes and their operands into a binary buffer.
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    pub(crate) buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new bytecode writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of bytecode)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 64-bit signed integer (little-endian)
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float (little-endian)
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit length-prefixed text
    pub fn emit_str(&mut self, value: &str) {
        self.emit_i64(value.len() as i64);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Emit a type tag followed by the value's payload
    pub fn emit_value(&mut self, value: &Value) {
        self.emit_u8(value.tag() as u8);
        match value {
            Value::Absent => {}
            Value::Int(v) => self.emit_i64(*v),
            Value::Float(v) => self.emit_f64(*v),
            Value::Text(s) => self.emit_str(s),
        }
    }

    /// Emit an index path
    pub fn emit_index_path(&mut self, index: &[IndexEntry]) {
        self.emit_i64(index.len() as i64);
        for entry in index {
            match entry {
                IndexEntry::Int(i) => {
                    self.emit_u8(TypeTag::Int as u8);
                    self.emit_i64(*i);
                }
                IndexEntry::Name(name) => {
                    self.emit_u8(TypeTag::Text as u8);
                    self.emit_str(name);
                }
            }
        }
    }

    fn emit_target(&mut self, opcode: Opcode, target: &Target) -> Result<(), EncodeError> {
        match target {
            Target::Offset(offset) => {
                self.emit_i64(*offset);
                Ok(())
            }
            Target::Label(label) => Err(EncodeError::UnresolvedTarget {
                opcode,
                label: label.clone(),
            }),
        }
    }

    // ===== Opcode Emission =====

    /// Emit an opcode without operands
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    /// Emit one instruction with its payload
    pub fn emit_instruction(&mut self, instruction: &Instruction) -> Result<(), EncodeError> {
        let opcode = instruction.opcode();
        match instruction {
            Instruction::Binary { op, lhs, rhs } => {
                if !op.is_binary() {
                    return Err(EncodeError::UnsupportedOpcode(*op));
                }
                self.emit_opcode(opcode);
                self.emit_u8(*lhs);
                self.emit_u8(*rhs);
            }
            Instruction::Unary { op, reg } => {
                if !op.is_unary() {
                    return Err(EncodeError::UnsupportedOpcode(*op));
                }
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
            }
            Instruction::LoadI { reg, value } => {
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
                self.emit_i64(*value);
            }
            Instruction::LoadD { reg, value } => {
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
                self.emit_f64(*value);
            }
            Instruction::LoadS { reg, value } => {
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
                self.emit_str(value);
            }
            Instruction::LoadX { name, index, reg } | Instruction::StoreX { name, index, reg } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
                self.emit_index_path(index);
                self.emit_u8(*reg);
            }
            Instruction::LoadA { reg, elements } => {
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
                self.emit_i64(elements.len() as i64);
                for element in elements {
                    self.emit_value(element);
                }
            }
            Instruction::LoadXA {
                reg,
                position,
                name,
            } => {
                self.emit_opcode(opcode);
                self.emit_u8(*reg);
                self.emit_i64(*position);
                self.emit_str(name);
            }
            Instruction::StoreI { name, value } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
                self.emit_i64(*value);
            }
            Instruction::StoreD { name, value } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
                self.emit_f64(*value);
            }
            Instruction::StoreS { name, value } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
                self.emit_str(value);
            }
            Instruction::StoreA { name, index, value } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
                self.emit_index_path(index);
                self.emit_value(value);
            }
            Instruction::Call { target } | Instruction::Jmp { target } => {
                self.emit_opcode(opcode);
                self.emit_target(opcode, target)?;
            }
            Instruction::Jif {
                then_target,
                else_target,
            } => {
                self.emit_opcode(opcode);
                self.emit_target(opcode, then_target)?;
                self.emit_target(opcode, else_target)?;
            }
            Instruction::Func { params } => {
                self.emit_opcode(opcode);
                self.emit_u8(*params);
            }
            Instruction::Param { name } => {
                self.emit_opcode(opcode);
                self.emit_str(name);
            }
            Instruction::Arg(Argument::ByName { name, index }) => {
                self.emit_opcode(opcode);
                self.emit_u8(ARG_BY_NAME);
                self.emit_str(name);
                self.emit_index_path(index);
            }
            Instruction::Arg(Argument::ByValue(value)) => {
                self.emit_opcode(opcode);
                self.emit_u8(ARG_BY_VALUE);
                self.emit_value(value);
            }
            Instruction::Ret => self.emit_opcode(opcode),
        }
        Ok(())
    }
}

/// Bytecode reader for decoding instructions
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new bytecode reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.position + N;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    // ===== Basic Reading =====

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a 64-bit signed integer (little-endian)
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take::<8>()?))
    }

    /// Read a 64-bit float (little-endian)
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    fn read_len(&mut self) -> Result<usize, DecodeError> {
        let start = self.position;
        let len = self.read_i64()?;
        match usize::try_from(len) {
            Ok(n) if n <= self.remaining() => Ok(n),
            _ => Err(DecodeError::InvalidLength(len, start)),
        }
    }

    /// Read length-prefixed text
    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let start = self.position;
        let bytes = &self.buffer[start..start + len];
        self.position += len;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    fn read_tag(&mut self) -> Result<TypeTag, DecodeError> {
        let offset = self.position;
        let byte = self.read_u8()?;
        TypeTag::from_u8(byte).ok_or(DecodeError::InvalidTypeTag(byte, offset))
    }

    /// Read a tagged value
    pub fn read_value(&mut self) -> Result<Value, DecodeError> {
        Ok(match self.read_tag()? {
            TypeTag::Int => Value::Int(self.read_i64()?),
            TypeTag::Float => Value::Float(self.read_f64()?),
            TypeTag::Text => Value::Text(self.read_str()?),
            TypeTag::Absent => Value::Absent,
        })
    }

    /// Read an index path
    pub fn read_index_path(&mut self) -> Result<Vec<IndexEntry>, DecodeError> {
        let start = self.position;
        let count = self.read_i64()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::InvalidLength(count, start))?;
        let mut index = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let offset = self.position;
            match self.read_tag()? {
                TypeTag::Int => index.push(IndexEntry::Int(self.read_i64()?)),
                TypeTag::Text => index.push(IndexEntry::Name(self.read_str()?)),
                other => return Err(DecodeError::InvalidTypeTag(other as u8, offset)),
            }
        }
        Ok(index)
    }

    fn read_target(&mut self) -> Result<Target, DecodeError> {
        Ok(Target::Offset(self.read_i64()?))
    }

    /// Read one instruction
    pub fn read_instruction(&mut self) -> Result<Instruction, DecodeError> {
        let offset = self.position;
        let byte = self.read_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))?;

        if opcode.is_binary() {
            let lhs = self.read_u8()?;
            let rhs = self.read_u8()?;
            return Ok(Instruction::Binary {
                op: opcode,
                lhs,
                rhs,
            });
        }
        if opcode.is_unary() {
            let reg = self.read_u8()?;
            return Ok(Instruction::Unary { op: opcode, reg });
        }

        let instruction = match opcode {
            Opcode::LoadI => Instruction::LoadI {
                reg: self.read_u8()?,
                value: self.read_i64()?,
            },
            Opcode::LoadD => Instruction::LoadD {
                reg: self.read_u8()?,
                value: self.read_f64()?,
            },
            Opcode::LoadS => Instruction::LoadS {
                reg: self.read_u8()?,
                value: self.read_str()?,
            },
            Opcode::LoadX => Instruction::LoadX {
                name: self.read_str()?,
                index: self.read_index_path()?,
                reg: self.read_u8()?,
            },
            Opcode::LoadA => {
                let reg = self.read_u8()?;
                let start = self.position;
                let count = self.read_i64()?;
                let count =
                    usize::try_from(count).map_err(|_| DecodeError::InvalidLength(count, start))?;
                let mut elements = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    elements.push(self.read_value()?);
                }
                Instruction::LoadA { reg, elements }
            }
            Opcode::LoadXA => Instruction::LoadXA {
                reg: self.read_u8()?,
                position: self.read_i64()?,
                name: self.read_str()?,
            },
            Opcode::StoreI => Instruction::StoreI {
                name: self.read_str()?,
                value: self.read_i64()?,
            },
            Opcode::StoreD => Instruction::StoreD {
                name: self.read_str()?,
                value: self.read_f64()?,
            },
            Opcode::StoreS => Instruction::StoreS {
                name: self.read_str()?,
                value: self.read_str()?,
            },
            Opcode::StoreX => Instruction::StoreX {
                name: self.read_str()?,
                index: self.read_index_path()?,
                reg: self.read_u8()?,
            },
            Opcode::StoreA => Instruction::StoreA {
                name: self.read_str()?,
                index: self.read_index_path()?,
                value: self.read_value()?,
            },
            Opcode::Call => Instruction::Call {
                target: self.read_target()?,
            },
            Opcode::Func => Instruction::Func {
                params: self.read_u8()?,
            },
            Opcode::Param => Instruction::Param {
                name: self.read_str()?,
            },
            Opcode::Arg => {
                let kind_offset = self.position;
                match self.read_u8()? {
                    ARG_BY_NAME => Instruction::Arg(Argument::ByName {
                        name: self.read_str()?,
                        index: self.read_index_path()?,
                    }),
                    ARG_BY_VALUE => Instruction::Arg(Argument::ByValue(self.read_value()?)),
                    kind => return Err(DecodeError::InvalidArgumentKind(kind, kind_offset)),
                }
            }
            Opcode::Ret => Instruction::Ret,
            Opcode::Jmp => Instruction::Jmp {
                target: self.read_target()?,
            },
            Opcode::Jif => Instruction::Jif {
                then_target: self.read_target()?,
                else_target: self.read_target()?,
            },
            // operators were handled above
            _ => return Err(DecodeError::InvalidOpcode(byte, offset)),
        };
        Ok(instruction)
    }
}
