//! Bytecode program format
//!
//! ```text
//! u8   magic              = 0xC2
//! u8   version            = 0x01
//! i64  entry_offset
//! i64  entry_end_offset
//! i64  global_section_len
//! ...  instructions
//! ```

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError, EncodeError};
use crate::instruction::Instruction;

/// Magic byte opening every program
pub const MAGIC: u8 = 0xC2;

/// Current bytecode version
pub const VERSION: u8 = 0x01;

/// Size of the encoded header in bytes
pub const HEADER_SIZE: usize = 2 + 3 * 8;

/// Bootstrap metadata read by the VM before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Instruction index of the entry function's `Func` marker
    pub entry_offset: i64,
    /// Instruction index of the entry function's last instruction
    pub entry_end_offset: i64,
    /// Number of instructions in the global initializer segment
    pub global_section_len: i64,
}

impl Header {
    /// Encode the header into a writer
    pub fn encode_into(&self, writer: &mut BytecodeWriter) {
        writer.emit_u8(MAGIC);
        writer.emit_u8(VERSION);
        writer.emit_i64(self.entry_offset);
        writer.emit_i64(self.entry_end_offset);
        writer.emit_i64(self.global_section_len);
    }

    /// Decode a header from a reader, validating magic and version
    pub fn decode_from(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let magic = reader.read_u8()?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        Ok(Self {
            entry_offset: reader.read_i64()?,
            entry_end_offset: reader.read_i64()?,
            global_section_len: reader.read_i64()?,
        })
    }

    /// Decode only the header of an encoded program
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::decode_from(&mut BytecodeReader::new(bytes))
    }
}

/// A relocated, flat instruction stream plus its header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Bootstrap metadata
    pub header: Header,
    /// Global initializer segment followed by every function
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Create a program from a header and instructions
    pub fn new(header: Header, instructions: Vec<Instruction>) -> Self {
        Self {
            header,
            instructions,
        }
    }

    /// Encode the program to bytes
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut writer = BytecodeWriter::with_capacity(HEADER_SIZE + self.instructions.len() * 12);
        self.header.encode_into(&mut writer);
        for instruction in &self.instructions {
            writer.emit_instruction(instruction)?;
        }
        Ok(writer.into_bytes())
    }

    /// Decode a program from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = BytecodeReader::new(bytes);
        let header = Header::decode_from(&mut reader)?;
        let mut instructions = Vec::new();
        while reader.has_more() {
            instructions.push(reader.read_instruction()?);
        }
        Ok(Self {
            header,
            instructions,
        })
    }

    /// Instructions of the global initializer segment
    pub fn globals(&self) -> &[Instruction] {
        let len = usize::try_from(self.header.global_section_len)
            .unwrap_or(0)
            .min(self.instructions.len());
        &self.instructions[..len]
    }

    /// Textual listing, one instruction per line prefixed by its index
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{:>5}  {}\n", index, instruction));
        }
        out
    }
}
