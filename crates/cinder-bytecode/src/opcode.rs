//! Bytecode opcodes for the Cinder VM
//!
//! Every instruction starts with a single opcode byte. Operands follow in a
//! fixed order per opcode; see [`crate::encoder`] for the payload layouts.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Arithmetic and bitwise operators on registers (1, 2)
//! - 0x10-0x1F: Comparison and logical operators, result in the state register
//! - 0x20-0x2F: Unary operators
//! - 0x30-0x3F: Register loads
//! - 0x40-0x4F: Named-slot stores
//! - 0x50-0x5F: Functions and calls
//! - 0x60-0x6F: Control flow

use serde::{Deserialize, Serialize};

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ===== Arithmetic & Bitwise (0x00-0x0F) =====
    /// r1 = r1 + r2
    Add = 0x00,
    /// r1 = r1 - r2
    Sub = 0x01,
    /// r1 = r1 * r2
    Mul = 0x02,
    /// r1 = r1 / r2
    Div = 0x03,
    /// r1 = r1 % r2
    Mod = 0x04,
    /// r1 = r1 ** r2
    Exp = 0x05,
    /// r1 = r1 & r2
    Band = 0x06,
    /// r1 = r1 | r2
    Bor = 0x07,
    /// r1 = r1 ^ r2
    Bxor = 0x08,
    /// r1 = r1 << r2
    Shl = 0x09,
    /// r1 = r1 >> r2
    Shr = 0x0A,

    // ===== Comparison & Logical (0x10-0x1F) =====
    /// r0 = r1 && r2
    Land = 0x10,
    /// r0 = r1 || r2
    Lor = 0x11,
    /// r0 = r1 == r2
    Eq = 0x12,
    /// r0 = r1 != r2
    Ne = 0x13,
    /// r0 = r1 < r2
    Lt = 0x14,
    /// r0 = r1 <= r2
    Le = 0x15,
    /// r0 = r1 > r2
    Gt = 0x16,
    /// r0 = r1 >= r2
    Ge = 0x17,

    // ===== Unary (0x20-0x2F) =====
    /// r0 = !r
    Lnot = 0x20,
    /// r = ~r
    Bnot = 0x21,
    /// r = -r
    Neg = 0x22,

    // ===== Loads (0x30-0x3F) =====
    /// Load an integer immediate (operands: reg, i64)
    LoadI = 0x30,
    /// Load a float immediate (operands: reg, f64)
    LoadD = 0x31,
    /// Load a text immediate (operands: reg, text)
    LoadS = 0x32,
    /// Load a named slot (operands: name, index path, reg)
    LoadX = 0x33,
    /// Load an array literal (operands: reg, i64 count, tagged values)
    LoadA = 0x34,
    /// Splice a named slot into an array register (operands: reg, i64 position, name)
    LoadXA = 0x35,

    // ===== Stores (0x40-0x4F) =====
    /// Store an integer immediate (operands: name, i64)
    StoreI = 0x40,
    /// Store a float immediate (operands: name, f64)
    StoreD = 0x41,
    /// Store a text immediate (operands: name, text)
    StoreS = 0x42,
    /// Store a register into a named slot (operands: name, index path, reg)
    StoreX = 0x43,
    /// Store a tagged immediate into a named slot (operands: name, index path, tagged value)
    StoreA = 0x44,

    // ===== Functions (0x50-0x5F) =====
    /// Call (operand: i64 target, negative for built-ins)
    Call = 0x50,
    /// Function prologue (operand: u8 parameter count)
    Func = 0x51,
    /// Parameter slot declaration (operand: name)
    Param = 0x52,
    /// Push an argument (operands: kind byte, payload)
    Arg = 0x53,
    /// Return, value in r1
    Ret = 0x54,

    // ===== Control Flow (0x60-0x6F) =====
    /// Unconditional jump (operand: i64 target)
    Jmp = 0x60,
    /// Jump on the state register (operands: i64 true-target, i64 false-target)
    Jif = 0x61,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Add),
            0x01 => Some(Self::Sub),
            0x02 => Some(Self::Mul),
            0x03 => Some(Self::Div),
            0x04 => Some(Self::Mod),
            0x05 => Some(Self::Exp),
            0x06 => Some(Self::Band),
            0x07 => Some(Self::Bor),
            0x08 => Some(Self::Bxor),
            0x09 => Some(Self::Shl),
            0x0A => Some(Self::Shr),

            0x10 => Some(Self::Land),
            0x11 => Some(Self::Lor),
            0x12 => Some(Self::Eq),
            0x13 => Some(Self::Ne),
            0x14 => Some(Self::Lt),
            0x15 => Some(Self::Le),
            0x16 => Some(Self::Gt),
            0x17 => Some(Self::Ge),

            0x20 => Some(Self::Lnot),
            0x21 => Some(Self::Bnot),
            0x22 => Some(Self::Neg),

            0x30 => Some(Self::LoadI),
            0x31 => Some(Self::LoadD),
            0x32 => Some(Self::LoadS),
            0x33 => Some(Self::LoadX),
            0x34 => Some(Self::LoadA),
            0x35 => Some(Self::LoadXA),

            0x40 => Some(Self::StoreI),
            0x41 => Some(Self::StoreD),
            0x42 => Some(Self::StoreS),
            0x43 => Some(Self::StoreX),
            0x44 => Some(Self::StoreA),

            0x50 => Some(Self::Call),
            0x51 => Some(Self::Func),
            0x52 => Some(Self::Param),
            0x53 => Some(Self::Arg),
            0x54 => Some(Self::Ret),

            0x60 => Some(Self::Jmp),
            0x61 => Some(Self::Jif),

            _ => None,
        }
    }

    /// Convert opcode to byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Exp => "EXP",
            Self::Band => "BAND",
            Self::Bor => "BOR",
            Self::Bxor => "BXOR",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::Land => "LAND",
            Self::Lor => "LOR",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Lnot => "LNOT",
            Self::Bnot => "BNOT",
            Self::Neg => "NEG",
            Self::LoadI => "LOADI",
            Self::LoadD => "LOADD",
            Self::LoadS => "LOADS",
            Self::LoadX => "LOADX",
            Self::LoadA => "LOADA",
            Self::LoadXA => "LOADXA",
            Self::StoreI => "STOREI",
            Self::StoreD => "STORED",
            Self::StoreS => "STORES",
            Self::StoreX => "STOREX",
            Self::StoreA => "STOREA",
            Self::Call => "CALL",
            Self::Func => "FUNC",
            Self::Param => "PARAM",
            Self::Arg => "ARG",
            Self::Ret => "RET",
            Self::Jmp => "JMP",
            Self::Jif => "JIF",
        }
    }

    /// Two-register operator
    pub fn is_binary(self) -> bool {
        matches!(self as u8, 0x00..=0x0A | 0x10..=0x17)
    }

    /// Operator whose result lands in the state register
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Land | Self::Lor | Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    /// Single-register operator
    pub fn is_unary(self) -> bool {
        matches!(self, Self::Lnot | Self::Bnot | Self::Neg)
    }

    /// Check if this opcode transfers control
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jmp | Self::Jif)
    }

    /// Check if this opcode ends a straight-line run
    pub fn is_terminator(self) -> bool {
        self.is_jump() || self == Self::Ret
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=255u8 {
            if let Some(opcode) = Opcode::from_u8(byte) {
                assert_eq!(opcode.to_u8(), byte);
            }
        }
    }

    #[test]
    fn test_unknown_bytes() {
        assert_eq!(Opcode::from_u8(0x0B), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_classification() {
        assert!(Opcode::Add.is_binary());
        assert!(Opcode::Ge.is_binary());
        assert!(!Opcode::Neg.is_binary());
        assert!(Opcode::Lt.is_comparison());
        assert!(!Opcode::Add.is_comparison());
        assert!(Opcode::Bnot.is_unary());
        assert!(Opcode::Jif.is_terminator());
        assert!(Opcode::Ret.is_terminator());
        assert!(!Opcode::Call.is_terminator());
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::LoadXA.name(), "LOADXA");
        assert_eq!(Opcode::StoreX.to_string(), "STOREX");
    }
}
