//! 32-bit instruction words
//!
//! An instruction word carries the opcode byte in bits 31..24 and its
//! operands in bits 23..0, laid out according to the opcode's
//! [`OperandShape`]. Decoding never fails: an unassigned opcode byte decodes
//! with no operands and is rejected later by the verifier or dispatcher.

use crate::opcode::{Opcode, OperandShape, SHAPES};
use std::fmt;
use thiserror::Error;

/// Errors raised while building instruction words
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The operand layout does not match the opcode's shape
    #[error("{opcode} expects {expected:?} operands, got {actual:?}")]
    ShapeMismatch {
        /// Mnemonic of the offending opcode
        opcode: &'static str,
        /// Shape declared in the opcode table
        expected: OperandShape,
        /// Shape of the supplied operands
        actual: OperandShape,
    },

    /// A jump target does not fit in a 16-bit immediate
    #[error("Jump target {0} does not fit in 16 bits")]
    TargetOutOfRange(usize),

    /// A label was used but never bound
    #[error("Unbound label {0}")]
    UnboundLabel(usize),
}

/// Decoded operand fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operands {
    /// No operands
    None,
    /// One register
    Regs1(u8),
    /// Two registers
    Regs2(u8, u8),
    /// Three registers
    Regs3(u8, u8, u8),
    /// 16-bit immediate
    Imm(u16),
    /// Register and 16-bit immediate
    ImmReg(u8, u16),
}

impl Operands {
    /// Shape described by these operands
    pub fn shape(&self) -> OperandShape {
        match self {
            Operands::None => OperandShape::None,
            Operands::Regs1(..) => OperandShape::OneReg,
            Operands::Regs2(..) => OperandShape::TwoReg,
            Operands::Regs3(..) => OperandShape::ThreeReg,
            Operands::Imm(_) => OperandShape::Imm,
            Operands::ImmReg(..) => OperandShape::ImmReg,
        }
    }

    /// Register operands in encoding order
    pub fn registers(&self) -> Vec<u8> {
        match *self {
            Operands::None | Operands::Imm(_) => vec![],
            Operands::Regs1(a) | Operands::ImmReg(a, _) => vec![a],
            Operands::Regs2(a, b) => vec![a, b],
            Operands::Regs3(a, b, c) => vec![a, b, c],
        }
    }
}

/// One decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Raw opcode byte, which may be unassigned
    pub opcode: u8,
    /// Operand fields
    pub operands: Operands,
}

impl Instruction {
    /// Build an instruction, checking the operands against the opcode's shape
    pub fn new(opcode: Opcode, operands: Operands) -> Result<Self, EncodeError> {
        let expected = opcode.shape();
        if operands.shape() != expected {
            return Err(EncodeError::ShapeMismatch {
                opcode: opcode.name(),
                expected,
                actual: operands.shape(),
            });
        }
        Ok(Self {
            opcode: opcode.to_u8(),
            operands,
        })
    }

    /// Unpack a 32-bit word using the shape table
    pub fn decode(word: u32) -> Self {
        let opcode = (word >> 24) as u8;
        let r1 = (word >> 16) as u8;
        let r2 = (word >> 8) as u8;
        let r3 = word as u8;
        let imm = word as u16;
        let operands = match SHAPES[opcode as usize] {
            OperandShape::None => Operands::None,
            OperandShape::OneReg => Operands::Regs1(r1),
            OperandShape::TwoReg => Operands::Regs2(r1, r2),
            OperandShape::ThreeReg => Operands::Regs3(r1, r2, r3),
            OperandShape::Imm => Operands::Imm(imm),
            OperandShape::ImmReg => Operands::ImmReg(r1, imm),
        };
        Self { opcode, operands }
    }

    /// Pack into a 32-bit word; exact inverse of [`Instruction::decode`]
    pub fn encode(&self) -> u32 {
        let fields = match self.operands {
            Operands::None => 0,
            Operands::Regs1(a) => (a as u32) << 16,
            Operands::Regs2(a, b) => (a as u32) << 16 | (b as u32) << 8,
            Operands::Regs3(a, b, c) => (a as u32) << 16 | (b as u32) << 8 | c as u32,
            Operands::Imm(imm) => imm as u32,
            Operands::ImmReg(a, imm) => (a as u32) << 16 | imm as u32,
        };
        (self.opcode as u32) << 24 | fields
    }

    /// The opcode, if the byte is assigned
    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// First three register fields, zero where absent
    pub fn regs(&self) -> (u8, u8, u8) {
        match self.operands {
            Operands::None | Operands::Imm(_) => (0, 0, 0),
            Operands::Regs1(a) | Operands::ImmReg(a, _) => (a, 0, 0),
            Operands::Regs2(a, b) => (a, b, 0),
            Operands::Regs3(a, b, c) => (a, b, c),
        }
    }

    /// The 16-bit immediate, zero where absent
    pub fn imm(&self) -> u16 {
        match self.operands {
            Operands::Imm(imm) | Operands::ImmReg(_, imm) => imm,
            _ => 0,
        }
    }
}

/// Encode an opcode and operands into a word
pub fn encode(opcode: Opcode, operands: Operands) -> Result<u32, EncodeError> {
    Instruction::new(opcode, operands).map(|i| i.encode())
}

/// Decode a word
pub fn decode(word: u32) -> Instruction {
    Instruction::decode(word)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.op() else {
            return write!(f, "??? {:#04x}", self.opcode);
        };
        f.write_str(op.name())?;
        match self.operands {
            Operands::None => Ok(()),
            Operands::Regs1(a) => write!(f, " r{a}"),
            Operands::Regs2(a, b) => write!(f, " r{a}, r{b}"),
            Operands::Regs3(a, b, c) => write!(f, " r{a}, r{b}, r{c}"),
            Operands::Imm(imm) => write!(f, " {imm}"),
            Operands::ImmReg(a, imm) if op == Opcode::LoadIntConst => {
                write!(f, " r{a}, {}", imm as i16)
            }
            Operands::ImmReg(a, imm) => write!(f, " r{a}, {imm}"),
        }
    }
}
