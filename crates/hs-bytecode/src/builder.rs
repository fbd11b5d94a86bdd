//! Instruction stream builder with forward-referencing labels

use crate::instruction::{EncodeError, Instruction, Operands};
use crate::opcode::Opcode;

/// Opaque handle for a code position that may be bound later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Builds a sequence of instruction words
///
/// Jumps to labels that are not yet bound are recorded and patched when
/// [`CodeWriter::finish`] runs.
#[derive(Debug, Default)]
pub struct CodeWriter {
    code: Vec<u32>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl CodeWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next instruction
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Words emitted so far
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current position
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len());
    }

    /// Emit one instruction and return its index
    pub fn emit(&mut self, opcode: Opcode, operands: Operands) -> Result<usize, EncodeError> {
        let word = Instruction::new(opcode, operands)?.encode();
        self.code.push(word);
        Ok(self.code.len() - 1)
    }

    /// Emit a raw word without shape checks
    pub fn emit_raw(&mut self, word: u32) -> usize {
        self.code.push(word);
        self.code.len() - 1
    }

    // ===== Shape helpers =====

    /// Emit an instruction with no operands
    pub fn op(&mut self, opcode: Opcode) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::None)
    }

    /// Emit a one-register instruction
    pub fn op_r(&mut self, opcode: Opcode, a: u8) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::Regs1(a))
    }

    /// Emit a two-register instruction
    pub fn op_rr(&mut self, opcode: Opcode, a: u8, b: u8) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::Regs2(a, b))
    }

    /// Emit a three-register instruction
    pub fn op_rrr(&mut self, opcode: Opcode, a: u8, b: u8, c: u8) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::Regs3(a, b, c))
    }

    /// Emit an immediate instruction
    pub fn op_i(&mut self, opcode: Opcode, imm: u16) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::Imm(imm))
    }

    /// Emit a register + immediate instruction
    pub fn op_ri(&mut self, opcode: Opcode, a: u8, imm: u16) -> Result<usize, EncodeError> {
        self.emit(opcode, Operands::ImmReg(a, imm))
    }

    /// `LOAD_INT_CONST r, value`
    pub fn load_int(&mut self, reg: u8, value: i16) -> Result<usize, EncodeError> {
        self.op_ri(Opcode::LoadIntConst, reg, value as u16)
    }

    /// Emit a jump whose immediate target is `label`
    ///
    /// `reg` is required for the register + immediate shapes
    /// (`JUMP_*_ZERO`, `ADD_CATCH`) and ignored for `JUMP`/`NEW_TRY_CONTEXT`.
    pub fn op_to_label(
        &mut self,
        opcode: Opcode,
        reg: u8,
        label: Label,
    ) -> Result<usize, EncodeError> {
        let operands = match opcode.shape() {
            crate::OperandShape::ImmReg => Operands::ImmReg(reg, 0),
            _ => Operands::Imm(0),
        };
        let at = self.emit(opcode, operands)?;
        self.fixups.push((at, label));
        Ok(at)
    }

    /// Resolve label references and return the finished code
    pub fn finish(mut self) -> Result<Vec<u32>, EncodeError> {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].ok_or(EncodeError::UnboundLabel(label.0))?;
            let target = u16::try_from(target).map_err(|_| EncodeError::TargetOutOfRange(target))?;
            self.code[at] = (self.code[at] & 0xFFFF_0000) | target as u32;
        }
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::decode;

    #[test]
    fn test_forward_label() {
        let mut w = CodeWriter::new();
        let end = w.new_label();
        w.op_to_label(Opcode::JumpEqZero, 2, end).unwrap();
        w.op(Opcode::Nop).unwrap();
        w.bind(end);
        w.op(Opcode::ReturnNull).unwrap();

        let code = w.finish().unwrap();
        assert_eq!(decode(code[0]).operands, Operands::ImmReg(2, 2));
    }

    #[test]
    fn test_unbound_label() {
        let mut w = CodeWriter::new();
        let nowhere = w.new_label();
        w.op_to_label(Opcode::Jump, 0, nowhere).unwrap();
        assert_eq!(w.finish().unwrap_err(), EncodeError::UnboundLabel(0));
    }

    #[test]
    fn test_load_int_sign() {
        let mut w = CodeWriter::new();
        w.load_int(1, -2).unwrap();
        assert_eq!(decode(w.code()[0]).imm() as i16, -2);
    }
}
