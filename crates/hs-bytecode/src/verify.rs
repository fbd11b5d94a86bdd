//! Static bytecode verification
//!
//! The dispatcher checks everything again at run time; verification lets a
//! loader reject a malformed module before any of it executes.

use crate::constants::Constant;
use crate::instruction::Instruction;
use crate::module::Module;
use crate::opcode::Opcode;
use crate::{MAX_ARGS, MAX_REGISTERS};

/// Bytecode verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Unassigned opcode byte
    #[error("Invalid opcode {opcode:#x} at pc {pc}")]
    InvalidOpcode {
        /// Raw opcode byte
        opcode: u8,
        /// Offending instruction
        pc: usize,
    },

    /// Register operand out of range
    #[error("Invalid register r{reg} at pc {pc}")]
    InvalidRegister {
        /// Register number
        reg: u8,
        /// Offending instruction
        pc: usize,
    },

    /// Immediate jump target past the end of the code
    #[error("Invalid jump target {target} at pc {pc}")]
    InvalidJumpTarget {
        /// Decoded jump target
        target: usize,
        /// Offending instruction
        pc: usize,
    },

    /// Constant index out of range
    #[error("Invalid constant reference {index} at pc {pc}")]
    InvalidConstantRef {
        /// Index operand
        index: usize,
        /// Offending instruction
        pc: usize,
    },

    /// Field name operand is not a string constant
    #[error("Constant {index} used as field name at pc {pc} is not a string")]
    InvalidFieldName {
        /// Index operand
        index: usize,
        /// Offending instruction
        pc: usize,
    },

    /// Function index out of range
    #[error("Invalid function reference {index} at pc {pc}")]
    InvalidFunctionRef {
        /// Index operand
        index: usize,
        /// Offending instruction
        pc: usize,
    },

    /// Argument slot beyond the staging buffer
    #[error("Argument index {index} exceeds {MAX_ARGS} slots at pc {pc}")]
    ArgumentIndexOutOfRange {
        /// Index operand
        index: usize,
        /// Offending instruction
        pc: usize,
    },

    /// Module validation error
    #[error("Module validation error: {0}")]
    ModuleValidation(String),
}

/// Verify a module's bytecode
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module.validate().map_err(VerifyError::ModuleValidation)?;

    for (pc, &word) in module.code.iter().enumerate() {
        verify_instruction(module, pc, Instruction::decode(word))?;
    }
    Ok(())
}

fn verify_instruction(module: &Module, pc: usize, ins: Instruction) -> Result<(), VerifyError> {
    let op = ins.op().ok_or(VerifyError::InvalidOpcode {
        opcode: ins.opcode,
        pc,
    })?;

    for reg in ins.operands.registers() {
        if reg as usize >= MAX_REGISTERS {
            return Err(VerifyError::InvalidRegister { reg, pc });
        }
    }

    let imm = ins.imm() as usize;
    if op.has_target_immediate() && imm > module.code.len() {
        return Err(VerifyError::InvalidJumpTarget { target: imm, pc });
    }

    match op {
        Opcode::LoadLocalConst => {
            if module.constants.get(imm).is_none() {
                return Err(VerifyError::InvalidConstantRef { index: imm, pc });
            }
        }
        Opcode::LoadField | Opcode::StoreField => match module.constants.get(imm) {
            None => return Err(VerifyError::InvalidConstantRef { index: imm, pc }),
            Some(Constant::Str(_)) => {}
            Some(_) => return Err(VerifyError::InvalidFieldName { index: imm, pc }),
        },
        Opcode::DeclareFunction => {
            if imm >= module.functions.len() {
                return Err(VerifyError::InvalidFunctionRef { index: imm, pc });
            }
        }
        Opcode::ReserveArgs if imm > MAX_ARGS => {
            return Err(VerifyError::ArgumentIndexOutOfRange { index: imm, pc });
        }
        Opcode::SetArg if imm >= MAX_ARGS => {
            return Err(VerifyError::ArgumentIndexOutOfRange { index: imm, pc });
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{encode, Operands};

    fn module_with(code: Vec<u32>) -> Module {
        let mut module = Module::new("verify");
        module.code = code;
        module
    }

    #[test]
    fn test_valid_module() {
        let module = module_with(vec![
            encode(Opcode::IntAdd, Operands::Regs3(0, 1, 7)).unwrap(),
            encode(Opcode::Jump, Operands::Imm(2)).unwrap(),
        ]);
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn test_rejects_unassigned_opcode() {
        let module = module_with(vec![0x0400_0000]);
        assert_eq!(
            verify_module(&module),
            Err(VerifyError::InvalidOpcode { opcode: 4, pc: 0 })
        );
    }

    #[test]
    fn test_rejects_register_eight() {
        let module = module_with(vec![encode(Opcode::Move, Operands::Regs2(8, 0)).unwrap()]);
        assert_eq!(
            verify_module(&module),
            Err(VerifyError::InvalidRegister { reg: 8, pc: 0 })
        );
    }

    #[test]
    fn test_rejects_jump_past_end() {
        let module = module_with(vec![encode(Opcode::JumpEqZero, Operands::ImmReg(0, 5)).unwrap()]);
        assert_eq!(
            verify_module(&module),
            Err(VerifyError::InvalidJumpTarget { target: 5, pc: 0 })
        );
    }

    #[test]
    fn test_rejects_non_string_field_name() {
        let mut module = module_with(vec![encode(Opcode::LoadField, Operands::ImmReg(0, 0)).unwrap()]);
        module.constants.add(Constant::Int(1));
        assert_eq!(
            verify_module(&module),
            Err(VerifyError::InvalidFieldName { index: 0, pc: 0 })
        );
    }

    #[test]
    fn test_rejects_too_many_args() {
        let module = module_with(vec![encode(Opcode::ReserveArgs, Operands::Imm(4)).unwrap()]);
        assert!(matches!(
            verify_module(&module),
            Err(VerifyError::ArgumentIndexOutOfRange { index: 4, .. })
        ));
    }
}
