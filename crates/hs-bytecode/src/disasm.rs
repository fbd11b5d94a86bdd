//! Human-readable listings

use crate::constants::Constant;
use crate::instruction::Instruction;
use crate::module::Module;
use std::fmt::Write;

/// One line per word: `pc: MNEMONIC operands`
pub fn disassemble(code: &[u32]) -> String {
    let mut out = String::new();
    for (pc, &word) in code.iter().enumerate() {
        let _ = writeln!(out, "{pc:04}: {}", Instruction::decode(word));
    }
    out
}

/// Full module listing: constants, functions and annotated code
pub fn disassemble_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; module {}", module.name);

    if !module.constants.is_empty() {
        let _ = writeln!(out, "; constants");
        for (index, constant) in module.constants.iter().enumerate() {
            let value = match constant {
                Constant::Int(v) => v.to_string(),
                Constant::Float(v) => v.to_string(),
                Constant::Str(s) | Constant::Native(s) => format!("{s:?}"),
                Constant::BigInt(v) => v.to_string(),
            };
            let _ = writeln!(out, ";   #{index} {} {value}", constant.kind());
        }
    }

    for (pc, &word) in module.code.iter().enumerate() {
        for func in module.functions.iter().filter(|f| f.entry as usize == pc) {
            let _ = writeln!(out, "{}:  ; params={}", func.name, func.param_count);
        }
        let _ = writeln!(out, "  {pc:04}: {}", Instruction::decode(word));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{encode, Operands};
    use crate::opcode::Opcode;

    #[test]
    fn test_disassemble_lines() {
        let code = vec![
            encode(Opcode::IntAdd, Operands::Regs3(1, 2, 3)).unwrap(),
            encode(Opcode::Jump, Operands::Imm(0)).unwrap(),
            0x0000_0000,
        ];
        let text = disassemble(&code);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0000: INT_ADD r1, r2, r3");
        assert_eq!(lines[1], "0001: JUMP 0");
        assert_eq!(lines[2], "0002: ??? 0x00");
    }

    #[test]
    fn test_module_listing_marks_functions() {
        let mut module = Module::new("demo");
        module.constants.add(Constant::Native("print".to_string()));
        module.code = vec![encode(Opcode::ReturnNull, Operands::None).unwrap()];
        module.add_function("main", 0, 1);

        let text = disassemble_module(&module);
        assert!(text.contains("; module demo"));
        assert!(text.contains(";   #0 native \"print\""));
        assert!(text.contains("main:  ; params=1"));
        assert!(text.contains("0000: RETURN_NULL"));
    }
}
