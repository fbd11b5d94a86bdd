//! Text assembler
//!
//! # Syntax
//!
//! ```text
//! # comment
//! .const answer int 42          # named constant-pool entries
//! .const greeting str "hi"
//! .const huge big 123456789012345678901234567890
//! .const add native add         # host function resolved at load time
//! .func main start 0            # function table entry: name, label, params
//! start:
//!     LOAD_INT_CONST r0, -1
//!     JUMP_EQ_ZERO r0, done
//!     LOAD_LOCAL_CONST r1, answer
//! done:
//!     RETURN r1
//! ```
//!
//! Registers are `r0`..`r7`. Immediates are decimal or `0x` hex integers, or
//! the name of a label, constant or function. Commas between operands are
//! optional.

use crate::constants::Constant;
use crate::instruction::{EncodeError, Instruction, Operands};
use crate::module::Module;
use crate::opcode::{Opcode, OperandShape};
use crate::MAX_REGISTERS;
use std::collections::HashMap;
use thiserror::Error;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

/// Assembly errors, each tagged with a 1-based source line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    /// Unknown instruction mnemonic
    #[error("line {line}: unknown mnemonic {name}")]
    UnknownMnemonic {
        /// Source line
        line: usize,
        /// Symbol or mnemonic as written
        name: String,
    },

    /// Wrong number of operands for the opcode's shape
    #[error("line {line}: {mnemonic} expects {expected} operands, got {actual}")]
    OperandCount {
        /// Source line
        line: usize,
        /// Mnemonic of the opcode
        mnemonic: &'static str,
        /// Operands the shape requires
        expected: usize,
        /// Operands supplied
        actual: usize,
    },

    /// Malformed or out-of-range register operand
    #[error("line {line}: invalid register {token}")]
    InvalidRegister {
        /// Source line
        line: usize,
        /// Operand as written
        token: String,
    },

    /// Malformed or out-of-range immediate operand
    #[error("line {line}: invalid immediate {token}")]
    InvalidImmediate {
        /// Source line
        line: usize,
        /// Operand as written
        token: String,
    },

    /// Reference to an undefined label, constant or function
    #[error("line {line}: undefined symbol {name}")]
    UndefinedSymbol {
        /// Source line
        line: usize,
        /// Symbol or mnemonic as written
        name: String,
    },

    /// Symbol defined twice
    #[error("line {line}: duplicate symbol {name}")]
    DuplicateSymbol {
        /// Source line
        line: usize,
        /// Symbol or mnemonic as written
        name: String,
    },

    /// Malformed directive
    #[error("line {line}: {message}")]
    InvalidDirective {
        /// Source line
        line: usize,
        /// What is wrong with the directive
        message: String,
    },

    /// Instruction encoding failed
    #[error("line {line}: {source}")]
    Encode {
        /// Source line
        line: usize,
        /// Underlying encoding error
        source: EncodeError,
    },
}

struct PendingInstr {
    line: usize,
    opcode: Opcode,
    operands: Vec<String>,
}

struct PendingFunc {
    line: usize,
    index: usize,
    label: String,
}

/// Two-pass assembler state: symbols are collected first, operands resolved
/// once every label position is known.
struct Assembler {
    module: Module,
    symbols: HashMap<String, u16>,
    instrs: Vec<PendingInstr>,
    funcs: Vec<PendingFunc>,
}

/// Assemble `source` into a module named `name`
pub fn assemble(name: &str, source: &str) -> Result<Module, AsmError> {
    let mut asm = Assembler {
        module: Module::new(name),
        symbols: HashMap::new(),
        instrs: Vec::new(),
        funcs: Vec::new(),
    };
    for (index, raw) in source.lines().enumerate() {
        asm.parse_line(index + 1, raw)?;
    }
    asm.finish()
}

/// Strip a trailing comment, ignoring `#` inside string literals
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if in_string => escaped = !escaped,
            '"' if !escaped => in_string = !in_string,
            COMMENT_CHAR if !in_string => return &line[..i],
            _ => escaped = false,
        }
    }
    line
}

/// Split off the first whitespace-delimited word; the remainder is trimmed
fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], s[end..].trim()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn parse_string_literal(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

impl Assembler {
    fn define(&mut self, line: usize, name: &str, value: usize) -> Result<(), AsmError> {
        let value = u16::try_from(value).map_err(|_| AsmError::InvalidDirective {
            line,
            message: format!("symbol {name} value {value} does not fit in 16 bits"),
        })?;
        if self.symbols.insert(name.to_string(), value).is_some() {
            return Err(AsmError::DuplicateSymbol {
                line,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn parse_line(&mut self, line: usize, raw: &str) -> Result<(), AsmError> {
        let mut text = strip_comment(raw).trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some(directive) = text.strip_prefix('.') {
            return self.parse_directive(line, directive);
        }

        if let Some((label, rest)) = text.split_once(LABEL_SUFFIX) {
            let label = label.trim();
            if is_identifier(label) {
                self.define(line, label, self.instrs.len())?;
                text = rest.trim();
                if text.is_empty() {
                    return Ok(());
                }
            }
        }

        let (mnemonic, rest) = text
            .split_once(char::is_whitespace)
            .unwrap_or((text, ""));
        let opcode = Opcode::from_name(&mnemonic.to_ascii_uppercase()).ok_or_else(|| {
            AsmError::UnknownMnemonic {
                line,
                name: mnemonic.to_string(),
            }
        })?;
        let operands = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        self.instrs.push(PendingInstr {
            line,
            opcode,
            operands,
        });
        Ok(())
    }

    fn parse_directive(&mut self, line: usize, directive: &str) -> Result<(), AsmError> {
        let bad = |message: &str| AsmError::InvalidDirective {
            line,
            message: message.to_string(),
        };
        let (keyword, rest) = next_word(directive).ok_or_else(|| bad("empty directive"))?;
        match keyword {
            "const" => {
                let (name, rest) = next_word(rest).ok_or_else(|| bad("missing constant name"))?;
                let (kind, value) = next_word(rest).ok_or_else(|| bad("missing constant kind"))?;
                if value.is_empty() {
                    return Err(bad("missing constant value"));
                }
                let constant = match kind {
                    "int" => Constant::Int(
                        parse_int(value)
                            .and_then(|v| i32::try_from(v).ok())
                            .ok_or_else(|| bad("invalid int constant"))?,
                    ),
                    "float" => Constant::Float(
                        value.parse().map_err(|_| bad("invalid float constant"))?,
                    ),
                    "str" => Constant::Str(
                        parse_string_literal(value).ok_or_else(|| bad("invalid string literal"))?,
                    ),
                    "big" => Constant::BigInt(
                        value.parse().map_err(|_| bad("invalid big integer constant"))?,
                    ),
                    "native" => Constant::Native(value.to_string()),
                    other => return Err(bad(&format!("unknown constant kind {other}"))),
                };
                let index = self.module.constants.add(constant);
                self.define(line, name, index)
            }
            "func" => {
                let (name, rest) = next_word(rest).ok_or_else(|| bad("missing function name"))?;
                let (label, rest) = next_word(rest).ok_or_else(|| bad("missing entry label"))?;
                let params = if rest.is_empty() {
                    0
                } else {
                    rest.parse::<u8>().map_err(|_| bad("invalid param count"))?
                };
                let index = self.module.add_function(name, 0, params);
                self.define(line, name, index)?;
                self.funcs.push(PendingFunc {
                    line,
                    index,
                    label: label.to_string(),
                });
                Ok(())
            }
            other => Err(bad(&format!("unknown directive .{other}"))),
        }
    }

    fn register(&self, line: usize, token: &str) -> Result<u8, AsmError> {
        token
            .strip_prefix('r')
            .or_else(|| token.strip_prefix('R'))
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| (n as usize) < MAX_REGISTERS)
            .ok_or_else(|| AsmError::InvalidRegister {
                line,
                token: token.to_string(),
            })
    }

    /// Resolve an immediate; negative literals only for `LOAD_INT_CONST`
    fn immediate(&self, line: usize, opcode: Opcode, token: &str) -> Result<u16, AsmError> {
        let signed = opcode == Opcode::LoadIntConst;
        if let Some(value) = parse_int(token) {
            return match value {
                -32768..=-1 if signed => Ok(value as i16 as u16),
                0..=65535 => Ok(value as u16),
                _ => Err(AsmError::InvalidImmediate {
                    line,
                    token: token.to_string(),
                }),
            };
        }
        if !is_identifier(token) {
            return Err(AsmError::InvalidImmediate {
                line,
                token: token.to_string(),
            });
        }
        self.symbols
            .get(token)
            .copied()
            .ok_or_else(|| AsmError::UndefinedSymbol {
                line,
                name: token.to_string(),
            })
    }

    fn resolve(&self, instr: &PendingInstr) -> Result<u32, AsmError> {
        let line = instr.line;
        let shape = instr.opcode.shape();
        let expected = shape.register_count() + usize::from(shape.has_immediate());
        if instr.operands.len() != expected {
            return Err(AsmError::OperandCount {
                line,
                mnemonic: instr.opcode.name(),
                expected,
                actual: instr.operands.len(),
            });
        }

        let ops = &instr.operands;
        let operands = match shape {
            OperandShape::None => Operands::None,
            OperandShape::OneReg => Operands::Regs1(self.register(line, &ops[0])?),
            OperandShape::TwoReg => {
                Operands::Regs2(self.register(line, &ops[0])?, self.register(line, &ops[1])?)
            }
            OperandShape::ThreeReg => Operands::Regs3(
                self.register(line, &ops[0])?,
                self.register(line, &ops[1])?,
                self.register(line, &ops[2])?,
            ),
            OperandShape::Imm => Operands::Imm(self.immediate(line, instr.opcode, &ops[0])?),
            OperandShape::ImmReg => {
                let reg = self.register(line, &ops[0])?;
                Operands::ImmReg(reg, self.immediate(line, instr.opcode, &ops[1])?)
            }
        };
        Instruction::new(instr.opcode, operands)
            .map(|i| i.encode())
            .map_err(|source| AsmError::Encode { line, source })
    }

    fn finish(mut self) -> Result<Module, AsmError> {
        for func in &self.funcs {
            let entry = self
                .symbols
                .get(&func.label)
                .copied()
                .ok_or_else(|| AsmError::UndefinedSymbol {
                    line: func.line,
                    name: func.label.clone(),
                })?;
            self.module.functions[func.index].entry = entry as u32;
        }

        let mut code = Vec::with_capacity(self.instrs.len());
        for instr in &self.instrs {
            code.push(self.resolve(instr)?);
        }
        self.module.code = code;
        Ok(self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::decode;

    #[test]
    fn test_assemble_program() {
        let source = r#"
            # adds two numbers
            .const greeting str "hi # there"
            .func main start 0
            start:
                LOAD_INT_CONST r0, -1
                LOAD_INT_CONST r1 2
                INT_ADD r2, r0, r1
                JUMP_EQ_ZERO r2, done
                LOAD_LOCAL_CONST r3, greeting
            done: RETURN r2
        "#;
        let module = assemble("test", source).unwrap();
        assert_eq!(module.code.len(), 6);
        assert_eq!(module.functions[0].name, "main");
        assert_eq!(module.functions[0].entry, 0);
        assert_eq!(module.constants.get_str(0), Some("hi # there"));
        assert_eq!(decode(module.code[0]).imm() as i16, -1);
        assert_eq!(decode(module.code[2]).operands, Operands::Regs3(2, 0, 1));
        assert_eq!(decode(module.code[3]).operands, Operands::ImmReg(2, 5));
    }

    #[test]
    fn test_unknown_mnemonic() {
        let err = assemble("t", "FROB r0").unwrap_err();
        assert!(matches!(err, AsmError::UnknownMnemonic { line: 1, .. }));
    }

    #[test]
    fn test_operand_count() {
        let err = assemble("t", "\nINT_ADD r0, r1").unwrap_err();
        assert!(matches!(
            err,
            AsmError::OperandCount {
                line: 2,
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_register_range() {
        let err = assemble("t", "MOVE r8, r0").unwrap_err();
        assert!(matches!(err, AsmError::InvalidRegister { .. }));
    }

    #[test]
    fn test_negative_immediate_only_for_int_const() {
        let err = assemble("t", "LOAD_ARG r0, -1").unwrap_err();
        assert!(matches!(err, AsmError::InvalidImmediate { line: 1, .. }));
        let err = assemble("t", "NOP\nRESERVE_ARGS -2").unwrap_err();
        assert!(matches!(err, AsmError::InvalidImmediate { line: 2, .. }));
        let module = assemble("t", "LOAD_INT_CONST r0, -32768").unwrap();
        assert_eq!(decode(module.code[0]).imm() as i16, i16::MIN);
    }

    #[test]
    fn test_undefined_label() {
        let err = assemble("t", "JUMP nowhere").unwrap_err();
        assert!(matches!(err, AsmError::UndefinedSymbol { .. }));
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("t", "a:\nNOP\na:\nNOP").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateSymbol { line: 3, .. }));
    }

    #[test]
    fn test_big_and_native_constants() {
        let module = assemble(
            "t",
            ".const n big -123456789012345678901234567890\n.const f native print\nNOP",
        )
        .unwrap();
        assert!(matches!(module.constants.get(0), Some(Constant::BigInt(_))));
        assert_eq!(module.constants.get(1), Some(&Constant::Native("print".to_string())));
    }
}
