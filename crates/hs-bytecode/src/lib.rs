//! Humming Script bytecode
//!
//! This crate defines the instruction set of the Humming Script VM and
//! everything needed to produce, store and inspect programs for it:
//!
//! - [`Opcode`] and the static [`SHAPES`] table giving each opcode's operand layout
//! - [`Instruction`] encoding to and from packed 32-bit words
//! - [`CodeWriter`] for building instruction streams with labels
//! - [`Module`] with its constant pool, function table and binary file format
//! - [`verify_module`], [`disassemble`] and the text [`assemble`]r

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod asm;
pub mod builder;
pub mod constants;
pub mod disasm;
pub mod encoder;
pub mod instruction;
pub mod module;
pub mod opcode;
pub mod verify;

pub use asm::{assemble, AsmError};
pub use builder::{CodeWriter, Label};
pub use constants::{Constant, ConstantPool};
pub use disasm::{disassemble, disassemble_module};
pub use encoder::{ByteReader, ByteWriter, DecodeError};
pub use instruction::{decode, encode, EncodeError, Instruction, Operands};
pub use module::{FunctionDef, Module, ModuleError, MAGIC, VERSION};
pub use opcode::{Opcode, OperandShape, SHAPES};
pub use verify::{verify_module, VerifyError};

/// Number of general-purpose registers in a frame
pub const MAX_REGISTERS: usize = 8;

/// Capacity of the outgoing argument staging buffer
pub const MAX_ARGS: usize = 3;
