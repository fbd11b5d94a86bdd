//! Bytecode module container and binary format

use crate::constants::ConstantPool;
use crate::encoder::{ByteReader, ByteWriter, DecodeError};
use thiserror::Error;

/// Magic number for Humming Script bytecode files: "HSBC"
pub const MAGIC: [u8; 4] = *b"HSBC";

/// Current bytecode version
pub const VERSION: u32 = 1;

/// Size of the fixed header (magic, version, checksum)
const HEADER_LEN: usize = 12;

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected HSBC, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// Bytes left over after the last section
    #[error("{0} trailing bytes after module payload")]
    TrailingBytes(usize),
}

/// Function table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Index of the first instruction in the module's code
    pub entry: u32,
    /// Number of declared parameters
    pub param_count: u8,
}

/// A loaded bytecode module
///
/// All functions share one instruction stream; a [`FunctionDef`] only names
/// an entry point into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Module name
    pub name: String,
    /// Instruction words
    pub code: Vec<u32>,
    /// Constant pool
    pub constants: ConstantPool,
    /// Function table
    pub functions: Vec<FunctionDef>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of instruction words
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether the module has no code
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Instruction word at `pc`, or `None` past the end
    pub fn fetch(&self, pc: usize) -> Option<u32> {
        self.code.get(pc).copied()
    }

    /// Find a function by name
    pub fn function(&self, name: &str) -> Option<(usize, &FunctionDef)> {
        self.functions.iter().enumerate().find(|(_, f)| f.name == name)
    }

    /// Add a function and return its index
    pub fn add_function(&mut self, name: impl Into<String>, entry: u32, param_count: u8) -> usize {
        self.functions.push(FunctionDef {
            name: name.into(),
            entry,
            param_count,
        });
        self.functions.len() - 1
    }

    /// Check structural consistency of the function table
    pub fn validate(&self) -> Result<(), String> {
        for func in &self.functions {
            if func.entry as usize >= self.code.len() {
                return Err(format!(
                    "Function '{}' entry {} is outside the code ({} words)",
                    func.name,
                    func.entry,
                    self.code.len()
                ));
            }
        }
        if self.constants.len() > u16::MAX as usize + 1 {
            return Err(format!("Too many constants: {}", self.constants.len()));
        }
        Ok(())
    }

    /// Encode the module to its binary format
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + checksum (u32)
    /// - Name
    /// - Constant pool
    /// - Function table
    /// - Code: word count (u32) + words (u32 each, little-endian)
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();

        writer.emit_bytes(&MAGIC);
        writer.emit_u32(VERSION);
        let checksum_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for checksum

        writer.emit_string(&self.name);
        self.constants.encode(&mut writer);

        writer.emit_u32(self.functions.len() as u32);
        for func in &self.functions {
            writer.emit_string(&func.name);
            writer.emit_u32(func.entry);
            writer.emit_u8(func.param_count);
        }

        writer.emit_u32(self.code.len() as u32);
        for &word in &self.code {
            writer.emit_u32(word);
        }

        // CRC32 of everything after the header
        let checksum = crc32fast::hash(&writer.buffer[HEADER_LEN..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a module from its binary format
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_bytes(4)?;
        let magic = [magic[0], magic[1], magic[2], magic[3]];
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let stored_checksum = reader.read_u32()?;
        let calculated_checksum = crc32fast::hash(&data[HEADER_LEN..]);
        if stored_checksum != calculated_checksum {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let name = reader.read_string()?;
        let constants = ConstantPool::decode(&mut reader)?;

        let func_count = reader.read_u32()? as usize;
        let mut functions = Vec::with_capacity(func_count.min(reader.remaining()));
        for _ in 0..func_count {
            let name = reader.read_string()?;
            let entry = reader.read_u32()?;
            let param_count = reader.read_u8()?;
            functions.push(FunctionDef {
                name,
                entry,
                param_count,
            });
        }

        let word_count = reader.read_u32()? as usize;
        let mut code = Vec::with_capacity(word_count.min(reader.remaining() / 4));
        for _ in 0..word_count {
            code.push(reader.read_u32()?);
        }

        if reader.remaining() != 0 {
            return Err(ModuleError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            name,
            code,
            constants,
            functions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::Constant;
    use crate::instruction::{encode, Operands};
    use crate::opcode::Opcode;

    fn sample() -> Module {
        let mut module = Module::new("sample");
        module.constants.add(Constant::Str("field".to_string()));
        module.code = vec![
            encode(Opcode::LoadIntConst, Operands::ImmReg(0, 7)).unwrap(),
            encode(Opcode::Return, Operands::Regs1(0)).unwrap(),
        ];
        module.add_function("main", 0, 0);
        module
    }

    #[test]
    fn test_module_roundtrip() {
        let module = sample();
        let decoded = Module::decode(&module.encode()).unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().encode();
        assert_eq!(&bytes[..4], b"HSBC");
        assert_eq!(&bytes[4..8], &VERSION.to_le_bytes());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        assert!(matches!(Module::decode(&bytes), Err(ModuleError::InvalidMagic(_))));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Module::decode(&bytes),
            Err(ModuleError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = sample().encode();
        assert!(Module::decode(&bytes[..6]).is_err());
    }

    #[test]
    fn test_validate_entry_point() {
        let mut module = sample();
        assert!(module.validate().is_ok());
        module.add_function("broken", 99, 0);
        assert!(module.validate().is_err());
    }

    #[test]
    fn test_fetch_past_end() {
        let module = sample();
        assert!(module.fetch(1).is_some());
        assert_eq!(module.fetch(2), None);
    }
}
