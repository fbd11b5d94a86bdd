//! Module constant pool

use crate::encoder::{ByteReader, ByteWriter, DecodeError};
use hs_bigint::BigInt;

const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_STR: u8 = 2;
const TAG_BIGINT: u8 = 3;
const TAG_NATIVE: u8 = 4;

/// A constant-pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// 32-bit integer
    Int(i32),
    /// 32-bit float
    Float(f32),
    /// String literal
    Str(String),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Name of a host function resolved at load time
    Native(String),
}

impl Constant {
    /// Short kind name used by the disassembler and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Int(_) => "int",
            Constant::Float(_) => "float",
            Constant::Str(_) => "str",
            Constant::BigInt(_) => "big",
            Constant::Native(_) => "native",
        }
    }
}

/// Indexed constant storage addressed by 16-bit immediates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant, reusing an identical existing entry
    pub fn add(&mut self, constant: Constant) -> usize {
        if let Some(index) = self.entries.iter().position(|c| c == &constant) {
            return index;
        }
        self.entries.push(constant);
        self.entries.len() - 1
    }

    /// Look up a constant by index
    pub fn get(&self, index: usize) -> Option<&Constant> {
        self.entries.get(index)
    }

    /// Look up a string constant by index
    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.entries.get(index) {
            Some(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    pub(crate) fn encode(&self, writer: &mut ByteWriter) {
        writer.emit_u32(self.entries.len() as u32);
        for constant in &self.entries {
            match constant {
                Constant::Int(v) => {
                    writer.emit_u8(TAG_INT);
                    writer.emit_u32(*v as u32);
                }
                Constant::Float(v) => {
                    writer.emit_u8(TAG_FLOAT);
                    writer.emit_f32(*v);
                }
                Constant::Str(s) => {
                    writer.emit_u8(TAG_STR);
                    writer.emit_string(s);
                }
                Constant::BigInt(v) => {
                    writer.emit_u8(TAG_BIGINT);
                    writer.emit_string(&v.to_string());
                }
                Constant::Native(name) => {
                    writer.emit_u8(TAG_NATIVE);
                    writer.emit_string(name);
                }
            }
        }
    }

    pub(crate) fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u32()? as usize;
        let mut entries = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            let offset = reader.position();
            let constant = match reader.read_u8()? {
                TAG_INT => Constant::Int(reader.read_i32()?),
                TAG_FLOAT => Constant::Float(reader.read_f32()?),
                TAG_STR => Constant::Str(reader.read_string()?),
                TAG_BIGINT => {
                    let text = reader.read_string()?;
                    let value = text
                        .parse::<BigInt>()
                        .map_err(|_| DecodeError::InvalidBigInt(offset))?;
                    Constant::BigInt(value)
                }
                TAG_NATIVE => Constant::Native(reader.read_string()?),
                tag => return Err(DecodeError::InvalidTag(tag, offset)),
            };
            entries.push(constant);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.add(Constant::Str("x".to_string()));
        let b = pool.add(Constant::Int(3));
        let c = pool.add(Constant::Str("x".to_string()));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get_str(a), Some("x"));
        assert_eq!(pool.get_str(b), None);
    }

    #[test]
    fn test_pool_encoding() {
        let mut pool = ConstantPool::new();
        pool.add(Constant::Int(-9));
        pool.add(Constant::Float(0.25));
        pool.add(Constant::BigInt("-98765432109876543210".parse().unwrap()));
        pool.add(Constant::Native("print".to_string()));

        let mut writer = ByteWriter::new();
        pool.encode(&mut writer);
        let bytes = writer.into_bytes();
        let decoded = ConstantPool::decode(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(decoded, pool);
    }

    #[test]
    fn test_invalid_tag() {
        let bytes = [1, 0, 0, 0, 9];
        let err = ConstantPool::decode(&mut ByteReader::new(&bytes)).unwrap_err();
        assert_eq!(err, DecodeError::InvalidTag(9, 4));
    }
}
