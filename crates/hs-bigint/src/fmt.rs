//! Text conversion: decimal `Display`/`FromStr`, hex and `Debug`

use crate::{mag, BigInt, BigIntError};
use std::fmt;
use std::str::FromStr;

/// Largest power of ten that fits in a limb
const DECIMAL_CHUNK: u32 = 1_000_000_000;
const DECIMAL_CHUNK_DIGITS: usize = 9;

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.limbs.clone();
        let mut chunks = Vec::new();
        loop {
            chunks.push(mag::div_small(&mut rest, DECIMAL_CHUNK));
            if mag::is_zero(&rest) {
                break;
            }
        }

        let mut digits = String::with_capacity(chunks.len() * DECIMAL_CHUNK_DIGITS);
        let mut iter = chunks.iter().rev();
        if let Some(first) = iter.next() {
            digits.push_str(&first.to_string());
        }
        for chunk in iter {
            digits.push_str(&format!("{:09}", chunk));
        }
        f.pad_integral(!self.is_negative(), "", &digits)
    }
}

impl fmt::Debug for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigInt({})", self)
    }
}

impl fmt::LowerHex for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = String::new();
        let mut iter = self.limbs.iter().rev();
        if let Some(top) = iter.next() {
            digits.push_str(&format!("{:x}", top));
        }
        for limb in iter {
            digits.push_str(&format!("{:08x}", limb));
        }
        f.pad_integral(!self.is_negative(), "0x", &digits)
    }
}

impl FromStr for BigInt {
    type Err = BigIntError;

    /// Parse an optionally signed decimal literal; `_` separators are allowed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if body.is_empty() || body.starts_with('_') {
            return Err(BigIntError::Parse(s.to_string()));
        }

        let mut limbs = mag::alloc(body.len() / DECIMAL_CHUNK_DIGITS + 1)?;
        limbs.push(0);
        let mut chunk = 0u32;
        let mut chunk_len = 0usize;
        for c in body.chars() {
            if c == '_' {
                continue;
            }
            let digit = c.to_digit(10).ok_or_else(|| BigIntError::Parse(s.to_string()))?;
            chunk = chunk * 10 + digit;
            chunk_len += 1;
            if chunk_len == DECIMAL_CHUNK_DIGITS {
                mag::mul_small_add(&mut limbs, DECIMAL_CHUNK, chunk)?;
                chunk = 0;
                chunk_len = 0;
            }
        }
        if chunk_len > 0 {
            mag::mul_small_add(&mut limbs, 10u32.pow(chunk_len as u32), chunk)?;
        }

        let mut big = BigInt { limbs, negative };
        big.fix_zero_sign();
        Ok(big)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_small_and_negative() {
        assert_eq!(BigInt::zero().to_string(), "0");
        assert_eq!(BigInt::from(-42i32).to_string(), "-42");
        assert_eq!(BigInt::from_limbs(&[0], true).to_string(), "0");
    }

    #[test]
    fn test_display_multi_chunk() {
        assert_eq!(BigInt::from(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(BigInt::from(1_000_000_000u64).to_string(), "1000000000");
    }

    #[test]
    fn test_parse_round_trips_display() {
        let text = "-123456789012345678901234567890";
        let big: BigInt = text.parse().unwrap();
        assert!(big.is_negative());
        assert_eq!(big.to_string(), text);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<BigInt>().is_err());
        assert!("-".parse::<BigInt>().is_err());
        assert!("12a".parse::<BigInt>().is_err());
        assert_eq!("1_000".parse::<BigInt>().unwrap(), BigInt::from(1000u32));
    }

    #[test]
    fn test_lower_hex() {
        let v = BigInt::from_limbs(&[0xab, 0x1], true);
        assert_eq!(format!("{:x}", v), "-1000000ab");
        assert_eq!(format!("{:#x}", v), "-0x1000000ab");
    }
}
