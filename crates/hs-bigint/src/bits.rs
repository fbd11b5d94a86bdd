//! Shifts and bitwise operations
//!
//! Bitwise operators act on the infinite two's complement form of the signed
//! value. Operands are expanded to a common width one limb wider than the
//! widest magnitude, combined, and converted back to sign-magnitude.

use crate::{mag, BigInt, BigIntError, BigIntResult};

/// Validate a bignum shift count: strictly positive and within `u32`
fn shift_count(count: &BigInt) -> BigIntResult<u32> {
    if count.is_zero() || count.is_negative() {
        return Err(BigIntError::InvalidShift);
    }
    count.to_u32().ok_or(BigIntError::ShiftTooLarge)
}

impl BigInt {
    /// `self <<= count` with a bignum count
    ///
    /// # Errors
    ///
    /// `InvalidShift` for a zero or negative count, `ShiftTooLarge` when the
    /// count exceeds `u32::MAX`.
    pub fn shl_assign_big(&mut self, count: &BigInt) -> BigIntResult<()> {
        let n = shift_count(count)?;
        self.shl_bits(n)
    }

    /// Arithmetic `self >>= count` with a bignum count
    pub fn shr_assign_big(&mut self, count: &BigInt) -> BigIntResult<()> {
        let n = shift_count(count)?;
        self.shr_bits(n)
    }

    /// Logical `self >>>= count` with a bignum count
    pub fn ushr_assign_big(&mut self, count: &BigInt) -> BigIntResult<()> {
        let n = shift_count(count)?;
        self.ushr_bits(n);
        Ok(())
    }

    /// Shift left by `n` bits; the sign is preserved
    pub fn shl_bits(&mut self, n: u32) -> BigIntResult<()> {
        mag::shl(&mut self.limbs, n)
    }

    /// Arithmetic shift right by `n` bits, rounding toward negative infinity
    pub fn shr_bits(&mut self, n: u32) -> BigIntResult<()> {
        if self.is_negative() {
            // floor(-m / 2^n) == -(((m - 1) >> n) + 1)
            mag::dec(&mut self.limbs);
            mag::shr(&mut self.limbs, n);
            mag::inc(&mut self.limbs)
        } else {
            mag::shr(&mut self.limbs, n);
            self.fix_zero_sign();
            Ok(())
        }
    }

    /// Logical shift right by `n` bits: shifts the magnitude and clears the sign
    pub fn ushr_bits(&mut self, n: u32) {
        mag::shr(&mut self.limbs, n);
        self.negative = false;
    }

    /// `self = !self`, that is `-self - 1`
    pub fn complement(&mut self) -> BigIntResult<()> {
        self.negate();
        self.dec()
    }

    /// `self &= rhs`
    pub fn and_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.bitwise(rhs, |a, b| a & b)
    }

    /// `self |= rhs`
    pub fn or_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.bitwise(rhs, |a, b| a | b)
    }

    /// `self ^= rhs`
    pub fn xor_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.bitwise(rhs, |a, b| a ^ b)
    }

    fn bitwise(&mut self, rhs: &BigInt, op: impl Fn(u32, u32) -> u32) -> BigIntResult<()> {
        let width = self
            .limbs
            .len()
            .max(rhs.limbs.len())
            .checked_add(1)
            .ok_or(BigIntError::CapacityOverflow)?;
        let lhs = self.to_twos(width)?;
        let rhs = rhs.to_twos(width)?;
        let combined: Vec<u32> = lhs.iter().zip(&rhs).map(|(&a, &b)| op(a, b)).collect();
        *self = BigInt::from_twos(combined);
        Ok(())
    }

    /// Two's complement form, sign-extended to `width` limbs
    fn to_twos(&self, width: usize) -> BigIntResult<Vec<u32>> {
        let mut out = mag::alloc(width)?;
        out.extend_from_slice(&self.limbs);
        out.resize(width, 0);
        if self.is_negative() {
            for limb in out.iter_mut() {
                *limb = !*limb;
            }
            let mut carry = true;
            for limb in out.iter_mut() {
                if !carry {
                    break;
                }
                let (v, overflow) = limb.overflowing_add(1);
                *limb = v;
                carry = overflow;
            }
        }
        Ok(out)
    }

    fn from_twos(mut limbs: Vec<u32>) -> BigInt {
        let negative = limbs.last().map_or(false, |&top| top & 0x8000_0000 != 0);
        if negative {
            for limb in limbs.iter_mut() {
                *limb = !*limb;
            }
            for limb in limbs.iter_mut() {
                let (v, overflow) = limb.overflowing_add(1);
                *limb = v;
                if !overflow {
                    break;
                }
            }
        }
        mag::normalize(&mut limbs);
        BigInt { limbs, negative }
    }
}
