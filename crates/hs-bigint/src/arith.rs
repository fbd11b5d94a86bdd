//! Signed arithmetic

use crate::{mag, BigInt, BigIntError, BigIntResult};
use std::cmp::Ordering;

impl BigInt {
    /// Add a signed magnitude to `self` in place
    fn add_signed(&mut self, rhs: &[u32], rhs_negative: bool) -> BigIntResult<()> {
        let lhs_negative = self.is_negative();
        let rhs_negative = rhs_negative && !mag::is_zero(rhs);

        if lhs_negative == rhs_negative || self.is_zero() {
            if self.is_zero() {
                self.negative = rhs_negative;
            }
            mag::add(&mut self.limbs, rhs)?;
        } else {
            match mag::cmp(&self.limbs, rhs) {
                Ordering::Greater | Ordering::Equal => mag::sub(&mut self.limbs, rhs),
                Ordering::Less => {
                    // |self| < |rhs|: subtract the other way and take rhs's sign
                    mag::sub_from(&mut self.limbs, rhs)?;
                    self.negative = rhs_negative;
                }
            }
        }
        self.fix_zero_sign();
        Ok(())
    }

    /// `self += rhs`
    pub fn add_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.add_signed(&rhs.limbs, rhs.negative)
    }

    /// `self -= rhs`
    pub fn sub_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.add_signed(&rhs.limbs, !rhs.negative)
    }

    /// `self *= rhs`
    pub fn mul_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        let negative = self.is_negative() != rhs.is_negative();
        self.limbs = mag::mul(&self.limbs, &rhs.limbs)?;
        self.negative = negative;
        self.fix_zero_sign();
        Ok(())
    }

    /// `self /= rhs`, truncating toward zero
    pub fn div_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        let (q, _) = divrem_parts(self, rhs)?;
        *self = q;
        Ok(())
    }

    /// `self = self rem rhs`; the remainder takes the dividend's sign
    pub fn rem_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        let (_, r) = divrem_parts(self, rhs)?;
        *self = r;
        Ok(())
    }

    /// `self = ((self rem rhs) + rhs) rem rhs`
    ///
    /// For positive `rhs` the result always lies in `[0, rhs)`.
    pub fn mod_assign_big(&mut self, rhs: &BigInt) -> BigIntResult<()> {
        self.rem_assign_big(rhs)?;
        self.add_assign_big(rhs)?;
        self.rem_assign_big(rhs)
    }

    /// Flip the sign flag; zero stays zero
    pub fn negate(&mut self) {
        self.negative = !self.negative;
    }

    /// Clear the sign
    pub fn make_abs(&mut self) {
        self.negative = false;
    }

    /// Add one in place
    pub fn inc(&mut self) -> BigIntResult<()> {
        if self.is_negative() {
            mag::dec(&mut self.limbs);
            self.fix_zero_sign();
            Ok(())
        } else {
            self.negative = false;
            mag::inc(&mut self.limbs)
        }
    }

    /// Subtract one in place; zero becomes -1
    pub fn dec(&mut self) -> BigIntResult<()> {
        if self.is_zero() {
            self.limbs[0] = 1;
            self.negative = true;
            Ok(())
        } else if self.is_negative() {
            mag::inc(&mut self.limbs)
        } else {
            mag::dec(&mut self.limbs);
            Ok(())
        }
    }

    /// Quotient and remainder in one pass
    ///
    /// The quotient is truncated toward zero and the remainder carries the
    /// dividend's sign, so `q * rhs + r == self`.
    pub fn divrem(&self, rhs: &BigInt) -> BigIntResult<(BigInt, BigInt)> {
        divrem_parts(self, rhs)
    }
}

fn divrem_parts(lhs: &BigInt, rhs: &BigInt) -> BigIntResult<(BigInt, BigInt)> {
    if rhs.is_zero() {
        return Err(BigIntError::DivisionByZero);
    }
    let (q, r) = mag::divrem(&lhs.limbs, &rhs.limbs)?;
    let mut quotient = BigInt {
        limbs: q,
        negative: lhs.is_negative() != rhs.is_negative(),
    };
    let mut remainder = BigInt {
        limbs: r,
        negative: lhs.is_negative(),
    };
    quotient.fix_zero_sign();
    remainder.fix_zero_sign();
    Ok((quotient, remainder))
}

macro_rules! copy_then_apply {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        impl BigInt {
            $(
                $(#[$doc])*
                pub fn $name(&self, rhs: &BigInt) -> BigIntResult<BigInt> {
                    let mut out = self.try_clone()?;
                    out.$op(rhs)?;
                    Ok(out)
                }
            )*
        }
    };
}

copy_then_apply! {
    /// `self + rhs` into a fresh value
    checked_add => add_assign_big;
    /// `self - rhs` into a fresh value
    checked_sub => sub_assign_big;
    /// `self * rhs` into a fresh value
    checked_mul => mul_assign_big;
    /// `self / rhs` into a fresh value
    checked_div => div_assign_big;
    /// `self rem rhs` into a fresh value
    checked_rem => rem_assign_big;
    /// Floored `self mod rhs` into a fresh value
    checked_mod => mod_assign_big;
    /// `self << rhs` into a fresh value
    checked_shl => shl_assign_big;
    /// Arithmetic `self >> rhs` into a fresh value
    checked_shr => shr_assign_big;
    /// Logical `self >>> rhs` into a fresh value
    checked_ushr => ushr_assign_big;
    /// `self & rhs` into a fresh value
    checked_and => and_assign_big;
    /// `self | rhs` into a fresh value
    checked_or => or_assign_big;
    /// `self ^ rhs` into a fresh value
    checked_xor => xor_assign_big;
}

impl BigInt {
    /// `-self` into a fresh value
    pub fn checked_neg(&self) -> BigIntResult<BigInt> {
        let mut out = self.try_clone()?;
        out.negate();
        Ok(out)
    }

    /// `|self|` into a fresh value
    pub fn checked_abs(&self) -> BigIntResult<BigInt> {
        let mut out = self.try_clone()?;
        out.make_abs();
        Ok(out)
    }

    /// `!self` (that is `-self - 1`) into a fresh value
    pub fn checked_complement(&self) -> BigIntResult<BigInt> {
        let mut out = self.try_clone()?;
        out.complement()?;
        Ok(out)
    }
}
