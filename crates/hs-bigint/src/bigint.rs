//! The [`BigInt`] type: construction, inspection, comparison and conversion

use crate::{mag, BigIntError, BigIntResult};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Sign-magnitude arbitrary-precision integer
///
/// The magnitude is a little-endian sequence of 32-bit limbs. There is always
/// at least one limb, and zero is the single limb `[0]`. The sign flag of zero
/// is not meaningful: `-0` and `+0` compare, hash and test as equal.
#[derive(Clone)]
pub struct BigInt {
    pub(crate) limbs: Vec<u32>,
    pub(crate) negative: bool,
}

impl BigInt {
    /// Create a zero value with room for `capacity` limbs
    ///
    /// # Errors
    ///
    /// `ZeroCapacity` when `capacity == 0`, `AllocationFailed` if the limb
    /// storage cannot be obtained.
    pub fn with_capacity(capacity: usize) -> BigIntResult<Self> {
        if capacity == 0 {
            return Err(BigIntError::ZeroCapacity);
        }
        let mut limbs = mag::alloc(capacity)?;
        limbs.push(0);
        Ok(Self {
            limbs,
            negative: false,
        })
    }

    /// The value zero
    pub fn zero() -> Self {
        Self {
            limbs: vec![0],
            negative: false,
        }
    }

    /// Build from raw little-endian limbs and a sign flag
    pub fn from_limbs(limbs: &[u32], negative: bool) -> Self {
        let mut limbs = limbs.to_vec();
        mag::normalize(&mut limbs);
        Self { limbs, negative }
    }

    /// Deep copy that reports allocation failure instead of aborting
    pub fn try_clone(&self) -> BigIntResult<Self> {
        let mut limbs = mag::alloc(self.limbs.len())?;
        limbs.extend_from_slice(&self.limbs);
        Ok(Self {
            limbs,
            negative: self.negative,
        })
    }

    /// Whether the value is zero, regardless of the sign flag
    pub fn is_zero(&self) -> bool {
        mag::is_zero(&self.limbs)
    }

    /// Whether the value is strictly negative
    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    /// Whether the value is strictly positive
    pub fn is_positive(&self) -> bool {
        !self.negative && !self.is_zero()
    }

    /// Number of significant limbs (at least one)
    pub fn len(&self) -> usize {
        self.limbs.len()
    }

    /// Always false; a bignum holds at least one limb
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of allocated limbs
    pub fn capacity(&self) -> usize {
        self.limbs.capacity()
    }

    /// Magnitude limbs, least significant first
    pub fn limbs(&self) -> &[u32] {
        &self.limbs
    }

    /// Three-way comparison of signed values
    ///
    /// Differing signs order negative before positive; equal signs compare
    /// magnitudes by limb count and then from the most significant limb down.
    pub fn compare(&self, other: &BigInt) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => mag::cmp(&self.limbs, &other.limbs),
            (true, true) => mag::cmp(&other.limbs, &self.limbs),
        }
    }

    /// Equality with `-0 == +0`
    pub fn equals(&self, other: &BigInt) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Convert to `i32` when the value fits
    pub fn to_i32(&self) -> Option<i32> {
        self.to_i64().and_then(|v| i32::try_from(v).ok())
    }

    /// Convert to `i64` when the value fits
    pub fn to_i64(&self) -> Option<i64> {
        if self.limbs.len() > 2 {
            return None;
        }
        let high = self.limbs.get(1).copied().unwrap_or(0) as i128;
        let magnitude = self.limbs[0] as i128 | high << 32;
        let value = if self.negative { -magnitude } else { magnitude };
        i64::try_from(value).ok()
    }

    /// Convert to `u32` when the value is non-negative and fits
    pub fn to_u32(&self) -> Option<u32> {
        if self.is_negative() || self.limbs.len() > 1 {
            return None;
        }
        Some(self.limbs[0])
    }

    /// Clear the sign of zero so the physical representation is canonical
    pub(crate) fn fix_zero_sign(&mut self) {
        if self.is_zero() {
            self.negative = false;
        }
    }
}

impl Default for BigInt {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for BigInt {
    fn from(value: u64) -> Self {
        Self::from_limbs(&[value as u32, (value >> 32) as u32], false)
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        let mut big = Self::from(value.unsigned_abs());
        big.negative = value < 0;
        big
    }
}

impl From<u32> for BigInt {
    fn from(value: u32) -> Self {
        Self {
            limbs: vec![value],
            negative: false,
        }
    }
}

impl From<i32> for BigInt {
    fn from(value: i32) -> Self {
        Self {
            limbs: vec![value.unsigned_abs()],
            negative: value < 0,
        }
    }
}

impl PartialEq for BigInt {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for BigInt {}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl Hash for BigInt {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_negative().hash(state);
        self.limbs.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_capacity_rejects_zero() {
        assert_eq!(BigInt::with_capacity(0).unwrap_err(), BigIntError::ZeroCapacity);
        let big = BigInt::with_capacity(4).unwrap();
        assert!(big.is_zero());
        assert!(big.capacity() >= 4);
        assert_eq!(big.len(), 1);
    }

    #[test]
    fn test_from_fixed_width() {
        assert_eq!(BigInt::from(-5i32).limbs(), &[5]);
        assert!(BigInt::from(-5i32).is_negative());
        assert_eq!(BigInt::from(u64::MAX).limbs(), &[u32::MAX, u32::MAX]);
        assert_eq!(BigInt::from(i64::MIN).limbs(), &[0, 0x8000_0000]);
        assert_eq!(BigInt::from(0u64).limbs(), &[0]);
    }

    #[test]
    fn test_compare_orders_signs_then_magnitudes() {
        let neg_big = BigInt::from(-(1i64 << 40));
        let neg_small = BigInt::from(-3i32);
        let pos_small = BigInt::from(3u32);
        let pos_big = BigInt::from(1u64 << 40);
        assert_eq!(neg_big.compare(&neg_small), Ordering::Less);
        assert_eq!(neg_small.compare(&pos_small), Ordering::Less);
        assert_eq!(pos_small.compare(&pos_big), Ordering::Less);
        assert_eq!(pos_big.compare(&pos_big.clone()), Ordering::Equal);
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        let neg_zero = BigInt::from_limbs(&[0], true);
        assert_eq!(neg_zero.compare(&BigInt::zero()), Ordering::Equal);
        assert!(neg_zero.equals(&BigInt::zero()));
        assert!(!neg_zero.is_negative());
    }

    #[test]
    fn test_to_i64_bounds() {
        assert_eq!(BigInt::from(i64::MIN).to_i64(), Some(i64::MIN));
        assert_eq!(BigInt::from(u64::MAX).to_i64(), None);
        assert_eq!(BigInt::from(i32::MIN).to_i32(), Some(i32::MIN));
        assert_eq!(BigInt::from(1u64 << 31).to_i32(), None);
    }
}
