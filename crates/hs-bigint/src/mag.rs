//! Unsigned magnitude helpers over little-endian `u32` limbs
//!
//! Every helper that produces a magnitude leaves it normalized: at least one
//! limb and no leading zero limbs except the single zero limb.

use crate::{BigIntError, BigIntResult};
use std::cmp::Ordering;

/// Allocate an empty limb buffer with room for `len` limbs
pub(crate) fn alloc(len: usize) -> BigIntResult<Vec<u32>> {
    let mut limbs = Vec::new();
    limbs
        .try_reserve_exact(len)
        .map_err(|_| BigIntError::AllocationFailed(len))?;
    Ok(limbs)
}

/// Ensure `limbs` can hold `needed` limbs, growing to `max(needed, cap * 2 + 1)`
pub(crate) fn reserve(limbs: &mut Vec<u32>, needed: usize) -> BigIntResult<()> {
    if limbs.capacity() >= needed {
        return Ok(());
    }
    let grown = limbs
        .capacity()
        .checked_mul(2)
        .and_then(|c| c.checked_add(1))
        .ok_or(BigIntError::CapacityOverflow)?;
    let target = grown.max(needed);
    if target.checked_mul(std::mem::size_of::<u32>()).is_none() {
        return Err(BigIntError::CapacityOverflow);
    }
    limbs
        .try_reserve_exact(target - limbs.len())
        .map_err(|_| BigIntError::AllocationFailed(target))
}

/// Resize to `len` limbs, zero-filling, through the growth policy
pub(crate) fn resize(limbs: &mut Vec<u32>, len: usize) -> BigIntResult<()> {
    reserve(limbs, len)?;
    limbs.resize(len, 0);
    Ok(())
}

/// Drop leading zero limbs, keeping at least one
pub(crate) fn normalize(limbs: &mut Vec<u32>) {
    while limbs.len() > 1 && limbs.last() == Some(&0) {
        limbs.pop();
    }
    if limbs.is_empty() {
        limbs.push(0);
    }
}

pub(crate) fn is_zero(limbs: &[u32]) -> bool {
    limbs.iter().all(|&l| l == 0)
}

/// Compare two normalized magnitudes
pub(crate) fn cmp(a: &[u32], b: &[u32]) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.iter().rev().cmp(b.iter().rev()))
}

/// `acc += other`
pub(crate) fn add(acc: &mut Vec<u32>, other: &[u32]) -> BigIntResult<()> {
    let n = acc.len().max(other.len());
    reserve(acc, n + 1)?;
    acc.resize(n, 0);

    let mut carry = 0u64;
    for (i, limb) in acc.iter_mut().enumerate() {
        let sum = *limb as u64 + other.get(i).copied().unwrap_or(0) as u64 + carry;
        *limb = sum as u32;
        carry = sum >> 32;
    }
    if carry != 0 {
        acc.push(carry as u32);
    }
    Ok(())
}

/// `acc -= other`; requires `acc >= other`
pub(crate) fn sub(acc: &mut Vec<u32>, other: &[u32]) {
    debug_assert!(cmp(acc, other) != Ordering::Less);
    let mut borrow = 0i64;
    for (i, limb) in acc.iter_mut().enumerate() {
        let diff = *limb as i64 - other.get(i).copied().unwrap_or(0) as i64 - borrow;
        if diff < 0 {
            *limb = (diff + (1i64 << 32)) as u32;
            borrow = 1;
        } else {
            *limb = diff as u32;
            borrow = 0;
        }
    }
    normalize(acc);
}

/// `acc = other - acc`; requires `other > acc`
pub(crate) fn sub_from(acc: &mut Vec<u32>, other: &[u32]) -> BigIntResult<()> {
    debug_assert!(cmp(acc, other) == Ordering::Less);
    resize(acc, other.len())?;
    let mut borrow = 0i64;
    for (limb, &o) in acc.iter_mut().zip(other) {
        let diff = o as i64 - *limb as i64 - borrow;
        if diff < 0 {
            *limb = (diff + (1i64 << 32)) as u32;
            borrow = 1;
        } else {
            *limb = diff as u32;
            borrow = 0;
        }
    }
    normalize(acc);
    Ok(())
}

/// Add one, growing only when every limb overflows
pub(crate) fn inc(limbs: &mut Vec<u32>) -> BigIntResult<()> {
    for limb in limbs.iter_mut() {
        let (v, overflow) = limb.overflowing_add(1);
        *limb = v;
        if !overflow {
            return Ok(());
        }
    }
    let len = limbs.len();
    reserve(limbs, len + 1)?;
    limbs.push(1);
    Ok(())
}

/// Subtract one from a non-zero magnitude
pub(crate) fn dec(limbs: &mut Vec<u32>) {
    debug_assert!(!is_zero(limbs));
    for limb in limbs.iter_mut() {
        if *limb != 0 {
            *limb -= 1;
            break;
        }
        *limb = u32::MAX;
    }
    normalize(limbs);
}

/// Schoolbook product
pub(crate) fn mul(a: &[u32], b: &[u32]) -> BigIntResult<Vec<u32>> {
    let len = a
        .len()
        .checked_add(b.len())
        .ok_or(BigIntError::CapacityOverflow)?;
    let mut out = alloc(len)?;
    out.resize(len, 0);

    for (i, &x) in a.iter().enumerate() {
        if x == 0 {
            continue;
        }
        let mut carry = 0u64;
        for (j, &y) in b.iter().enumerate() {
            let t = out[i + j] as u64 + x as u64 * y as u64 + carry;
            out[i + j] = t as u32;
            carry = t >> 32;
        }
        let mut k = i + b.len();
        while carry != 0 {
            let t = out[k] as u64 + carry;
            out[k] = t as u32;
            carry = t >> 32;
            k += 1;
        }
    }
    normalize(&mut out);
    Ok(out)
}

/// `limbs = limbs * m + a`
pub(crate) fn mul_small_add(limbs: &mut Vec<u32>, m: u32, a: u32) -> BigIntResult<()> {
    let mut carry = a as u64;
    for limb in limbs.iter_mut() {
        let t = *limb as u64 * m as u64 + carry;
        *limb = t as u32;
        carry = t >> 32;
    }
    if carry != 0 {
        let len = limbs.len();
        reserve(limbs, len + 1)?;
        limbs.push(carry as u32);
    }
    normalize(limbs);
    Ok(())
}

/// Divide by a single non-zero limb, returning the remainder
pub(crate) fn div_small(limbs: &mut Vec<u32>, d: u32) -> u32 {
    debug_assert!(d != 0);
    let mut rem = 0u64;
    for limb in limbs.iter_mut().rev() {
        let cur = (rem << 32) | *limb as u64;
        *limb = (cur / d as u64) as u32;
        rem = cur % d as u64;
    }
    normalize(limbs);
    rem as u32
}

fn bit_len(limbs: &[u32]) -> usize {
    let top = limbs.len() - 1;
    top * 32 + (32 - limbs[top].leading_zeros() as usize)
}

/// Long division of magnitudes; `b` must be non-zero
pub(crate) fn divrem(a: &[u32], b: &[u32]) -> BigIntResult<(Vec<u32>, Vec<u32>)> {
    if cmp(a, b) == Ordering::Less {
        let mut r = alloc(a.len())?;
        r.extend_from_slice(a);
        let mut q = alloc(1)?;
        q.push(0);
        return Ok((q, r));
    }

    if b.len() == 1 {
        let mut q = alloc(a.len())?;
        q.extend_from_slice(a);
        let r = div_small(&mut q, b[0]);
        let mut rem = alloc(1)?;
        rem.push(r);
        return Ok((q, rem));
    }

    // Binary shift-subtract: one conditional subtraction per dividend bit.
    let mut q = alloc(a.len())?;
    q.resize(a.len(), 0);
    let mut r = alloc(b.len() + 1)?;
    r.push(0);

    for bit in (0..bit_len(a)).rev() {
        shl(&mut r, 1)?;
        r[0] |= (a[bit / 32] >> (bit % 32)) & 1;
        if cmp(&r, b) != Ordering::Less {
            sub(&mut r, b);
            q[bit / 32] |= 1 << (bit % 32);
        }
    }
    normalize(&mut q);
    Ok((q, r))
}

/// Shift a magnitude left by `n` bits
pub(crate) fn shl(limbs: &mut Vec<u32>, n: u32) -> BigIntResult<()> {
    if is_zero(limbs) || n == 0 {
        return Ok(());
    }
    let limb_shift = (n / 32) as usize;
    let bit_shift = n % 32;
    let old_len = limbs.len();
    let new_len = old_len
        .checked_add(limb_shift)
        .and_then(|l| l.checked_add(1))
        .ok_or(BigIntError::CapacityOverflow)?;
    resize(limbs, new_len)?;

    if bit_shift == 0 {
        for i in (0..old_len).rev() {
            limbs[i + limb_shift] = limbs[i];
        }
    } else {
        for i in (0..old_len).rev() {
            let v = limbs[i];
            limbs[i + limb_shift + 1] |= v >> (32 - bit_shift);
            limbs[i + limb_shift] = v << bit_shift;
        }
    }
    for limb in limbs.iter_mut().take(limb_shift) {
        *limb = 0;
    }
    normalize(limbs);
    Ok(())
}

/// Shift a magnitude right by `n` bits, discarding the shifted-out bits
pub(crate) fn shr(limbs: &mut Vec<u32>, n: u32) {
    let limb_shift = (n / 32) as usize;
    let bit_shift = n % 32;
    if limb_shift >= limbs.len() {
        limbs.clear();
        limbs.push(0);
        return;
    }
    limbs.drain(..limb_shift);
    if bit_shift != 0 {
        for i in 0..limbs.len() {
            let hi = limbs.get(i + 1).copied().unwrap_or(0);
            limbs[i] = (limbs[i] >> bit_shift) | (hi << (32 - bit_shift));
        }
    }
    normalize(limbs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_carries_into_new_limb() {
        let mut a = vec![u32::MAX, u32::MAX];
        add(&mut a, &[1]).unwrap();
        assert_eq!(a, vec![0, 0, 1]);
    }

    #[test]
    fn test_sub_borrows_across_limbs() {
        let mut a = vec![0, 0, 1];
        sub(&mut a, &[1]);
        assert_eq!(a, vec![u32::MAX, u32::MAX]);
    }

    #[test]
    fn test_sub_from_swaps_roles() {
        let mut a = vec![3];
        sub_from(&mut a, &[0, 1]).unwrap();
        assert_eq!(a, vec![u32::MAX - 2]);
    }

    #[test]
    fn test_mul_two_limbs() {
        let p = mul(&[u32::MAX], &[u32::MAX]).unwrap();
        // (2^32 - 1)^2 = 2^64 - 2^33 + 1
        assert_eq!(p, vec![1, u32::MAX - 1]);
    }

    #[test]
    fn test_divrem_multi_limb() {
        let a = vec![5, 7, 9];
        let b = vec![3, 2];
        let (q, r) = divrem(&a, &b).unwrap();
        let mut back = mul(&q, &b).unwrap();
        add(&mut back, &r).unwrap();
        assert_eq!(back, a);
        assert_eq!(cmp(&r, &b), Ordering::Less);
    }

    #[test]
    fn test_shl_shr_cross_limb() {
        let mut v = vec![0x8000_0001];
        shl(&mut v, 33).unwrap();
        assert_eq!(v, vec![0, 2, 1]);
        shr(&mut v, 33);
        assert_eq!(v, vec![0x8000_0001]);
    }

    #[test]
    fn test_shr_past_end_is_zero() {
        let mut v = vec![1, 2];
        shr(&mut v, 64);
        assert_eq!(v, vec![0]);
    }

    #[test]
    fn test_reserve_grows_geometrically() {
        let mut v = alloc(1).unwrap();
        v.push(0);
        reserve(&mut v, 2).unwrap();
        assert!(v.capacity() >= 3);
    }

    #[test]
    fn test_inc_grows_when_all_limbs_overflow() {
        let mut v = vec![u32::MAX];
        inc(&mut v).unwrap();
        assert_eq!(v, vec![0, 1]);
        dec(&mut v);
        assert_eq!(v, vec![u32::MAX]);
    }
}
