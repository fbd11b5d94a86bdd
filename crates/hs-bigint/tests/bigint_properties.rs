//! Randomized algebraic properties of the bignum engine

use hs_bigint::{BigInt, BigIntError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

const ROUNDS: usize = 128;

fn random_big(rng: &mut StdRng) -> BigInt {
    let len = rng.gen_range(1..=6);
    let limbs: Vec<u32> = (0..len).map(|_| rng.gen()).collect();
    BigInt::from_limbs(&limbs, rng.gen_bool(0.5))
}

fn random_nonzero(rng: &mut StdRng) -> BigInt {
    loop {
        let b = random_big(rng);
        if !b.is_zero() {
            return b;
        }
    }
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(0x4853_4249)
}

#[test]
fn test_additive_identity_and_inverse() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        assert_eq!(a.checked_add(&BigInt::zero()).unwrap(), a);
        let sum = a.checked_add(&a.checked_neg().unwrap()).unwrap();
        assert!(sum.is_zero(), "{a} + -{a} = {sum}");
    }
}

#[test]
fn test_add_commutative_and_associative() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let b = random_big(&mut rng);
        let c = random_big(&mut rng);
        assert_eq!(a.checked_add(&b).unwrap(), b.checked_add(&a).unwrap());
        let left = a.checked_add(&b).unwrap().checked_add(&c).unwrap();
        let right = a.checked_add(&b.checked_add(&c).unwrap()).unwrap();
        assert_eq!(left, right);
    }
}

#[test]
fn test_sub_inverts_add() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let b = random_big(&mut rng);
        let back = a.checked_add(&b).unwrap().checked_sub(&b).unwrap();
        assert_eq!(back, a);
    }
}

#[test]
fn test_mul_commutative_and_distributive() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let b = random_big(&mut rng);
        let c = random_big(&mut rng);
        assert_eq!(a.checked_mul(&b).unwrap(), b.checked_mul(&a).unwrap());
        let left = a.checked_mul(&b.checked_add(&c).unwrap()).unwrap();
        let right = a
            .checked_mul(&b)
            .unwrap()
            .checked_add(&a.checked_mul(&c).unwrap())
            .unwrap();
        assert_eq!(left, right);
    }
}

#[test]
fn test_division_identity() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let b = random_nonzero(&mut rng);
        let q = a.checked_div(&b).unwrap();
        let r = a.checked_rem(&b).unwrap();
        let back = q.checked_mul(&b).unwrap().checked_add(&r).unwrap();
        assert_eq!(back, a, "({a} / {b}) * {b} + ({a} rem {b})");

        let mut abs_r = r.clone();
        abs_r.make_abs();
        let mut abs_b = b.clone();
        abs_b.make_abs();
        assert_eq!(abs_r.compare(&abs_b), Ordering::Less);

        let (q2, r2) = a.divrem(&b).unwrap();
        assert_eq!(q2, q);
        assert_eq!(r2, r);
    }
}

#[test]
fn test_mod_non_negative_for_positive_divisor() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let mut b = random_nonzero(&mut rng);
        b.make_abs();
        let m = a.checked_mod(&b).unwrap();
        assert!(!m.is_negative(), "{a} mod {b} = {m}");
        assert_eq!(m.compare(&b), Ordering::Less);
    }
}

#[test]
fn test_zero_sign_equivalence() {
    let neg_zero = BigInt::zero().checked_neg().unwrap();
    assert_eq!(neg_zero, BigInt::zero());
    assert_eq!(neg_zero.compare(&BigInt::zero()), Ordering::Equal);
    assert!(neg_zero.is_zero());
}

#[test]
fn test_shl_matches_mul_by_power_of_two() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let n = rng.gen_range(1u32..=96);
        let shifted = a.checked_shl(&BigInt::from(n)).unwrap();

        let mut power = BigInt::from(1u32);
        power.shl_bits(n).unwrap();
        assert_eq!(shifted, a.checked_mul(&power).unwrap());
    }
}

#[test]
fn test_arithmetic_shr_is_floor_division() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let n = rng.gen_range(1u32..=96);
        let shifted = a.checked_shr(&BigInt::from(n)).unwrap();

        let mut power = BigInt::from(1u32);
        power.shl_bits(n).unwrap();
        let (mut q, r) = a.divrem(&power).unwrap();
        if r.is_negative() {
            q.dec().unwrap();
        }
        assert_eq!(shifted, q, "{a} >> {n}");
    }
}

#[test]
fn test_bitwise_identities() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let b = random_big(&mut rng);
        // a ^ b == (a | b) - (a & b)
        let xor = a.checked_xor(&b).unwrap();
        let or = a.checked_or(&b).unwrap();
        let and = a.checked_and(&b).unwrap();
        assert_eq!(xor, or.checked_sub(&and).unwrap());
        // !a == -a - 1
        let mut expected = a.checked_neg().unwrap();
        expected.dec().unwrap();
        assert_eq!(a.checked_complement().unwrap(), expected);
    }
}

#[test]
fn test_decimal_round_trip() {
    let mut rng = rng();
    for _ in 0..ROUNDS {
        let a = random_big(&mut rng);
        let parsed: BigInt = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
    }
}

#[test]
fn test_word_boundary_addition() {
    let sum = BigInt::from(4294967295u32)
        .checked_add(&BigInt::from(1u32))
        .unwrap();
    assert_eq!(sum.limbs(), &[0, 1]);
    assert!(!sum.is_negative());
}

#[test]
fn test_domain_errors() {
    let a = BigInt::from(10u32);
    assert_eq!(a.checked_rem(&BigInt::zero()).unwrap_err(), BigIntError::DivisionByZero);
    assert_eq!(a.checked_mod(&BigInt::zero()).unwrap_err(), BigIntError::DivisionByZero);
    assert_eq!(a.checked_shl(&BigInt::zero()).unwrap_err(), BigIntError::InvalidShift);
    assert_eq!(
        a.checked_ushr(&BigInt::from(-3i32)).unwrap_err(),
        BigIntError::InvalidShift
    );
}
