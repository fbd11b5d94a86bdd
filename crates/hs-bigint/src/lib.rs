//! Arbitrary-precision integers for the Humming Script VM
//!
//! [`BigInt`] is a sign-magnitude integer stored as little-endian 32-bit
//! limbs. It backs integer values that no longer fit in the VM's fixed-width
//! `i32` register representation (see the `BOX_INT`/`UNBOX` opcodes).
//!
//! Operations come in two flavours:
//! - destructive `*_assign_big` / `negate` / `inc` style methods that mutate
//!   the receiver in place (on failure the receiver may be partially updated)
//! - non-destructive `checked_*` wrappers that copy the left operand first and
//!   leave both inputs untouched
//!
//! Bitwise operations and shifts follow infinite two's complement semantics on
//! the signed value, so `complement(x) == -x - 1` and arithmetic right shift
//! rounds toward negative infinity.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod arith;
mod bigint;
mod bits;
mod fmt;
mod mag;

pub use bigint::BigInt;

use thiserror::Error;

/// Errors reported by bignum operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BigIntError {
    /// `with_capacity(0)` was requested
    #[error("Bignum capacity must be at least one limb")]
    ZeroCapacity,

    /// The requested limb count overflows `usize`
    #[error("Bignum capacity overflow")]
    CapacityOverflow,

    /// The allocator refused to provide limb storage
    #[error("Failed to allocate {0} limbs")]
    AllocationFailed(usize),

    /// Division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Shift count is zero or negative
    #[error("Shift count must be positive")]
    InvalidShift,

    /// Shift count does not fit in a `u32`
    #[error("Shift count too large")]
    ShiftTooLarge,

    /// Malformed decimal literal
    #[error("Invalid integer literal: {0:?}")]
    Parse(String),
}

/// Result type for bignum operations
pub type BigIntResult<T> = Result<T, BigIntError>;
