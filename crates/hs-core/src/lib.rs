//! Humming Script VM core
//!
//! This crate provides the runtime half of the Humming Script VM:
//! - [`Value`]: the tagged register value
//! - [`Heap`]: a generational arena of heap objects with mark/sweep reachability
//! - [`Frame`]: per-call registers, argument staging, value stack and scratch heap
//! - [`Vm`]: the fetch-decode-execute dispatcher and call protocol
//! - [`NativeRegistry`]: host functions callable from bytecode
//! - [`LockRegistry`]: the monitors behind `LOCK`/`UNLOCK`

#![warn(rust_2018_idioms)]

pub mod frame;
pub mod heap;
pub mod native;
pub mod options;
pub mod sync;
pub mod value;
pub mod vm;

pub use frame::{Frame, FrameState, TryContext};
pub use heap::{Heap, HeapError, HeapObject, HeapRef, Object};
pub use native::{NativeContext, NativeError, NativeFn, NativeRegistry};
pub use options::{ConfigError, ResourceLimits, VmOptions};
pub use sync::{LockError, LockKey, LockRegistry};
pub use value::{NativeId, Value};
pub use vm::{Vm, VmId};

use hs_bigint::BigIntError;

/// Coarse classification of a fault, reported to the embedding runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// Storage could not be obtained or a resource limit was hit
    Allocation,
    /// Arithmetic domain error (division by zero, bad shift or exponent)
    Domain,
    /// Invalid opcode, register, jump target or program counter
    Decode,
    /// The call stack budget is exhausted
    CallDepth,
    /// Any other execution error, including uncaught script exceptions
    Runtime,
}

/// VM execution errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    // ===== Decode =====
    /// Unassigned opcode byte
    #[error("Invalid opcode {opcode:#04x} at pc {pc}")]
    InvalidOpcode { opcode: u8, pc: usize },

    /// Register index outside the register file
    #[error("Invalid register r{0}")]
    InvalidRegister(u8),

    /// Program counter past the end of the code
    #[error("Program counter {0} is outside the code")]
    PcOutOfBounds(usize),

    /// Jump target outside the code
    #[error("Invalid jump target {0}")]
    InvalidJumpTarget(i64),

    /// Constant index out of range or of the wrong kind
    #[error("Invalid constant #{0}")]
    InvalidConstant(usize),

    /// Function index out of range
    #[error("Invalid function #{0}")]
    InvalidFunction(usize),

    /// The module failed structural validation
    #[error("Invalid module: {0}")]
    InvalidModule(String),

    // ===== Domain =====
    /// Integer division, remainder or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Negative shift count
    #[error("Negative shift count {0}")]
    NegativeShift(i32),

    /// Negative exponent for integer power
    #[error("Negative exponent {0}")]
    NegativeExponent(i32),

    /// A bignum does not fit in a register integer
    #[error("Integer overflow while unboxing")]
    IntegerOverflow,

    /// Bignum engine error
    #[error("Bignum error: {0}")]
    BigInt(#[from] BigIntError),

    // ===== Allocation =====
    /// Heap error
    #[error("Heap error: {0}")]
    Heap(#[from] HeapError),

    /// Value stack limit reached
    #[error("Stack overflow")]
    StackOverflow,

    /// Scratch heap slot beyond the configured limit
    #[error("Scratch slot {0} exceeds the configured limit")]
    ScratchLimitExceeded(usize),

    /// Array length beyond the configured limit
    #[error("Array length {0} exceeds the configured limit")]
    ArrayTooLarge(usize),

    /// Frame storage could not be allocated
    #[error("Failed to allocate frame storage")]
    AllocationFailed,

    // ===== Call depth =====
    /// Too many nested calls
    #[error("Call depth limit {0} exceeded")]
    CallDepthExceeded(usize),

    // ===== Runtime =====
    /// Pop or peek on an empty value stack
    #[error("Stack underflow")]
    StackUnderflow,

    /// More argument slots reserved than the staging buffer holds
    #[error("Cannot reserve {0} argument slots")]
    TooManyArguments(usize),

    /// Argument index outside the reserved or received range
    #[error("Argument index {0} out of range")]
    ArgumentIndexOutOfRange(usize),

    /// Container index out of range
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// Operand of the wrong type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Callee is neither a function nor a native
    #[error("Value of type {0} is not callable")]
    NotCallable(&'static str),

    /// Native constant names an unregistered host function
    #[error("Unknown native function '{0}'")]
    UnknownNative(String),

    /// A host function failed
    #[error("Native function '{name}' failed: {source}")]
    Native {
        name: String,
        source: native::NativeError,
    },

    /// `ADD_CATCH` or `END_TRY_CONTEXT` without an open try context
    #[error("No open try context")]
    NoTryContext,

    /// Lock misuse
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Instruction budget exhausted
    #[error("Step budget of {0} instructions exhausted")]
    StepBudgetExceeded(u64),

    /// The frame already returned or faulted
    #[error("Frame has already halted")]
    FrameHalted,

    /// No `main` function and no code to run
    #[error("Module has no entry point")]
    NoEntryPoint,

    /// Named function not present in the module
    #[error("Function '{0}' not found")]
    FunctionNotFound(String),

    /// Script exception that no try context caught
    #[error("Uncaught exception: {0}")]
    Thrown(Value),
}

impl VmError {
    /// Fault category surfaced to the embedding runtime
    pub fn category(&self) -> FaultCategory {
        match self {
            VmError::InvalidOpcode { .. }
            | VmError::InvalidRegister(_)
            | VmError::PcOutOfBounds(_)
            | VmError::InvalidJumpTarget(_)
            | VmError::InvalidConstant(_)
            | VmError::InvalidFunction(_)
            | VmError::InvalidModule(_) => FaultCategory::Decode,

            VmError::DivisionByZero
            | VmError::NegativeShift(_)
            | VmError::NegativeExponent(_)
            | VmError::IntegerOverflow => FaultCategory::Domain,

            VmError::BigInt(e) => match e {
                BigIntError::CapacityOverflow | BigIntError::AllocationFailed(_) => {
                    FaultCategory::Allocation
                }
                _ => FaultCategory::Domain,
            },

            VmError::Heap(HeapError::DanglingReference(_)) => FaultCategory::Runtime,
            VmError::Heap(_)
            | VmError::StackOverflow
            | VmError::ScratchLimitExceeded(_)
            | VmError::ArrayTooLarge(_)
            | VmError::AllocationFailed => FaultCategory::Allocation,

            VmError::CallDepthExceeded(_) => FaultCategory::CallDepth,

            _ => FaultCategory::Runtime,
        }
    }
}

/// VM result type
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_categories() {
        assert_eq!(
            VmError::InvalidOpcode { opcode: 0, pc: 0 }.category(),
            FaultCategory::Decode
        );
        assert_eq!(VmError::DivisionByZero.category(), FaultCategory::Domain);
        assert_eq!(
            VmError::BigInt(BigIntError::InvalidShift).category(),
            FaultCategory::Domain
        );
        assert_eq!(
            VmError::BigInt(BigIntError::AllocationFailed(8)).category(),
            FaultCategory::Allocation
        );
        assert_eq!(VmError::StackOverflow.category(), FaultCategory::Allocation);
        assert_eq!(VmError::CallDepthExceeded(4).category(), FaultCategory::CallDepth);
        assert_eq!(VmError::Thrown(Value::Int(1)).category(), FaultCategory::Runtime);
    }
}
