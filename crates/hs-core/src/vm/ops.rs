//! Arithmetic and comparison semantics shared by the handlers

use crate::value::Value;
use crate::{VmError, VmResult};
use hs_bytecode::Opcode;
use std::cmp::Ordering;

/// Binary integer operation with wrapping two's-complement results
pub(crate) fn int_binary(op: Opcode, a: i32, b: i32) -> VmResult<i32> {
    Ok(match op {
        Opcode::IntAdd => a.wrapping_add(b),
        Opcode::IntSub => a.wrapping_sub(b),
        Opcode::IntMul => a.wrapping_mul(b),
        Opcode::IntDiv => {
            if b == 0 {
                return Err(VmError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        Opcode::IntRem => {
            if b == 0 {
                return Err(VmError::DivisionByZero);
            }
            a.wrapping_rem(b)
        }
        Opcode::IntMod => {
            if b == 0 {
                return Err(VmError::DivisionByZero);
            }
            let r = a.wrapping_rem(b);
            if r != 0 && (r < 0) != (b < 0) {
                r.wrapping_add(b)
            } else {
                r
            }
        }
        Opcode::IntShl | Opcode::IntLsl => {
            let n = shift_count(b)?;
            if n >= 32 {
                0
            } else {
                a.wrapping_shl(n)
            }
        }
        Opcode::IntShr => {
            let n = shift_count(b)?;
            a >> n.min(31)
        }
        Opcode::IntLsr => {
            let n = shift_count(b)?;
            if n >= 32 {
                0
            } else {
                ((a as u32) >> n) as i32
            }
        }
        Opcode::IntAnd => a & b,
        Opcode::IntOr => a | b,
        Opcode::IntXor => a ^ b,
        Opcode::IntCmp => a.cmp(&b) as i32,
        Opcode::IntPow => {
            if b < 0 {
                return Err(VmError::NegativeExponent(b));
            }
            a.wrapping_pow(b as u32)
        }
        _ => return Err(unexpected(op)),
    })
}

fn shift_count(b: i32) -> VmResult<u32> {
    u32::try_from(b).map_err(|_| VmError::NegativeShift(b))
}

/// Binary float operation
pub(crate) fn float_binary(op: Opcode, a: f32, b: f32) -> VmResult<Value> {
    Ok(match op {
        Opcode::FloatAdd => Value::Float(a + b),
        Opcode::FloatSub => Value::Float(a - b),
        Opcode::FloatMul => Value::Float(a * b),
        Opcode::FloatDiv => Value::Float(a / b),
        Opcode::FloatPow => Value::Float(a.powf(b)),
        Opcode::FloatAtan2 => Value::Float(a.atan2(b)),
        Opcode::FloatCmp => Value::Int(a.total_cmp(&b) as i32),
        _ => return Err(unexpected(op)),
    })
}

/// Unary float operation
pub(crate) fn float_unary(op: Opcode, a: f32) -> VmResult<f32> {
    Ok(match op {
        Opcode::FloatSqrt => a.sqrt(),
        Opcode::FloatExp => a.exp(),
        Opcode::FloatLog2 => a.log2(),
        Opcode::FloatLog => a.log10(),
        Opcode::FloatLn => a.ln(),
        Opcode::FloatSin => a.sin(),
        Opcode::FloatCos => a.cos(),
        Opcode::FloatTan => a.tan(),
        Opcode::FloatAsin => a.asin(),
        Opcode::FloatAcos => a.acos(),
        Opcode::FloatAtan => a.atan(),
        Opcode::FloatNeg => -a,
        _ => return Err(unexpected(op)),
    })
}

/// Binary boolean operation
pub(crate) fn bool_binary(op: Opcode, a: bool, b: bool) -> VmResult<Value> {
    Ok(match op {
        Opcode::BoolAnd => Value::Bool(a && b),
        Opcode::BoolOr => Value::Bool(a || b),
        Opcode::BoolXor => Value::Bool(a ^ b),
        Opcode::BoolCmp => Value::Int(a.cmp(&b) as i32),
        _ => return Err(unexpected(op)),
    })
}

fn unexpected(op: Opcode) -> VmError {
    VmError::TypeError(format!("{} is not handled here", op.name()))
}

/// Outcome of comparing two register values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    /// Both numeric (or both bool) and ordered
    Ordered(Ordering),
    /// Numeric, but a NaN is involved
    Unordered,
    /// No ordering between these types
    Incomparable,
}

/// Compare ints, floats and bools numerically
pub(crate) fn compare(a: Value, b: Value) -> Comparison {
    let ordering = match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(&y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(&y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(&y),
        (Value::Int(x), Value::Float(y)) => (x as f32).partial_cmp(&y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(y as f32)),
        (Value::Bool(x), Value::Int(y)) => (x as i32).partial_cmp(&y),
        (Value::Int(x), Value::Bool(y)) => x.partial_cmp(&(y as i32)),
        _ => return Comparison::Incomparable,
    };
    match ordering {
        Some(o) => Comparison::Ordered(o),
        None => Comparison::Unordered,
    }
}

/// Evaluate the condition of a conditional jump
///
/// `op` is any of the register, zero or indirect-zero jump families. Values
/// without an ordering only support equality tests, which fall back to
/// identity.
pub(crate) fn jump_condition(op: Opcode, a: Value, b: Value) -> VmResult<bool> {
    use Opcode::*;

    let is_eq = matches!(op, JumpEqReg | JumpEqZero | JumpEqZeroIndirect);
    let is_ne = matches!(op, JumpNeReg | JumpNeZero | JumpNeZeroIndirect);

    match compare(a, b) {
        Comparison::Ordered(o) => Ok(match op {
            JumpEqReg | JumpEqZero | JumpEqZeroIndirect => o == Ordering::Equal,
            JumpNeReg | JumpNeZero | JumpNeZeroIndirect => o != Ordering::Equal,
            JumpLtReg | JumpLtZero | JumpLtZeroIndirect => o == Ordering::Less,
            JumpLeReg | JumpLeZero | JumpLeZeroIndirect => o != Ordering::Greater,
            JumpGtReg | JumpGtZero | JumpGtZeroIndirect => o == Ordering::Greater,
            JumpGeReg | JumpGeZero | JumpGeZeroIndirect => o != Ordering::Less,
            _ => return Err(unexpected(op)),
        }),
        Comparison::Unordered => Ok(is_ne),
        Comparison::Incomparable if is_eq => Ok(a == b),
        Comparison::Incomparable if is_ne => Ok(a != b),
        Comparison::Incomparable => Err(VmError::TypeError(format!(
            "{} cannot order {} and {}",
            op.name(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Saturating float to int conversion; NaN becomes 0
pub(crate) fn float_to_int(f: f32) -> i32 {
    f as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_wrapping() {
        assert_eq!(int_binary(Opcode::IntAdd, i32::MAX, 1).unwrap(), i32::MIN);
        assert_eq!(int_binary(Opcode::IntMul, 1 << 16, 1 << 16).unwrap(), 0);
        assert_eq!(int_binary(Opcode::IntDiv, i32::MIN, -1).unwrap(), i32::MIN);
        assert_eq!(int_binary(Opcode::IntPow, 3, 4).unwrap(), 81);
    }

    #[test]
    fn test_int_division_family() {
        assert_eq!(int_binary(Opcode::IntDiv, -7, 2).unwrap(), -3);
        assert_eq!(int_binary(Opcode::IntRem, -7, 2).unwrap(), -1);
        assert_eq!(int_binary(Opcode::IntMod, -7, 2).unwrap(), 1);
        assert_eq!(int_binary(Opcode::IntMod, 7, -2).unwrap(), -1);
        assert_eq!(int_binary(Opcode::IntMod, 6, -3).unwrap(), 0);
        for op in [Opcode::IntDiv, Opcode::IntRem, Opcode::IntMod] {
            assert!(matches!(int_binary(op, 1, 0), Err(VmError::DivisionByZero)));
        }
    }

    #[test]
    fn test_shifts() {
        assert_eq!(int_binary(Opcode::IntShl, 1, 4).unwrap(), 16);
        assert_eq!(int_binary(Opcode::IntShl, 1, 40).unwrap(), 0);
        assert_eq!(int_binary(Opcode::IntShr, -16, 2).unwrap(), -4);
        assert_eq!(int_binary(Opcode::IntShr, -16, 99).unwrap(), -1);
        assert_eq!(int_binary(Opcode::IntShr, 16, 99).unwrap(), 0);
        assert_eq!(int_binary(Opcode::IntLsr, -1, 28).unwrap(), 0xF);
        assert_eq!(int_binary(Opcode::IntLsr, -1, 32).unwrap(), 0);
        assert!(matches!(
            int_binary(Opcode::IntShl, 1, -1),
            Err(VmError::NegativeShift(-1))
        ));
        assert!(matches!(
            int_binary(Opcode::IntPow, 2, -1),
            Err(VmError::NegativeExponent(-1))
        ));
    }

    #[test]
    fn test_float_ops() {
        assert_eq!(
            float_binary(Opcode::FloatCmp, 1.0, 2.0).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            float_binary(Opcode::FloatDiv, 1.0, 0.0).unwrap(),
            Value::Float(f32::INFINITY)
        );
        assert_eq!(float_unary(Opcode::FloatSqrt, 9.0).unwrap(), 3.0);
        assert_eq!(float_to_int(f32::NAN), 0);
        assert_eq!(float_to_int(1e20), i32::MAX);
        assert_eq!(float_to_int(-2.9), -2);
    }

    #[test]
    fn test_jump_conditions() {
        assert!(jump_condition(Opcode::JumpLtReg, Value::Int(1), Value::Int(2)).unwrap());
        assert!(jump_condition(Opcode::JumpGeZero, Value::Float(0.0), Value::Int(0)).unwrap());
        assert!(jump_condition(Opcode::JumpEqZero, Value::Bool(false), Value::Int(0)).unwrap());
        assert!(!jump_condition(Opcode::JumpEqReg, Value::Float(f32::NAN), Value::Float(f32::NAN)).unwrap());
        assert!(jump_condition(Opcode::JumpNeReg, Value::Float(f32::NAN), Value::Int(1)).unwrap());
        assert!(jump_condition(Opcode::JumpEqReg, Value::Null, Value::Null).unwrap());
        assert!(jump_condition(Opcode::JumpNeZero, Value::Null, Value::Int(0)).unwrap());
        assert!(matches!(
            jump_condition(Opcode::JumpLtReg, Value::Null, Value::Int(0)),
            Err(VmError::TypeError(_))
        ));
    }
}
