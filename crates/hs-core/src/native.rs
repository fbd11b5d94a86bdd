//! Host functions callable from bytecode
//!
//! A native is a plain function taking a [`NativeContext`]. Natives are
//! registered by name; a module refers to one through a `native` constant,
//! which `LOAD_LOCAL_CONST` resolves to a [`Value::Native`] handle.

use crate::heap::{Heap, HeapError, HeapObject};
use crate::value::{NativeId, Value};
use hs_bigint::{BigInt, BigIntError};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::io::Write;

/// Native function errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// Type mismatch on an argument
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: &'static str,
        /// Actual type name
        got: &'static str,
    },

    /// Wrong number of arguments
    #[error("Expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Required argument count
        expected: usize,
        /// Received argument count
        got: usize,
    },

    /// Invalid argument
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Heap failure
    #[error(transparent)]
    Heap(#[from] HeapError),

    /// Bignum failure
    #[error(transparent)]
    BigInt(#[from] BigIntError),

    /// Output failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Signature of a host function
pub type NativeFn = fn(&mut NativeContext<'_>) -> Result<Value, NativeError>;

/// What a native sees of the VM
pub struct NativeContext<'a> {
    /// The VM heap
    pub heap: &'a mut Heap,
    /// Receiver of the call
    pub this: Value,
    /// Call arguments
    pub args: &'a [Value],
    /// Standard output sink of the VM
    pub output: &'a mut dyn Write,
}

impl<'a> NativeContext<'a> {
    /// Argument `index`
    pub fn arg(&self, index: usize) -> Result<Value, NativeError> {
        self.args.get(index).copied().ok_or(NativeError::ArgumentCount {
            expected: index + 1,
            got: self.args.len(),
        })
    }

    /// Fail unless exactly `count` arguments were passed
    pub fn expect_args(&self, count: usize) -> Result<(), NativeError> {
        if self.args.len() != count {
            return Err(NativeError::ArgumentCount {
                expected: count,
                got: self.args.len(),
            });
        }
        Ok(())
    }

    /// Argument `index` as a register integer
    pub fn int_arg(&self, index: usize) -> Result<i32, NativeError> {
        let v = self.arg(index)?;
        v.as_int().ok_or(NativeError::TypeMismatch {
            expected: "int",
            got: v.type_name(),
        })
    }

    /// Argument `index` as a bignum, widening register integers
    pub fn bigint_arg(&self, index: usize) -> Result<BigInt, NativeError> {
        match self.arg(index)? {
            Value::Int(i) => Ok(BigInt::from(i)),
            Value::Object(r) => match self.heap.get(r)? {
                HeapObject::BigInt(n) => Ok(n.try_clone()?),
                other => Err(NativeError::TypeMismatch {
                    expected: "bigint",
                    got: other.type_name(),
                }),
            },
            other => Err(NativeError::TypeMismatch {
                expected: "bigint",
                got: other.type_name(),
            }),
        }
    }

    /// Argument `index` as a string slice
    pub fn str_arg(&self, index: usize) -> Result<&str, NativeError> {
        match self.arg(index)? {
            Value::Object(r) => match self.heap.get(r)? {
                HeapObject::Str(s) => Ok(s.as_str()),
                other => Err(NativeError::TypeMismatch {
                    expected: "string",
                    got: other.type_name(),
                }),
            },
            other => Err(NativeError::TypeMismatch {
                expected: "string",
                got: other.type_name(),
            }),
        }
    }

    /// Allocate a heap object
    pub fn alloc(&mut self, object: HeapObject) -> Result<Value, NativeError> {
        Ok(Value::Object(self.heap.alloc(object)?))
    }
}

/// Name-indexed table of host functions
#[derive(Debug, Default, Clone)]
pub struct NativeRegistry {
    functions: Vec<(String, NativeFn)>,
    by_name: FxHashMap<String, NativeId>,
}

impl NativeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the standard natives
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }

    /// Register `function` under `name`, replacing any previous binding
    pub fn register(&mut self, name: impl Into<String>, function: NativeFn) -> NativeId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            self.functions[id.0 as usize].1 = function;
            return id;
        }
        let id = NativeId(self.functions.len() as u32);
        self.functions.push((name.clone(), function));
        self.by_name.insert(name, id);
        id
    }

    /// Look up a native by name
    pub fn lookup(&self, name: &str) -> Option<NativeId> {
        self.by_name.get(name).copied()
    }

    /// Name and function for a handle
    pub fn get(&self, id: NativeId) -> Option<(&str, NativeFn)> {
        self.functions
            .get(id.0 as usize)
            .map(|(name, f)| (name.as_str(), *f))
    }

    /// Number of registered natives
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if no natives are registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Standard natives: output, containers and bignum arithmetic
pub mod builtins {
    use super::*;

    /// Register every standard native
    pub fn register_all(registry: &mut NativeRegistry) {
        registry.register("print", print);
        registry.register("len", len);
        registry.register("list_new", list_new);
        registry.register("set_new", set_new);
        registry.register("map_new", map_new);
        registry.register("push", push);
        registry.register("pop", pop);
        registry.register("big", big);
        registry.register("big_add", big_add);
        registry.register("big_sub", big_sub);
        registry.register("big_mul", big_mul);
        registry.register("big_div", big_div);
        registry.register("big_rem", big_rem);
        registry.register("big_mod", big_mod);
        registry.register("big_and", big_and);
        registry.register("big_or", big_or);
        registry.register("big_xor", big_xor);
        registry.register("big_shl", big_shl);
        registry.register("big_shr", big_shr);
        registry.register("big_neg", big_neg);
        registry.register("big_cmp", big_cmp);
        registry.register("big_str", big_str);
    }

    /// Write the arguments separated by spaces, then a newline
    pub fn print(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        let line = ctx
            .args
            .iter()
            .map(|v| ctx.heap.render(*v))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(ctx.output, "{}", line).map_err(|e| NativeError::Io(e.to_string()))?;
        Ok(Value::Null)
    }

    /// Length of a string or container
    pub fn len(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(1)?;
        let n = match ctx.arg(0)? {
            Value::Object(r) => match ctx.heap.get(r)? {
                HeapObject::Str(s) => s.chars().count(),
                HeapObject::Array(v) => v.len(),
                HeapObject::List(v) => v.len(),
                HeapObject::Set(v) => v.len(),
                HeapObject::Map(v) => v.len(),
                HeapObject::Object(o) => o.fields.len(),
                other => {
                    return Err(NativeError::TypeMismatch {
                        expected: "container",
                        got: other.type_name(),
                    })
                }
            },
            other => {
                return Err(NativeError::TypeMismatch {
                    expected: "container",
                    got: other.type_name(),
                })
            }
        };
        i32::try_from(n)
            .map(Value::Int)
            .map_err(|_| NativeError::ArgumentError(format!("length {} does not fit", n)))
    }

    /// New empty list
    pub fn list_new(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.alloc(HeapObject::List(VecDeque::new()))
    }

    /// New empty set
    pub fn set_new(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.alloc(HeapObject::Set(FxHashSet::default()))
    }

    /// New empty map
    pub fn map_new(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.alloc(HeapObject::Map(FxHashMap::default()))
    }

    /// Append to an array or list, returning the new length
    pub fn push(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(2)?;
        let target = ctx.arg(0)?;
        let item = ctx.arg(1)?;
        let Value::Object(r) = target else {
            return Err(NativeError::TypeMismatch {
                expected: "array",
                got: target.type_name(),
            });
        };
        let len = match ctx.heap.get_mut(r)? {
            HeapObject::Array(v) => {
                v.push(item);
                v.len()
            }
            HeapObject::List(v) => {
                v.push_back(item);
                v.len()
            }
            other => {
                return Err(NativeError::TypeMismatch {
                    expected: "array",
                    got: other.type_name(),
                })
            }
        };
        Ok(Value::Int(len.min(i32::MAX as usize) as i32))
    }

    /// Remove the last element of an array or list, or null when empty
    pub fn pop(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(1)?;
        let target = ctx.arg(0)?;
        let Value::Object(r) = target else {
            return Err(NativeError::TypeMismatch {
                expected: "array",
                got: target.type_name(),
            });
        };
        let popped = match ctx.heap.get_mut(r)? {
            HeapObject::Array(v) => v.pop(),
            HeapObject::List(v) => v.pop_back(),
            other => {
                return Err(NativeError::TypeMismatch {
                    expected: "array",
                    got: other.type_name(),
                })
            }
        };
        Ok(popped.unwrap_or_default())
    }

    /// Bignum from an int or a decimal string
    pub fn big(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(1)?;
        let n = match ctx.arg(0)? {
            Value::Object(r) if matches!(ctx.heap.get(r)?, HeapObject::Str(_)) => {
                ctx.str_arg(0)?.parse::<BigInt>()?
            }
            _ => ctx.bigint_arg(0)?,
        };
        ctx.alloc(HeapObject::BigInt(n))
    }

    macro_rules! big_binary {
        ($($name:ident => $method:ident;)*) => {
            $(
                #[doc = concat!("Bignum `", stringify!($method), "` of two arguments")]
                pub fn $name(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
                    ctx.expect_args(2)?;
                    let a = ctx.bigint_arg(0)?;
                    let b = ctx.bigint_arg(1)?;
                    let result = a.$method(&b)?;
                    ctx.alloc(HeapObject::BigInt(result))
                }
            )*
        };
    }

    big_binary! {
        big_add => checked_add;
        big_sub => checked_sub;
        big_mul => checked_mul;
        big_div => checked_div;
        big_rem => checked_rem;
        big_mod => checked_mod;
        big_and => checked_and;
        big_or => checked_or;
        big_xor => checked_xor;
    }

    /// Bignum left shift by an int count
    pub fn big_shl(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(2)?;
        let a = ctx.bigint_arg(0)?;
        let count = BigInt::from(ctx.int_arg(1)?);
        ctx.alloc(HeapObject::BigInt(a.checked_shl(&count)?))
    }

    /// Bignum arithmetic right shift by an int count
    pub fn big_shr(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(2)?;
        let a = ctx.bigint_arg(0)?;
        let count = BigInt::from(ctx.int_arg(1)?);
        ctx.alloc(HeapObject::BigInt(a.checked_shr(&count)?))
    }

    /// Bignum negation
    pub fn big_neg(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(1)?;
        let a = ctx.bigint_arg(0)?;
        ctx.alloc(HeapObject::BigInt(a.checked_neg()?))
    }

    /// Three-way bignum comparison as -1, 0 or 1
    pub fn big_cmp(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(2)?;
        let a = ctx.bigint_arg(0)?;
        let b = ctx.bigint_arg(1)?;
        Ok(Value::Int(a.compare(&b) as i32))
    }

    /// Decimal string of a bignum
    pub fn big_str(ctx: &mut NativeContext<'_>) -> Result<Value, NativeError> {
        ctx.expect_args(1)?;
        let a = ctx.bigint_arg(0)?;
        ctx.alloc(HeapObject::Str(a.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        registry: &NativeRegistry,
        heap: &mut Heap,
        name: &str,
        args: &[Value],
    ) -> (Result<Value, NativeError>, String) {
        let (_, f) = registry.get(registry.lookup(name).unwrap()).unwrap();
        let mut out = Vec::new();
        let mut ctx = NativeContext {
            heap,
            this: Value::Null,
            args,
            output: &mut out,
        };
        let result = f(&mut ctx);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_register_and_lookup() {
        fn answer(_: &mut NativeContext<'_>) -> Result<Value, NativeError> {
            Ok(Value::Int(42))
        }
        let mut registry = NativeRegistry::new();
        let id = registry.register("answer", answer);
        assert_eq!(registry.lookup("answer"), Some(id));
        assert_eq!(registry.register("answer", answer), id);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_print_renders_heap_values() {
        let registry = NativeRegistry::with_builtins();
        let mut heap = Heap::new();
        let s = heap.alloc(HeapObject::Str("total".into())).unwrap();
        let (result, out) = call(
            &registry,
            &mut heap,
            "print",
            &[Value::Object(s), Value::Int(3)],
        );
        assert_eq!(result, Ok(Value::Null));
        assert_eq!(out, "total 3\n");
    }

    #[test]
    fn test_bignum_natives() {
        let registry = NativeRegistry::with_builtins();
        let mut heap = Heap::new();
        let (max, _) = call(&registry, &mut heap, "big", &[Value::Int(i32::MAX)]);
        let max = max.unwrap();
        let (sum, _) = call(&registry, &mut heap, "big_add", &[max, Value::Int(1)]);
        let (text, _) = call(&registry, &mut heap, "big_str", &[sum.unwrap()]);
        assert_eq!(heap.render(text.unwrap()), "2147483648");

        let (cmp, _) = call(&registry, &mut heap, "big_cmp", &[Value::Int(1), max]);
        assert_eq!(cmp, Ok(Value::Int(-1)));

        let (err, _) = call(&registry, &mut heap, "big_div", &[max, Value::Int(0)]);
        assert_eq!(err, Err(NativeError::BigInt(BigIntError::DivisionByZero)));
    }

    #[test]
    fn test_container_natives() {
        let registry = NativeRegistry::with_builtins();
        let mut heap = Heap::new();
        let (list, _) = call(&registry, &mut heap, "list_new", &[]);
        let list = list.unwrap();
        call(&registry, &mut heap, "push", &[list, Value::Int(1)]).0.unwrap();
        let (n, _) = call(&registry, &mut heap, "push", &[list, Value::Int(2)]);
        assert_eq!(n, Ok(Value::Int(2)));
        assert_eq!(call(&registry, &mut heap, "pop", &[list]).0, Ok(Value::Int(2)));
        assert_eq!(call(&registry, &mut heap, "len", &[list]).0, Ok(Value::Int(1)));
        assert!(matches!(
            call(&registry, &mut heap, "len", &[Value::Int(1)]).0,
            Err(NativeError::TypeMismatch { .. })
        ));
    }
}
