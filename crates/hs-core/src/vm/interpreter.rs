//! Fetch-decode-execute loop and instruction handlers

use super::ops::{self, bool_binary, float_binary, float_unary, int_binary, jump_condition};
use super::Vm;
use crate::frame::Frame;
use crate::heap::{HeapObject, Object};
use crate::native::NativeContext;
use crate::sync::LockKey;
use crate::value::{NativeId, Value};
use crate::{VmError, VmResult};
use hs_bigint::BigInt;
use hs_bytecode::{Constant, Instruction, Module, Opcode, MAX_REGISTERS};
use tracing::{debug, trace, warn};

/// What the loop does after a handler returns
enum Flow {
    /// Fall through to `pc + 1`
    Next,
    /// Continue at an already validated target
    Jump(usize),
    /// Leave the frame with a result
    Return(Value),
}

impl Vm {
    pub(super) fn execute_frame(&mut self, frame: &mut Frame<'_>) -> VmResult<Value> {
        if frame.is_halted() {
            return Err(VmError::FrameHalted);
        }

        loop {
            match self.step(frame) {
                Ok(None) => {}
                Ok(Some(value)) => {
                    frame.halt();
                    return Ok(value);
                }
                Err(VmError::Thrown(value)) => {
                    if frame.unwind(value) {
                        trace!(pc = frame.pc(), "exception caught");
                        continue;
                    }
                    frame.halt();
                    return Err(VmError::Thrown(value));
                }
                Err(error) => {
                    if self.depth <= 1 {
                        warn!(pc = frame.pc(), opcode = frame.opcode(), %error, "fault");
                    } else {
                        debug!(pc = frame.pc(), %error, "fault unwinding frame");
                    }
                    frame.halt();
                    return Err(error);
                }
            }
        }
    }

    /// Execute one instruction; `Some` carries the frame's result
    fn step(&mut self, frame: &mut Frame<'_>) -> VmResult<Option<Value>> {
        if let Some(limit) = self.options.limits.max_steps {
            if self.steps >= limit {
                return Err(VmError::StepBudgetExceeded(limit));
            }
        }
        self.steps += 1;

        let pc = frame.pc();
        let word = frame.module().fetch(pc).ok_or(VmError::PcOutOfBounds(pc))?;
        let ins = Instruction::decode(word);
        frame.set_opcode(ins.opcode);
        let op = ins.op().ok_or(VmError::InvalidOpcode {
            opcode: ins.opcode,
            pc,
        })?;

        check_registers(&ins)?;

        if self.options.trace_instructions {
            trace!(pc, instruction = %ins, "dispatch");
        }

        match self.dispatch(frame, op, &ins)? {
            Flow::Next => frame.set_pc(pc + 1),
            Flow::Jump(target) => frame.set_pc(target),
            Flow::Return(value) => return Ok(Some(value)),
        }
        Ok(None)
    }

    fn dispatch(&mut self, frame: &mut Frame<'_>, op: Opcode, ins: &Instruction) -> VmResult<Flow> {
        let module = frame.module();
        let (a, b, c) = ins.regs();
        let imm = ins.imm() as usize;

        match op {
            // ===== Misc =====
            Opcode::Nop => {}
            Opcode::Breakpoint => {
                warn!(
                    pc = frame.pc(),
                    registers = ?frame.registers(),
                    stack_depth = frame.stack().len(),
                    "breakpoint"
                );
            }
            Opcode::Halt | Opcode::ReturnNull | Opcode::EndFunction => {
                return Ok(Flow::Return(Value::Null))
            }

            // ===== Loads =====
            Opcode::LoadNull => frame.set_reg(a, Value::Null)?,
            Opcode::LoadFalse => frame.set_reg(a, Value::Bool(false))?,
            Opcode::LoadTrue => frame.set_reg(a, Value::Bool(true))?,
            Opcode::LoadArg => frame.set_reg(a, frame.arg(imm)?)?,
            Opcode::LoadArgIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, frame.arg(index)?)?;
            }
            Opcode::LoadLocal => frame.set_reg(a, frame.load_local(imm))?,
            Opcode::LoadLocalIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, frame.load_local(index))?;
            }
            Opcode::LoadField => {
                let key = field_name(module, imm)?;
                let value = self.load_field(frame.this(), key)?;
                frame.set_reg(a, value)?;
            }
            Opcode::LoadFieldIndirect => {
                let key = self.string_key(frame.reg(c)?)?;
                let value = self.load_field(frame.reg(b)?, &key)?;
                frame.set_reg(a, value)?;
            }
            Opcode::LoadLocalConst => {
                let value = self.load_constant(module, imm)?;
                frame.set_reg(a, value)?;
            }
            Opcode::LoadLocalConstIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                let value = self.load_constant(module, index)?;
                frame.set_reg(a, value)?;
            }
            Opcode::LoadIntConst => frame.set_reg(a, Value::Int(ins.imm() as i16 as i32))?,

            // ===== Stores =====
            Opcode::StoreLocal => frame.store_local(imm, frame.reg(a)?)?,
            Opcode::StoreLocalIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                frame.store_local(index, frame.reg(a)?)?;
            }
            Opcode::StoreField => {
                let key = field_name(module, imm)?;
                self.store_field(frame.this(), key.to_string(), frame.reg(a)?)?;
            }
            Opcode::StoreFieldIndirect => {
                let key = self.string_key(frame.reg(b)?)?;
                self.store_field(frame.reg(a)?, key, frame.reg(c)?)?;
            }
            Opcode::Move => frame.set_reg(a, frame.reg(b)?)?,

            // ===== Value stack =====
            Opcode::StackPop => {
                let value = frame.pop()?;
                frame.set_reg(a, value)?;
            }
            Opcode::StackPush => frame.push(frame.reg(a)?)?,
            Opcode::StackPeek => frame.set_reg(a, frame.peek()?)?,
            Opcode::StackDup => frame.push(frame.peek()?)?,

            // ===== Jumps =====
            Opcode::Jump => return Ok(Flow::Jump(frame.check_target(imm as i64)?)),
            Opcode::JumpIndirect => return Ok(Flow::Jump(register_target(frame, a)?)),
            Opcode::JumpEqReg
            | Opcode::JumpNeReg
            | Opcode::JumpLtReg
            | Opcode::JumpLeReg
            | Opcode::JumpGtReg
            | Opcode::JumpGeReg => {
                if jump_condition(op, frame.reg(a)?, frame.reg(b)?)? {
                    return Ok(Flow::Jump(register_target(frame, c)?));
                }
            }
            Opcode::JumpEqZero
            | Opcode::JumpNeZero
            | Opcode::JumpLtZero
            | Opcode::JumpLeZero
            | Opcode::JumpGtZero
            | Opcode::JumpGeZero => {
                if jump_condition(op, frame.reg(a)?, Value::Int(0))? {
                    return Ok(Flow::Jump(frame.check_target(imm as i64)?));
                }
            }
            Opcode::JumpEqZeroIndirect
            | Opcode::JumpNeZeroIndirect
            | Opcode::JumpLtZeroIndirect
            | Opcode::JumpLeZeroIndirect
            | Opcode::JumpGtZeroIndirect
            | Opcode::JumpGeZeroIndirect => {
                if jump_condition(op, frame.reg(a)?, Value::Int(0))? {
                    return Ok(Flow::Jump(register_target(frame, b)?));
                }
            }

            // ===== Returns =====
            Opcode::Return => return Ok(Flow::Return(frame.reg(a)?)),
            Opcode::ReturnSelf => return Ok(Flow::Return(frame.this())),

            // ===== Calls =====
            Opcode::ReserveArgs => frame.reserve_args(imm)?,
            Opcode::ReserveArgsIndirect => {
                let count = index_operand(frame.reg(a)?, op)?;
                frame.reserve_args(count)?;
            }
            Opcode::SetArg => frame.set_arg(imm, frame.reg(a)?)?,
            Opcode::SetArgIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                frame.set_arg(index, frame.reg(a)?)?;
            }
            Opcode::Call => {
                let this = frame.this();
                let key = self.string_key(frame.reg(b)?)?;
                let callee = self.load_field(this, &key)?;
                if callee.is_null() {
                    return Err(VmError::TypeError(format!("no method '{}' on this", key)));
                }
                let args = frame.take_args();
                let result = self.invoke(frame, callee, this, args)?;
                frame.set_reg(a, result)?;
            }
            Opcode::LocalCall => {
                let callee = frame.reg(b)?;
                let args = frame.take_args();
                let result = self.invoke(frame, callee, Value::Null, args)?;
                frame.set_reg(a, result)?;
            }
            Opcode::DynamicCall => {
                let this = frame.reg(b)?;
                let callee = frame.reg(c)?;
                let args = frame.take_args();
                let result = self.invoke(frame, callee, this, args)?;
                frame.set_reg(a, result)?;
            }

            // ===== Frame context =====
            Opcode::SetThis => frame.set_this(frame.reg(a)?),
            Opcode::SetModule => frame.set_module_object(frame.reg(a)?),
            Opcode::GetThis => frame.set_reg(a, frame.this())?,
            Opcode::GetModule => frame.set_reg(a, frame.module_object())?,

            // ===== Booleans =====
            Opcode::BoolAnd | Opcode::BoolOr | Opcode::BoolXor | Opcode::BoolCmp => {
                let x = bool_operand(frame.reg(b)?, op)?;
                let y = bool_operand(frame.reg(c)?, op)?;
                frame.set_reg(a, bool_binary(op, x, y)?)?;
            }
            Opcode::BoolNot => {
                let x = bool_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Bool(!x))?;
            }

            // ===== Integers =====
            Opcode::IntAdd
            | Opcode::IntSub
            | Opcode::IntMul
            | Opcode::IntDiv
            | Opcode::IntMod
            | Opcode::IntRem
            | Opcode::IntShl
            | Opcode::IntShr
            | Opcode::IntLsl
            | Opcode::IntLsr
            | Opcode::IntAnd
            | Opcode::IntOr
            | Opcode::IntXor
            | Opcode::IntCmp
            | Opcode::IntPow => {
                let x = int_operand(frame.reg(b)?, op)?;
                let y = int_operand(frame.reg(c)?, op)?;
                frame.set_reg(a, Value::Int(int_binary(op, x, y)?))?;
            }
            Opcode::IntNeg => {
                let x = int_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Int(x.wrapping_neg()))?;
            }
            Opcode::IntCpl => {
                let x = int_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Int(!x))?;
            }
            Opcode::IntInc => {
                let x = int_operand(frame.reg(a)?, op)?;
                frame.set_reg(a, Value::Int(x.wrapping_add(1)))?;
            }
            Opcode::IntDec => {
                let x = int_operand(frame.reg(a)?, op)?;
                frame.set_reg(a, Value::Int(x.wrapping_sub(1)))?;
            }

            // ===== Floats =====
            Opcode::FloatAdd
            | Opcode::FloatSub
            | Opcode::FloatMul
            | Opcode::FloatDiv
            | Opcode::FloatPow
            | Opcode::FloatAtan2
            | Opcode::FloatCmp => {
                let x = float_operand(frame.reg(b)?, op)?;
                let y = float_operand(frame.reg(c)?, op)?;
                frame.set_reg(a, float_binary(op, x, y)?)?;
            }
            Opcode::FloatSqrt
            | Opcode::FloatExp
            | Opcode::FloatLog2
            | Opcode::FloatLog
            | Opcode::FloatLn
            | Opcode::FloatSin
            | Opcode::FloatCos
            | Opcode::FloatTan
            | Opcode::FloatAsin
            | Opcode::FloatAcos
            | Opcode::FloatAtan
            | Opcode::FloatNeg => {
                let x = float_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Float(float_unary(op, x)?))?;
            }
            Opcode::FloatInc => {
                let x = float_operand(frame.reg(a)?, op)?;
                frame.set_reg(a, Value::Float(x + 1.0))?;
            }
            Opcode::FloatDec => {
                let x = float_operand(frame.reg(a)?, op)?;
                frame.set_reg(a, Value::Float(x - 1.0))?;
            }

            // ===== Conversions =====
            Opcode::Bool2Int => {
                let x = bool_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Int(x as i32))?;
            }
            Opcode::Int2Bool => {
                let x = int_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Bool(x != 0))?;
            }
            Opcode::Int2Float => {
                let x = int_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Float(x as f32))?;
            }
            Opcode::Float2Int => {
                let x = float_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, Value::Int(ops::float_to_int(x)))?;
            }

            // ===== Objects =====
            Opcode::New => {
                let handle = self.heap.alloc(HeapObject::Object(Object::default()))?;
                frame.set_reg(a, Value::Object(handle))?;
            }
            Opcode::Extend => {
                let proto = match frame.reg(b)? {
                    Value::Object(h) if matches!(self.heap.get(h)?, HeapObject::Object(_)) => h,
                    other => return Err(type_mismatch(op, "object", other.type_name())),
                };
                let handle = self.heap.alloc(HeapObject::Object(Object {
                    prototype: Some(proto),
                    ..Object::default()
                }))?;
                frame.set_reg(a, Value::Object(handle))?;
            }

            // ===== Boxing =====
            Opcode::BoxBool => {
                let x = bool_operand(frame.reg(b)?, op)?;
                let handle = self.heap.alloc(HeapObject::Boxed(Value::Bool(x)))?;
                frame.set_reg(a, Value::Object(handle))?;
            }
            Opcode::BoxInt => {
                let x = int_operand(frame.reg(b)?, op)?;
                let handle = self.heap.alloc(HeapObject::BigInt(BigInt::from(x)))?;
                frame.set_reg(a, Value::Object(handle))?;
            }
            Opcode::BoxFloat => {
                let x = float_operand(frame.reg(b)?, op)?;
                let handle = self.heap.alloc(HeapObject::Boxed(Value::Float(x)))?;
                frame.set_reg(a, Value::Object(handle))?;
            }
            Opcode::Unbox => {
                let value = self.unbox(frame.reg(b)?)?;
                frame.set_reg(a, value)?;
            }

            // ===== Locks =====
            Opcode::Lock => {
                let key = self.lock_key(frame.reg(a)?)?;
                self.locks.lock(key, self.id, self.options.lock_timeout())?;
            }
            Opcode::Unlock => {
                let key = self.lock_key(frame.reg(a)?)?;
                self.locks.unlock(key, self.id)?;
            }

            // ===== Arrays =====
            Opcode::ArrayNew => {
                let array = self.new_array(imm)?;
                frame.set_reg(a, array)?;
            }
            Opcode::ArrayNewIndirect => {
                let len = index_operand(frame.reg(b)?, op)?;
                let array = self.new_array(len)?;
                frame.set_reg(a, array)?;
            }
            Opcode::ArrayGet => {
                let value = self.container_get(frame.reg(b)?, frame.reg(c)?)?;
                frame.set_reg(a, value)?;
            }
            Opcode::ArraySet => self.container_set(frame.reg(a)?, frame.reg(b)?, frame.reg(c)?)?,
            Opcode::ArrayDelete => self.container_delete(frame.reg(a)?, frame.reg(b)?)?,

            // ===== Exceptions =====
            Opcode::NewTryContext => {
                let finalizer = frame.check_target(imm as i64)?;
                frame.open_try(Some(finalizer));
            }
            Opcode::NewTryContextIndirect => {
                let finalizer = register_target(frame, a)?;
                frame.open_try(Some(finalizer));
            }
            Opcode::NewTryContextNoFinal => frame.open_try(None),
            Opcode::AddCatch => {
                let target = frame.check_target(imm as i64)?;
                frame.add_catch(a, target)?;
            }
            Opcode::AddCatchIndirect => {
                let target = register_target(frame, b)?;
                frame.add_catch(a, target)?;
            }
            Opcode::Throw => return Err(VmError::Thrown(frame.reg(a)?)),
            Opcode::EndTryContext => {
                if let Some(finalizer) = frame.end_try()? {
                    return Ok(Flow::Jump(finalizer));
                }
            }

            // ===== Functions =====
            Opcode::DeclareFunction => frame.set_reg(a, function_value(module, imm)?)?,
            Opcode::DeclareFunctionIndirect => {
                let index = index_operand(frame.reg(b)?, op)?;
                frame.set_reg(a, function_value(module, index)?)?;
            }
        }

        Ok(Flow::Next)
    }

    // ===== Calls =====

    fn invoke(
        &mut self,
        frame: &Frame<'_>,
        callee: Value,
        this: Value,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        match callee {
            Value::Function(index) => self.invoke_function(
                frame.module(),
                index as usize,
                this,
                frame.module_object(),
                args,
            ),
            Value::Int(index) if index >= 0 => self.invoke_function(
                frame.module(),
                index as usize,
                this,
                frame.module_object(),
                args,
            ),
            Value::Native(id) => self.invoke_native(id, this, &args),
            other => Err(VmError::NotCallable(other.type_name())),
        }
    }

    fn invoke_native(&mut self, id: NativeId, this: Value, args: &[Value]) -> VmResult<Value> {
        let (name, function) = self
            .natives
            .get(id)
            .ok_or_else(|| VmError::UnknownNative(format!("#{}", id.0)))?;
        trace!(native = name, args = args.len(), "native call");

        let mut ctx = NativeContext {
            heap: &mut self.heap,
            this,
            args,
            output: &mut *self.output,
        };
        function(&mut ctx).map_err(|source| VmError::Native {
            name: name.to_string(),
            source,
        })
    }

    // ===== Constants =====

    fn load_constant(&mut self, module: &Module, index: usize) -> VmResult<Value> {
        let constant = module
            .constants
            .get(index)
            .ok_or(VmError::InvalidConstant(index))?;
        Ok(match constant {
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Object(self.heap.alloc(HeapObject::Str(s.clone()))?),
            Constant::BigInt(n) => {
                Value::Object(self.heap.alloc(HeapObject::BigInt(n.try_clone()?))?)
            }
            Constant::Native(name) => Value::Native(
                self.natives
                    .lookup(name)
                    .ok_or_else(|| VmError::UnknownNative(name.clone()))?,
            ),
        })
    }

    // ===== Fields =====

    fn string_key(&self, key: Value) -> VmResult<String> {
        if let Value::Object(h) = key {
            if let HeapObject::Str(s) = self.heap.get(h)? {
                return Ok(s.clone());
            }
        }
        Err(VmError::TypeError(format!(
            "field key must be a string, got {}",
            self.describe(key)
        )))
    }

    fn load_field(&self, target: Value, key: &str) -> VmResult<Value> {
        match target {
            Value::Object(h) if matches!(self.heap.get(h)?, HeapObject::Object(_)) => {
                Ok(self.heap.get_field(h, key)?.unwrap_or_default())
            }
            other => Err(VmError::TypeError(format!(
                "cannot read field '{}' of {}",
                key,
                self.describe(other)
            ))),
        }
    }

    fn store_field(&mut self, target: Value, key: String, value: Value) -> VmResult<()> {
        if let Value::Object(h) = target {
            if let HeapObject::Object(obj) = self.heap.get_mut(h)? {
                obj.fields.insert(key, value);
                return Ok(());
            }
        }
        Err(VmError::TypeError(format!(
            "cannot write field '{}' of {}",
            key,
            self.describe(target)
        )))
    }

    fn describe(&self, value: Value) -> &'static str {
        match value {
            Value::Object(h) => self.heap.get(h).map(|o| o.type_name()).unwrap_or("object"),
            other => other.type_name(),
        }
    }

    // ===== Boxing and locks =====

    fn unbox(&self, value: Value) -> VmResult<Value> {
        if let Value::Object(h) = value {
            match self.heap.get(h)? {
                HeapObject::Boxed(inner) => return Ok(*inner),
                HeapObject::BigInt(n) => {
                    return n.to_i32().map(Value::Int).ok_or(VmError::IntegerOverflow)
                }
                _ => {}
            }
        }
        Err(type_mismatch(Opcode::Unbox, "boxed value", self.describe(value)))
    }

    fn lock_key(&self, value: Value) -> VmResult<LockKey> {
        match value {
            Value::Int(handle) => Ok(LockKey::Handle(handle)),
            Value::Object(h) => {
                self.heap.get(h)?;
                Ok(LockKey::Object(self.id, h))
            }
            other => Err(type_mismatch(Opcode::Lock, "int or object", other.type_name())),
        }
    }

    // ===== Containers =====

    fn new_array(&mut self, len: usize) -> VmResult<Value> {
        if len > self.options.limits.max_array_len {
            return Err(VmError::ArrayTooLarge(len));
        }
        let mut items = Vec::new();
        items
            .try_reserve_exact(len)
            .map_err(|_| VmError::AllocationFailed)?;
        items.resize(len, Value::Null);
        Ok(Value::Object(self.heap.alloc(HeapObject::Array(items))?))
    }

    fn container_get(&self, container: Value, key: Value) -> VmResult<Value> {
        let h = container_handle(container, Opcode::ArrayGet)?;
        match self.heap.get(h)? {
            HeapObject::Array(items) => Ok(items[element_index(key, items.len())?]),
            HeapObject::List(items) => Ok(items[element_index(key, items.len())?]),
            HeapObject::Map(entries) => Ok(entries.get(&key).copied().unwrap_or_default()),
            HeapObject::Set(items) => Ok(Value::Bool(items.contains(&key))),
            other => Err(type_mismatch(Opcode::ArrayGet, "container", other.type_name())),
        }
    }

    fn container_set(&mut self, container: Value, key: Value, value: Value) -> VmResult<()> {
        let h = container_handle(container, Opcode::ArraySet)?;
        let max_len = self.options.limits.max_array_len;
        match self.heap.get_mut(h)? {
            HeapObject::Array(items) => {
                if key.as_int() == Some(items.len() as i32) && items.len() < max_len {
                    items.try_reserve(1).map_err(|_| VmError::AllocationFailed)?;
                    items.push(value);
                } else {
                    let i = element_index(key, items.len())?;
                    items[i] = value;
                }
            }
            HeapObject::List(items) => {
                if key.as_int() == Some(items.len() as i32) && items.len() < max_len {
                    items.try_reserve(1).map_err(|_| VmError::AllocationFailed)?;
                    items.push_back(value);
                } else {
                    let i = element_index(key, items.len())?;
                    items[i] = value;
                }
            }
            HeapObject::Map(entries) => {
                entries.insert(key, value);
            }
            HeapObject::Set(items) => {
                if value.is_truthy() {
                    items.insert(key);
                } else {
                    items.remove(&key);
                }
            }
            other => {
                return Err(type_mismatch(Opcode::ArraySet, "container", other.type_name()))
            }
        }
        Ok(())
    }

    fn container_delete(&mut self, container: Value, key: Value) -> VmResult<()> {
        let h = container_handle(container, Opcode::ArrayDelete)?;
        match self.heap.get_mut(h)? {
            HeapObject::Array(items) => {
                let i = element_index(key, items.len())?;
                items.remove(i);
            }
            HeapObject::List(items) => {
                let i = element_index(key, items.len())?;
                items.remove(i);
            }
            HeapObject::Map(entries) => {
                entries.remove(&key);
            }
            HeapObject::Set(items) => {
                items.remove(&key);
            }
            other => {
                return Err(type_mismatch(Opcode::ArrayDelete, "container", other.type_name()))
            }
        }
        Ok(())
    }
}

// ===== Operand helpers =====

/// Every register operand must be in range before a handler runs
fn check_registers(ins: &Instruction) -> VmResult<()> {
    // absent operands decode as r0
    let (a, b, c) = ins.regs();
    match [a, b, c].into_iter().find(|&r| r as usize >= MAX_REGISTERS) {
        Some(r) => Err(VmError::InvalidRegister(r)),
        None => Ok(()),
    }
}

fn type_mismatch(op: Opcode, expected: &str, got: &str) -> VmError {
    VmError::TypeError(format!("{} expects {}, got {}", op.name(), expected, got))
}

fn int_operand(value: Value, op: Opcode) -> VmResult<i32> {
    value
        .as_int()
        .ok_or_else(|| type_mismatch(op, "int", value.type_name()))
}

fn float_operand(value: Value, op: Opcode) -> VmResult<f32> {
    value
        .as_float()
        .ok_or_else(|| type_mismatch(op, "float", value.type_name()))
}

fn bool_operand(value: Value, op: Opcode) -> VmResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| type_mismatch(op, "bool", value.type_name()))
}

/// Non-negative integer operand used as an index or count
fn index_operand(value: Value, op: Opcode) -> VmResult<usize> {
    let i = int_operand(value, op)?;
    usize::try_from(i).map_err(|_| VmError::IndexOutOfRange {
        index: i as i64,
        len: 0,
    })
}

fn register_target(frame: &Frame<'_>, reg: u8) -> VmResult<usize> {
    match frame.reg(reg)? {
        Value::Int(target) => frame.check_target(target as i64),
        other => Err(VmError::TypeError(format!(
            "jump target must be an int, got {}",
            other.type_name()
        ))),
    }
}

fn field_name(module: &Module, index: usize) -> VmResult<&str> {
    module
        .constants
        .get_str(index)
        .ok_or(VmError::InvalidConstant(index))
}

fn function_value(module: &Module, index: usize) -> VmResult<Value> {
    if index >= module.functions.len() {
        return Err(VmError::InvalidFunction(index));
    }
    u16::try_from(index)
        .map(Value::Function)
        .map_err(|_| VmError::InvalidFunction(index))
}

fn container_handle(value: Value, op: Opcode) -> VmResult<crate::heap::HeapRef> {
    value
        .as_object()
        .ok_or_else(|| type_mismatch(op, "container", value.type_name()))
}

fn element_index(key: Value, len: usize) -> VmResult<usize> {
    let Value::Int(i) = key else {
        return Err(VmError::TypeError(format!(
            "element index must be an int, got {}",
            key.type_name()
        )));
    };
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or(VmError::IndexOutOfRange {
            index: i as i64,
            len,
        })
}
