//! Call frames
//!
//! A [`Frame`] is the activation record of one function call. It owns:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ registers   r0 .. r7         │  operands of every instruction
//! │ outgoing    staged call args │  RESERVE_ARGS / SET_ARG
//! │ args        incoming args    │  LOAD_ARG
//! │ stack       value stack      │  STACK_PUSH / STACK_POP
//! │ scratch     local slots      │  LOAD_LOCAL / STORE_LOCAL
//! │ this, module, pc, opcode     │
//! │ try contexts                 │  NEW_TRY_CONTEXT / ADD_CATCH
//! └──────────────────────────────┘
//! ```
//!
//! Frames borrow the module they execute, so a frame can never outlive its
//! code. Once a frame halts it never runs again.

use crate::options::VmOptions;
use crate::value::Value;
use crate::{VmError, VmResult};
use hs_bytecode::{Module, MAX_ARGS, MAX_REGISTERS};

/// Lifecycle of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Executing instructions
    Running,
    /// Returned or faulted; terminal
    Halted,
}

/// A catch registered on a try context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchHandler {
    /// Register that receives the thrown value
    pub register: u8,
    /// Instruction to continue at
    pub target: usize,
}

/// An open try block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryContext {
    /// Instruction `END_TRY_CONTEXT` jumps to
    pub finalizer: Option<usize>,
    /// Catches in registration order
    pub catches: Vec<CatchHandler>,
    /// Value stack depth when the context opened
    pub stack_depth: usize,
}

/// Staging buffer for outgoing call arguments
#[derive(Debug, Clone, Default)]
struct ArgBuffer {
    slots: [Value; MAX_ARGS],
    reserved: usize,
}

impl ArgBuffer {
    fn reserve(&mut self, count: usize) -> VmResult<()> {
        if count > MAX_ARGS {
            return Err(VmError::TooManyArguments(count));
        }
        self.slots = Default::default();
        self.reserved = count;
        Ok(())
    }

    fn set(&mut self, index: usize, value: Value) -> VmResult<()> {
        if index >= self.reserved {
            return Err(VmError::ArgumentIndexOutOfRange(index));
        }
        self.slots[index] = value;
        Ok(())
    }

    fn take(&mut self) -> Vec<Value> {
        let args = self.slots[..self.reserved].to_vec();
        self.slots = Default::default();
        self.reserved = 0;
        args
    }
}

/// Activation record of one call
#[derive(Debug)]
pub struct Frame<'m> {
    module: &'m Module,
    registers: [Value; MAX_REGISTERS],
    outgoing: ArgBuffer,
    args: Vec<Value>,
    stack: Vec<Value>,
    max_stack: usize,
    scratch: Vec<Value>,
    max_scratch: usize,
    this: Value,
    module_object: Value,
    pc: usize,
    opcode: u8,
    state: FrameState,
    try_contexts: Vec<TryContext>,
}

impl<'m> Frame<'m> {
    /// Create a frame that starts executing `module` at `entry`
    ///
    /// Fails when the scratch heap's initial storage cannot be allocated.
    pub fn new(module: &'m Module, entry: usize, options: &VmOptions) -> VmResult<Self> {
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(options.scratch_initial_capacity)
            .map_err(|_| VmError::AllocationFailed)?;

        Ok(Self {
            module,
            registers: [Value::Null; MAX_REGISTERS],
            outgoing: ArgBuffer::default(),
            args: Vec::new(),
            stack: Vec::new(),
            max_stack: options.limits.max_stack_depth,
            scratch,
            max_scratch: options.limits.max_scratch_slots,
            this: Value::Null,
            module_object: Value::Null,
            pc: entry,
            opcode: 0,
            state: FrameState::Running,
            try_contexts: Vec::new(),
        })
    }

    /// Set the incoming arguments
    pub fn with_args(mut self, args: Vec<Value>) -> VmResult<Self> {
        if args.len() > MAX_ARGS {
            return Err(VmError::TooManyArguments(args.len()));
        }
        self.args = args;
        Ok(self)
    }

    /// Set the receiver
    pub fn with_this(mut self, this: Value) -> Self {
        self.this = this;
        self
    }

    /// Set the module object
    pub fn with_module_object(mut self, module_object: Value) -> Self {
        self.module_object = module_object;
        self
    }

    /// The module this frame executes
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Index of the next instruction to execute
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub(crate) fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    /// Opcode byte of the most recently fetched instruction
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub(crate) fn set_opcode(&mut self, opcode: u8) {
        self.opcode = opcode;
    }

    /// Current lifecycle state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Check if the frame has stopped
    pub fn is_halted(&self) -> bool {
        self.state == FrameState::Halted
    }

    pub(crate) fn halt(&mut self) {
        self.state = FrameState::Halted;
    }

    /// Validate a jump target; `len` itself is allowed and halts on fetch
    pub fn check_target(&self, target: i64) -> VmResult<usize> {
        usize::try_from(target)
            .ok()
            .filter(|&t| t <= self.module.len())
            .ok_or(VmError::InvalidJumpTarget(target))
    }

    // ===== Registers =====

    /// Register file
    pub fn registers(&self) -> &[Value; MAX_REGISTERS] {
        &self.registers
    }

    /// Read a register
    #[inline]
    pub fn reg(&self, index: u8) -> VmResult<Value> {
        self.registers
            .get(index as usize)
            .copied()
            .ok_or(VmError::InvalidRegister(index))
    }

    /// Write a register
    #[inline]
    pub fn set_reg(&mut self, index: u8, value: Value) -> VmResult<()> {
        let slot = self
            .registers
            .get_mut(index as usize)
            .ok_or(VmError::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    // ===== Arguments =====

    /// Incoming arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Read an incoming argument
    pub fn arg(&self, index: usize) -> VmResult<Value> {
        self.args
            .get(index)
            .copied()
            .ok_or(VmError::ArgumentIndexOutOfRange(index))
    }

    /// Clear the staging buffer and reserve `count` slots
    pub fn reserve_args(&mut self, count: usize) -> VmResult<()> {
        self.outgoing.reserve(count)
    }

    /// Stage an outgoing argument
    pub fn set_arg(&mut self, index: usize, value: Value) -> VmResult<()> {
        self.outgoing.set(index, value)
    }

    /// Take the staged arguments, leaving the buffer empty
    pub fn take_args(&mut self) -> Vec<Value> {
        self.outgoing.take()
    }

    // ===== Context =====

    /// Receiver
    pub fn this(&self) -> Value {
        self.this
    }

    /// Replace the receiver
    pub fn set_this(&mut self, this: Value) {
        self.this = this;
    }

    /// Module object
    pub fn module_object(&self) -> Value {
        self.module_object
    }

    /// Replace the module object
    pub fn set_module_object(&mut self, value: Value) {
        self.module_object = value;
    }

    // ===== Value stack =====

    /// Value stack, bottom first
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Push onto the value stack
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= self.max_stack {
            return Err(VmError::StackOverflow);
        }
        self.stack
            .try_reserve(1)
            .map_err(|_| VmError::AllocationFailed)?;
        self.stack.push(value);
        Ok(())
    }

    /// Pop from the value stack
    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Top of the value stack
    pub fn peek(&self) -> VmResult<Value> {
        self.stack.last().copied().ok_or(VmError::StackUnderflow)
    }

    // ===== Scratch heap =====

    /// Scratch slots currently materialized
    pub fn scratch(&self) -> &[Value] {
        &self.scratch
    }

    /// Read a scratch slot; never-written slots read as null
    pub fn load_local(&self, index: usize) -> Value {
        self.scratch.get(index).copied().unwrap_or_default()
    }

    /// Write a scratch slot, growing the scratch heap as needed
    pub fn store_local(&mut self, index: usize, value: Value) -> VmResult<()> {
        if index >= self.max_scratch {
            return Err(VmError::ScratchLimitExceeded(index));
        }
        if index >= self.scratch.len() {
            let needed = index + 1;
            if needed > self.scratch.capacity() {
                let target = needed
                    .max(self.scratch.capacity().saturating_mul(2).saturating_add(1))
                    .min(self.max_scratch);
                self.scratch
                    .try_reserve_exact(target - self.scratch.len())
                    .map_err(|_| VmError::AllocationFailed)?;
            }
            self.scratch.resize(needed, Value::Null);
        }
        self.scratch[index] = value;
        Ok(())
    }

    // ===== Try contexts =====

    /// Open try contexts, innermost last
    pub fn try_contexts(&self) -> &[TryContext] {
        &self.try_contexts
    }

    /// Open a try context
    pub fn open_try(&mut self, finalizer: Option<usize>) {
        self.try_contexts.push(TryContext {
            finalizer,
            catches: Vec::new(),
            stack_depth: self.stack.len(),
        });
    }

    /// Register a catch on the innermost try context
    pub fn add_catch(&mut self, register: u8, target: usize) -> VmResult<()> {
        if register as usize >= MAX_REGISTERS {
            return Err(VmError::InvalidRegister(register));
        }
        let context = self.try_contexts.last_mut().ok_or(VmError::NoTryContext)?;
        context.catches.push(CatchHandler { register, target });
        Ok(())
    }

    /// Close the innermost try context, returning its finalizer
    pub fn end_try(&mut self) -> VmResult<Option<usize>> {
        self.try_contexts
            .pop()
            .map(|c| c.finalizer)
            .ok_or(VmError::NoTryContext)
    }

    /// Route a thrown value to the innermost context with a catch
    ///
    /// Contexts without a catch are discarded on the way out. Returns `false`
    /// when nothing in this frame handles the value.
    pub fn unwind(&mut self, thrown: Value) -> bool {
        while let Some(context) = self.try_contexts.pop() {
            let Some(handler) = context.catches.first().copied() else {
                continue;
            };
            self.stack.truncate(context.stack_depth);
            self.registers[handler.register as usize] = thrown;
            self.pc = handler.target;
            return true;
        }
        false
    }

    /// Every value this frame keeps alive
    pub fn roots(&self) -> impl Iterator<Item = Value> + '_ {
        self.registers
            .iter()
            .chain(self.outgoing.slots.iter())
            .chain(self.args.iter())
            .chain(self.stack.iter())
            .chain(self.scratch.iter())
            .copied()
            .chain([self.this, self.module_object])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ResourceLimits;

    fn module() -> Module {
        let mut module = Module::new("test");
        module.code = vec![0; 4];
        module
    }

    #[test]
    fn test_new_frame() {
        let m = module();
        let frame = Frame::new(&m, 2, &VmOptions::default()).unwrap();
        assert_eq!(frame.pc(), 2);
        assert_eq!(frame.state(), FrameState::Running);
        assert!(frame.registers().iter().all(Value::is_null));
        assert!(frame.scratch().is_empty());
    }

    #[test]
    fn test_register_bounds() {
        let m = module();
        let mut frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        frame.set_reg(7, Value::Int(1)).unwrap();
        assert_eq!(frame.reg(7).unwrap(), Value::Int(1));
        assert!(matches!(frame.reg(8), Err(VmError::InvalidRegister(8))));
        assert!(matches!(
            frame.set_reg(200, Value::Null),
            Err(VmError::InvalidRegister(200))
        ));
    }

    #[test]
    fn test_argument_staging() {
        let m = module();
        let mut frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        assert!(matches!(frame.reserve_args(4), Err(VmError::TooManyArguments(4))));
        frame.reserve_args(2).unwrap();
        frame.set_arg(1, Value::Int(9)).unwrap();
        assert!(matches!(
            frame.set_arg(2, Value::Null),
            Err(VmError::ArgumentIndexOutOfRange(2))
        ));
        assert_eq!(frame.take_args(), vec![Value::Null, Value::Int(9)]);
        assert!(frame.take_args().is_empty());
    }

    #[test]
    fn test_scratch_growth() {
        let m = module();
        let mut frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        assert_eq!(frame.load_local(100), Value::Null);
        frame.store_local(9, Value::Int(3)).unwrap();
        assert_eq!(frame.scratch().len(), 10);
        assert!(frame.scratch.capacity() >= 10);
        assert_eq!(frame.load_local(9), Value::Int(3));
        assert_eq!(frame.load_local(4), Value::Null);
    }

    #[test]
    fn test_scratch_limit() {
        let m = module();
        let mut options = VmOptions::default();
        options.limits = ResourceLimits {
            max_scratch_slots: 8,
            ..ResourceLimits::default()
        };
        let mut frame = Frame::new(&m, 0, &options).unwrap();
        frame.store_local(7, Value::Bool(true)).unwrap();
        assert!(matches!(
            frame.store_local(8, Value::Null),
            Err(VmError::ScratchLimitExceeded(8))
        ));
    }

    #[test]
    fn test_stack_bounds() {
        let m = module();
        let mut options = VmOptions::default();
        options.limits.max_stack_depth = 2;
        let mut frame = Frame::new(&m, 0, &options).unwrap();
        assert!(matches!(frame.pop(), Err(VmError::StackUnderflow)));
        frame.push(Value::Int(1)).unwrap();
        frame.push(Value::Int(2)).unwrap();
        assert!(matches!(frame.push(Value::Int(3)), Err(VmError::StackOverflow)));
        assert_eq!(frame.peek().unwrap(), Value::Int(2));
        assert_eq!(frame.pop().unwrap(), Value::Int(2));
    }

    #[test]
    fn test_jump_target_bounds() {
        let m = module();
        let frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        assert_eq!(frame.check_target(4).unwrap(), 4);
        assert!(matches!(frame.check_target(5), Err(VmError::InvalidJumpTarget(5))));
        assert!(matches!(frame.check_target(-1), Err(VmError::InvalidJumpTarget(-1))));
    }

    #[test]
    fn test_unwind_skips_contexts_without_catch() {
        let m = module();
        let mut frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        frame.open_try(None);
        frame.add_catch(3, 2).unwrap();
        frame.push(Value::Int(1)).unwrap();
        frame.open_try(Some(1));
        frame.push(Value::Int(2)).unwrap();

        assert!(frame.unwind(Value::Int(42)));
        assert_eq!(frame.pc(), 2);
        assert_eq!(frame.reg(3).unwrap(), Value::Int(42));
        assert!(frame.stack().is_empty());
        assert!(frame.try_contexts().is_empty());
        assert!(!frame.unwind(Value::Null));
    }

    #[test]
    fn test_end_try_without_context() {
        let m = module();
        let mut frame = Frame::new(&m, 0, &VmOptions::default()).unwrap();
        assert!(matches!(frame.end_try(), Err(VmError::NoTryContext)));
        assert!(matches!(frame.add_catch(0, 0), Err(VmError::NoTryContext)));
        frame.open_try(Some(3));
        assert_eq!(frame.end_try().unwrap(), Some(3));
    }
}
