//! Virtual machine execution

mod interpreter;
mod ops;

use crate::frame::Frame;
use crate::heap::Heap;
use crate::native::{NativeFn, NativeRegistry};
use crate::options::VmOptions;
use crate::sync::LockRegistry;
use crate::value::{NativeId, Value};
use crate::{VmError, VmResult};
use hs_bytecode::Module;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Unique identifier for a VM instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmId(u64);

impl VmId {
    /// Create a new unique ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        VmId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for VmId {
    fn default() -> Self {
        Self::new()
    }
}

/// Humming Script virtual machine
///
/// A VM owns a heap and a native table and executes modules on the calling
/// thread. Nested calls run on the Rust stack, one [`Frame`] per call, up to
/// the configured call depth. VMs on different threads coordinate through a
/// shared [`LockRegistry`].
pub struct Vm {
    id: VmId,
    options: VmOptions,
    heap: Heap,
    natives: NativeRegistry,
    locks: Arc<LockRegistry>,
    output: Box<dyn Write + Send>,
    depth: usize,
    steps: u64,
}

impl Vm {
    /// Create a VM with default options and the standard natives
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    /// Create a VM with specific options and a private lock registry
    pub fn with_options(options: VmOptions) -> Self {
        Self::with_lock_registry(options, Arc::new(LockRegistry::new()))
    }

    /// Create a VM that shares `locks` with other VMs
    pub fn with_lock_registry(options: VmOptions, locks: Arc<LockRegistry>) -> Self {
        Self {
            id: VmId::new(),
            heap: Heap::with_limit(options.limits.max_heap_objects),
            options,
            natives: NativeRegistry::with_builtins(),
            locks,
            output: Box::new(std::io::stdout()),
            depth: 0,
            steps: 0,
        }
    }

    /// This VM's ID
    pub fn id(&self) -> VmId {
        self.id
    }

    /// Options in effect
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// The heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutable heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The native table
    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Register a host function
    pub fn register_native(&mut self, name: impl Into<String>, function: NativeFn) -> NativeId {
        self.natives.register(name, function)
    }

    /// The lock registry
    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Redirect standard output, returning the previous sink
    pub fn set_output(&mut self, output: Box<dyn Write + Send>) -> Box<dyn Write + Send> {
        std::mem::replace(&mut self.output, output)
    }

    /// Instructions executed since the last top-level run started
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current number of active frames
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run a module from its `main` function, or from instruction 0 if it has none
    pub fn run(&mut self, module: &Module) -> VmResult<Value> {
        module.validate().map_err(VmError::InvalidModule)?;
        match module.function("main") {
            Some((index, _)) => self.call_function(module, index, Value::Null, &[]),
            None if !module.is_empty() => {
                self.steps = 0;
                let mut frame = self.frame(module, 0)?;
                self.enter(&mut frame)
            }
            None => Err(VmError::NoEntryPoint),
        }
    }

    /// Call a function by name
    pub fn call(&mut self, module: &Module, name: &str, args: &[Value]) -> VmResult<Value> {
        let (index, _) = module
            .function(name)
            .ok_or_else(|| VmError::FunctionNotFound(name.to_string()))?;
        self.call_function(module, index, Value::Null, args)
    }

    /// Call a function by index with a receiver
    pub fn call_function(
        &mut self,
        module: &Module,
        index: usize,
        this: Value,
        args: &[Value],
    ) -> VmResult<Value> {
        if self.depth == 0 {
            self.steps = 0;
        }
        self.invoke_function(module, index, this, Value::Null, args.to_vec())
    }

    /// Create a frame for `module` starting at `entry`
    pub fn frame<'m>(&self, module: &'m Module, entry: usize) -> VmResult<Frame<'m>> {
        Frame::new(module, entry, &self.options)
    }

    /// Run a frame until it returns, faults or throws an uncaught value
    ///
    /// On a fault the frame is left halted with its program counter on the
    /// faulting instruction.
    pub fn execute(&mut self, frame: &mut Frame<'_>) -> VmResult<Value> {
        self.enter(frame)
    }

    /// Reclaim heap objects unreachable from `roots`
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = Value>) -> usize {
        self.heap.collect(roots)
    }

    fn invoke_function(
        &mut self,
        module: &Module,
        index: usize,
        this: Value,
        module_object: Value,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        let def = module
            .functions
            .get(index)
            .ok_or(VmError::InvalidFunction(index))?;

        if self.depth >= self.options.limits.max_call_depth {
            return Err(VmError::CallDepthExceeded(self.options.limits.max_call_depth));
        }

        let mut frame = Frame::new(module, def.entry as usize, &self.options)?
            .with_args(args)?
            .with_this(this)
            .with_module_object(module_object);

        debug!(function = %def.name, depth = self.depth, "enter frame");
        let result = self.enter(&mut frame);
        debug!(function = %def.name, ok = result.is_ok(), "exit frame");
        result
    }

    fn enter(&mut self, frame: &mut Frame<'_>) -> VmResult<Value> {
        self.depth += 1;
        let result = self.execute_frame(frame);
        self.depth -= 1;
        result
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        let released = self.locks.release_all(self.id);
        if released > 0 {
            debug!(vm = self.id.as_u64(), released, "released locks on drop");
        }
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("heap_objects", &self.heap.len())
            .field("natives", &self.natives.len())
            .field("depth", &self.depth)
            .finish()
    }
}
