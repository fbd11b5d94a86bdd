//! `hs run` - execute a module and print its result

use anyhow::Context;
use hs_core::{Vm, VmOptions};
use std::path::Path;

pub struct RunArgs {
    pub file: String,
    pub config: Option<String>,
    pub trace: bool,
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let module = super::load_module(&args.file)?;

    let mut options = match &args.config {
        Some(path) => VmOptions::from_file(Path::new(path))
            .with_context(|| format!("Failed to load VM options from {}", path))?,
        None => VmOptions::default(),
    };
    if args.trace {
        options.trace_instructions = true;
    }

    let mut vm = Vm::with_options(options);
    let result = vm
        .run(&module)
        .with_context(|| format!("{} faulted", args.file))?;

    if !result.is_null() {
        println!("{}", vm.heap().render(result));
    }
    let stats = vm.heap().stats();
    tracing::debug!(
        steps = vm.steps(),
        heap_objects = vm.heap().len(),
        peak_heap_objects = stats.peak_live,
        collections = stats.collections,
        "run finished"
    );
    Ok(())
}
