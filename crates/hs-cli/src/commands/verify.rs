//! `hs verify` - static checks without execution

use anyhow::Context;

pub fn execute(file: &str) -> anyhow::Result<()> {
    let module = super::load_module(file)?;
    hs_bytecode::verify_module(&module).with_context(|| format!("{} failed verification", file))?;
    println!(
        "{}: ok ({} instructions, {} constants, {} functions)",
        file,
        module.len(),
        module.constants.len(),
        module.functions.len()
    );
    Ok(())
}
