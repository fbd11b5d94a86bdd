//! `hs disasm` - print a module listing

pub fn execute(file: &str) -> anyhow::Result<()> {
    let module = super::load_module(file)?;
    print!("{}", hs_bytecode::disassemble_module(&module));
    Ok(())
}
