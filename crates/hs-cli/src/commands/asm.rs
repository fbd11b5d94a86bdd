//! `hs asm` - assemble text into a binary module

use anyhow::Context;
use std::path::{Path, PathBuf};

pub fn execute(src: &str, out: Option<&str>) -> anyhow::Result<()> {
    let module = super::load_module(src)?;
    hs_bytecode::verify_module(&module).with_context(|| format!("{} failed verification", src))?;

    let out = output_path(src, out);
    let bytes = module.encode();
    std::fs::write(&out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Wrote {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

fn output_path(src: &str, out: Option<&str>) -> PathBuf {
    match out {
        Some(path) => PathBuf::from(path),
        None => Path::new(src).with_extension(super::MODULE_EXT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        assert_eq!(output_path("a/prog.hsa", None), PathBuf::from("a/prog.hsm"));
        assert_eq!(output_path("prog.hsa", Some("out.bin")), PathBuf::from("out.bin"));
    }
}
