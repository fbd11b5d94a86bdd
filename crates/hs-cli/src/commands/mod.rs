//! Subcommand implementations

pub mod asm;
pub mod disasm;
pub mod run;
pub mod verify;

use anyhow::Context;
use hs_bytecode::Module;
use std::path::Path;

/// Extension of text assembly sources
pub const SOURCE_EXT: &str = "hsa";

/// Extension of binary modules
pub const MODULE_EXT: &str = "hsm";

/// Load a module, assembling `.hsa` sources on the fly
pub fn load_module(path: &str) -> anyhow::Result<Module> {
    let file = Path::new(path);
    if !file.exists() {
        anyhow::bail!("File not found: {}", path);
    }

    if is_source(file) {
        let source =
            std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", path))?;
        let name = module_name(file);
        return hs_bytecode::assemble(&name, &source)
            .with_context(|| format!("Failed to assemble {}", path));
    }

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", path))?;
    Module::decode(&bytes).with_context(|| format!("Failed to decode module {}", path))
}

fn is_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT)
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string()
}
