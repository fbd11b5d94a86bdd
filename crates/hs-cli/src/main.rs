//! Humming Script CLI
//!
//! Commands:
//! - hs run <file> - Execute a module or assembly file
//! - hs disasm <file> - Print a listing of a module
//! - hs verify <file> - Statically check a module
//! - hs asm <src> -o <out> - Assemble text into a binary module

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hs")]
#[command(about = "Humming Script bytecode toolchain", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a module (.hsm) or assembly source (.hsa)
    Run {
        /// File to execute
        file: String,

        /// VM options file (TOML)
        #[arg(short, long)]
        config: Option<String>,

        /// Log every dispatched instruction
        #[arg(long)]
        trace: bool,
    },

    /// Disassemble a module
    Disasm {
        /// Module or assembly file
        file: String,
    },

    /// Verify a module without running it
    Verify {
        /// Module or assembly file
        file: String,
    },

    /// Assemble a text source into a binary module
    Asm {
        /// Assembly source
        src: String,

        /// Output path (defaults to the source with a .hsm extension)
        #[arg(short, long)]
        out: Option<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            config,
            trace,
        } => commands::run::execute(commands::run::RunArgs {
            file,
            config,
            trace,
        }),
        Commands::Disasm { file } => commands::disasm::execute(&file),
        Commands::Verify { file } => commands::verify::execute(&file),
        Commands::Asm { src, out } => commands::asm::execute(&src, out.as_deref()),
    }
}
