//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracecomp::{ParseConfig, Strictness, TraceError};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "tracecomp")]
#[command(about = "Spike commit-log parser - canonical records for RTL differential testing")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a captured Spike transcript
    Parse {
        /// Transcript file (`.zst` is decompressed)
        #[arg(value_name = "TRANSCRIPT")]
        transcript: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run Spike on an ELF and parse its transcript live
    Spike {
        /// Program to simulate
        #[arg(value_name = "ELF")]
        elf: PathBuf,

        /// Spike executable (default: `spike` from PATH)
        #[arg(long, value_name = "PATH")]
        spike: Option<PathBuf>,

        /// ISA string passed as --isa
        #[arg(long)]
        isa: Option<String>,

        /// Stop Spike after this many seconds and keep what was parsed
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Interactive debugger command (runs Spike with -d)
        #[arg(long = "debug-cmd", value_name = "CMD", action = clap::ArgAction::Append)]
        debug_cmd: Vec<String>,

        /// Copy every transcript line to this file
        #[arg(long, value_name = "FILE")]
        save_transcript: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the default marker table as TOML
    Markers,
}

/// Parse configuration and output destinations shared by parsing commands.
#[derive(clap::Args, Clone, Debug)]
pub struct OutputArgs {
    /// NDJSON output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// TOML file overriding markers and placeholder encoding
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Skip malformed commit lines instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Write the diagnostics summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

impl OutputArgs {
    /// Load the configured marker table, applying `--lenient` on top.
    pub fn parse_config(&self) -> Result<ParseConfig, TraceError> {
        let config = match &self.config {
            Some(path) => ParseConfig::load(path)?,
            None => ParseConfig::default(),
        };
        Ok(if self.lenient {
            config.with_strictness(Strictness::Lenient)
        } else {
            config
        })
    }
}
