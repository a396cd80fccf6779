//! Command implementations.

mod markers;
mod parse;
mod spike;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use tracecomp::{ParsedTrace, Result};

use crate::cli::{Cli, Commands, OutputArgs};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Parse { .. } => handle_parse(cli),
        Commands::Spike { .. } => handle_spike(cli),
        Commands::Markers => markers::cmd_markers(),
    }
}

fn handle_parse(cli: &Cli) -> i32 {
    let Commands::Parse { transcript, output } = &cli.command else {
        unreachable!("parse command variant mismatch");
    };
    parse::cmd_parse(transcript, output, cli.silent)
}

fn handle_spike(cli: &Cli) -> i32 {
    let Commands::Spike {
        elf,
        spike: program,
        isa,
        timeout,
        debug_cmd,
        save_transcript,
        output,
    } = &cli.command
    else {
        unreachable!("spike command variant mismatch");
    };

    spike::cmd_spike(
        &spike::SpikeArgs {
            elf,
            spike: program.as_deref(),
            isa: isa.as_deref(),
            timeout: *timeout,
            debug_commands: debug_cmd,
            save_transcript: save_transcript.as_deref(),
        },
        output,
        cli.silent,
    )
}

/// Write records as NDJSON and the optional diagnostics summary.
fn write_outputs(trace: &ParsedTrace, args: &OutputArgs) -> Result<()> {
    match &args.output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            trace.stream.write_jsonl(&mut out)?;
        }
        None => {
            let mut out = BufWriter::new(io::stdout().lock());
            trace.stream.write_jsonl(&mut out)?;
        }
    }

    if let Some(path) = &args.summary {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &trace.diagnostics)?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(())
}
