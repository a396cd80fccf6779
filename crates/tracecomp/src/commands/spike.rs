//! `spike` command: run the golden model and parse its transcript live.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracecomp::{CancelToken, SpikeConfig, find_spike, run_spike};
use tracing::{error, info, warn};

use super::write_outputs;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, OutputArgs};
use crate::terminal::{self, Spinner};

pub struct SpikeArgs<'a> {
    pub elf: &'a Path,
    pub spike: Option<&'a Path>,
    pub isa: Option<&'a str>,
    pub timeout: Option<u64>,
    pub debug_commands: &'a [String],
    pub save_transcript: Option<&'a Path>,
}

impl SpikeArgs<'_> {
    fn spike_config(&self) -> SpikeConfig {
        let program = self
            .spike
            .map(Path::to_path_buf)
            .or_else(find_spike)
            .unwrap_or_else(|| PathBuf::from("spike"));

        let mut config = SpikeConfig::default()
            .with_program(program)
            .with_debug_commands(self.debug_commands.to_vec());
        if let Some(isa) = self.isa {
            config = config.with_isa(isa);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = self.save_transcript {
            config = config.with_transcript_log(path);
        }
        config
    }
}

/// Handle the `spike` command.
pub fn cmd_spike(args: &SpikeArgs<'_>, output: &OutputArgs, silent: bool) -> i32 {
    info!(elf = %args.elf.display(), "running golden model");

    let parse_config = match output.parse_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return EXIT_FAILURE;
        }
    };
    let spike_config = args.spike_config();

    // Ctrl-C ends the run early; the partial stream is still written.
    let cancel = CancelToken::new();
    let handler_cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_cancel.cancel()) {
        warn!("Ctrl-C will not stop Spike cleanly: {e}");
    }

    let spinner = Spinner::new(
        format!(
            "Running {} on {}",
            spike_config.program.display(),
            args.elf.display()
        ),
        silent,
    );
    let run = match run_spike(&parse_config, &spike_config, args.elf, cancel) {
        Ok(run) => run,
        Err(e) => {
            spinner.finish_with_failure(&e.to_string());
            return EXIT_FAILURE;
        }
    };

    spinner.set_message("Writing records");
    if let Err(e) = write_outputs(&run.trace, output) {
        spinner.finish_with_failure(&format!("writing output failed: {e}"));
        return EXIT_FAILURE;
    }

    if silent {
        return EXIT_SUCCESS;
    }
    let summary = terminal::describe(&run.trace.diagnostics);
    match terminal::early_end(run.end) {
        Some(reason) => spinner.finish_with_warning(&format!("{summary}, Spike {reason}")),
        None if run.exit_code != Some(0) => spinner.finish_with_warning(&format!(
            "{summary}, Spike exited with {}",
            run.exit_code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
        )),
        None => spinner.finish_with_success(&summary),
    }
    terminal::print_regions(&run.trace.diagnostics);
    EXIT_SUCCESS
}
