//! `parse` command.

use std::path::Path;

use tracing::{error, info};

use super::write_outputs;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS, OutputArgs};
use crate::terminal::{self, Spinner};

/// Handle the `parse` command.
pub fn cmd_parse(transcript: &Path, args: &OutputArgs, silent: bool) -> i32 {
    info!(transcript = %transcript.display(), "parsing");

    let config = match args.parse_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return EXIT_FAILURE;
        }
    };

    let spinner = Spinner::new(format!("Parsing {}", transcript.display()), silent);
    let trace = match tracecomp::parse_file(&config, transcript) {
        Ok(trace) => trace,
        Err(e) => {
            spinner.finish_with_failure(&e.to_string());
            return EXIT_FAILURE;
        }
    };

    if let Err(e) = write_outputs(&trace, args) {
        spinner.finish_with_failure(&format!("writing output failed: {e}"));
        return EXIT_FAILURE;
    }

    if silent {
        return EXIT_SUCCESS;
    }
    let summary = terminal::describe(&trace.diagnostics);
    if trace.diagnostics.has_open_region() {
        spinner.finish_with_warning(&format!("{summary}, excluded region never closed"));
    } else {
        spinner.finish_with_success(&summary);
    }
    terminal::print_regions(&trace.diagnostics);
    EXIT_SUCCESS
}
