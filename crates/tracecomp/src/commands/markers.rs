//! `markers` command.

use tracecomp::ParseConfig;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Print the default configuration as TOML, ready to edit and pass back
/// with `--config`.
pub fn cmd_markers() -> i32 {
    match ParseConfig::default().to_toml_string() {
        Ok(text) => {
            print!("{text}");
            EXIT_SUCCESS
        }
        Err(e) => {
            terminal::error(&e.to_string());
            EXIT_FAILURE
        }
    }
}
