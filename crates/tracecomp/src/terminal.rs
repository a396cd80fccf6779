//! Terminal UI: spinner and styled status lines on stderr.
//!
//! Records go to stdout, so everything here writes to stderr.

use std::borrow::Cow;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracecomp::{SourceEnd, StreamDiagnostics};

/// Spinner for indeterminate progress.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Create a spinner with a message. A `silent` spinner draws nothing.
    pub fn new(message: impl Into<Cow<'static, str>>, silent: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if silent {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("✓").green().bold(), message);
    }

    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    pub fn finish_with_warning(&self, message: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", style("!").yellow().bold(), message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// One-line description of a finished parse.
pub fn describe(diag: &StreamDiagnostics) -> String {
    let mut text = format!(
        "{} records from {} lines ({} synthesized, {} noise)",
        diag.emitted_records,
        diag.total_lines,
        diag.synthesized_records(),
        diag.noise_lines
    );
    if diag.malformed_skipped > 0 {
        text.push_str(&format!(", {} malformed skipped", diag.malformed_skipped));
    }
    text
}

/// Why a live transcript stopped early, if it did.
pub fn early_end(end: SourceEnd) -> Option<&'static str> {
    match end {
        SourceEnd::Exhausted => None,
        SourceEnd::Cancelled => Some("cancelled"),
        SourceEnd::TimedOut => Some("timed out"),
    }
}

/// Print region details below the status line.
pub fn print_regions(diag: &StreamDiagnostics) {
    for region in &diag.regions {
        let end = region
            .end_line
            .map_or_else(|| "end of transcript".to_string(), |l| format!("line {l}"));
        eprintln!(
            "  {}",
            style(format!(
                "excluded region line {} .. {}: {} placeholders",
                region.start_line, end, region.suppressed
            ))
            .dim()
        );
    }
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}
