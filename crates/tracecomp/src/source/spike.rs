//! Live Spike transcripts.
//!
//! Spike runs as a child process with `--log-commits`. Its stdout and stderr
//! are the same pipe, so debugger output and commit lines keep the order
//! Spike wrote them in. One reader thread forwards raw lines into a bounded
//! channel; the parser pulls from the other end one line at a time, so
//! parsing overlaps with simulation instead of waiting for Spike to exit.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, PipeReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, info_span, warn};

use super::decode_line;
use crate::config::ParseConfig;
use crate::error::{Result, TraceError};
use crate::metrics;
use crate::parser::TraceParser;
use crate::record::TranscriptLine;
use crate::stream::ParsedTrace;

/// Flag that makes Spike print one line per retired instruction.
const COMMIT_LOG_FLAG: &str = "--log-commits";

/// How often a waiting consumer checks for cancellation and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How to invoke the golden model.
#[derive(Clone, Debug)]
pub struct SpikeConfig {
    /// Executable, resolved through `PATH` when it has no directory part.
    pub program: PathBuf,
    /// Passed as `--isa=<isa>`.
    pub isa: Option<String>,
    /// Extra arguments placed before the ELF path.
    pub extra_args: Vec<String>,
    /// Interactive debugger commands. When non-empty Spike runs with `-d`
    /// and reads them from a temporary `--debug-cmd` file.
    pub debug_commands: Vec<String>,
    /// Kill Spike and end the stream after this long.
    pub timeout: Option<Duration>,
    /// Bound on lines buffered between Spike and the parser.
    pub channel_capacity: usize,
    /// Copy every received line to this file.
    pub transcript_log: Option<PathBuf>,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("spike"),
            isa: None,
            extra_args: Vec::new(),
            debug_commands: Vec::new(),
            timeout: None,
            channel_capacity: 1024,
            transcript_log: None,
        }
    }
}

impl SpikeConfig {
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn with_isa(mut self, isa: impl Into<String>) -> Self {
        self.isa = Some(isa.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_debug_commands(mut self, commands: Vec<String>) -> Self {
        self.debug_commands = commands;
        self
    }

    #[must_use]
    pub fn with_transcript_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_log = Some(path.into());
        self
    }
}

/// Shared flag that stops a running source from any thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a live transcript ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEnd {
    /// Spike closed its output.
    Exhausted,
    Cancelled,
    TimedOut,
}

/// A running Spike process viewed as a sequence of transcript lines.
///
/// Dropping the source kills and reaps the process, stops the reader
/// threads and removes the debug command file.
pub struct TranscriptSource {
    program: String,
    child: Child,
    lines: Option<Receiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    cancel: CancelToken,
    deadline: Option<Instant>,
    next_index: usize,
    end: Option<SourceEnd>,
    status: Option<ExitStatus>,
    log: Option<BufWriter<File>>,
    _debug_script: Option<NamedTempFile>,
}

impl TranscriptSource {
    /// Start Spike on `elf`.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if the process cannot be started.
    pub fn spawn(config: &SpikeConfig, elf: &Path, cancel: CancelToken) -> Result<Self> {
        let program = config.program.display().to_string();
        let _span = info_span!("spawn", program = %program, elf = %elf.display()).entered();

        let debug_script = write_debug_script(&config.debug_commands)?;
        let log = match &config.transcript_log {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };

        let (output, output_writer) = std::io::pipe()?;
        let mut cmd = Command::new(&config.program);
        cmd.arg(COMMIT_LOG_FLAG);
        if let Some(isa) = &config.isa {
            cmd.arg(format!("--isa={isa}"));
        }
        if let Some(script) = &debug_script {
            cmd.arg("-d")
                .arg(format!("--debug-cmd={}", script.path().display()));
        }
        cmd.args(&config.extra_args)
            .arg(elf)
            .stdin(Stdio::null())
            // Spike prints the commit log on stderr and debugger output on
            // stdout. Sharing one pipe keeps their relative order.
            .stdout(output_writer.try_clone()?)
            .stderr(output_writer);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        debug!(?cmd, "starting golden model");

        let spawned = cmd.spawn();
        // Close our copies of the write end, or the reader never sees EOF.
        drop(cmd);
        let mut child = spawned.map_err(|e| TraceError::SourceUnavailable {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::sync_channel(config.channel_capacity.max(1));
        let reader = match forward_lines(output, tx) {
            Ok(handle) => handle,
            Err(e) => {
                kill_process_group(&mut child);
                let _ = child.wait();
                return Err(e.into());
            }
        };

        Ok(Self {
            program,
            child,
            lines: Some(rx),
            reader: Some(reader),
            cancel,
            deadline: config.timeout.map(|t| Instant::now() + t),
            next_index: 0,
            end: None,
            status: None,
            log,
            _debug_script: debug_script,
        })
    }

    /// Wait for the next line.
    ///
    /// Returns `None` once Spike has closed its output, or after the source
    /// was cancelled or timed out. Either way the stream simply ends.
    pub fn next_line(&mut self) -> Option<TranscriptLine> {
        if self.end.is_some() {
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                self.stop(SourceEnd::Cancelled);
                return None;
            }
            if let Some(deadline) = self.deadline
                && Instant::now() >= deadline
            {
                self.stop(SourceEnd::TimedOut);
                return None;
            }

            let rx = self.lines.as_ref()?;
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(bytes) => {
                    let line = TranscriptLine::new(self.next_index, decode_line(&bytes));
                    self.next_index += 1;
                    self.tee(&line);
                    return Some(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.reap();
                    return None;
                }
            }
        }
    }

    /// How the stream ended, once it has.
    #[must_use]
    pub fn end(&self) -> Option<SourceEnd> {
        self.end
    }

    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.next_index
    }

    /// Exit status of Spike, known after the stream was exhausted.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Collect the exit status once output has closed. A process that
    /// closed its output but keeps running is still bound by cancel and
    /// timeout.
    fn reap(&mut self) {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.status = Some(status);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("failed to wait for golden model: {e}");
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                self.stop(SourceEnd::Cancelled);
                return;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.stop(SourceEnd::TimedOut);
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.end = Some(SourceEnd::Exhausted);
        self.flush_log();
    }

    fn stop(&mut self, end: SourceEnd) {
        match end {
            SourceEnd::TimedOut => warn!(
                program = %self.program,
                lines = self.next_index,
                "golden model timed out, ending transcript"
            ),
            _ => info!(
                program = %self.program,
                lines = self.next_index,
                "golden model cancelled, ending transcript"
            ),
        }
        self.end = Some(end);
        kill_process_group(&mut self.child);
        self.status = self.child.wait().ok();
        self.flush_log();
    }

    fn tee(&mut self, line: &TranscriptLine) {
        let failed = match self.log.as_mut() {
            Some(log) => writeln!(log, "{}", line.text).err(),
            None => None,
        };
        if let Some(e) = failed {
            warn!("transcript log disabled: {e}");
            self.log = None;
        }
    }

    fn flush_log(&mut self) {
        if let Some(log) = self.log.as_mut()
            && let Err(e) = log.flush()
        {
            warn!("failed to flush transcript log: {e}");
        }
    }
}

impl Drop for TranscriptSource {
    fn drop(&mut self) {
        if self.status.is_none() {
            kill_process_group(&mut self.child);
            let _ = self.child.wait();
        }
        self.flush_log();
        // A reader blocked on a full channel returns once the receiver is gone.
        drop(self.lines.take());
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn write_debug_script(commands: &[String]) -> Result<Option<NamedTempFile>> {
    if commands.is_empty() {
        return Ok(None);
    }
    let mut script = NamedTempFile::new()?;
    for command in commands {
        writeln!(script, "{command}")?;
    }
    script.flush()?;
    Ok(Some(script))
}

/// Kill Spike and anything it started.
///
/// Spike leads its own process group, so a wrapper script's children die
/// with it and cannot hold the output pipe open.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

fn forward_lines(pipe: PipeReader, tx: SyncSender<Vec<u8>>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("spike-output".to_string()).spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(std::mem::take(&mut buf)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Result of parsing a live Spike run.
#[derive(Debug)]
pub struct SpikeRun {
    pub trace: ParsedTrace,
    pub end: SourceEnd,
    /// `None` when Spike was killed or its status could not be collected.
    pub exit_code: Option<i32>,
}

/// Run Spike on `elf` and parse its transcript as it is produced.
///
/// Cancellation and timeout end the stream early; whatever was parsed up to
/// that point is finalized and returned.
///
/// # Errors
///
/// Returns `SourceUnavailable` if Spike cannot be started or prints nothing,
/// and any parse error from the transcript. Spike is killed on every error
/// path.
pub fn run_spike(
    parse_config: &ParseConfig,
    spike_config: &SpikeConfig,
    elf: &Path,
    cancel: CancelToken,
) -> Result<SpikeRun> {
    let mut source = TranscriptSource::spawn(spike_config, elf, cancel)?;
    let mut parser = TraceParser::new(parse_config);

    while let Some(line) = source.next_line() {
        parser.feed(&line)?;
    }

    if source.lines_read() == 0 {
        return Err(TraceError::SourceUnavailable {
            program: source.program().to_string(),
            reason: "produced no output".to_string(),
        });
    }

    let end = source.end().unwrap_or(SourceEnd::Exhausted);
    metrics::record_source_end(end);
    let exit_code = source.exit_status().and_then(|s| s.code());
    if end == SourceEnd::Exhausted && exit_code != Some(0) {
        warn!(?exit_code, "golden model exited unsuccessfully");
    }
    drop(source);

    Ok(SpikeRun {
        trace: parser.finish()?,
        end,
        exit_code,
    })
}

/// Find the Spike executable in `PATH`.
pub fn find_spike() -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join("spike"))
            .find(|path| path.is_file())
    })
}
