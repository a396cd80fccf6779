//! Spike commit-log parser.
//!
//! Turns the transcript Spike prints with `--log-commits` into an ordered
//! stream of [`CommitRecord`]s that can be compared one-to-one with an RTL
//! retirement trace. Debugger noise and trap dumps are dropped; instructions
//! inside an excluded region are replaced by placeholder records so both
//! traces stay index-aligned.
//!
//! ```no_run
//! use std::path::Path;
//! use tracecomp::{ParseConfig, parse_file};
//!
//! let trace = parse_file(&ParseConfig::default(), Path::new("spike.log"))?;
//! trace.stream.write_jsonl(&mut std::io::stdout().lock())?;
//! # Ok::<(), tracecomp::TraceError>(())
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod memory;
pub mod metrics;
pub mod parser;
pub mod record;
pub mod source;
pub mod stream;

pub use classify::{LineClass, LineClassifier, SkipState};
pub use config::{MarkerTable, NOP_ENCODING, ParseConfig, Strictness};
pub use error::{MalformedReason, Result, TraceError};
pub use extract::Extractor;
pub use parser::{TraceParser, parse_file, parse_lines, parse_reader};
pub use record::{
    CommitRecord, Direction, Effect, MemoryAccess, RecordStream, Register, RegisterWrite,
    TranscriptLine,
};
pub use source::{
    CancelToken, SourceEnd, SpikeConfig, SpikeRun, TranscriptFile, TranscriptLines,
    TranscriptSource, find_spike, run_spike,
};
pub use stream::{ParsedTrace, RegionSpan, StreamAssembler, StreamDiagnostics};
