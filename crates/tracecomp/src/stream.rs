//! Record stream assembly and diagnostics.

use serde::Serialize;
use tracing::warn;

use crate::error::{Result, TraceError};
use crate::record::{CommitRecord, RecordStream};

/// One excluded region as seen in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSpan {
    /// Line index of the start marker.
    pub start_line: usize,
    /// Line index of the end marker, `None` if the transcript ended first.
    pub end_line: Option<usize>,
    /// Placeholders emitted for lines strictly inside the region.
    pub suppressed: u64,
}

/// Counters reported alongside the finished stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamDiagnostics {
    pub total_lines: u64,
    pub noise_lines: u64,
    /// Retained lines that produced a record.
    pub retained_lines: u64,
    pub emitted_records: u64,
    pub suppressed_in_region: u64,
    pub value_traps: u64,
    /// Retained lines skipped in lenient mode.
    pub malformed_skipped: u64,
    pub regions: Vec<RegionSpan>,
}

impl StreamDiagnostics {
    #[must_use]
    pub fn has_open_region(&self) -> bool {
        self.regions.last().is_some_and(|r| r.end_line.is_none())
    }

    /// Placeholders emitted for excluded regions.
    #[must_use]
    pub fn synthesized_records(&self) -> u64 {
        self.suppressed_in_region
    }
}

/// A finished parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrace {
    pub stream: RecordStream,
    pub diagnostics: StreamDiagnostics,
}

/// Accumulates records in arrival order and keeps the alignment counters.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    records: Vec<CommitRecord>,
    diagnostics: StreamDiagnostics,
    open_region: Option<RegionSpan>,
}

impl StreamAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_line(&mut self) {
        self.diagnostics.total_lines += 1;
    }

    pub fn note_noise(&mut self) {
        self.diagnostics.noise_lines += 1;
    }

    pub fn note_malformed(&mut self) {
        self.diagnostics.malformed_skipped += 1;
    }

    /// Append a record extracted from a retained line.
    pub fn push_extracted(&mut self, record: CommitRecord, value_trap: bool) {
        if value_trap {
            self.diagnostics.value_traps += 1;
        }
        self.diagnostics.retained_lines += 1;
        self.push(record);
    }

    /// Append a placeholder for a line inside an excluded region.
    pub fn push_placeholder(&mut self, record: CommitRecord) {
        self.diagnostics.suppressed_in_region += 1;
        if let Some(region) = self.open_region.as_mut() {
            region.suppressed += 1;
        }
        self.push(record);
    }

    pub fn open_region(&mut self, line: usize) {
        self.close_pending();
        self.open_region = Some(RegionSpan {
            start_line: line,
            end_line: None,
            suppressed: 0,
        });
    }

    pub fn close_region(&mut self, line: usize) {
        if let Some(mut region) = self.open_region.take() {
            region.end_line = Some(line);
            self.diagnostics.regions.push(region);
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &StreamDiagnostics {
        &self.diagnostics
    }

    fn push(&mut self, record: CommitRecord) {
        self.diagnostics.emitted_records += 1;
        self.records.push(record);
    }

    fn close_pending(&mut self) {
        if let Some(region) = self.open_region.take() {
            self.diagnostics.regions.push(region);
        }
    }

    /// Hand over the stream once the emitted/retained/synthesized counts agree.
    pub fn finalize(mut self) -> Result<ParsedTrace> {
        self.close_pending();
        let diag = &self.diagnostics;

        let expected = diag.retained_lines + diag.suppressed_in_region;
        if diag.emitted_records != expected || self.records.len() as u64 != diag.emitted_records {
            return Err(TraceError::StreamIntegrity {
                emitted: self.records.len() as u64,
                retained: diag.retained_lines,
                synthesized: diag.suppressed_in_region,
            });
        }

        if let Some(region) = diag.regions.last()
            && region.end_line.is_none()
        {
            warn!(
                start_line = region.start_line,
                suppressed = region.suppressed,
                "transcript ended inside an excluded region"
            );
        }

        Ok(ParsedTrace {
            stream: RecordStream::from_records(self.records),
            diagnostics: self.diagnostics,
        })
    }
}
