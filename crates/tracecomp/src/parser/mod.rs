//! Transcript parsing pipeline.
//!
//! Each line is classified, then (if retained) extracted, before the next
//! line is looked at. Lines inside an excluded region become placeholder
//! records so the stream stays index-aligned with the RTL trace.

use std::io::BufRead;
use std::path::Path;
use std::time::Instant;

use tracing::{info_span, warn};

use crate::classify::{LineClass, LineClassifier, SkipState};
use crate::config::ParseConfig;
use crate::error::Result;
use crate::extract::Extractor;
use crate::metrics;
use crate::record::TranscriptLine;
use crate::source::{TranscriptFile, TranscriptLines};
use crate::stream::{ParsedTrace, StreamAssembler};


/// Incremental parser fed one line at a time.
pub struct TraceParser<'a> {
    config: &'a ParseConfig,
    classifier: LineClassifier<'a>,
    extractor: Extractor<'a>,
    assembler: StreamAssembler,
    started: Instant,
}

impl<'a> TraceParser<'a> {
    pub fn new(config: &'a ParseConfig) -> Self {
        Self {
            config,
            classifier: LineClassifier::new(&config.markers),
            extractor: Extractor::new(config),
            assembler: StreamAssembler::new(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> SkipState {
        self.classifier.state()
    }

    /// Consume one line.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLine` in strict mode when a retained line cannot be
    /// extracted.
    pub fn feed(&mut self, line: &TranscriptLine) -> Result<()> {
        self.assembler.note_line();
        let in_region = self.classifier.state() == SkipState::InExcludedRegion;

        match self.classifier.classify(line) {
            LineClass::Noise if in_region => {
                self.assembler
                    .push_placeholder(self.extractor.placeholder(line));
            }
            LineClass::Noise => self.assembler.note_noise(),
            LineClass::RegionStart => self.assembler.open_region(line.index),
            LineClass::RegionEnd => self.assembler.close_region(line.index),
            LineClass::Retain => match self.extractor.extract(line) {
                Ok(record) => {
                    let value_trap = self.extractor.is_value_trap(line);
                    self.assembler.push_extracted(record, value_trap);
                }
                Err(err) if self.config.is_lenient() => {
                    warn!("skipping line: {err}");
                    self.assembler.note_malformed();
                }
                Err(err) => return Err(err),
            },
        }
        Ok(())
    }

    /// Finish the stream and check its alignment invariant.
    ///
    /// # Errors
    ///
    /// Returns `StreamIntegrity` if the record count disagrees with the
    /// retained and synthesized line counts.
    pub fn finish(self) -> Result<ParsedTrace> {
        let elapsed = self.started.elapsed();
        let parsed = self.assembler.finalize()?;
        metrics::record_parse(&parsed.diagnostics, elapsed);
        Ok(parsed)
    }
}

/// Parse an in-memory sequence of lines.
pub fn parse_lines<I, S>(config: &ParseConfig, lines: I) -> Result<ParsedTrace>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parser = TraceParser::new(config);
    for (index, text) in lines.into_iter().enumerate() {
        parser.feed(&TranscriptLine::new(index, text))?;
    }
    parser.finish()
}

/// Parse a transcript read from `reader` until end of input.
pub fn parse_reader<R: BufRead>(config: &ParseConfig, reader: R) -> Result<ParsedTrace> {
    let _span = info_span!("parse").entered();
    let mut parser = TraceParser::new(config);
    for line in TranscriptLines::new(reader) {
        parser.feed(&line?)?;
    }
    parser.finish()
}

/// Parse a transcript file, decoding zstd when the name ends in `.zst`.
pub fn parse_file(config: &ParseConfig, path: &Path) -> Result<ParsedTrace> {
    let _span = info_span!("parse_file", path = %path.display()).entered();
    let file = TranscriptFile::open(path)?;
    parse_reader(config, file.into_reader())
}
