//! Transcript sources: captured log files and live Spike processes.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::record::TranscriptLine;

pub mod spike;

pub use spike::{CancelToken, SourceEnd, SpikeConfig, SpikeRun, TranscriptSource, find_spike, run_spike};

/// Split a byte stream into transcript lines.
///
/// Line endings (`\n` or `\r\n`) are removed and invalid UTF-8 is replaced,
/// since output captured through a pty can carry control bytes.
pub struct TranscriptLines<R> {
    reader: R,
    buf: Vec<u8>,
    next_index: usize,
}

impl<R: BufRead> TranscriptLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            next_index: 0,
        }
    }
}

impl<R: BufRead> Iterator for TranscriptLines<R> {
    type Item = std::io::Result<TranscriptLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = TranscriptLine::new(self.next_index, decode_line(&self.buf));
                self.next_index += 1;
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// A transcript captured to disk, optionally zstd compressed.
pub struct TranscriptFile {
    reader: Box<dyn BufRead>,
}

impl TranscriptFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let compressed = path.extension().is_some_and(|ext| ext == "zst");
        let reader: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(zstd::stream::Decoder::new(file)?))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self { reader })
    }

    pub fn into_reader(self) -> Box<dyn BufRead> {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_strip_endings_and_index() {
        let input = b"first\r\nsecond\n\nlast".as_slice();
        let lines: Vec<TranscriptLine> = TranscriptLines::new(input)
            .collect::<std::io::Result<_>>()
            .unwrap();

        assert_eq!(
            lines,
            vec![
                TranscriptLine::new(0, "first"),
                TranscriptLine::new(1, "second"),
                TranscriptLine::new(2, ""),
                TranscriptLine::new(3, "last"),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let input = b"core\xff 0:\n".as_slice();
        let line = TranscriptLines::new(input).next().unwrap().unwrap();
        assert_eq!(line.text, "core\u{fffd} 0:");
    }
}
