//! Canonical commit records.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MalformedReason, Result, TraceError};

/// One raw transcript line and its 0-based position in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub index: usize,
    pub text: String,
}

impl TranscriptLine {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub(crate) fn malformed(&self, reason: MalformedReason) -> TraceError {
        TraceError::MalformedLine {
            index: self.index,
            text: self.text.clone(),
            reason,
        }
    }
}

/// Architectural register named in a commit line.
///
/// Spike writes general purpose registers as `x<N>`, floating point as
/// `f<N>` and CSRs as `c<NUM>_<name>` with a decimal CSR number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Register {
    Gpr(u8),
    Fpr(u8),
    Csr { number: u16, name: String },
    Other(String),
}

impl Register {
    pub fn parse(token: &str) -> Self {
        let file_pattern =
            FILE_PATTERN.get_or_init(|| Regex::new(r"^([xf])(\d{1,2})$").unwrap());
        if let Some(caps) = file_pattern.captures(token) {
            let index = caps[2].parse::<u8>().ok().filter(|n| *n < 32);
            match (&caps[1], index) {
                ("x", Some(n)) => return Self::Gpr(n),
                ("f", Some(n)) => return Self::Fpr(n),
                _ => {}
            }
        }

        let csr_pattern =
            CSR_PATTERN.get_or_init(|| Regex::new(r"^c(\d+)_([A-Za-z0-9_]+)$").unwrap());
        if let Some(caps) = csr_pattern.captures(token)
            && let Ok(number) = caps[1].parse::<u16>()
        {
            return Self::Csr {
                number,
                name: caps[2].to_string(),
            };
        }

        Self::Other(token.to_string())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpr(n) => write!(f, "x{n}"),
            Self::Fpr(n) => write!(f, "f{n}"),
            Self::Csr { number, name } => write!(f, "c{number}_{name}"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

impl From<Register> for String {
    fn from(reg: Register) -> Self {
        reg.to_string()
    }
}

impl From<String> for Register {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite {
    pub register: Register,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Load,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccess {
    pub address: u64,
    /// Stored value. Loads never carry one.
    pub value: Option<u64>,
    pub direction: Direction,
    /// Register a load writes. Always `None` for stores.
    pub destination: Option<RegisterWrite>,
}

/// Architectural effect reported for one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    RegisterWrite(RegisterWrite),
    MemoryAccess(MemoryAccess),
    NoEffect,
}

/// A single retired instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub pc: u64,
    pub instruction: u32,
    pub effect: Effect,
    /// Stands in for an excluded instruction rather than a real commit line.
    pub synthesized: bool,
}

impl CommitRecord {
    pub fn placeholder(pc: u64, encoding: u32) -> Self {
        Self {
            pc,
            instruction: encoding,
            effect: Effect::NoEffect,
            synthesized: true,
        }
    }

    #[must_use]
    pub fn register_write(&self) -> Option<&RegisterWrite> {
        match &self.effect {
            Effect::RegisterWrite(write) => Some(write),
            Effect::MemoryAccess(access) => access.destination.as_ref(),
            Effect::NoEffect => None,
        }
    }

    #[must_use]
    pub fn memory_access(&self) -> Option<&MemoryAccess> {
        match &self.effect {
            Effect::MemoryAccess(access) => Some(access),
            _ => None,
        }
    }
}

/// Ordered commit records; insertion order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecordStream {
    records: Vec<CommitRecord>,
}

impl RecordStream {
    pub(crate) fn from_records(records: Vec<CommitRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommitRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CommitRecord> {
        self.records.get(index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CommitRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CommitRecord> {
        self.records
    }

    /// Write one JSON object per record, newline delimited.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a stream previously written with [`RecordStream::write_jsonl`].
    pub fn read_jsonl(text: &str) -> Result<Self> {
        let records = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }
}

impl<'a> IntoIterator for &'a RecordStream {
    type Item = &'a CommitRecord;
    type IntoIter = std::slice::Iter<'a, CommitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Parse a hex literal with an optional `0x` prefix.
pub(crate) fn parse_hex_u64(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

static FILE_PATTERN: OnceLock<Regex> = OnceLock::new();
static CSR_PATTERN: OnceLock<Regex> = OnceLock::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_parse() {
        assert_eq!(Register::parse("x0"), Register::Gpr(0));
        assert_eq!(Register::parse("x31"), Register::Gpr(31));
        assert_eq!(Register::parse("f12"), Register::Fpr(12));
        assert_eq!(
            Register::parse("c773_mtvec"),
            Register::Csr {
                number: 773,
                name: "mtvec".to_string()
            }
        );
        assert_eq!(Register::parse("x32"), Register::Other("x32".to_string()));
        assert_eq!(Register::parse("mem"), Register::Other("mem".to_string()));
    }

    #[test]
    fn test_register_display_matches_spike_spelling() {
        for token in ["x5", "f0", "c768_mstatus", "v3"] {
            assert_eq!(Register::parse(token).to_string(), token);
        }
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u64("0x0000000080000004"), Some(0x8000_0004));
        assert_eq!(parse_hex_u64("ff"), Some(0xff));
        assert_eq!(parse_hex_u64("0xzz"), None);
        assert_eq!(parse_hex_u64(""), None);
    }

    #[test]
    fn test_record_json_shape() {
        let record = CommitRecord {
            pc: 0x8000_0004,
            instruction: 0x13,
            effect: Effect::RegisterWrite(RegisterWrite {
                register: Register::Gpr(0),
                value: 0,
            }),
            synthesized: false,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"pc":2147483652,"instruction":19,"effect":{"kind":"register_write","register":"x0","value":0},"synthesized":false}"#
        );
    }

    #[test]
    fn test_placeholder_json_shape() {
        let json = serde_json::to_string(&CommitRecord::placeholder(0x10, 0x13)).unwrap();
        assert_eq!(
            json,
            r#"{"pc":16,"instruction":19,"effect":{"kind":"no_effect"},"synthesized":true}"#
        );
    }

    #[test]
    fn test_load_exposes_destination_register() {
        let record = CommitRecord {
            pc: 0,
            instruction: 0x0182_b283,
            effect: Effect::MemoryAccess(MemoryAccess {
                address: 0x1018,
                value: None,
                direction: Direction::Load,
                destination: Some(RegisterWrite {
                    register: Register::Gpr(5),
                    value: 7,
                }),
            }),
            synthesized: false,
        };
        assert_eq!(record.register_write().map(|w| w.value), Some(7));
        assert_eq!(record.memory_access().map(|m| m.address), Some(0x1018));
    }

    #[test]
    fn test_jsonl_reload() {
        let stream = RecordStream::from_records(vec![
            CommitRecord::placeholder(0x8000_0000, 0x13),
            CommitRecord {
                pc: 0x8000_0040,
                instruction: 0xfc3f_2223,
                effect: Effect::MemoryAccess(MemoryAccess {
                    address: 0x8000_1000,
                    value: Some(1),
                    direction: Direction::Store,
                    destination: None,
                }),
                synthesized: false,
            },
        ]);

        let mut buf = Vec::new();
        stream.write_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(RecordStream::read_jsonl(&text).unwrap(), stream);
    }
}
