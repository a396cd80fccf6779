use thiserror::Error;

/// Why a retained commit line could not be turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("expected at least {needed} tokens, found {found}")]
    MissingFields { needed: usize, found: usize },
    #[error("program counter is not a hex literal")]
    ProgramCounter,
    #[error("instruction encoding is not a parenthesized hex literal")]
    Instruction,
    #[error("register value is not a hex literal")]
    RegisterValue,
    #[error("memory address is not a hex literal")]
    MemoryAddress,
    #[error("memory value is not a hex literal")]
    MemoryValue,
}

/// Trace parsing errors.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("malformed commit line {index}: {reason}: {text:?}")]
    MalformedLine {
        index: usize,
        text: String,
        reason: MalformedReason,
    },

    #[error(
        "stream integrity violated: emitted {emitted} records, expected {retained} retained + {synthesized} synthesized"
    )]
    StreamIntegrity {
        emitted: u64,
        retained: u64,
        synthesized: u64,
    },

    #[error("golden model `{program}` unavailable: {reason}")]
    SourceUnavailable { program: String, reason: String },

    #[error("invalid marker configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;
