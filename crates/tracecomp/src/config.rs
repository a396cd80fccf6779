//! Parse configuration.
//!
//! Every marker the classifier and extractor look for is a literal substring
//! held in [`MarkerTable`]. Nothing is matched against hard-coded strings, so a
//! different Spike build (or a different golden model) only needs a new table.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// `addi x0, x0, 0`
pub const NOP_ENCODING: u32 = 0x0000_0013;

/// Literal substrings that drive line classification and field extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerTable {
    /// Interactive debugger prompt.
    pub prompt: String,
    /// Echoed debugger command whose output occupies the following line.
    pub echo: String,
    /// Trap dump line.
    pub exception: String,
    /// Opens an excluded region (write to the ISA capability CSR).
    pub region_start: String,
    /// Closes an excluded region (the `ecall` encoding).
    pub region_end: String,
    /// Trap-value continuation line; normal commit fields are elided.
    pub value_trap: String,
    /// Memory-access token.
    pub memory: String,
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self {
            prompt: "(spike)".to_string(),
            echo: "reg 0".to_string(),
            exception: "exception".to_string(),
            region_start: "c301_misa".to_string(),
            region_end: "(0x00000073)".to_string(),
            value_trap: " tval ".to_string(),
            memory: " mem ".to_string(),
        }
    }
}

impl MarkerTable {
    fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("prompt", &self.prompt),
            ("echo", &self.echo),
            ("exception", &self.exception),
            ("region_start", &self.region_start),
            ("region_end", &self.region_end),
            ("value_trap", &self.value_trap),
            ("memory", &self.memory),
        ]
    }

    /// Reject empty markers; an empty substring matches every line.
    pub fn validate(&self) -> Result<()> {
        for (name, marker) in self.fields() {
            if marker.trim().is_empty() {
                return Err(TraceError::Config(format!("marker `{name}` is empty")));
            }
        }
        Ok(())
    }
}

/// What to do with a retained line that cannot be extracted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Abort the whole parse. A malformed commit line means the log format
    /// does not match the marker table and the run cannot be trusted.
    #[default]
    Strict,
    /// Log, count, and skip the line.
    Lenient,
}

/// Immutable configuration shared by the classifier and extractor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    pub markers: MarkerTable,
    /// Encoding carried by placeholder and value-trap records.
    pub placeholder_encoding: u32,
    pub strictness: Strictness,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            markers: MarkerTable::default(),
            placeholder_encoding: NOP_ENCODING,
            strictness: Strictness::Strict,
        }
    }
}

impl ParseConfig {
    #[must_use]
    pub fn with_markers(mut self, markers: MarkerTable) -> Self {
        self.markers = markers;
        self
    }

    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    #[must_use]
    pub fn with_placeholder_encoding(mut self, encoding: u32) -> Self {
        self.placeholder_encoding = encoding;
        self
    }

    #[must_use]
    pub fn is_lenient(&self) -> bool {
        self.strictness == Strictness::Lenient
    }

    /// Parse a TOML document. Missing keys fall back to the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.markers.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markers_are_valid() {
        assert!(MarkerTable::default().validate().is_ok());
    }

    #[test]
    fn test_empty_marker_rejected() {
        let markers = MarkerTable {
            memory: "  ".to_string(),
            ..MarkerTable::default()
        };
        let err = markers.validate().unwrap_err();
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ParseConfig::from_toml_str(
            r#"
strictness = "lenient"

[markers]
region_start = "c769_mstatus"
"#,
        )
        .unwrap();

        assert!(config.is_lenient());
        assert_eq!(config.markers.region_start, "c769_mstatus");
        assert_eq!(config.markers.prompt, "(spike)");
        assert_eq!(config.placeholder_encoding, NOP_ENCODING);
    }

    #[test]
    fn test_toml_rejects_empty_marker() {
        let err = ParseConfig::from_toml_str("[markers]\nprompt = \"\"\n").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
    }

    #[test]
    fn test_toml_output_reloads() {
        let config = ParseConfig::default().with_strictness(Strictness::Lenient);
        let text = config.to_toml_string().unwrap();
        assert_eq!(ParseConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_builders_return_updated_config() {
        let config = ParseConfig::default()
            .with_strictness(Strictness::Lenient)
            .with_placeholder_encoding(0x0000_0001);

        assert!(config.is_lenient());
        assert_eq!(config.placeholder_encoding, 1);
        assert_eq!(config.markers, MarkerTable::default());
        assert!(!ParseConfig::default().is_lenient());
    }
}
