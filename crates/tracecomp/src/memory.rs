//! Load/store disambiguation for commit lines carrying a memory token.
//!
//! Spike's commit log distinguishes the two forms only by position:
//!
//! - load:  `core 0: 3 0x<PC> (0x<INSN>) x<RD> 0x<VALUE> mem 0x<ADDR>`
//! - store: `core 0: 3 0x<PC> (0x<INSN>) mem 0x<ADDR> 0x<VALUE>`
//!
//! A load keeps the register write that precedes the memory token; a store
//! never reports one, so whatever sat in tokens 5 and 6 is discarded.

use crate::error::{MalformedReason, Result};
use crate::record::{Direction, MemoryAccess, RegisterWrite, TranscriptLine, parse_hex_u64};

/// Lines with more tokens than this are loads.
const STORE_MAX_TOKENS: usize = 8;
const LOAD_ADDRESS_TOKEN: usize = 8;
const STORE_ADDRESS_TOKEN: usize = 6;
const STORE_VALUE_TOKEN: usize = 7;

/// Whether a memory line with `token_count` tokens is a load.
pub fn is_load(token_count: usize) -> bool {
    token_count > STORE_MAX_TOKENS
}

/// Resolve the memory form of a line.
///
/// `tentative` is the register write read from tokens 5 and 6, if any. It is
/// only consulted for loads.
pub fn classify_memory(
    line: &TranscriptLine,
    tokens: &[&str],
    has_memory_marker: bool,
    tentative: Option<RegisterWrite>,
) -> Result<Option<MemoryAccess>> {
    if !has_memory_marker {
        return Ok(None);
    }

    if is_load(tokens.len()) {
        let address = hex_at(
            line,
            tokens,
            LOAD_ADDRESS_TOKEN,
            MalformedReason::MemoryAddress,
        )?;
        return Ok(Some(MemoryAccess {
            address,
            value: None,
            direction: Direction::Load,
            destination: tentative,
        }));
    }

    let address = hex_at(
        line,
        tokens,
        STORE_ADDRESS_TOKEN,
        MalformedReason::MemoryAddress,
    )?;
    let value = if tokens.len() > STORE_VALUE_TOKEN {
        Some(hex_at(line, tokens, STORE_VALUE_TOKEN, MalformedReason::MemoryValue)?)
    } else {
        None
    };
    Ok(Some(MemoryAccess {
        address,
        value,
        direction: Direction::Store,
        destination: None,
    }))
}

fn hex_at(
    line: &TranscriptLine,
    tokens: &[&str],
    position: usize,
    reason: MalformedReason,
) -> Result<u64> {
    tokens
        .get(position)
        .and_then(|token| parse_hex_u64(token))
        .ok_or_else(|| line.malformed(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraceError;
    use crate::record::Register;

    fn classify(text: &str, tentative: Option<RegisterWrite>) -> Result<Option<MemoryAccess>> {
        let line = TranscriptLine::new(0, text);
        let tokens = line.tokens();
        classify_memory(&line, &tokens, true, tentative)
    }

    fn x5() -> RegisterWrite {
        RegisterWrite {
            register: Register::Gpr(5),
            value: 0x8000_0000,
        }
    }

    #[test]
    fn test_no_marker_is_none() {
        let line = TranscriptLine::new(0, "core   0: 3 0x80000000 (0x00000013)");
        let tokens = line.tokens();
        assert_eq!(classify_memory(&line, &tokens, false, None).unwrap(), None);
    }

    #[test]
    fn test_load_keeps_destination() {
        let access = classify(
            "core   0: 3 0x000000008000010c (0x0182b283) x5 0x0000000080000000 mem 0x0000000000001018",
            Some(x5()),
        )
        .unwrap()
        .unwrap();

        assert_eq!(access.direction, Direction::Load);
        assert_eq!(access.address, 0x1018);
        assert_eq!(access.value, None);
        assert_eq!(access.destination, Some(x5()));
    }

    #[test]
    fn test_store_clears_register_fields() {
        let access = classify(
            "core   0: 3 0x80000040 (0xfc3f2223) mem 0x80001000 0x00000001",
            Some(RegisterWrite {
                register: Register::Other("mem".to_string()),
                value: 0x8000_1000,
            }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(access.direction, Direction::Store);
        assert_eq!(access.address, 0x8000_1000);
        assert_eq!(access.value, Some(1));
        assert_eq!(access.destination, None);
    }

    #[test]
    fn test_store_without_value() {
        let access = classify("core   0: 3 0x80000040 (0x00052023) mem 0x80001000", None)
            .unwrap()
            .unwrap();
        assert_eq!(access.direction, Direction::Store);
        assert_eq!(access.value, None);
    }

    #[test]
    fn test_bad_address_is_malformed() {
        let err = classify("core   0: 3 0x80000040 (0x00052023) mem zzzz 0x1", None).unwrap_err();
        assert!(matches!(
            err,
            TraceError::MalformedLine {
                reason: MalformedReason::MemoryAddress,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_store_address_is_malformed() {
        let err = classify("core   0: 3 0x80000040 (0x00052023) mem", None).unwrap_err();
        assert!(matches!(
            err,
            TraceError::MalformedLine {
                reason: MalformedReason::MemoryAddress,
                ..
            }
        ));
    }
}
