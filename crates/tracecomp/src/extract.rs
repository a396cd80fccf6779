//! Positional field extraction for retained commit lines.
//!
//! ```text
//! core   0: 3 0x0000000080000004 (0x00000013) x0 0x0000000000000000
//! ^0     ^1 ^2 ^3                 ^4           ^5 ^6
//! ```

use crate::config::ParseConfig;
use crate::error::{MalformedReason, Result, TraceError};
use crate::memory::{self, classify_memory};
use crate::record::{
    CommitRecord, Effect, Register, RegisterWrite, TranscriptLine, parse_hex_u64,
};

const PC_TOKEN: usize = 3;
const INSTRUCTION_TOKEN: usize = 4;
const REGISTER_TOKEN: usize = 5;
const VALUE_TOKEN: usize = 6;

pub struct Extractor<'a> {
    config: &'a ParseConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a ParseConfig) -> Self {
        Self { config }
    }

    /// Whether Spike elided the normal commit fields on this line.
    pub fn is_value_trap(&self, line: &TranscriptLine) -> bool {
        line.text.contains(&self.config.markers.value_trap)
    }

    /// Turn a retained line into exactly one record.
    pub fn extract(&self, line: &TranscriptLine) -> Result<CommitRecord> {
        let tokens = line.tokens();
        if tokens.len() <= PC_TOKEN {
            return Err(missing(line, PC_TOKEN + 1, tokens.len()));
        }

        let pc = parse_hex_u64(tokens[PC_TOKEN])
            .ok_or_else(|| line.malformed(MalformedReason::ProgramCounter))?;

        if self.is_value_trap(line) {
            return Ok(CommitRecord {
                pc,
                instruction: self.config.placeholder_encoding,
                effect: Effect::NoEffect,
                synthesized: false,
            });
        }

        // Four tokens is both "fewer than five, so no effect" and "no
        // instruction encoding". The encoding is required: a record with an
        // invented encoding would compare against RTL as a real commit.
        let Some(token) = tokens.get(INSTRUCTION_TOKEN) else {
            return Err(missing(line, INSTRUCTION_TOKEN + 1, tokens.len()));
        };
        let instruction = parse_instruction(token)
            .ok_or_else(|| line.malformed(MalformedReason::Instruction))?;

        let has_memory = line.text.contains(&self.config.markers.memory);
        // Tokens 5 and 6 of a store are the memory operands, not a register.
        let is_store = has_memory && !memory::is_load(tokens.len());
        let tentative = if tokens.len() > REGISTER_TOKEN && !is_store {
            Some(register_write(line, &tokens)?)
        } else {
            None
        };

        let effect = if has_memory {
            classify_memory(line, &tokens, true, tentative)?
                .map_or(Effect::NoEffect, Effect::MemoryAccess)
        } else {
            tentative.map_or(Effect::NoEffect, Effect::RegisterWrite)
        };

        Ok(CommitRecord {
            pc,
            instruction,
            effect,
            synthesized: false,
        })
    }

    /// Placeholder for a line inside an excluded region.
    ///
    /// The program counter is taken from the line when it has one.
    pub fn placeholder(&self, line: &TranscriptLine) -> CommitRecord {
        let pc = line
            .text
            .split_whitespace()
            .nth(PC_TOKEN)
            .and_then(parse_hex_u64)
            .unwrap_or(0);
        CommitRecord::placeholder(pc, self.config.placeholder_encoding)
    }
}

fn register_write(line: &TranscriptLine, tokens: &[&str]) -> Result<RegisterWrite> {
    let register = Register::parse(tokens[REGISTER_TOKEN]);
    let Some(token) = tokens.get(VALUE_TOKEN) else {
        return Err(missing(line, VALUE_TOKEN + 1, tokens.len()));
    };
    let value = parse_hex_u64(token)
        .ok_or_else(|| line.malformed(MalformedReason::RegisterValue))?;
    Ok(RegisterWrite { register, value })
}

/// `(0x00000013)` -> `0x13`
fn parse_instruction(token: &str) -> Option<u32> {
    let inner = token.strip_prefix('(')?.strip_suffix(')')?;
    let value = parse_hex_u64(inner)?;
    u32::try_from(value).ok()
}

fn missing(line: &TranscriptLine, needed: usize, found: usize) -> TraceError {
    line.malformed(MalformedReason::MissingFields { needed, found })
}
