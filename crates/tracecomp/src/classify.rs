//! Line classification and skip-region state machine.
//!
//! Decides, one line at a time and without lookahead, whether a transcript
//! line is a commit line to extract, noise from the interactive debugger or
//! a trap dump, or part of an excluded region.

use tracing::debug;

use crate::config::MarkerTable;
use crate::record::TranscriptLine;

/// Classifier state carried between lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipState {
    #[default]
    Passthrough,
    /// The next line is output of an echoed debugger command.
    SuppressNext,
    InExcludedRegion,
}

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Noise,
    RegionStart,
    RegionEnd,
    Retain,
}

pub struct LineClassifier<'a> {
    markers: &'a MarkerTable,
    state: SkipState,
}

impl<'a> LineClassifier<'a> {
    pub fn new(markers: &'a MarkerTable) -> Self {
        Self {
            markers,
            state: SkipState::Passthrough,
        }
    }

    pub fn state(&self) -> SkipState {
        self.state
    }

    /// Classify `line` and advance the state. First matching rule wins.
    pub fn classify(&mut self, line: &TranscriptLine) -> LineClass {
        let text = line.text.as_str();
        let markers = self.markers;

        if self.state == SkipState::InExcludedRegion {
            if text.contains(&markers.region_end) {
                debug!(line = line.index, "excluded region closed");
                self.state = SkipState::Passthrough;
                return LineClass::RegionEnd;
            }
            return LineClass::Noise;
        }

        if text.contains(&markers.prompt) {
            if text.contains(&markers.echo) {
                self.state = SkipState::SuppressNext;
            }
            return LineClass::Noise;
        }

        if self.state == SkipState::SuppressNext {
            self.state = SkipState::Passthrough;
            return LineClass::Noise;
        }

        if text.contains(&markers.exception) {
            return LineClass::Noise;
        }

        if text.contains(&markers.region_start) {
            debug!(line = line.index, "excluded region opened");
            self.state = SkipState::InExcludedRegion;
            return LineClass::RegionStart;
        }

        // Blank lines still pass through the state rules above, so they
        // consume a pending suppression and count inside a region.
        if line.is_blank() {
            return LineClass::Noise;
        }
        LineClass::Retain
    }
}
