//! Time windows on the playback timeline

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Playback position in milliseconds
pub type Position = u64;

/// Slot used when a document does not name one
pub const DEFAULT_SLOT: &str = "top";

/// A half-open interval `[start, end)` during which an activation wants to
/// occupy a named screen slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    start: Position,
    end: Position,
    #[serde(rename = "slotName")]
    slot: String,
    settings: Value,
}

#[derive(Deserialize)]
struct RawTimeWindow {
    start: Position,
    end: Position,
    #[serde(rename = "slotName", default = "default_slot")]
    slot: String,
    #[serde(default)]
    settings: Value,
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = Error;

    fn try_from(raw: RawTimeWindow) -> Result<Self> {
        Self::new(raw.start, raw.end, raw.slot, raw.settings)
    }
}

impl TimeWindow {
    /// Creates a new time window, rejecting empty or inverted intervals
    pub fn new(
        start: Position,
        end: Position,
        slot: impl Into<String>,
        settings: Value,
    ) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidWindow { start, end });
        }
        Ok(Self {
            start,
            end,
            slot: slot.into(),
            settings,
        })
    }

    /// First position inside the window
    pub fn start(&self) -> Position {
        self.start
    }

    /// First position after the window
    pub fn end(&self) -> Position {
        self.end
    }

    /// Name of the screen slot this window targets
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Free-form per-window settings carried through from the document
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// Checks if this window is active at the given position
    pub fn contains(&self, position: Position) -> bool {
        position >= self.start && position < self.end
    }

    /// Returns the duration of this window in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end - self.start
    }
}
