//! Shared value types
//!
//! Notes, time signatures and program assignments flow between the codec, the
//! style reader and the voicing engine. They are plain values: once built they
//! are replaced, never edited in place.

use serde::{Deserialize, Serialize};

/// A sounding note with absolute tick timing.
///
/// # Fields
/// - `channel`: MIDI channel 0-15
/// - `pitch`: MIDI note number 0-127
/// - `velocity`: 1-127 (a note-on with velocity 0 is a note-off and never becomes a `NoteEvent`)
/// - `start_tick`: absolute start in ticks (part-relative inside a [`StylePart`](crate::StylePart))
/// - `duration`: length in ticks, always greater than zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub duration: u64,
}

impl NoteEvent {
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration
    }
}

/// Time signature as numerator over denominator (4/4, 3/4, 6/8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    /// Bar length measured in quarter notes: 4/4 = 4.0, 6/8 = 3.0.
    pub fn beats_per_bar(&self) -> f64 {
        let denominator = self.denominator.max(1) as f64;
        self.numerator as f64 * 4.0 / denominator
    }
}

/// Program assignment for a channel, with the bank select that preceded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramChange {
    pub program: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_msb: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_lsb: Option<u8>,
}

/// Channels 9 and 10 (zero-based 8 and 9) carry drum kits in style files.
pub fn is_drum_channel(channel: u8) -> bool {
    channel == 8 || channel == 9
}
