//! Voicing engine type definitions

use serde::Serialize;

use crate::casm::{CasmInfo, Ctb2Settings};
use crate::chart::ChordSegment;
use crate::harmony::Degree;
use crate::style::StylePart;
use crate::types::{NoteEvent, TimeSignature};

/// How a channel's notes follow the chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// The recorded chord shape is re-voiced onto the target chord
    Chord,
    /// Each note moves to the nearest fitting degree of the target chord
    Melody,
    /// The pattern is transposed by the root interval
    Root,
}

impl MappingMode {
    /// Mode selected by a channel's settings; channels without settings follow the root.
    pub fn for_settings(ctb2: Option<&Ctb2Settings>) -> Self {
        match ctb2 {
            Some(s) if s.is_chord_mode() => MappingMode::Chord,
            Some(s) if s.is_melody_mode() => MappingMode::Melody,
            _ => MappingMode::Root,
        }
    }
}

/// Chord span a mapped note was voiced against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRef {
    pub start_tick: u64,
    pub end_tick: u64,
    pub symbol: String,
}

/// Trace record of one emitted note.
///
/// # Fields
/// - `source_rel_pitch`: source pitch class relative to the recorded chord root
/// - `dest_rel_pitch`: emitted pitch class relative to the target root
/// - `source_degree` / `dest_degree`: degree interpretation on each side
/// - `start_tick` / `duration`: the emitted sub-span in output ticks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMapping {
    pub source_channel: u8,
    pub dest_channel: u8,
    pub source_pitch: u8,
    pub dest_pitch: u8,
    pub source_rel_pitch: u8,
    pub dest_rel_pitch: u8,
    pub source_degree: Degree,
    pub dest_degree: Degree,
    pub mapping: MappingMode,
    pub start_tick: u64,
    pub duration: u64,
    pub segment: SegmentRef,
    pub source_root: u8,
    pub target_root: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctb2: Option<Ctb2Settings>,
}

/// Inputs of [`build_song`](super::build_song).
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions<'a> {
    pub bars: u32,
    /// Resolution of the part's note ticks.
    pub input_ticks_per_beat: u16,
    pub output_ticks_per_beat: u16,
    pub time_signature: TimeSignature,
    pub part: &'a StylePart,
    /// Chord spans in output ticks; an empty slice plays `C7` throughout.
    pub chord_timeline: &'a [ChordSegment],
    pub settings: Option<&'a CasmInfo>,
    /// Collect a [`NoteMapping`] per emitted note.
    pub trace: bool,
}

/// Re-harmonized notes of one render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuiltSong {
    pub notes: Vec<NoteEvent>,
    pub total_ticks: u64,
    /// Empty unless tracing was requested.
    pub mappings: Vec<NoteMapping>,
}
