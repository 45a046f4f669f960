//! Channel harmonization settings parsed from a style's `CASM` block.

use std::collections::BTreeMap;

use serde::Serialize;

/// Style file generation, taken from the `SFF1`/`SFF2` marker of the first track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SffType {
    Sff1,
    Sff2,
}

/// Note transposition settings of one source channel.
///
/// - `ntr`: 0 = root transposition, 1 = root fixed, 2 = guitar
/// - `ntt`: note transposition table (0 = bypass, non-zero = melody tables)
/// - `bass_on`: keep the bass line interval to the root when chord types agree
/// - `chord_root_upper`: highest chord root before the pattern drops an octave
/// - `note_low`/`note_high`: playable window, always `note_low <= note_high <= 127`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ctb2Settings {
    pub ntr: u8,
    pub ntt: u8,
    pub bass_on: bool,
    pub chord_root_upper: u8,
    pub note_low: u8,
    pub note_high: u8,
    pub rtr: u8,
}

impl Ctb2Settings {
    pub fn is_chord_mode(&self) -> bool {
        self.ntr == 1 || self.ntr == 2
    }

    pub fn is_melody_mode(&self) -> bool {
        self.ntr == 0 && self.ntt != 0
    }
}

/// Settings for one source channel of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSettings {
    pub source_channel: u8,
    pub dest_channel: u8,
    pub muted_notes: u16,
    pub muted_chords: [u8; 5],
    /// Root of the chord the pattern was recorded over (raw value, reduce
    /// with `normalize_pitch_class` before use).
    pub source_root: u8,
    /// Style chord-type name of the recorded chord (`"Maj7"`, `"min"`, ...).
    pub source_quality: Option<String>,
    pub ctb2: Option<Ctb2Settings>,
}

/// A late `Cntt` override of a channel's `ntt` and `bass_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NttOverride {
    pub ntt: u8,
    pub bass_on: bool,
}

/// Settings for every source channel of one part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CasmInfo {
    pub channels: BTreeMap<u8, ChannelSettings>,
    /// `Cntt` overrides, already applied to `channels`.
    pub overrides: BTreeMap<u8, NttOverride>,
}

impl CasmInfo {
    pub fn channel(&self, channel: u8) -> Option<&ChannelSettings> {
        self.channels.get(&channel)
    }

    /// Destination channel for a source channel; unmapped channels keep their number.
    pub fn dest_channel(&self, channel: u8) -> u8 {
        self.channel(channel).map_or(channel, |s| s.dest_channel)
    }
}

/// Per-part settings keyed by normalized part id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasmTable {
    parts: BTreeMap<String, CasmInfo>,
    first: Option<String>,
}

impl CasmTable {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn get(&self, part_id: &str) -> Option<&CasmInfo> {
        self.parts.get(part_id)
    }

    /// Settings of the first part named in the block.
    pub fn first(&self) -> Option<&CasmInfo> {
        self.first.as_deref().and_then(|id| self.parts.get(id))
    }

    /// Settings for a part, falling back to the first part of the block.
    pub fn for_part(&self, part_id: &str) -> Option<&CasmInfo> {
        self.get(part_id).or_else(|| self.first())
    }

    pub fn part_ids(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub(crate) fn entry(&mut self, part_id: &str) -> &mut CasmInfo {
        if self.first.is_none() {
            self.first = Some(part_id.to_string());
        }
        self.parts.entry(part_id.to_string()).or_default()
    }

    pub(crate) fn infos_mut(&mut self) -> impl Iterator<Item = &mut CasmInfo> {
        self.parts.values_mut()
    }
}
