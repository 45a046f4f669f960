//! # Voicing Module
//!
//! Re-harmonize a recorded accompaniment pattern over an arbitrary chord timeline.
//!
//! ## Purpose
//! A style part is recorded over one chord per channel (usually CMaj7). To play
//! it over a song, every note has to be moved onto the chord sounding at its
//! position. How a channel moves depends on its settings:
//! 1. **Chord mode** - the channel's chord shape is re-voiced onto the target chord
//! 2. **Melody mode** - each note moves to the nearest fitting degree
//! 3. **Root mode** - the pattern is transposed by the root interval
//!
//! Drum channels keep their pitches.
//!
//! ## Sub-modules
//! - `types` - BuildOptions, BuiltSong, NoteMapping type definitions
//! - `engine` - Pattern tiling and per-note voicing
//! - `chord_mode` - Degree pairing and the permutation search for chord mode
//! - `pitch` - Octave placement helpers
//! - `overlap` - Same-pitch overlap resolution
//!
//! ## Key Types
//! - [`BuildOptions`] - Part, timeline, resolutions and channel settings of one render
//! - [`BuiltSong`] - Voiced notes plus the optional trace
//! - [`NoteMapping`] - How one emitted note was derived
//!
//! ## Entry Point
//! [`build_song()`] - Tile, voice and clean up a part
//!
//! ## Note Window
//! Channels with zoned settings carry a `[note_low, note_high]` window. Every
//! voiced pitch is folded into it by octaves, so a bass line never climbs into
//! the piano's register however far the chord root moves.

mod chord_mode;
mod engine;
mod overlap;
mod pitch;
mod types;


pub use chord_mode::{
    chord_score, compute_chord_mapping, dest_degrees_for_chord_mode, parallel_chord,
    unique_permutations, ChordModeMapping, SourceChord, MAX_PERMUTED_TONES,
};
pub use engine::build_song;
pub use overlap::resolve_overlaps;
pub use pitch::{closest_pitch, lower_pitch, upper_pitch};
pub use types::{BuildOptions, BuiltSong, MappingMode, NoteMapping, SegmentRef};
