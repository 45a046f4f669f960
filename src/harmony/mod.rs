//! Harmonic model
//!
//! Chord symbols, chord qualities and the degree taxonomy used by the voicing
//! engine.
//!
//! ## Modules
//! - `tones` - Chord symbol parsing into root and semitone offsets
//! - `degree` - The 15 degrees, their naturals and slot positions
//! - `profile` - Chord quality classification and degree fitting

pub mod degree;
pub mod profile;
pub mod tones;

pub use degree::{degree_most_probable, Degree, DegreeIndex, DegreeNatural};
pub use profile::{ChordFamily, ChordProfile, ChordTypeInfo};
pub use tones::{
    chord_tones_for_quality, chord_tones_for_symbol, chord_tones_for_type_name, extract_quality,
    normalize_pitch_class, parse_chord_root,
};
