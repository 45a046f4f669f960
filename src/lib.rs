//! # stylemap
//!
//! Render arranger-keyboard style parts over arbitrary chord progressions.
//!
//! A style file holds short accompaniment patterns (intros, main sections,
//! fills, endings) recorded over a single chord, plus a settings block that
//! tells the arranger how each channel follows chord changes. This crate reads
//! both and writes the accompaniment for a whole chord chart.
//!
//! ## Modules
//! - [`style`] - Split the embedded MIDI track into parts
//! - [`casm`] - Per-channel harmonization settings
//! - [`harmony`] - Chord symbols, qualities and degrees
//! - [`chart`] - Chord charts and chord timelines
//! - [`voicing`] - The re-harmonization engine
//! - [`midi`] - Standard MIDI File codec
//! - [`api`] - Render entry points
//! - [`config`] - YAML render jobs
//! - [`compare`] - Note-level diff of two MIDI files

pub mod api;
pub mod casm;
pub mod chart;
pub mod compare;
pub mod config;
pub mod error;
pub mod harmony;
pub mod midi;
pub mod style;
pub mod types;
pub mod voicing;

pub use api::{
    render_parsed, render_style, render_style_to_midi, render_style_traced, rendered_to_midi,
    RenderOptions, RenderedSong, TracedRender,
};
pub use chart::{build_chord_timeline, parse_chord_chart, ChordChart, ChordSegment};
pub use error::{Result, StyleError};
pub use style::{parse_style, ParsedStyle, StylePart};
pub use types::{NoteEvent, ProgramChange, TimeSignature};
