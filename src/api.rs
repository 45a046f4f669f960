//! # Public API
//!
//! This module contains the main entry points for rendering a style part over
//! a chord progression.
//!
//! ## Render Functions
//!
//! - [`render_style()`] - Parse a style file and render one part (recommended)
//! - [`render_style_traced()`] - Same, keeping a per-note mapping trace
//! - [`render_parsed()`] - Render from an already parsed style
//! - [`render_style_to_midi()`] - Render straight to Standard MIDI File bytes
//!
//! ## Typical Usage
//!
//! ```rust,no_run
//! use stylemap::{render_style_to_midi, RenderOptions};
//!
//! let style = std::fs::read("SwingBallad.S910.sty")?;
//! let mut options = RenderOptions::new("Main A");
//! options.chord_chart = Some("Cmaj7 A7 | Dm7 G7 | Em7 A7 | Dm7 G7".to_string());
//! options.tempo_bpm = Some(96.0);
//!
//! let midi = render_style_to_midi(&style, &options)?;
//! std::fs::write("ballad.mid", midi)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::chart::{build_chord_timeline, parse_chord_chart, ticks_per_bar, ChordSegment, DEFAULT_CHORD};
use crate::error::{Result, StyleError};
use crate::midi::{SequenceCodec, SmfCodec, SongFile, MAX_TEMPO, MAX_TICKS_PER_BEAT};
use crate::style::{parse_style, ParsedStyle};
use crate::types::{NoteEvent, ProgramChange, TimeSignature};
use crate::voicing::{build_song, BuildOptions, NoteMapping};

/// Output resolution used unless the options ask for another one.
pub const DEFAULT_OUTPUT_TICKS_PER_BEAT: u16 = 960;

/// Track name written into rendered MIDI files.
pub const RENDER_TRACK_NAME: &str = "stylemap render";

/// What to render and how.
///
/// # Fields
/// - `part`: marker of the style part, matched case-insensitively
/// - `bars`: song length; defaults to the chart length (or the timeline's)
/// - `chord_chart`: chart text, see [`crate::chart`]; `C7` when absent
/// - `chord_timeline`: precomputed chord spans in output ticks, replaces the chart
/// - `tempo_bpm`: overrides the style's tempo
/// - `output_ticks_per_beat`: resolution of the rendered notes
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub part: String,
    pub bars: Option<u32>,
    pub chord_chart: Option<String>,
    pub chord_timeline: Option<Vec<ChordSegment>>,
    pub tempo_bpm: Option<f64>,
    pub output_ticks_per_beat: u16,
}

impl RenderOptions {
    /// Options rendering `part` over the default chart at 960 ticks per beat.
    pub fn new(part: impl Into<String>) -> Self {
        Self {
            part: part.into(),
            bars: None,
            chord_chart: None,
            chord_timeline: None,
            tempo_bpm: None,
            output_ticks_per_beat: DEFAULT_OUTPUT_TICKS_PER_BEAT,
        }
    }
}

/// A rendered part.
///
/// `programs_by_channel` is keyed by destination channel, matching the notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSong {
    pub notes: Vec<NoteEvent>,
    pub total_ticks: u64,
    pub ticks_per_beat: u16,
    /// Microseconds per quarter note.
    pub tempo: u32,
    pub time_signature: TimeSignature,
    pub programs_by_channel: BTreeMap<u8, ProgramChange>,
}

/// A rendered part together with the mapping of every emitted note.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedRender {
    pub song: RenderedSong,
    pub mappings: Vec<NoteMapping>,
}

/// Render one part of a style file.
///
/// # Errors
/// - [`StyleError::Codec`] when the embedded MIDI data cannot be decoded
/// - [`StyleError::PartNotFound`] when no part has the requested marker
/// - [`StyleError::Config`] when the output resolution or the tempo cannot be
///   written to a MIDI file
pub fn render_style(bytes: &[u8], options: &RenderOptions) -> Result<RenderedSong> {
    let style = parse_style(bytes, &SmfCodec)?;
    render_parsed(&style, options, false).map(|traced| traced.song)
}

/// Render one part of a style file and keep the per-note mapping trace.
pub fn render_style_traced(bytes: &[u8], options: &RenderOptions) -> Result<TracedRender> {
    let style = parse_style(bytes, &SmfCodec)?;
    render_parsed(&style, options, true)
}

/// Render one part of a parsed style.
///
/// # Pipeline
/// 1. Look up the part and its channel settings (the first settings block
///    when the part has none of its own)
/// 2. Build the chord timeline from the options
/// 3. Voice the part over the timeline
/// 4. Re-key the part's programs by destination channel
pub fn render_parsed(style: &ParsedStyle, options: &RenderOptions, trace: bool) -> Result<TracedRender> {
    let part = style.part(&options.part).ok_or_else(|| StyleError::PartNotFound {
        part: options.part.clone(),
        available: style.markers(),
    })?;
    if options.output_ticks_per_beat == 0 || options.output_ticks_per_beat > MAX_TICKS_PER_BEAT {
        return Err(StyleError::Config(format!(
            "output ticks per beat must be between 1 and {}",
            MAX_TICKS_PER_BEAT
        )));
    }
    let tempo = match tempo_micros(options.tempo_bpm) {
        Some(tempo) if tempo > MAX_TEMPO => {
            return Err(StyleError::Config(format!(
                "tempo {} BPM is too slow to encode",
                options.tempo_bpm.unwrap_or_default()
            )));
        }
        Some(tempo) => tempo,
        None => style.tempo,
    };

    let time_signature = style
        .time_signature
        .filter(|ts| ts.numerator > 0)
        .unwrap_or_default();
    let output_ticks_per_beat = options.output_ticks_per_beat;
    let bar_ticks = ticks_per_bar(time_signature, output_ticks_per_beat as u32);
    let settings = style.casm.for_part(&part.id);

    let mut bars = options.bars.filter(|&b| b > 0);
    let timeline = match &options.chord_timeline {
        Some(timeline) => timeline.clone(),
        None => {
            let chart = parse_chord_chart(options.chord_chart.as_deref().unwrap_or(DEFAULT_CHORD));
            let chart_bars = bars.unwrap_or_else(|| (chart.bars.len() as u32).max(1));
            bars = Some(chart_bars);
            build_chord_timeline(&chart, Some(chart_bars), bar_ticks)
        }
    };
    let bars = bars.unwrap_or_else(|| {
        let last_end = timeline.last().map_or(bar_ticks, |s| s.end_tick as f64);
        ((last_end / bar_ticks).round() as u32).max(1)
    });

    let built = build_song(&BuildOptions {
        bars,
        input_ticks_per_beat: style.ticks_per_beat,
        output_ticks_per_beat,
        time_signature,
        part,
        chord_timeline: &timeline,
        settings,
        trace,
    });

    let programs_by_channel = part
        .programs_by_channel
        .iter()
        .map(|(&channel, &change)| {
            let dest = settings.map_or(channel, |s| s.dest_channel(channel));
            (dest, change)
        })
        .collect();

    info!(
        part = %part.marker,
        bars,
        chords = timeline.len(),
        notes = built.notes.len(),
        tempo,
        "Rendered style part"
    );

    Ok(TracedRender {
        song: RenderedSong {
            notes: built.notes,
            total_ticks: built.total_ticks,
            ticks_per_beat: output_ticks_per_beat,
            tempo,
            time_signature,
            programs_by_channel,
        },
        mappings: built.mappings,
    })
}

/// Render one part of a style file as Standard MIDI File bytes.
pub fn render_style_to_midi(bytes: &[u8], options: &RenderOptions) -> Result<Vec<u8>> {
    let song = render_style(bytes, options)?;
    rendered_to_midi(&song, &SmfCodec)
}

/// Encode a rendered song: format 1, programs at tick 0, end of track one
/// tick after the song.
pub fn rendered_to_midi(song: &RenderedSong, codec: &dyn SequenceCodec) -> Result<Vec<u8>> {
    codec.encode(&SongFile {
        ticks_per_beat: song.ticks_per_beat,
        tempo: song.tempo,
        time_signature: song.time_signature,
        notes: song.notes.clone(),
        programs: song.programs_by_channel.clone(),
        track_name: Some(RENDER_TRACK_NAME.to_string()),
        end_tick: Some(song.total_ticks + 1),
    })
}

/// Microseconds per quarter note for a BPM value; `None` for unusable values.
fn tempo_micros(bpm: Option<f64>) -> Option<u32> {
    let bpm = bpm.filter(|b| b.is_finite() && *b > 0.0)?;
    Some(((60_000_000.0 / bpm).round() as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_micros() {
        assert_eq!(tempo_micros(Some(120.0)), Some(500_000));
        assert_eq!(tempo_micros(Some(90.0)), Some(666_667));
        assert_eq!(tempo_micros(Some(0.0)), None);
        assert_eq!(tempo_micros(Some(f64::NAN)), None);
        assert_eq!(tempo_micros(None), None);
        assert_eq!(tempo_micros(Some(1e12)), Some(1));
    }

    fn one_note_style(time_signature: Option<TimeSignature>) -> ParsedStyle {
        ParsedStyle {
            ticks_per_beat: 480,
            tempo: 500_000,
            time_signature,
            parts: vec![crate::style::StylePart {
                id: "main_a".to_string(),
                marker: "Main A".to_string(),
                start_tick: 0,
                length_ticks: 1920,
                notes: vec![NoteEvent {
                    channel: 10,
                    pitch: 36,
                    velocity: 100,
                    start_tick: 0,
                    duration: 480,
                }],
                programs_by_channel: BTreeMap::new(),
            }],
            casm: Default::default(),
            sff_type: None,
            mega_voice_channels: Default::default(),
        }
    }

    #[test]
    fn test_unencodable_tempo_and_resolution_rejected() {
        let style = one_note_style(None);

        let mut options = RenderOptions::new("Main A");
        options.tempo_bpm = Some(3.0);
        let err = render_parsed(&style, &options, false).unwrap_err();
        assert!(matches!(err, StyleError::Config(_)));

        let mut options = RenderOptions::new("Main A");
        options.output_ticks_per_beat = 40_000;
        let err = render_parsed(&style, &options, false).unwrap_err();
        assert!(matches!(err, StyleError::Config(_)));

        let mut options = RenderOptions::new("Main A");
        options.tempo_bpm = Some(4.0);
        options.output_ticks_per_beat = MAX_TICKS_PER_BEAT;
        let traced = render_parsed(&style, &options, false).unwrap();
        assert_eq!(traced.song.tempo, 15_000_000);
    }

    #[test]
    fn test_zero_numerator_meter_renders_in_four() {
        let style = one_note_style(Some(TimeSignature {
            numerator: 0,
            denominator: 4,
        }));
        let mut options = RenderOptions::new("Main A");
        options.output_ticks_per_beat = 480;
        let traced = render_parsed(&style, &options, false).unwrap();
        assert_eq!(traced.song.total_ticks, 1920);
        assert_eq!(traced.song.time_signature, TimeSignature::default());
        assert_eq!(traced.song.notes.len(), 1);
    }

    #[test]
    fn test_render_options_defaults() {
        let options = RenderOptions::new("Main A");
        assert_eq!(options.part, "Main A");
        assert_eq!(options.output_ticks_per_beat, 960);
        assert!(options.bars.is_none());
        assert!(options.chord_chart.is_none());
    }
}
