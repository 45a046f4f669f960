//! Integration tests for the style renderer
//!
//! Tests the full pipeline from style bytes (a Standard MIDI File followed by a
//! `CASM` block) to rendered notes and MIDI output.

use std::collections::BTreeSet;

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use pretty_assertions::assert_eq;
use stylemap::compare::{compare_notes, notes_from_smf};
use stylemap::midi::SmfCodec;
use stylemap::voicing::MappingMode;
use stylemap::{
    parse_style, render_style, render_style_to_midi, render_style_traced, RenderOptions,
    StyleError,
};

fn midi(channel: u8, message: MidiMessage) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message,
    }
}

fn on(channel: u8, key: u8) -> TrackEventKind<'static> {
    midi(
        channel,
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(100),
        },
    )
}

fn off(channel: u8, key: u8) -> TrackEventKind<'static> {
    midi(
        channel,
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        },
    )
}

fn marker(text: &'static str) -> TrackEventKind<'static> {
    TrackEventKind::Meta(MetaMessage::Marker(text.as_bytes()))
}

/// Standard MIDI File with one style track: an init section, then `Main A`
/// (bass on 10, a C triad on 11, a kick on 9) and `Main B`.
fn style_smf() -> Vec<u8> {
    let events: Vec<(u32, TrackEventKind<'static>)> = vec![
        (0, marker("SFF2")),
        (0, marker("SInt")),
        (0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000)))),
        (0, TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8))),
        (
            0,
            midi(
                10,
                MidiMessage::Controller {
                    controller: u7::new(0),
                    value: u7::new(0),
                },
            ),
        ),
        (0, midi(10, MidiMessage::ProgramChange { program: u7::new(32) })),
        (0, midi(11, MidiMessage::ProgramChange { program: u7::new(0) })),
        (1920, marker("Main A")),
        (1920, on(10, 36)),
        (1920, on(11, 60)),
        (1920, on(11, 64)),
        (1920, on(11, 67)),
        (1920, on(9, 36)),
        (2040, off(9, 36)),
        (2400, off(10, 36)),
        (3360, off(11, 60)),
        (3360, off(11, 64)),
        (3360, off(11, 67)),
        (3840, marker("Main B")),
        (3840, on(10, 43)),
        (4320, off(10, 43)),
        (5760, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ];

    let mut last = 0;
    let track: Vec<TrackEvent<'static>> = events
        .into_iter()
        .map(|(tick, kind)| {
            let delta = tick - last;
            last = tick;
            TrackEvent {
                delta: u28::new(delta),
                kind,
            }
        })
        .collect();

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
        tracks: vec![track],
    };
    let mut out = Vec::new();
    smf.write(&mut out).unwrap();
    out
}

fn block(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn channel_header(source: u8, dest: u8, code: u8) -> Vec<u8> {
    let mut body = vec![source];
    body.extend_from_slice(b"Part    ");
    body.push(dest);
    body.push(0);
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&[0; 5]);
    body.push(0); // recorded over C
    body.push(code);
    body
}

/// Plain channel table: header, harmonization record, no special feature.
fn ctab(source: u8, dest: u8, harmonization: [u8; 6]) -> Vec<u8> {
    let mut body = channel_header(source, dest, 0x00);
    body.extend_from_slice(&harmonization);
    body.push(0);
    block(b"Ctab", &body)
}

/// Zoned channel table with the harmonization record in the middle zone.
fn ctb2(source: u8, dest: u8, middle: [u8; 6]) -> Vec<u8> {
    let mut body = channel_header(source, dest, 0x00);
    body.extend_from_slice(&[0, 127]);
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(&middle);
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(&[0; 7]);
    block(b"Ctb2", &body)
}

fn casm(sections: &[Vec<u8>]) -> Vec<u8> {
    let mut segment = block(b"Sdec", b"Main A,Main B");
    for section in sections {
        segment.extend_from_slice(section);
    }
    block(b"CASM", &block(b"CSEG", &segment))
}

/// Bass on 10 follows the root inside 24-55 and plays on 12; the triad on 11
/// is in chord mode.
fn style_file() -> Vec<u8> {
    let mut file = style_smf();
    file.extend_from_slice(&casm(&[
        ctab(10, 12, [0, 0, 11, 24, 55, 0]),
        ctb2(11, 11, [1, 0, 11, 0, 127, 0]),
    ]));
    file
}

fn options(part: &str, chart: &str) -> RenderOptions {
    let mut options = RenderOptions::new(part);
    options.chord_chart = Some(chart.to_string());
    options.output_ticks_per_beat = 480;
    options
}

fn pitches_on(notes: &[stylemap::NoteEvent], channel: u8) -> Vec<u8> {
    let mut pitches: Vec<u8> = notes
        .iter()
        .filter(|n| n.channel == channel)
        .map(|n| n.pitch)
        .collect();
    pitches.sort();
    pitches
}

#[test]
fn test_parse_style_reads_parts_and_settings() {
    let style = parse_style(&style_file(), &SmfCodec).unwrap();
    assert_eq!(style.markers(), vec!["SFF2", "SInt", "Main A", "Main B"]);
    assert_eq!(style.ticks_per_beat, 480);
    assert_eq!(style.tempo, 500_000);

    let main_a = style.part("Main A").unwrap();
    assert_eq!(main_a.length_ticks, 1920);
    assert_eq!(main_a.notes.len(), 5);
    assert!(main_a.notes.iter().all(|n| n.start_tick == 0));

    let settings = style.casm.get("main_a").unwrap();
    assert_eq!(settings.dest_channel(10), 12);
    assert_eq!(settings.channel(11).and_then(|s| s.ctb2).map(|c| c.ntr), Some(1));
    assert_eq!(
        settings.channel(11).and_then(|s| s.source_quality.clone()),
        Some("Maj".to_string())
    );
}

#[test]
fn test_render_over_f() {
    let song = render_style(&style_file(), &options("Main A", "F")).unwrap();
    assert_eq!(song.total_ticks, 1920);
    assert_eq!(song.ticks_per_beat, 480);

    // Root-mode bass moved up a fourth on its destination channel.
    assert_eq!(pitches_on(&song.notes, 12), vec![41]);
    // Chord-mode triad re-voiced as close as possible to the recorded shape.
    assert_eq!(pitches_on(&song.notes, 11), vec![60, 65, 69]);
    // Drums untouched.
    assert_eq!(pitches_on(&song.notes, 9), vec![36]);
    assert!(pitches_on(&song.notes, 10).is_empty());
}

#[test]
fn test_programs_follow_destination_channel() {
    let song = render_style(&style_file(), &options("Main A", "F")).unwrap();
    let bass = song.programs_by_channel.get(&12).unwrap();
    assert_eq!(bass.program, 32);
    assert_eq!(bass.bank_msb, Some(0));
    assert!(!song.programs_by_channel.contains_key(&10));
    assert_eq!(song.programs_by_channel.get(&11).map(|p| p.program), Some(0));
}

#[test]
fn test_unknown_part_lists_markers() {
    let err = render_style(&style_file(), &RenderOptions::new("Main E")).unwrap_err();
    assert!(matches!(err, StyleError::PartNotFound { .. }));
    assert_eq!(
        err.to_string(),
        "Style part \"Main E\" not found. Available markers: SFF2, SInt, Main A, Main B"
    );
}

#[test]
fn test_part_lookup_ignores_case_and_spacing() {
    let song = render_style(&style_file(), &options("  main   b ", "C")).unwrap();
    assert_eq!(pitches_on(&song.notes, 12), vec![43]);
}

#[test]
fn test_default_chart_is_single_c7_segment() {
    let mut options = RenderOptions::new("Main A");
    options.bars = Some(4);
    let traced = render_style_traced(&style_file(), &options).unwrap();
    assert_eq!(traced.song.total_ticks, 4 * 4 * 960);

    let segments: BTreeSet<(u64, u64, String)> = traced
        .mappings
        .iter()
        .map(|m| (m.segment.start_tick, m.segment.end_tick, m.segment.symbol.clone()))
        .collect();
    assert_eq!(
        segments.into_iter().collect::<Vec<_>>(),
        vec![(0, 15360, "C7".to_string())]
    );
    // Four tiles of the bass note, unmoved over C.
    assert_eq!(pitches_on(&traced.song.notes, 12), vec![36, 36, 36, 36]);
}

#[test]
fn test_trace_reports_modes() {
    let traced = render_style_traced(&style_file(), &options("Main A", "Bb")).unwrap();
    assert_eq!(traced.mappings.len(), traced.song.notes.len());
    for mapping in &traced.mappings {
        let expected = match mapping.source_channel {
            11 => MappingMode::Chord,
            _ => MappingMode::Root,
        };
        assert_eq!(mapping.mapping, expected);
        assert_eq!(mapping.target_root, 10);
    }
}

#[test]
fn test_tempo_override() {
    let mut opts = options("Main A", "C");
    opts.tempo_bpm = Some(100.0);
    let song = render_style(&style_file(), &opts).unwrap();
    assert_eq!(song.tempo, 600_000);

    let song = render_style(&style_file(), &options("Main A", "C")).unwrap();
    assert_eq!(song.tempo, 500_000);
}

#[test]
fn test_bass_window_over_long_progression() {
    let chart = "C | Db | D | Eb | E | F | F# | G | Ab | A | Bb | B";
    let song = render_style(&style_file(), &options("Main A", chart)).unwrap();
    let bass = pitches_on(&song.notes, 12);
    assert_eq!(bass.len(), 12);
    assert!(bass.iter().all(|&p| (24..=55).contains(&p)));
}

#[test]
fn test_midi_round_trip_keeps_notes() {
    let opts = options("Main A", "Dm7 G7 | Cmaj7");
    let song = render_style(&style_file(), &opts).unwrap();
    let midi = render_style_to_midi(&style_file(), &opts).unwrap();

    let decoded = notes_from_smf(&midi, &SmfCodec).unwrap();
    let diff = compare_notes(&song.notes, &decoded);
    assert_eq!(diff.mismatches, 0, "{:?}", diff.samples);
    assert_eq!(diff.len_a, diff.len_b);
}

#[test]
fn test_compare_file_with_itself() {
    let midi = render_style_to_midi(&style_file(), &options("Main A", "Am | F | C | G")).unwrap();
    let notes = notes_from_smf(&midi, &SmfCodec).unwrap();
    assert!(!notes.is_empty());
    assert!(compare_notes(&notes, &notes).is_identical());
}

#[test]
fn test_truncated_section_keeps_earlier_settings() {
    let mut file = style_smf();
    let mut broken = ctb2(11, 11, [1, 0, 11, 0, 127, 0]);
    // Claim more bytes than the segment holds.
    broken[4..8].copy_from_slice(&1000u32.to_be_bytes());
    file.extend_from_slice(&casm(&[ctab(10, 12, [0, 0, 11, 24, 55, 0]), broken]));

    let style = parse_style(&file, &SmfCodec).unwrap();
    let settings = style.casm.get("main_a").unwrap();
    assert_eq!(settings.dest_channel(10), 12);
    assert!(settings.channel(11).is_none());

    // Without settings the triad falls back to root transposition.
    let song = render_style(&file, &options("Main A", "F")).unwrap();
    assert_eq!(pitches_on(&song.notes, 11), vec![65, 69, 72]);
}

#[test]
fn test_style_without_metadata_renders_by_root() {
    let song = render_style(&style_smf(), &options("Main A", "G")).unwrap();
    assert_eq!(pitches_on(&song.notes, 10), vec![43]);
    assert_eq!(pitches_on(&song.notes, 11), vec![67, 71, 74]);
}

#[test]
fn test_garbage_input_is_codec_error() {
    let err = render_style(b"not a midi file", &RenderOptions::new("Main A")).unwrap_err();
    assert!(matches!(err, StyleError::Codec(_)));
}

#[test]
fn test_destination_channel_out_of_range_is_not_encoded() {
    let mut file = style_smf();
    file.extend_from_slice(&casm(&[ctab(10, 16, [0, 0, 11, 24, 55, 0])]));

    let song = render_style(&file, &options("Main A", "F")).unwrap();
    assert_eq!(pitches_on(&song.notes, 16), vec![41]);

    let err = render_style_to_midi(&file, &options("Main A", "F")).unwrap_err();
    assert_eq!(err.to_string(), "MIDI codec error: Invalid MIDI channel 16");
}
