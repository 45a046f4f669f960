//! # Sequence Codec
//!
//! Standard MIDI File decoding and encoding on top of `midly`.
//!
//! The rest of the crate only depends on the [`SequenceCodec`] trait: decode
//! bytes into tracks of absolute-tick events, encode a rendered song back into
//! bytes. [`SmfCodec`] is the `midly` implementation.
//!
//! ## Decoding
//! Delta times are accumulated into absolute ticks. Only the events the
//! renderer cares about survive: notes, controllers, program changes and the
//! marker, track name, tempo, time signature and end-of-track meta events.
//! Unknown chunks after the last track (such as a style's `CASM` block) are
//! ignored by the parser.
//!
//! ## Encoding
//! Format 1 with two tracks: a conductor track (name, tempo, time signature)
//! and a single performance track holding bank selects, program changes and
//! notes.

use std::collections::{BTreeMap, HashMap};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::{Result, StyleError};
use crate::types::{NoteEvent, ProgramChange, TimeSignature};

/// Ticks per beat assumed for SMPTE-timed files.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// Largest tempo a tempo meta event can carry, in microseconds per quarter note.
pub const MAX_TEMPO: u32 = 0xFF_FFFF;

/// Largest metrical resolution a file header can carry.
pub const MAX_TICKS_PER_BEAT: u16 = 0x7FFF;

/// Largest delta time a track event can carry.
const MAX_DELTA: u64 = 0x0FFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    Marker(String),
    TrackName(String),
    /// Microseconds per quarter note.
    Tempo(u32),
    TimeSignature(TimeSignature),
    EndOfTrack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub tick: u64,
    pub event: SequenceEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSequence {
    pub ticks_per_beat: u16,
    pub tracks: Vec<Vec<TimedEvent>>,
}

/// A rendered song ready to be written as a Standard MIDI File.
#[derive(Debug, Clone, PartialEq)]
pub struct SongFile {
    pub ticks_per_beat: u16,
    /// Microseconds per quarter note.
    pub tempo: u32,
    pub time_signature: TimeSignature,
    pub notes: Vec<NoteEvent>,
    /// Programs sent at tick 0, keyed by channel.
    pub programs: BTreeMap<u8, ProgramChange>,
    pub track_name: Option<String>,
    /// Tick of the conductor track's end-of-track event.
    pub end_tick: Option<u64>,
}

/// Decode and encode tick-stamped event sequences.
pub trait SequenceCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSequence>;
    fn encode(&self, song: &SongFile) -> Result<Vec<u8>>;
}

/// [`SequenceCodec`] backed by `midly`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmfCodec;

impl SequenceCodec for SmfCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSequence> {
        let smf = Smf::parse(bytes).map_err(|e| StyleError::Codec(e.to_string()))?;

        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(ticks) => ticks.as_int(),
            Timing::Timecode(_, _) => DEFAULT_TICKS_PER_BEAT,
        };

        let tracks = smf
            .tracks
            .iter()
            .map(|track| {
                let mut tick = 0u64;
                let mut events = Vec::with_capacity(track.len());
                for event in track {
                    tick += event.delta.as_int() as u64;
                    if let Some(event) = convert_event(&event.kind) {
                        events.push(TimedEvent { tick, event });
                    }
                }
                events
            })
            .collect();

        Ok(DecodedSequence {
            ticks_per_beat,
            tracks,
        })
    }

    fn encode(&self, song: &SongFile) -> Result<Vec<u8>> {
        check_encodable(song)?;
        let mut conductor: Vec<(u64, u8, TrackEventKind)> = Vec::new();
        if let Some(name) = &song.track_name {
            conductor.push((0, 0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
        }
        conductor.push((0, 0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(song.tempo)))));
        conductor.push((
            0,
            0,
            TrackEventKind::Meta(MetaMessage::TimeSignature(
                song.time_signature.numerator,
                song.time_signature.denominator.max(1).trailing_zeros() as u8,
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter note
            )),
        ));

        let mut performance: Vec<(u64, u8, TrackEventKind)> = Vec::new();
        for (&channel, change) in &song.programs {
            if let Some(msb) = change.bank_msb {
                performance.push((0, 1, controller(channel, 0, msb)));
            }
            if let Some(lsb) = change.bank_lsb {
                performance.push((0, 1, controller(channel, 32, lsb)));
            }
            performance.push((
                0,
                2,
                midi_event(
                    channel,
                    MidiMessage::ProgramChange {
                        program: u7::new(change.program),
                    },
                ),
            ));
        }
        for note in &song.notes {
            performance.push((
                note.start_tick,
                4,
                midi_event(
                    note.channel,
                    MidiMessage::NoteOn {
                        key: u7::new(note.pitch),
                        vel: u7::new(note.velocity),
                    },
                ),
            ));
            performance.push((
                note.end_tick(),
                3,
                midi_event(
                    note.channel,
                    MidiMessage::NoteOff {
                        key: u7::new(note.pitch),
                        vel: u7::new(0),
                    },
                ),
            ));
        }

        let conductor_end = song
            .end_tick
            .unwrap_or_else(|| performance.iter().map(|(tick, _, _)| *tick).max().unwrap_or(0));
        let tracks = vec![
            build_track(conductor, Some(conductor_end)),
            build_track(performance, None),
        ];

        let smf = Smf {
            header: Header::new(
                Format::Parallel,
                Timing::Metrical(u15::new(song.ticks_per_beat)),
            ),
            tracks,
        };
        let mut out = Vec::new();
        smf.write(&mut out)
            .map_err(|e| StyleError::Codec(format!("Failed to write MIDI: {}", e)))?;
        Ok(out)
    }
}

/// Reject values `midly` would silently truncate.
fn check_encodable(song: &SongFile) -> Result<()> {
    if song.ticks_per_beat == 0 || song.ticks_per_beat > MAX_TICKS_PER_BEAT {
        return Err(StyleError::Codec(format!(
            "Ticks per beat must be between 1 and {}, got {}",
            MAX_TICKS_PER_BEAT, song.ticks_per_beat
        )));
    }
    if song.tempo == 0 || song.tempo > MAX_TEMPO {
        return Err(StyleError::Codec(format!(
            "Tempo must be between 1 and {} us per beat, got {}",
            MAX_TEMPO, song.tempo
        )));
    }
    let channels = song
        .notes
        .iter()
        .map(|n| n.channel)
        .chain(song.programs.keys().copied());
    for channel in channels {
        if channel > 15 {
            return Err(StyleError::Codec(format!("Invalid MIDI channel {}", channel)));
        }
    }
    if let Some(note) = song.notes.iter().find(|n| n.pitch > 127 || n.velocity > 127) {
        return Err(StyleError::Codec(format!(
            "Invalid note: pitch {}, velocity {}",
            note.pitch, note.velocity
        )));
    }
    Ok(())
}

fn midi_event<'a>(channel: u8, message: MidiMessage) -> TrackEventKind<'a> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message,
    }
}

fn controller<'a>(channel: u8, controller: u8, value: u8) -> TrackEventKind<'a> {
    midi_event(
        channel,
        MidiMessage::Controller {
            controller: u7::new(controller),
            value: u7::new(value),
        },
    )
}

/// Sort `(tick, order, event)` entries and convert them to delta times.
///
/// Same-tick events go meta, controller, program, note-off, note-on.
fn build_track(
    mut events: Vec<(u64, u8, TrackEventKind<'_>)>,
    end_tick: Option<u64>,
) -> Vec<TrackEvent<'_>> {
    events.sort_by_key(|(tick, order, _)| (*tick, *order));
    let mut track = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0u64;
    for (tick, _, kind) in events {
        track.push(TrackEvent {
            delta: u28::new((tick - last_tick).min(MAX_DELTA) as u32),
            kind,
        });
        last_tick = tick;
    }
    let final_tick = end_tick.unwrap_or(last_tick);
    track.push(TrackEvent {
        delta: u28::new(final_tick.saturating_sub(last_tick).min(MAX_DELTA) as u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn convert_event(kind: &TrackEventKind) -> Option<SequenceEvent> {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => Some(SequenceEvent::NoteOn {
                    channel,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                }),
                MidiMessage::NoteOff { key, vel } => Some(SequenceEvent::NoteOff {
                    channel,
                    key: key.as_int(),
                    velocity: vel.as_int(),
                }),
                MidiMessage::Controller { controller, value } => Some(SequenceEvent::Controller {
                    channel,
                    controller: controller.as_int(),
                    value: value.as_int(),
                }),
                MidiMessage::ProgramChange { program } => Some(SequenceEvent::ProgramChange {
                    channel,
                    program: program.as_int(),
                }),
                _ => None,
            }
        }
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::Marker(text) => Some(SequenceEvent::Marker(
                String::from_utf8_lossy(text).into_owned(),
            )),
            MetaMessage::TrackName(text) => Some(SequenceEvent::TrackName(
                String::from_utf8_lossy(text).into_owned(),
            )),
            MetaMessage::Tempo(tempo) => Some(SequenceEvent::Tempo(tempo.as_int())),
            MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                Some(SequenceEvent::TimeSignature(TimeSignature {
                    numerator,
                    denominator: 1u8.checked_shl(denominator_pow as u32).unwrap_or(4),
                }))
            }
            MetaMessage::EndOfTrack => Some(SequenceEvent::EndOfTrack),
            _ => None,
        },
        _ => None,
    }
}

/// First tempo event of a track.
pub fn tempo_of(track: &[TimedEvent]) -> Option<u32> {
    track.iter().find_map(|e| match e.event {
        SequenceEvent::Tempo(tempo) => Some(tempo),
        _ => None,
    })
}

/// First time signature event of a track.
pub fn time_signature_of(track: &[TimedEvent]) -> Option<TimeSignature> {
    track.iter().find_map(|e| match e.event {
        SequenceEvent::TimeSignature(ts) => Some(ts),
        _ => None,
    })
}

/// Pair note-on and note-off events into notes.
///
/// A note-on with velocity 0 ends a note. Note-offs without a sounding note
/// and zero-length notes are dropped. Also returns the tick of the last event.
pub fn collect_notes(track: &[TimedEvent]) -> (Vec<NoteEvent>, u64) {
    let mut notes = Vec::new();
    let mut active: HashMap<(u8, u8), (u64, u8)> = HashMap::new();
    let mut end_tick = 0;

    for timed in track {
        end_tick = end_tick.max(timed.tick);
        match timed.event {
            SequenceEvent::NoteOn {
                channel,
                key,
                velocity,
            } if velocity > 0 => {
                active.insert((channel, key), (timed.tick, velocity));
            }
            SequenceEvent::NoteOn { channel, key, .. } | SequenceEvent::NoteOff { channel, key, .. } => {
                let Some((start_tick, velocity)) = active.remove(&(channel, key)) else {
                    continue;
                };
                if timed.tick > start_tick {
                    notes.push(NoteEvent {
                        channel,
                        pitch: key,
                        velocity,
                        start_tick,
                        duration: timed.tick - start_tick,
                    });
                }
            }
            _ => {}
        }
    }

    (notes, end_tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(channel: u8, pitch: u8, start_tick: u64, duration: u64) -> NoteEvent {
        NoteEvent {
            channel,
            pitch,
            velocity: 90,
            start_tick,
            duration,
        }
    }

    fn song(notes: Vec<NoteEvent>) -> SongFile {
        let mut programs = BTreeMap::new();
        programs.insert(
            2,
            ProgramChange {
                program: 33,
                bank_msb: Some(0),
                bank_lsb: Some(112),
            },
        );
        SongFile {
            ticks_per_beat: 960,
            tempo: 600_000,
            time_signature: TimeSignature {
                numerator: 3,
                denominator: 4,
            },
            notes,
            programs,
            track_name: Some("render".to_string()),
            end_tick: Some(2881),
        }
    }

    #[test]
    fn test_encode_then_decode_keeps_notes_and_meta() {
        let notes = vec![note(2, 40, 0, 960), note(3, 64, 480, 1920), note(2, 40, 960, 960)];
        let bytes = SmfCodec.encode(&song(notes.clone())).unwrap();
        let decoded = SmfCodec.decode(&bytes).unwrap();

        assert_eq!(decoded.ticks_per_beat, 960);
        assert_eq!(decoded.tracks.len(), 2);
        assert_eq!(tempo_of(&decoded.tracks[0]), Some(600_000));
        assert_eq!(
            time_signature_of(&decoded.tracks[0]),
            Some(TimeSignature {
                numerator: 3,
                denominator: 4
            })
        );
        assert_eq!(
            decoded.tracks[0].last(),
            Some(&TimedEvent {
                tick: 2881,
                event: SequenceEvent::EndOfTrack
            })
        );

        let (mut decoded_notes, _) = collect_notes(&decoded.tracks[1]);
        decoded_notes.sort_by_key(|n| (n.start_tick, n.channel, n.pitch));
        assert_eq!(decoded_notes, notes);
    }

    #[test]
    fn test_same_tick_ordering() {
        let bytes = SmfCodec
            .encode(&song(vec![note(2, 40, 0, 960), note(2, 40, 960, 960)]))
            .unwrap();
        let decoded = SmfCodec.decode(&bytes).unwrap();
        let kinds: Vec<&SequenceEvent> = decoded.tracks[1].iter().map(|e| &e.event).collect();

        assert!(matches!(kinds[0], SequenceEvent::Controller { controller: 0, .. }));
        assert!(matches!(kinds[1], SequenceEvent::Controller { controller: 32, .. }));
        assert!(matches!(kinds[2], SequenceEvent::ProgramChange { program: 33, .. }));
        assert!(matches!(kinds[3], SequenceEvent::NoteOn { key: 40, .. }));
        // At tick 960 the first note ends before the second starts.
        assert!(matches!(kinds[4], SequenceEvent::NoteOff { key: 40, .. }));
        assert!(matches!(kinds[5], SequenceEvent::NoteOn { key: 40, .. }));
    }

    #[test]
    fn test_encode_rejects_values_out_of_range() {
        let mut slow = song(vec![note(2, 40, 0, 960)]);
        slow.tempo = 20_000_000;
        assert!(matches!(SmfCodec.encode(&slow), Err(StyleError::Codec(_))));

        let mut fine = song(vec![note(2, 40, 0, 960)]);
        fine.ticks_per_beat = 40_000;
        assert!(matches!(SmfCodec.encode(&fine), Err(StyleError::Codec(_))));

        let err = SmfCodec.encode(&song(vec![note(16, 40, 0, 960)])).unwrap_err();
        assert_eq!(err.to_string(), "MIDI codec error: Invalid MIDI channel 16");

        let mut edge = song(vec![note(15, 40, 0, 960)]);
        edge.tempo = MAX_TEMPO;
        edge.ticks_per_beat = MAX_TICKS_PER_BEAT;
        let decoded = SmfCodec.decode(&SmfCodec.encode(&edge).unwrap()).unwrap();
        assert_eq!(decoded.ticks_per_beat, MAX_TICKS_PER_BEAT);
        assert_eq!(tempo_of(&decoded.tracks[0]), Some(MAX_TEMPO));
    }

    #[test]
    fn test_collect_notes_pairs_zero_velocity_note_on() {
        let on = |tick, key, velocity| TimedEvent {
            tick,
            event: SequenceEvent::NoteOn {
                channel: 0,
                key,
                velocity,
            },
        };
        let track = vec![
            on(0, 60, 100),
            on(240, 60, 0),
            on(240, 62, 0), // never started
            on(300, 64, 80),
            on(300, 64, 0), // zero length
        ];
        let (notes, end_tick) = collect_notes(&track);
        assert_eq!(
            notes,
            vec![NoteEvent {
                channel: 0,
                pitch: 60,
                velocity: 100,
                start_tick: 0,
                duration: 240
            }]
        );
        assert_eq!(end_tick, 300);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = SmfCodec.decode(b"not a midi file").unwrap_err();
        assert!(matches!(err, StyleError::Codec(_)));
    }
}
