//! # Style Reader
//!
//! A style file is a Standard MIDI File whose first track holds every
//! accompaniment part back to back, separated by marker events
//! (`SFF2`, `SInt`, `Main A`, `Fill In AA`, ...), followed by the `CASM`
//! settings block.
//!
//! [`parse_style`] splits that track into [`StylePart`]s with part-relative
//! note timing and attaches the parsed settings table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::casm::{normalize_part_id, parse_casm, CasmTable, SffType};
use crate::error::Result;
use crate::midi::{tempo_of, time_signature_of, SequenceCodec, SequenceEvent, TimedEvent};
use crate::types::{NoteEvent, ProgramChange, TimeSignature};

/// Tempo used when the style has no tempo event (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

/// One named accompaniment pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePart {
    /// Normalized marker, used for lookups.
    pub id: String,
    /// Marker text as written in the file.
    pub marker: String,
    /// Absolute tick of the marker.
    pub start_tick: u64,
    /// Ticks until the next marker or the end of the track.
    pub length_ticks: u64,
    /// Notes with start ticks relative to `start_tick`.
    pub notes: Vec<NoteEvent>,
    /// Programs in effect for the part, including those inherited from
    /// earlier parts.
    pub programs_by_channel: BTreeMap<u8, ProgramChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStyle {
    pub ticks_per_beat: u16,
    /// Microseconds per quarter note.
    pub tempo: u32,
    pub time_signature: Option<TimeSignature>,
    pub parts: Vec<StylePart>,
    pub casm: CasmTable,
    pub sff_type: Option<SffType>,
    /// Channels switched to Mega Voice sounds (bank MSB 8) in the `SInt` section.
    pub mega_voice_channels: BTreeSet<u8>,
}

impl ParsedStyle {
    pub fn part(&self, id: &str) -> Option<&StylePart> {
        let id = normalize_part_id(id);
        self.parts.iter().find(|part| part.id == id)
    }

    /// Marker names of every part in file order.
    pub fn markers(&self) -> Vec<String> {
        self.parts.iter().map(|part| part.marker.clone()).collect()
    }
}

/// Parse a style file.
///
/// Only the first track is read. A note that started before the current
/// part's marker is dropped when it ends.
pub fn parse_style(bytes: &[u8], codec: &dyn SequenceCodec) -> Result<ParsedStyle> {
    let sequence = codec.decode(bytes)?;
    let track: &[TimedEvent] = sequence.tracks.first().map(Vec::as_slice).unwrap_or(&[]);

    let tempo = tempo_of(track).unwrap_or(DEFAULT_TEMPO);
    let time_signature = time_signature_of(track);
    let sff_type = detect_sff_type(track);
    let mega_voice_channels = mega_voice_channels(track);
    let casm = parse_casm(bytes, sff_type);

    let mut parts: Vec<StylePart> = Vec::new();
    let mut active: HashMap<(u8, u8), (u64, u8)> = HashMap::new();
    let mut programs: BTreeMap<u8, ProgramChange> = BTreeMap::new();
    let mut bank_msb: HashMap<u8, u8> = HashMap::new();
    let mut bank_lsb: HashMap<u8, u8> = HashMap::new();
    let mut last_tick = 0;

    for timed in track {
        let tick = timed.tick;
        last_tick = tick;
        match &timed.event {
            SequenceEvent::Marker(text) => {
                if let Some(part) = parts.last_mut() {
                    part.length_ticks = tick.saturating_sub(part.start_tick);
                }
                parts.push(StylePart {
                    id: normalize_part_id(text),
                    marker: text.clone(),
                    start_tick: tick,
                    length_ticks: 0,
                    notes: Vec::new(),
                    programs_by_channel: programs.clone(),
                });
            }
            SequenceEvent::Controller {
                channel,
                controller,
                value,
            } => match *controller {
                0 => {
                    bank_msb.insert(*channel, *value);
                }
                32 => {
                    bank_lsb.insert(*channel, *value);
                }
                _ => {}
            },
            SequenceEvent::ProgramChange { channel, program } => {
                let change = ProgramChange {
                    program: *program,
                    bank_msb: bank_msb.get(channel).copied(),
                    bank_lsb: bank_lsb.get(channel).copied(),
                };
                programs.insert(*channel, change);
                if let Some(part) = parts.last_mut() {
                    part.programs_by_channel.insert(*channel, change);
                }
            }
            SequenceEvent::NoteOn {
                channel,
                key,
                velocity,
            } if *velocity > 0 => {
                if !parts.is_empty() {
                    active.insert((*channel, *key), (tick, *velocity));
                }
            }
            SequenceEvent::NoteOn { channel, key, .. } | SequenceEvent::NoteOff { channel, key, .. } => {
                let Some(part) = parts.last_mut() else {
                    continue;
                };
                let Some((start_tick, velocity)) = active.remove(&(*channel, *key)) else {
                    continue;
                };
                if start_tick < part.start_tick || tick <= start_tick {
                    continue;
                }
                part.notes.push(NoteEvent {
                    channel: *channel,
                    pitch: *key,
                    velocity,
                    start_tick: start_tick - part.start_tick,
                    duration: tick - start_tick,
                });
            }
            _ => {}
        }
    }
    if let Some(part) = parts.last_mut() {
        part.length_ticks = last_tick.saturating_sub(part.start_tick);
    }

    debug!(
        parts = parts.len(),
        casm_parts = casm.len(),
        ticks_per_beat = sequence.ticks_per_beat,
        "Parsed style"
    );

    Ok(ParsedStyle {
        ticks_per_beat: sequence.ticks_per_beat,
        tempo,
        time_signature,
        parts,
        casm,
        sff_type,
        mega_voice_channels,
    })
}

fn detect_sff_type(track: &[TimedEvent]) -> Option<SffType> {
    track.iter().find_map(|e| match &e.event {
        SequenceEvent::Marker(text) if text == "SFF1" => Some(SffType::Sff1),
        SequenceEvent::Marker(text) if text == "SFF2" => Some(SffType::Sff2),
        _ => None,
    })
}

/// Channels given a bank MSB 8 program inside the `SInt` section.
fn mega_voice_channels(track: &[TimedEvent]) -> BTreeSet<u8> {
    let mut channels = BTreeSet::new();
    let mut bank_msb: HashMap<u8, u8> = HashMap::new();
    let mut inside_init = false;

    for timed in track {
        match &timed.event {
            SequenceEvent::Marker(text) => inside_init = text == "SInt",
            SequenceEvent::Controller {
                channel,
                controller: 0,
                value,
            } if inside_init => {
                bank_msb.insert(*channel, *value);
            }
            SequenceEvent::ProgramChange { channel, .. } if inside_init => {
                if bank_msb.get(channel).copied().unwrap_or(0) == 8 {
                    channels.insert(*channel);
                }
            }
            _ => {}
        }
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{DecodedSequence, SongFile};
    use pretty_assertions::assert_eq;

    /// Codec returning a fixed event list as the first track.
    struct FixedCodec(Vec<TimedEvent>);

    impl SequenceCodec for FixedCodec {
        fn decode(&self, _bytes: &[u8]) -> Result<DecodedSequence> {
            Ok(DecodedSequence {
                ticks_per_beat: 480,
                tracks: vec![self.0.clone()],
            })
        }

        fn encode(&self, _song: &SongFile) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn at(tick: u64, event: SequenceEvent) -> TimedEvent {
        TimedEvent { tick, event }
    }

    fn marker(tick: u64, text: &str) -> TimedEvent {
        at(tick, SequenceEvent::Marker(text.to_string()))
    }

    fn on(tick: u64, channel: u8, key: u8) -> TimedEvent {
        at(
            tick,
            SequenceEvent::NoteOn {
                channel,
                key,
                velocity: 100,
            },
        )
    }

    fn off(tick: u64, channel: u8, key: u8) -> TimedEvent {
        at(
            tick,
            SequenceEvent::NoteOff {
                channel,
                key,
                velocity: 0,
            },
        )
    }

    fn fixture() -> Vec<TimedEvent> {
        vec![
            marker(0, "SFF2"),
            marker(0, "SInt"),
            at(0, SequenceEvent::Controller { channel: 10, controller: 0, value: 8 }),
            at(0, SequenceEvent::ProgramChange { channel: 10, program: 25 }),
            at(0, SequenceEvent::Controller { channel: 11, controller: 0, value: 0 }),
            at(0, SequenceEvent::Controller { channel: 11, controller: 32, value: 112 }),
            at(0, SequenceEvent::ProgramChange { channel: 11, program: 33 }),
            marker(1920, "Main A"),
            on(1920, 11, 36),
            off(2400, 11, 36),
            on(3600, 11, 43), // still sounding at the next marker
            marker(3840, "Main B"),
            at(3840, SequenceEvent::ProgramChange { channel: 11, program: 34 }),
            on(3840, 12, 60),
            off(3900, 11, 43),
            off(4320, 12, 60),
            at(5760, SequenceEvent::EndOfTrack),
        ]
    }

    #[test]
    fn test_parts_split_at_markers() {
        let style = parse_style(b"", &FixedCodec(fixture())).unwrap();
        assert_eq!(style.markers(), vec!["SFF2", "SInt", "Main A", "Main B"]);
        assert_eq!(style.sff_type, Some(SffType::Sff2));
        assert_eq!(style.tempo, DEFAULT_TEMPO);
        assert!(style.casm.is_empty());

        let main_a = style.part("main a").unwrap();
        assert_eq!(main_a.start_tick, 1920);
        assert_eq!(main_a.length_ticks, 1920);
        assert_eq!(
            main_a.notes,
            vec![NoteEvent {
                channel: 11,
                pitch: 36,
                velocity: 100,
                start_tick: 0,
                duration: 480
            }]
        );

        let main_b = style.part("Main B").unwrap();
        assert_eq!(main_b.length_ticks, 1920);
        assert_eq!(main_b.notes.len(), 1);
        assert_eq!(main_b.notes[0].pitch, 60);
        assert_eq!(main_b.notes[0].start_tick, 0);
    }

    #[test]
    fn test_programs_inherited_and_overridden() {
        let style = parse_style(b"", &FixedCodec(fixture())).unwrap();
        let main_a = style.part("Main A").unwrap();
        assert_eq!(
            main_a.programs_by_channel.get(&11),
            Some(&ProgramChange {
                program: 33,
                bank_msb: Some(0),
                bank_lsb: Some(112)
            })
        );
        let main_b = style.part("Main B").unwrap();
        assert_eq!(main_b.programs_by_channel.get(&11).map(|p| p.program), Some(34));
    }

    #[test]
    fn test_mega_voice_detection() {
        let style = parse_style(b"", &FixedCodec(fixture())).unwrap();
        assert_eq!(style.mega_voice_channels.into_iter().collect::<Vec<_>>(), vec![10]);
    }
}
