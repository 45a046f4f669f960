//! Pattern tiling and per-note voicing

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use super::chord_mode::{compute_chord_mapping, ChordModeMapping, SourceChord};
use super::overlap::resolve_overlaps;
use super::pitch::closest_pitch;
use super::types::{BuildOptions, BuiltSong, MappingMode, NoteMapping, SegmentRef};
use crate::casm::CasmInfo;
use crate::chart::{ChordSegment, DEFAULT_CHORD};
use crate::harmony::{degree_most_probable, extract_quality, normalize_pitch_class, ChordTypeInfo};
use crate::style::StylePart;
use crate::types::{is_drum_channel, NoteEvent};

/// Re-harmonize a style part over a chord timeline.
///
/// The part is tiled from tick 0 until `bars` bars are filled. Every note is
/// rescaled to the output resolution, clipped to the song length and split
/// wherever a new chord starts while it sounds; each piece is voiced against
/// the chord it falls in.
///
/// # Pipeline
/// 1. Collect the pitches each non-drum source channel plays
/// 2. Tile the pattern and split notes at chord boundaries
/// 3. Voice each piece in chord, melody or root mode
/// 4. Fold into the channel's note window
/// 5. Resolve same-pitch overlaps
///
/// # Examples
/// ```
/// use stylemap::chart::ChordSegment;
/// use stylemap::style::StylePart;
/// use stylemap::types::{NoteEvent, TimeSignature};
/// use stylemap::voicing::{build_song, BuildOptions};
///
/// let part = StylePart {
///     id: "main a".to_string(),
///     marker: "Main A".to_string(),
///     start_tick: 0,
///     length_ticks: 1920,
///     notes: vec![NoteEvent { channel: 10, pitch: 60, velocity: 100, start_tick: 0, duration: 480 }],
///     programs_by_channel: Default::default(),
/// };
/// let timeline = vec![ChordSegment::new(0, 1920, "D"), ChordSegment::new(1920, 3840, "G")];
/// let song = build_song(&BuildOptions {
///     bars: 2,
///     input_ticks_per_beat: 480,
///     output_ticks_per_beat: 480,
///     time_signature: TimeSignature::default(),
///     part: &part,
///     chord_timeline: &timeline,
///     settings: None,
///     trace: false,
/// });
///
/// let pitches: Vec<u8> = song.notes.iter().map(|n| n.pitch).collect();
/// assert_eq!(pitches, vec![62, 67]);
/// assert_eq!(song.total_ticks, 3840);
/// ```
pub fn build_song(options: &BuildOptions) -> BuiltSong {
    let beats_per_bar = options.time_signature.beats_per_bar();
    let out_ppq = options.output_ticks_per_beat as f64;
    let total_ticks = (options.bars as f64 * beats_per_bar * out_ppq).round() as u64;
    let scale = out_ppq / options.input_ticks_per_beat.max(1) as f64;
    let pattern_length = if options.part.length_ticks > 0 {
        (options.part.length_ticks as f64 * scale).round() as u64
    } else {
        (beats_per_bar * out_ppq).round() as u64
    };

    let mut song = BuiltSong {
        total_ticks,
        ..Default::default()
    };
    if pattern_length == 0 {
        return song;
    }

    let default_timeline = [ChordSegment::new(0, total_ticks, DEFAULT_CHORD)];
    let segments: &[ChordSegment] = if options.chord_timeline.is_empty() {
        &default_timeline
    } else {
        options.chord_timeline
    };

    let mut voicer = Voicer::new(*options, segments);
    let mut base = 0;
    while base < total_ticks {
        for note in &options.part.notes {
            let start = base + (note.start_tick as f64 * scale).round() as u64;
            let end = (start + (note.duration as f64 * scale).round() as u64).min(total_ticks);
            if start >= total_ticks || end <= start {
                continue;
            }

            let boundaries = segments
                .iter()
                .map(|s| s.start_tick)
                .filter(|&tick| tick > start && tick < end);
            let mut span_start = start;
            for stop in boundaries.chain(std::iter::once(end)) {
                if stop > span_start {
                    voicer.voice(note, span_start, stop - span_start, &mut song);
                }
                span_start = stop;
            }
        }
        base += pattern_length;
    }

    let voiced = song.notes.len();
    song.notes = resolve_overlaps(std::mem::take(&mut song.notes));
    debug!(
        part = %options.part.marker,
        voiced,
        kept = song.notes.len(),
        total_ticks,
        chord_mappings = voicer.chord_cache.len(),
        "Built song"
    );
    song
}

/// Source chord data for every non-drum channel of a part.
fn collect_sources(part: &StylePart, settings: Option<&CasmInfo>) -> BTreeMap<u8, SourceChord> {
    let mut pitches: BTreeMap<u8, BTreeSet<u8>> = BTreeMap::new();
    for note in &part.notes {
        if is_drum_channel(note.channel) {
            continue;
        }
        pitches.entry(note.channel).or_default().insert(note.pitch);
    }

    pitches
        .into_iter()
        .map(|(channel, pitches)| {
            let channel_settings = settings.and_then(|s| s.channel(channel));
            let root = channel_settings.map_or(0, |s| s.source_root);
            let quality = channel_settings
                .and_then(|s| s.source_quality.as_deref())
                .unwrap_or("");
            (channel, SourceChord::new(pitches, root, quality))
        })
        .collect()
}

/// Per-render voicing state and memo tables.
struct Voicer<'a> {
    options: BuildOptions<'a>,
    segments: &'a [ChordSegment],
    sources: BTreeMap<u8, SourceChord>,
    dest_types: Vec<ChordTypeInfo>,
    /// Index into `dest_types` for each segment.
    segment_types: Vec<usize>,
    chord_cache: HashMap<(u8, usize), Option<ChordModeMapping>>,
}

impl<'a> Voicer<'a> {
    fn new(options: BuildOptions<'a>, segments: &'a [ChordSegment]) -> Self {
        let mut by_symbol: HashMap<&str, usize> = HashMap::new();
        let mut dest_types = Vec::new();
        let segment_types = segments
            .iter()
            .map(|segment| {
                *by_symbol.entry(segment.symbol.as_str()).or_insert_with(|| {
                    dest_types.push(ChordTypeInfo::from_quality(extract_quality(&segment.symbol)));
                    dest_types.len() - 1
                })
            })
            .collect();

        Self {
            options,
            segments,
            sources: collect_sources(options.part, options.settings),
            dest_types,
            segment_types,
            chord_cache: HashMap::new(),
        }
    }

    /// Segment containing `tick`, or the last segment.
    fn segment_at(&self, tick: u64) -> usize {
        self.segments
            .iter()
            .position(|s| s.contains(tick))
            .unwrap_or(self.segments.len().saturating_sub(1))
    }

    fn voice(&mut self, note: &NoteEvent, start_tick: u64, duration: u64, song: &mut BuiltSong) {
        let segment_index = self.segment_at(start_tick);
        let segment = &self.segments[segment_index];
        let dest_type = &self.dest_types[self.segment_types[segment_index]];
        let settings = self.options.settings.and_then(|s| s.channel(note.channel));
        let ctb2 = settings.and_then(|s| s.ctb2);
        let dest_channel = settings.map_or(note.channel, |s| s.dest_channel);
        let target_root = normalize_pitch_class(segment.root as i32);
        let source_root = normalize_pitch_class(settings.map_or(0, |s| s.source_root) as i32);

        let source = self.sources.get(&note.channel);
        let source_is_major = source.map_or(true, |s| s.type_info.profile.is_major);
        let source_rel = normalize_pitch_class(note.pitch as i32 - source_root as i32);
        let source_degree = degree_most_probable(source_rel as i32, source_is_major);

        let mut pitch = note.pitch as i32;
        let mut dest_degree = source_degree;
        let mut mode = MappingMode::Root;

        if !is_drum_channel(dest_channel) {
            mode = MappingMode::for_settings(ctb2.as_ref());
            match mode {
                MappingMode::Chord => {
                    let mapping = match self.chord_cache.entry((note.channel, segment_index)) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) => {
                            let computed = source
                                .and_then(|s| compute_chord_mapping(s, dest_type, target_root));
                            debug!(
                                channel = note.channel,
                                chord = %segment.symbol,
                                found = computed.is_some(),
                                "Computed chord-mode voicing"
                            );
                            entry.insert(computed)
                        }
                    };
                    let mapping = mapping.as_ref();
                    dest_degree = mapping
                        .and_then(|m| m.degree_map.get(&source_degree).copied())
                        .unwrap_or_else(|| dest_type.profile.fit_degree_advanced(source_degree));
                    if let Some(&mapped) = mapping.and_then(|m| m.pitch_map.get(&note.pitch)) {
                        pitch = mapped;
                    }
                }
                MappingMode::Melody => {
                    let root_delta = normalize_pitch_class(target_root as i32 - source_root as i32);
                    let base = pitch + root_delta as i32;
                    let bass_on = ctb2.map_or(false, |c| c.bass_on);
                    let same_type = source.map_or(false, |s| s.type_info.same_type_as(dest_type));
                    if bass_on && same_type {
                        let dest_rel = normalize_pitch_class(target_root as i32 + source_rel as i32);
                        pitch = closest_pitch(base, dest_rel);
                        dest_degree = degree_most_probable(
                            dest_rel as i32 - target_root as i32,
                            dest_type.profile.is_major,
                        );
                    } else {
                        dest_degree = dest_type.profile.fit_degree_melody_mode(source_degree);
                        let dest_rel =
                            normalize_pitch_class(target_root as i32 + dest_degree.pitch() as i32);
                        pitch = closest_pitch(base, dest_rel);
                    }
                }
                MappingMode::Root => {
                    pitch += target_root as i32 - source_root as i32;
                }
            }

            if let Some(c) = ctb2 {
                let upper = normalize_pitch_class(c.chord_root_upper as i32);
                if mode != MappingMode::Chord && c.ntr == 0 && target_root > upper {
                    pitch -= 12;
                }
            }
        }

        if let Some(c) = ctb2 {
            let (low, high) = (c.note_low as i32, c.note_high as i32);
            while pitch > high {
                pitch -= 12;
            }
            while pitch < low {
                pitch += 12;
            }
            // Windows narrower than an octave can be overshot by the upward fold.
            pitch = pitch.min(high);
        }
        let pitch = pitch.clamp(0, 127) as u8;

        let dest_rel = normalize_pitch_class(pitch as i32 - target_root as i32);
        if mode == MappingMode::Root {
            dest_degree = degree_most_probable(dest_rel as i32, dest_type.profile.is_major);
        }

        song.notes.push(NoteEvent {
            channel: dest_channel,
            pitch,
            velocity: note.velocity,
            start_tick,
            duration,
        });

        if self.options.trace {
            song.mappings.push(NoteMapping {
                source_channel: note.channel,
                dest_channel,
                source_pitch: note.pitch,
                dest_pitch: pitch,
                source_rel_pitch: source_rel,
                dest_rel_pitch: dest_rel,
                source_degree,
                dest_degree,
                mapping: mode,
                start_tick,
                duration,
                segment: SegmentRef {
                    start_tick: segment.start_tick,
                    end_tick: segment.end_tick,
                    symbol: segment.symbol.clone(),
                },
                source_root,
                target_root,
                ctb2,
            });
        }
    }
}
