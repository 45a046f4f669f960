//! Chord-mode voicing
//!
//! A chord-mode channel records a chord shape over a known source chord. For
//! every target chord the shape is rebuilt from scratch:
//!
//! 1. each degree the pattern uses is paired with a degree of the target
//!    chord, most important target slots first
//! 2. every ordering of the resulting target pitch classes is stacked in
//!    parallel to the source shape, once anchored above and once below the
//!    lowest source note
//! 3. the stacking closest to the source shape wins
//!
//! The result is a lookup table from each distinct source pitch to its
//! target pitch.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::pitch::{lower_pitch, upper_pitch};
use crate::harmony::{
    degree_most_probable, normalize_pitch_class, ChordTypeInfo, Degree, DegreeIndex,
};

/// Above this many destination pitch classes only the identity ordering is
/// tried.
pub const MAX_PERMUTED_TONES: usize = 8;

/// Pitch material of one source channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChord {
    /// Distinct pitches, ascending.
    pub pitches: Vec<u8>,
    /// Pitch class of each entry of `pitches`.
    pub pitch_classes: Vec<u8>,
    /// Pitch classes in order of first appearance.
    pub unique_pitch_classes: Vec<u8>,
    pub root: u8,
    pub type_info: ChordTypeInfo,
    /// Degrees of the unique pitch classes over `root`, in canonical order.
    pub used_degrees: Vec<Degree>,
}

impl SourceChord {
    pub fn new(pitches: BTreeSet<u8>, root: u8, quality: &str) -> Self {
        let pitches: Vec<u8> = pitches.into_iter().collect();
        let pitch_classes: Vec<u8> = pitches
            .iter()
            .map(|&p| normalize_pitch_class(p as i32))
            .collect();
        let mut unique_pitch_classes = Vec::new();
        for &pc in &pitch_classes {
            if !unique_pitch_classes.contains(&pc) {
                unique_pitch_classes.push(pc);
            }
        }

        let root = normalize_pitch_class(root as i32);
        let type_info = ChordTypeInfo::from_quality(quality);
        let mut used_degrees = Vec::new();
        for &pc in &unique_pitch_classes {
            let degree = degree_most_probable(pc as i32 - root as i32, type_info.profile.is_major);
            if !used_degrees.contains(&degree) {
                used_degrees.push(degree);
            }
        }
        used_degrees.sort();

        Self {
            pitches,
            pitch_classes,
            unique_pitch_classes,
            root,
            type_info,
            used_degrees,
        }
    }
}

/// Source-to-target tables for one (channel, chord span) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordModeMapping {
    pub pitch_map: BTreeMap<u8, i32>,
    pub degree_map: BTreeMap<Degree, Degree>,
}

fn permute(values: &[u8]) -> Vec<Vec<u8>> {
    if values.len() <= 1 {
        return vec![values.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..values.len() {
        let mut rest = values.to_vec();
        let head = rest.remove(i);
        for tail in permute(&rest) {
            let mut permutation = Vec::with_capacity(values.len());
            permutation.push(head);
            permutation.extend(tail);
            result.push(permutation);
        }
    }
    result
}

/// All orderings of `values`, duplicates removed, in first-seen order.
pub fn unique_permutations(values: &[u8]) -> Vec<Vec<u8>> {
    if values.len() > MAX_PERMUTED_TONES {
        return vec![values.to_vec()];
    }
    let mut seen = HashSet::new();
    permute(values)
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Octaves skipped between consecutive pitches; the first entry is 0.
fn skip_octaves(pitches: &[u8]) -> Vec<i32> {
    let mut result = Vec::with_capacity(pitches.len());
    let mut last: Option<i32> = None;
    for &pitch in pitches {
        result.push(match last {
            None => 0,
            Some(last) => (pitch as i32 - last).div_euclid(12),
        });
        last = Some(pitch as i32);
    }
    result
}

/// Stack `rel_pitches` in parallel to the source shape.
///
/// Source pitch classes take destination pitch classes in order of first
/// appearance; repeated classes reuse their assignment. Each next note is the
/// next occurrence strictly above the previous one, skipping as many extra
/// octaves as the source leap did. Returns an empty chord when the
/// destination has a different number of pitch classes than the source.
pub fn parallel_chord(source: &SourceChord, rel_pitches: &[u8], below: bool) -> Vec<i32> {
    let (Some(&first_source), Some(&first_rel)) = (source.pitches.first(), rel_pitches.first())
    else {
        return Vec::new();
    };
    if rel_pitches.len() != source.unique_pitch_classes.len() {
        return Vec::new();
    }

    let skips = skip_octaves(&source.pitches);
    let mut assigned: BTreeMap<u8, u8> = BTreeMap::new();
    let mut next = 1;

    let first = if below {
        lower_pitch(first_source as i32, first_rel, true)
    } else {
        upper_pitch(first_source as i32, first_rel, true)
    };
    assigned.insert(source.pitch_classes[0], first_rel);

    let mut chord = Vec::with_capacity(source.pitches.len());
    chord.push(first);
    let mut last = first;
    for i in 1..source.pitches.len() {
        let pc = source.pitch_classes[i];
        let rel = match assigned.get(&pc) {
            Some(&rel) => rel,
            None => {
                let rel = rel_pitches
                    .get(next)
                    .or_else(|| rel_pitches.last())
                    .copied()
                    .unwrap_or(first_rel);
                next += 1;
                assigned.insert(pc, rel);
                rel
            }
        };
        for _ in 0..=skips[i] {
            last = upper_pitch(last, rel, false);
        }
        chord.push(last);
    }
    chord
}

/// Distance between a source shape and a candidate voicing; lower is better.
///
/// `None` stands for an unusable candidate. The score sums the per-voice
/// distances, weighs the top voice three more times and the bass once more,
/// then penalizes crowded or over-wide voicings of three or more notes.
pub fn chord_score(
    source: &[u8],
    dest: &[i32],
    dest_info: &ChordTypeInfo,
    dest_root: u8,
) -> Option<i32> {
    if source.is_empty() || source.len() != dest.len() {
        return None;
    }
    let distance: i32 = source
        .iter()
        .zip(dest)
        .map(|(&s, &d)| (s as i32 - d).abs())
        .sum();
    let n = dest.len();
    let top = (source[n - 1] as i32 - dest[n - 1]).abs();
    let bottom = (source[0] as i32 - dest[0]).abs();
    let mut score = distance + 3 * top + bottom;

    if n > 2 {
        let size = n as i32;
        let max = dest[n - 1];
        let min = dest[0];
        if dest_info.is_thirteenth && max - min < 11 {
            score += 4 * size;
        }
        if dest[n - 2] == max - 1 {
            score += 3 * size;
        }
        if max - min == 13 {
            score += 4 * size;
        }
        if dest[1] - min >= 9 && normalize_pitch_class(min) != dest_root {
            score += 2 * size;
        }
    }
    Some(score)
}

/// Signed interval from `source_rel` to `dest_rel`, folded into `-5..=6`.
fn relative_pitch_delta(source_rel: u8, dest_rel: u8) -> i32 {
    let delta = dest_rel as i32 - source_rel as i32;
    if delta > 6 {
        delta - 12
    } else if delta < -5 {
        delta + 12
    } else {
        delta
    }
}

/// Pair the source degrees with target degrees.
///
/// Up to two source degrees are fitted one by one. Larger sets first pair
/// degrees occupying the same slot of both chord types, walking the target's
/// most important slots; the rest go to the remaining slot whose pitch class
/// is nearest. When the target has fewer degrees than the source, slots are
/// shared instead of consumed.
pub fn dest_degrees_for_chord_mode(
    source_info: &ChordTypeInfo,
    dest_info: &ChordTypeInfo,
    source_degrees: &[Degree],
    source_root: u8,
    dest_root: u8,
) -> BTreeMap<Degree, Degree> {
    let mut result = BTreeMap::new();
    let mut remaining: Vec<Degree> = source_degrees.to_vec();
    remaining.sort();

    if remaining.len() <= 2 {
        for degree in remaining {
            result.insert(degree, dest_info.profile.fit_degree_advanced(degree));
        }
        return result;
    }

    let consume = dest_info.degrees.len() >= remaining.len();
    let mut slots: Vec<DegreeIndex> = if consume {
        dest_info.most_important.iter().take(remaining.len()).copied().collect()
    } else {
        dest_info.most_important.clone()
    };

    for slot in slots.clone() {
        let dest_degree = dest_info.fit_index_advanced(slot);
        let source_degree = source_info.fit_index_advanced(slot);
        if let Some(pos) = remaining.iter().position(|&d| d == source_degree) {
            result.insert(source_degree, dest_degree);
            remaining.remove(pos);
            if consume {
                slots.retain(|&s| s != slot);
            }
        }
    }

    for source_degree in remaining {
        if slots.is_empty() {
            result.insert(source_degree, dest_info.profile.fit_degree_advanced(source_degree));
            continue;
        }
        let source_rel = normalize_pitch_class(source_root as i32 + source_degree.pitch() as i32);
        let mut closest = 0;
        let mut smallest = i32::MAX;
        for (i, &slot) in slots.iter().enumerate() {
            let dest_degree = dest_info.fit_index_advanced(slot);
            let dest_rel = normalize_pitch_class(dest_root as i32 + dest_degree.pitch() as i32);
            let delta = relative_pitch_delta(source_rel, dest_rel).abs();
            if delta < smallest {
                smallest = delta;
                closest = i;
            }
        }
        result.insert(source_degree, dest_info.fit_index_advanced(slots[closest]));
        if consume {
            slots.remove(closest);
        }
    }
    result
}

/// Build the pitch and degree tables re-voicing `source` onto a target chord.
///
/// Returns `None` when no candidate voicing can be scored.
pub fn compute_chord_mapping(
    source: &SourceChord,
    dest_info: &ChordTypeInfo,
    dest_root: u8,
) -> Option<ChordModeMapping> {
    if source.pitches.is_empty() || source.unique_pitch_classes.is_empty() {
        return None;
    }
    let dest_root = normalize_pitch_class(dest_root as i32);
    let degree_map = dest_degrees_for_chord_mode(
        &source.type_info,
        dest_info,
        &source.used_degrees,
        source.root,
        dest_root,
    );
    let dest_rels: Vec<u8> = source
        .used_degrees
        .iter()
        .map(|degree| {
            let dest = degree_map
                .get(degree)
                .copied()
                .unwrap_or_else(|| dest_info.profile.fit_degree_advanced(*degree));
            normalize_pitch_class(dest_root as i32 + dest.pitch() as i32)
        })
        .collect();

    let permutations = if dest_rels.len() > 1 {
        unique_permutations(&dest_rels)
    } else {
        vec![dest_rels]
    };

    let mut best: Option<(i32, Vec<i32>)> = None;
    for permutation in &permutations {
        for below in [false, true] {
            let candidate = parallel_chord(source, permutation, below);
            let Some(score) = chord_score(&source.pitches, &candidate, dest_info, dest_root) else {
                continue;
            };
            if best.as_ref().map_or(true, |(best_score, _)| score < *best_score) {
                best = Some((score, candidate));
            }
        }
    }

    let (_, chord) = best?;
    let pitch_map = source.pitches.iter().copied().zip(chord).collect();
    Some(ChordModeMapping {
        pitch_map,
        degree_map,
    })
}
