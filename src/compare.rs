//! Note-level comparison of two MIDI files.
//!
//! Used to check a render against a reference render: notes from every track
//! are flattened, put in a canonical order and compared position by
//! position. Velocity is ignored.

use serde::Serialize;

use crate::error::Result;
use crate::midi::{collect_notes, SequenceCodec};
use crate::types::NoteEvent;

/// Differing pairs kept in a [`NoteDiff`].
pub const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDiff {
    /// Positions whose notes differ, including positions only one list has.
    pub mismatches: usize,
    /// First differing pairs as `(index, left, right)`.
    pub samples: Vec<(usize, Option<NoteEvent>, Option<NoteEvent>)>,
    pub len_a: usize,
    pub len_b: usize,
}

impl NoteDiff {
    pub fn is_identical(&self) -> bool {
        self.mismatches == 0
    }
}

fn sort_key(note: &NoteEvent) -> (u64, u8, u8, u64) {
    (note.start_tick, note.channel, note.pitch, note.duration)
}

fn same_note(a: &NoteEvent, b: &NoteEvent) -> bool {
    sort_key(a) == sort_key(b)
}

/// Compare two note lists in (start, channel, pitch, duration) order.
///
/// # Examples
/// ```
/// use stylemap::compare::compare_notes;
/// use stylemap::types::NoteEvent;
///
/// let a = NoteEvent { channel: 0, pitch: 60, velocity: 100, start_tick: 0, duration: 480 };
/// let b = NoteEvent { velocity: 64, ..a };
/// let c = NoteEvent { pitch: 62, ..a };
///
/// assert!(compare_notes(&[a], &[b]).is_identical());
/// assert_eq!(compare_notes(&[a], &[c]).mismatches, 1);
/// ```
pub fn compare_notes(a: &[NoteEvent], b: &[NoteEvent]) -> NoteDiff {
    let mut left = a.to_vec();
    let mut right = b.to_vec();
    left.sort_by_key(sort_key);
    right.sort_by_key(sort_key);

    let mut mismatches = 0;
    let mut samples = Vec::new();
    for index in 0..left.len().max(right.len()) {
        let l = left.get(index).copied();
        let r = right.get(index).copied();
        let equal = match (&l, &r) {
            (Some(l), Some(r)) => same_note(l, r),
            _ => false,
        };
        if !equal {
            mismatches += 1;
            if samples.len() < MAX_SAMPLES {
                samples.push((index, l, r));
            }
        }
    }

    NoteDiff {
        mismatches,
        samples,
        len_a: left.len(),
        len_b: right.len(),
    }
}

/// Notes of every track of a MIDI file.
pub fn notes_from_smf(bytes: &[u8], codec: &dyn SequenceCodec) -> Result<Vec<NoteEvent>> {
    let sequence = codec.decode(bytes)?;
    Ok(sequence
        .tracks
        .iter()
        .flat_map(|track| collect_notes(track).0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(pitch: u8, start_tick: u64) -> NoteEvent {
        NoteEvent {
            channel: 2,
            pitch,
            velocity: 80,
            start_tick,
            duration: 240,
        }
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = vec![note(60, 0), note(64, 240)];
        let b = vec![note(64, 240), note(60, 0)];
        assert!(compare_notes(&a, &b).is_identical());
    }

    #[test]
    fn test_length_difference_counts() {
        let a = vec![note(60, 0), note(64, 240), note(67, 480)];
        let b = vec![note(60, 0)];
        let diff = compare_notes(&a, &b);
        assert_eq!(diff.mismatches, 2);
        assert_eq!((diff.len_a, diff.len_b), (3, 1));
        assert_eq!(diff.samples[0], (1, Some(note(64, 240)), None));
    }

    #[test]
    fn test_samples_capped() {
        let a: Vec<NoteEvent> = (0..10).map(|i| note(60, i * 480)).collect();
        let b: Vec<NoteEvent> = (0..10).map(|i| note(61, i * 480)).collect();
        let diff = compare_notes(&a, &b);
        assert_eq!(diff.mismatches, 10);
        assert_eq!(diff.samples.len(), MAX_SAMPLES);
    }
}
