//! Pitch placement helpers
//!
//! Pitches are handled as `i32` while voicing so intermediate octave shifts
//! can leave the MIDI range before the final clamp.

use crate::harmony::normalize_pitch_class;

/// Nearest pitch with pitch class `rel` at or below `reference`.
///
/// With `inclusive` false the reference itself is skipped. The result is
/// raised an octave if it falls below 0.
pub fn lower_pitch(reference: i32, rel: u8, inclusive: bool) -> i32 {
    let rel = rel as i32;
    let reference_pc = normalize_pitch_class(reference) as i32;
    let octave = reference.div_euclid(12);
    let mut pitch = octave * 12 + rel;
    if (rel == reference_pc && !inclusive) || rel > reference_pc {
        pitch = (octave - 1) * 12 + rel;
    }
    if pitch < 0 {
        pitch += 12;
    }
    pitch
}

/// Nearest pitch with pitch class `rel` at or above `reference`.
///
/// With `inclusive` false the reference itself is skipped. The result is
/// lowered an octave if it rises above 127.
pub fn upper_pitch(reference: i32, rel: u8, inclusive: bool) -> i32 {
    let rel = rel as i32;
    let reference_pc = normalize_pitch_class(reference) as i32;
    let octave = reference.div_euclid(12);
    let mut pitch = octave * 12 + rel;
    if (rel == reference_pc && !inclusive) || rel < reference_pc {
        pitch = (octave + 1) * 12 + rel;
    }
    if pitch > 127 {
        pitch -= 12;
    }
    pitch
}

/// Closest pitch with pitch class `rel` to `reference`; ties go to the lower pitch.
///
/// # Examples
/// ```
/// use stylemap::voicing::closest_pitch;
///
/// assert_eq!(closest_pitch(60, 2), 62);
/// assert_eq!(closest_pitch(60, 10), 58);
/// // F# is six semitones away on both sides of C.
/// assert_eq!(closest_pitch(60, 6), 54);
/// ```
pub fn closest_pitch(reference: i32, rel: u8) -> i32 {
    let up = upper_pitch(reference, rel, true);
    let low = lower_pitch(reference, rel, true);
    if up - reference < reference - low {
        up
    } else {
        low
    }
}
