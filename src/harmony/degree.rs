//! Scale degrees
//!
//! Harmonic reasoning works on named degrees rather than raw semitone offsets:
//! a flat ninth and a sharp ninth carry different intent even where they share
//! a pitch with a third.

use serde::Serialize;

use super::tones::normalize_pitch_class;

/// One of the 15 chord degrees.
///
/// Declaration order is the canonical sort order used when degree lists are
/// ordered (root, ninths, thirds, fourth, eleventh, fifths, thirteenth,
/// sixth, sevenths).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Degree {
    Root,
    NinthFlat,
    Ninth,
    NinthSharp,
    ThirdFlat,
    Third,
    FourthOrEleventh,
    EleventhSharp,
    FifthFlat,
    Fifth,
    FifthSharp,
    ThirteenthFlat,
    SixthOrThirteenth,
    SeventhFlat,
    Seventh,
}

/// Natural family of a degree, ignoring its accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegreeNatural {
    Root,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Ninth,
    Eleventh,
    Thirteenth,
}

impl DegreeNatural {
    pub const COUNT: usize = 9;

    /// Slot of this natural in per-profile lookup tables.
    pub fn index(self) -> usize {
        match self {
            DegreeNatural::Root => 0,
            DegreeNatural::Third => 1,
            DegreeNatural::Fourth => 2,
            DegreeNatural::Fifth => 3,
            DegreeNatural::Sixth => 4,
            DegreeNatural::Seventh => 5,
            DegreeNatural::Ninth => 6,
            DegreeNatural::Eleventh => 7,
            DegreeNatural::Thirteenth => 8,
        }
    }
}

impl Degree {
    /// Semitone offset above the chord root.
    pub fn pitch(self) -> u8 {
        match self {
            Degree::Root => 0,
            Degree::NinthFlat => 1,
            Degree::Ninth => 2,
            Degree::NinthSharp | Degree::ThirdFlat => 3,
            Degree::Third => 4,
            Degree::FourthOrEleventh => 5,
            Degree::EleventhSharp | Degree::FifthFlat => 6,
            Degree::Fifth => 7,
            Degree::FifthSharp | Degree::ThirteenthFlat => 8,
            Degree::SixthOrThirteenth => 9,
            Degree::SeventhFlat => 10,
            Degree::Seventh => 11,
        }
    }

    pub fn natural(self) -> DegreeNatural {
        match self {
            Degree::Root => DegreeNatural::Root,
            Degree::NinthFlat | Degree::Ninth | Degree::NinthSharp => DegreeNatural::Ninth,
            Degree::ThirdFlat | Degree::Third => DegreeNatural::Third,
            Degree::FourthOrEleventh => DegreeNatural::Fourth,
            Degree::EleventhSharp => DegreeNatural::Eleventh,
            Degree::FifthFlat | Degree::Fifth | Degree::FifthSharp => DegreeNatural::Fifth,
            Degree::ThirteenthFlat => DegreeNatural::Thirteenth,
            Degree::SixthOrThirteenth => DegreeNatural::Sixth,
            Degree::SeventhFlat | Degree::Seventh => DegreeNatural::Seventh,
        }
    }
}

/// Slot positions within a chord's ordered degree list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegreeIndex {
    Root,
    ThirdOrFourth,
    Fifth,
    SixthOrSeventh,
    Extension1,
    Extension2,
    Extension3,
}

impl DegreeIndex {
    pub fn ordinal(self) -> usize {
        match self {
            DegreeIndex::Root => 0,
            DegreeIndex::ThirdOrFourth => 1,
            DegreeIndex::Fifth => 2,
            DegreeIndex::SixthOrSeventh => 3,
            DegreeIndex::Extension1 => 4,
            DegreeIndex::Extension2 => 5,
            DegreeIndex::Extension3 => 6,
        }
    }
}

/// Most likely degree for a pitch `rel` semitones above the root.
///
/// Offset 3 reads as a sharp ninth over a major chord and as a minor third
/// otherwise.
///
/// # Examples
/// ```
/// use stylemap::harmony::{degree_most_probable, Degree};
///
/// assert_eq!(degree_most_probable(3, true), Degree::NinthSharp);
/// assert_eq!(degree_most_probable(3, false), Degree::ThirdFlat);
/// assert_eq!(degree_most_probable(20, false), Degree::ThirteenthFlat);
/// ```
pub fn degree_most_probable(rel: i32, is_major: bool) -> Degree {
    match normalize_pitch_class(rel) {
        0 => Degree::Root,
        1 => Degree::NinthFlat,
        2 => Degree::Ninth,
        3 if is_major => Degree::NinthSharp,
        3 => Degree::ThirdFlat,
        4 => Degree::Third,
        5 => Degree::FourthOrEleventh,
        6 => Degree::EleventhSharp,
        7 => Degree::Fifth,
        8 => Degree::ThirteenthFlat,
        9 => Degree::SixthOrThirteenth,
        10 => Degree::SeventhFlat,
        _ => Degree::Seventh,
    }
}
