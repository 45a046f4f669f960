//! Chord quality classification
//!
//! A chord quality string ("m7b5", "Maj7#11", "1+2+5") is classified once into
//! a [`ChordProfile`], the set of degrees the chord implies, and a
//! [`ChordTypeInfo`], the ordered degree list used to pair voices between two
//! chords.
//!
//! ## Fitting
//! When a degree from one chord has to land on another chord, the `fit_*`
//! functions pick the destination degree:
//! - [`ChordProfile::fit_degree`] answers only from degrees the chord contains
//! - [`ChordProfile::fit_degree_advanced`] falls back through a per-degree cascade
//! - [`ChordProfile::fit_degree_melody_mode`] uses the cascade only for ninths,
//!   sevenths and the sixth, leaving melodic tensions untouched

use super::degree::{Degree, DegreeIndex, DegreeNatural};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordFamily {
    Major,
    Minor,
    Seventh,
    Diminished,
    Sus,
    Other,
}

/// Special chord forms that bypass the regular degree assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    RootOnly,
    Power,
    Special2,
}

fn special_form(normalized: &str) -> Option<SpecialForm> {
    match normalized {
        "1+8" => Some(SpecialForm::RootOnly),
        "1+5" => Some(SpecialForm::Power),
        "1+2+5" | "2" => Some(SpecialForm::Special2),
        _ if normalized.contains("sus2") => Some(SpecialForm::Special2),
        _ => None,
    }
}

fn normalize_quality(quality: &str) -> String {
    quality.trim().to_lowercase()
}

fn is_minor_quality(normalized: &str) -> bool {
    normalized.starts_with('m') && !normalized.starts_with("maj")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordProfile {
    pub family: ChordFamily,
    pub is_major: bool,
    /// Lowercased, trimmed quality text.
    pub extension: String,
    by_natural: [Option<Degree>; DegreeNatural::COUNT],
    by_pitch: [Option<Degree>; 12],
}

impl ChordProfile {
    fn empty(family: ChordFamily, is_major: bool, extension: String) -> Self {
        Self {
            family,
            is_major,
            extension,
            by_natural: [None; DegreeNatural::COUNT],
            by_pitch: [None; 12],
        }
    }

    /// Record a degree under a natural slot. The pitch table keeps the first
    /// degree registered for a pitch.
    fn add(&mut self, natural: DegreeNatural, degree: Degree) {
        self.by_natural[natural.index()] = Some(degree);
        let slot = &mut self.by_pitch[degree.pitch() as usize];
        if slot.is_none() {
            *slot = Some(degree);
        }
    }

    /// Classify a quality string.
    ///
    /// # Examples
    /// ```
    /// use stylemap::harmony::{ChordFamily, ChordProfile, Degree, DegreeNatural};
    ///
    /// let profile = ChordProfile::from_quality("m7b5");
    /// assert_eq!(profile.family, ChordFamily::Minor);
    /// assert_eq!(profile.degree(DegreeNatural::Fifth), Some(Degree::FifthFlat));
    /// assert_eq!(profile.degree(DegreeNatural::Seventh), Some(Degree::SeventhFlat));
    /// ```
    pub fn from_quality(quality: &str) -> Self {
        let q = normalize_quality(quality);
        let special = special_form(&q);
        let is_minor = is_minor_quality(&q);
        let has_sus = q.contains("sus");
        let has_dim = q.contains("dim");
        let has_maj = q.contains("maj");
        let has_seventh = q.contains('7');
        let is_major = special.is_none() && (has_maj || (!is_minor && !has_dim && !has_sus));

        let family = if has_sus {
            ChordFamily::Sus
        } else if has_dim {
            ChordFamily::Diminished
        } else if is_minor {
            ChordFamily::Minor
        } else if has_seventh {
            ChordFamily::Seventh
        } else {
            ChordFamily::Major
        };

        if let Some(form) = special {
            let family = if form == SpecialForm::Special2 {
                ChordFamily::Sus
            } else {
                ChordFamily::Other
            };
            let mut profile = Self::empty(family, false, q);
            profile.add(DegreeNatural::Root, Degree::Root);
            if form != SpecialForm::RootOnly {
                profile.add(DegreeNatural::Fifth, Degree::Fifth);
            }
            if form == SpecialForm::Special2 {
                profile.add(DegreeNatural::Ninth, Degree::Ninth);
            }
            return profile;
        }

        let mut profile = Self::empty(family, is_major, q.clone());
        profile.add(DegreeNatural::Root, Degree::Root);

        if has_sus {
            profile.add(DegreeNatural::Fourth, Degree::FourthOrEleventh);
        } else if is_minor {
            profile.add(DegreeNatural::Third, Degree::ThirdFlat);
        } else {
            profile.add(DegreeNatural::Third, Degree::Third);
        }

        let fifth = if q.contains("b5") || q.starts_with("dim") {
            Degree::FifthFlat
        } else if q.contains("#5") || q.contains("aug") || q.contains('+') || q.contains("b13") {
            Degree::FifthSharp
        } else {
            Degree::Fifth
        };
        profile.add(DegreeNatural::Fifth, fifth);

        let has_maj7 = q.contains("maj7") || q.contains("m7m") || q.contains("minmaj7");
        if q.contains("dim7") {
            profile.add(DegreeNatural::Sixth, Degree::SixthOrThirteenth);
        } else if has_maj7 {
            profile.add(DegreeNatural::Seventh, Degree::Seventh);
        } else if has_seventh {
            profile.add(DegreeNatural::Seventh, Degree::SeventhFlat);
        }

        if q.contains('6') || q.contains("13") {
            profile.add(DegreeNatural::Sixth, Degree::SixthOrThirteenth);
        }

        if q.contains("b9") {
            profile.add(DegreeNatural::Ninth, Degree::NinthFlat);
        } else if q.contains("#9") {
            profile.add(DegreeNatural::Ninth, Degree::NinthSharp);
        } else if q.contains('9') {
            profile.add(DegreeNatural::Ninth, Degree::Ninth);
        }

        if q.contains("#11") {
            profile.add(DegreeNatural::Eleventh, Degree::EleventhSharp);
        } else if q.contains("11") || has_sus {
            profile.add(DegreeNatural::Eleventh, Degree::FourthOrEleventh);
        }

        if q.contains("b13") && !q.contains("#5") {
            profile.add(DegreeNatural::Thirteenth, Degree::ThirteenthFlat);
        } else if q.contains("13") {
            profile.add(DegreeNatural::Thirteenth, Degree::SixthOrThirteenth);
        }

        profile
    }

    /// Degree registered under a natural, if the chord has one.
    pub fn degree(&self, natural: DegreeNatural) -> Option<Degree> {
        self.by_natural[natural.index()]
    }

    pub fn has(&self, natural: DegreeNatural) -> bool {
        self.degree(natural).is_some()
    }

    /// First degree registered at a pitch offset.
    pub fn degree_at_pitch(&self, pitch: u8) -> Option<Degree> {
        self.by_pitch.get(pitch as usize).copied().flatten()
    }

    fn fifth_or_natural(&self) -> Degree {
        self.degree(DegreeNatural::Fifth).unwrap_or(Degree::Fifth)
    }

    fn is_half_diminished(&self) -> bool {
        self.extension.contains("m7b5") || self.extension.contains("m9b5")
    }

    /// Degree of this chord matching `degree`, using only degrees the chord has.
    pub fn fit_degree(&self, degree: Degree) -> Option<Degree> {
        let natural = degree.natural();
        if let Some(direct) = self.degree(natural) {
            if natural == DegreeNatural::Seventh && self.extension.contains('6') {
                return Some(Degree::SixthOrThirteenth);
            }
            if natural == DegreeNatural::Sixth {
                if let Some(seventh) = self.degree(DegreeNatural::Seventh) {
                    return Some(seventh);
                }
            }
            return Some(direct);
        }
        self.degree_at_pitch(degree.pitch())
    }

    /// Degree of this chord matching `degree`, falling back to the closest
    /// musically plausible substitute when the chord lacks it.
    ///
    /// # Examples
    /// ```
    /// use stylemap::harmony::{ChordProfile, Degree};
    ///
    /// // A major triad has no seventh: a major seventh stays a major seventh.
    /// let major = ChordProfile::from_quality("");
    /// assert_eq!(major.fit_degree_advanced(Degree::Seventh), Degree::Seventh);
    ///
    /// // Over a plain minor triad the same degree becomes a minor seventh.
    /// let minor = ChordProfile::from_quality("m");
    /// assert_eq!(minor.fit_degree_advanced(Degree::Seventh), Degree::SeventhFlat);
    /// ```
    pub fn fit_degree_advanced(&self, degree: Degree) -> Degree {
        if let Some(direct) = self.fit_degree(degree) {
            return direct;
        }
        match degree {
            Degree::NinthFlat | Degree::Ninth | Degree::NinthSharp => {
                if self.is_half_diminished() {
                    Degree::NinthFlat
                } else {
                    Degree::Ninth
                }
            }
            Degree::ThirdFlat | Degree::Third => Degree::FourthOrEleventh,
            Degree::FourthOrEleventh => match self.family {
                ChordFamily::Minor | ChordFamily::Diminished => Degree::FourthOrEleventh,
                _ if self.degree_at_pitch(6).is_some() => Degree::EleventhSharp,
                _ => Degree::FourthOrEleventh,
            },
            Degree::EleventhSharp => {
                if self.family == ChordFamily::Sus {
                    Degree::FourthOrEleventh
                } else {
                    self.fifth_or_natural()
                }
            }
            Degree::ThirteenthFlat => self.fifth_or_natural(),
            Degree::SixthOrThirteenth => {
                if self.is_half_diminished() {
                    Degree::ThirteenthFlat
                } else {
                    self.degree_at_pitch(8).unwrap_or(Degree::SixthOrThirteenth)
                }
            }
            Degree::SeventhFlat => {
                if self.family == ChordFamily::Major && self.has(DegreeNatural::Sixth) {
                    Degree::Seventh
                } else if self.extension.contains("dim7") {
                    Degree::SixthOrThirteenth
                } else {
                    Degree::SeventhFlat
                }
            }
            Degree::Seventh => match self.family {
                ChordFamily::Sus => Degree::SeventhFlat,
                ChordFamily::Minor if !self.has(DegreeNatural::Sixth) => Degree::SeventhFlat,
                ChordFamily::Diminished if self.has(DegreeNatural::Sixth) => {
                    Degree::SixthOrThirteenth
                }
                ChordFamily::Diminished => Degree::SeventhFlat,
                _ => Degree::Seventh,
            },
            other => other,
        }
    }

    /// Melody-mode fit: tensions the chord lacks are kept as written, except
    /// ninths, sevenths and the sixth which go through the advanced cascade.
    pub fn fit_degree_melody_mode(&self, degree: Degree) -> Degree {
        if let Some(direct) = self.fit_degree(degree) {
            return direct;
        }
        match degree.natural() {
            DegreeNatural::Ninth | DegreeNatural::Seventh => self.fit_degree_advanced(degree),
            _ if degree == Degree::SixthOrThirteenth => self.fit_degree_advanced(degree),
            _ => degree,
        }
    }
}

/// Ordered degree layout of a chord type, used for voice pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordTypeInfo {
    pub profile: ChordProfile,
    /// Root, third-or-fourth, fifth, sixth-or-seventh, then extensions.
    pub degrees: Vec<Degree>,
    pub is_special2: bool,
    pub base_has_six: bool,
    pub is_thirteenth: bool,
    /// Slot positions in pairing priority order.
    pub most_important: Vec<DegreeIndex>,
}

impl ChordTypeInfo {
    pub fn from_quality(quality: &str) -> Self {
        Self::with_profile(quality, ChordProfile::from_quality(quality))
    }

    /// Build the type layout from an already classified profile.
    pub fn with_profile(quality: &str, profile: ChordProfile) -> Self {
        let q = normalize_quality(quality);
        let special = special_form(&q);
        let degrees = chord_degrees(&profile, &q, special);
        let mut info = Self {
            profile,
            degrees,
            is_special2: special == Some(SpecialForm::Special2),
            base_has_six: q.contains('6') && !q.contains("13"),
            is_thirteenth: q.contains("13"),
            most_important: Vec::new(),
        };
        info.most_important = info.compute_most_important();
        info
    }

    /// Degree occupying a slot, if the chord has that slot.
    ///
    /// Special-2 chords (root, fifth, ninth) only expose the root, fifth and
    /// first extension slots.
    pub fn degree_at(&self, index: DegreeIndex) -> Option<Degree> {
        if self.is_special2 {
            return match index {
                DegreeIndex::Root => self.degrees.first().copied(),
                DegreeIndex::Fifth => self.degrees.get(1).copied(),
                DegreeIndex::Extension1 => self.degrees.get(2).copied(),
                _ => None,
            };
        }
        self.degrees.get(index.ordinal()).copied()
    }

    /// Degree for a slot, substituting a plausible degree for missing slots.
    pub fn fit_index_advanced(&self, index: DegreeIndex) -> Degree {
        if let Some(direct) = self.degree_at(index) {
            return direct;
        }
        match index {
            DegreeIndex::ThirdOrFourth => self.profile.fit_degree_advanced(Degree::FourthOrEleventh),
            DegreeIndex::SixthOrSeventh => self.profile.fit_degree_advanced(Degree::Seventh),
            DegreeIndex::Extension1 => self.profile.fit_degree_advanced(Degree::Ninth),
            DegreeIndex::Extension2 | DegreeIndex::Extension3 => {
                self.profile.fit_degree_advanced(Degree::SixthOrThirteenth)
            }
            DegreeIndex::Fifth => self.profile.fifth_or_natural(),
            DegreeIndex::Root => Degree::Root,
        }
    }

    fn compute_most_important(&self) -> Vec<DegreeIndex> {
        let mut result = Vec::with_capacity(7);
        if !self.is_special2 {
            result.push(DegreeIndex::ThirdOrFourth);
        }
        let fifth = self.degree_at(DegreeIndex::Fifth);
        let natural_fifth = fifth == Some(Degree::Fifth);
        if fifth.is_some() && !natural_fifth {
            result.push(DegreeIndex::Fifth);
        }
        if self.degree_at(DegreeIndex::SixthOrSeventh).is_some() {
            result.push(DegreeIndex::SixthOrSeventh);
        }
        if self.degree_at(DegreeIndex::Extension1).is_some() {
            result.push(DegreeIndex::Extension1);
        }
        if self.base_has_six {
            result.push(DegreeIndex::Root);
            if natural_fifth {
                result.push(DegreeIndex::Fifth);
            }
        } else {
            if natural_fifth {
                result.push(DegreeIndex::Fifth);
            }
            result.push(DegreeIndex::Root);
        }
        if self.degree_at(DegreeIndex::Extension2).is_some() {
            result.push(DegreeIndex::Extension2);
        }
        if self.degree_at(DegreeIndex::Extension3).is_some() {
            result.push(DegreeIndex::Extension3);
        }
        result
    }

    /// Two chord types are the same when their ordered degree lists match.
    pub fn same_type_as(&self, other: &ChordTypeInfo) -> bool {
        self.degrees == other.degrees
    }
}

fn chord_degrees(profile: &ChordProfile, q: &str, special: Option<SpecialForm>) -> Vec<Degree> {
    let mut degrees = vec![Degree::Root];
    match special {
        Some(SpecialForm::RootOnly) => return degrees,
        Some(form) => {
            degrees.push(profile.fifth_or_natural());
            if form == SpecialForm::Special2 {
                degrees.push(profile.degree(DegreeNatural::Ninth).unwrap_or(Degree::Ninth));
            }
            return degrees;
        }
        None => {}
    }

    if let Some(third) = profile
        .degree(DegreeNatural::Third)
        .or_else(|| profile.degree(DegreeNatural::Fourth))
    {
        degrees.push(third);
    }
    if let Some(fifth) = profile.degree(DegreeNatural::Fifth) {
        degrees.push(fifth);
    }

    let seventh = profile.degree(DegreeNatural::Seventh);
    let sixth = profile.degree(DegreeNatural::Sixth);
    let thirteenth = profile.degree(DegreeNatural::Thirteenth);
    if let (Some(sixth), None, None) = (sixth, seventh, thirteenth) {
        degrees.push(sixth);
    }
    if let Some(seventh) = seventh {
        degrees.push(seventh);
    }
    if let Some(ninth) = profile.degree(DegreeNatural::Ninth) {
        degrees.push(ninth);
    }
    if q.contains("11") {
        if let Some(eleventh) = profile.degree(DegreeNatural::Eleventh) {
            degrees.push(eleventh);
        }
    }
    let has_thirteenth_extension =
        thirteenth.is_some() || (sixth.is_some() && seventh.is_some()) || q.contains("13");
    if has_thirteenth_extension {
        if let Some(degree) = thirteenth.or(sixth) {
            degrees.push(degree);
        }
    }
    degrees
}
