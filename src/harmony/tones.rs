//! Chord symbol parsing into pitch classes
//!
//! Splits chord symbols (C7, Bbm7b5, F#maj9/C) into a root pitch class and a
//! quality string, and resolves qualities into semitone offsets from the root.

/// Reduce any semitone value to a pitch class in `0..12`.
///
/// # Examples
/// ```
/// use stylemap::harmony::normalize_pitch_class;
///
/// assert_eq!(normalize_pitch_class(62), 2);
/// assert_eq!(normalize_pitch_class(-1), 11);
/// ```
pub fn normalize_pitch_class(value: i32) -> u8 {
    value.rem_euclid(12) as u8
}

/// Split a symbol into its root letter, accidental and quality text.
///
/// Returns `None` when the symbol does not start with a note letter.
fn split_symbol(symbol: &str) -> Option<(char, Option<char>, &str)> {
    let mut chars = symbol.char_indices();
    let (_, letter) = chars.next()?;
    if !matches!(letter.to_ascii_uppercase(), 'A'..='G') {
        return None;
    }
    let mut rest = &symbol[letter.len_utf8()..];
    let accidental = match rest.chars().next() {
        Some(c @ ('#' | 'b')) => {
            rest = &rest[1..];
            Some(c)
        }
        _ => None,
    };
    let quality = match rest.find('/') {
        Some(slash) => &rest[..slash],
        None => rest,
    };
    Some((letter, accidental, quality))
}

/// Parse the root of a chord symbol as a pitch class.
///
/// Letters map to `C=0 D=2 E=4 F=5 G=7 A=9 B=11`, `#` raises and `b` lowers by
/// a semitone. Symbols without a recognizable root parse as C.
///
/// # Examples
/// ```
/// use stylemap::harmony::parse_chord_root;
///
/// assert_eq!(parse_chord_root("F#m7"), 6);
/// assert_eq!(parse_chord_root("Cb"), 11);
/// assert_eq!(parse_chord_root("N.C."), 0);
/// ```
pub fn parse_chord_root(symbol: &str) -> u8 {
    let Some((letter, accidental, _)) = split_symbol(symbol) else {
        return 0;
    };
    let base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    let shift = match accidental {
        Some('#') => 1,
        Some('b') => -1,
        _ => 0,
    };
    normalize_pitch_class(base + shift)
}

/// Quality text of a chord symbol: everything after the root and accidental,
/// up to an optional slash bass.
pub fn extract_quality(symbol: &str) -> &str {
    split_symbol(symbol).map(|(_, _, quality)| quality).unwrap_or("")
}

fn push_ninth(tones: &mut Vec<u8>, q: &str) {
    if q.contains('9') {
        tones.push(if q.contains("b9") {
            1
        } else if q.contains("#9") {
            3
        } else {
            2
        });
    }
}

fn push_thirteenth(tones: &mut Vec<u8>, q: &str) {
    if q.contains("13") {
        tones.push(if q.contains("b13") { 8 } else { 9 });
    }
}

fn dedupe(tones: Vec<u8>) -> Vec<u8> {
    let mut unique = Vec::with_capacity(tones.len());
    for tone in tones {
        if !unique.contains(&tone) {
            unique.push(tone);
        }
    }
    unique
}

/// Resolve a free-text chord quality into semitone offsets from the root.
///
/// Matching is case-insensitive. The first tone is always the root; extension
/// tones follow the basic triad or seventh chord in the order they are found.
///
/// # Examples
/// ```
/// use stylemap::harmony::chord_tones_for_quality;
///
/// assert_eq!(chord_tones_for_quality(""), vec![0, 4, 7]);
/// assert_eq!(chord_tones_for_quality("m7b5"), vec![0, 3, 6, 10]);
/// assert_eq!(chord_tones_for_quality("7b9"), vec![0, 4, 7, 10, 1]);
/// ```
pub fn chord_tones_for_quality(quality: &str) -> Vec<u8> {
    let q = quality.trim().to_lowercase();
    let q = q.as_str();
    if q.is_empty() {
        return vec![0, 4, 7];
    }
    match q {
        "1+8" => return vec![0],
        "1+5" => return vec![0, 7],
        "1+2+5" | "2" => return vec![0, 2, 7],
        _ => {}
    }

    if q.starts_with("m7m") || q.contains("maj7") {
        let mut tones = vec![0, 4, 7, 11];
        if q.contains('9') {
            tones.push(2);
        }
        if q.contains("#11") {
            tones.push(6);
        } else if q.contains("11") {
            tones.push(5);
        }
        push_thirteenth(&mut tones, q);
        return dedupe(tones);
    }

    if q.starts_with("maj") {
        let mut tones = vec![0, 4, 7];
        if q.contains('6') {
            tones.push(9);
        }
        push_ninth(&mut tones, q);
        if q.contains("#11") {
            tones.push(6);
        }
        push_thirteenth(&mut tones, q);
        return dedupe(tones);
    }

    if q.starts_with("min7") || q.starts_with("m7") || q.starts_with('m') {
        let mut tones = if q.starts_with("min7") || q.starts_with("m7") {
            vec![0, 3, 7, 10]
        } else {
            vec![0, 3, 7]
        };
        if q.contains("b5") {
            tones[2] = 6;
        } else if q.contains("#5") {
            tones[2] = 8;
        }
        if tones.len() == 3 && q.contains('6') {
            tones.push(9);
        }
        push_ninth(&mut tones, q);
        if q.contains("11") {
            tones.push(5);
        }
        push_thirteenth(&mut tones, q);
        return dedupe(tones);
    }

    if q.starts_with("dim7") {
        return vec![0, 3, 6, 9];
    }
    if q.starts_with("dim") {
        return vec![0, 3, 6];
    }

    if q.starts_with("aug") || q.starts_with('+') {
        let mut tones = vec![0, 4, 8];
        if q.contains('7') {
            tones.push(10);
        }
        return tones;
    }

    if q.starts_with("sus") {
        let mut tones = vec![0, 5, 7];
        if q.contains('7') {
            tones.push(10);
        }
        push_ninth(&mut tones, q);
        push_thirteenth(&mut tones, q);
        return dedupe(tones);
    }

    if q.contains('7') {
        let mut tones = vec![0, 4, 7, 10];
        if q.contains("b5") {
            tones[2] = 6;
        } else if q.contains("#5") || q.contains("aug") {
            tones[2] = 8;
        }
        push_ninth(&mut tones, q);
        if q.contains("#11") {
            tones.push(6);
        } else if q.contains("11") {
            tones.push(5);
        }
        push_thirteenth(&mut tones, q);
        return dedupe(tones);
    }

    vec![0, 4, 7]
}

/// Tones of a full chord symbol (root excluded, offsets are relative).
pub fn chord_tones_for_symbol(symbol: &str) -> Vec<u8> {
    chord_tones_for_quality(extract_quality(symbol))
}

/// Tones for the chord-type names used inside style files.
///
/// Names are matched case-insensitively against the 34 style chord types;
/// anything else goes through [`chord_tones_for_quality`]. Returns `None` for
/// an empty name.
pub fn chord_tones_for_type_name(name: &str) -> Option<Vec<u8>> {
    if name.is_empty() {
        return None;
    }
    let tones: &[u8] = match name.trim().to_lowercase().as_str() {
        "1+2+5" => &[0, 2, 7],
        "sus4" => &[0, 5, 7],
        "1+5" => &[0, 7],
        "1+8" => &[0],
        "7aug" => &[0, 4, 8, 10],
        "maj7aug" => &[0, 4, 8, 11],
        "7(#9)" => &[0, 4, 7, 10, 3],
        "7(b13)" => &[0, 4, 7, 10, 8],
        "7(b9)" => &[0, 4, 7, 10, 1],
        "7(13)" => &[0, 4, 7, 10, 9],
        "7#11" => &[0, 4, 7, 10, 6],
        "7(9)" => &[0, 4, 7, 10, 2],
        "7b5" => &[0, 4, 6, 10],
        "7sus4" => &[0, 5, 7, 10],
        "7th" => &[0, 4, 7, 10],
        "dim7" => &[0, 3, 6, 9],
        "dim" => &[0, 3, 6],
        "minmaj7(9)" => &[0, 3, 7, 11, 2],
        "minmaj7" => &[0, 3, 7, 11],
        "min7(11)" => &[0, 3, 7, 10, 5],
        "min7(9)" => &[0, 3, 7, 10, 2],
        "min(9)" => &[0, 3, 7, 2],
        "m7b5" => &[0, 3, 6, 10],
        "min7" => &[0, 3, 7, 10],
        "min6" => &[0, 3, 7, 9],
        "min" => &[0, 3, 7],
        "aug" => &[0, 4, 8],
        "maj6(9)" => &[0, 4, 7, 9, 2],
        "maj7(9)" => &[0, 4, 7, 11, 2],
        "maj(9)" => &[0, 4, 7, 2],
        "maj7#11" => &[0, 4, 7, 11, 6],
        "maj7" => &[0, 4, 7, 11],
        "maj6" => &[0, 4, 7, 9],
        "maj" => &[0, 4, 7],
        _ => return Some(chord_tones_for_quality(name)),
    };
    Some(tones.to_vec())
}
