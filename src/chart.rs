//! Chord charts and chord timelines
//!
//! A chord chart is plain text: bars separated by `|` or newlines, chords
//! within a bar separated by whitespace.
//!
//! ```text
//! C7 | F7 | C7 C7/E | G7 F7
//! ```
//!
//! An empty bar or an `N.C.` token repeats the previous chord (`C7` at the
//! start of the chart).

use serde::Serialize;
use tracing::debug;

use crate::harmony::{chord_tones_for_symbol, parse_chord_root};
use crate::types::TimeSignature;

/// Chord played when a chart gives nothing else.
pub const DEFAULT_CHORD: &str = "C7";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordChart {
    pub bars: Vec<Vec<String>>,
}

/// A half-open tick span `[start_tick, end_tick)` with one chord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordSegment {
    pub start_tick: u64,
    pub end_tick: u64,
    /// Root pitch class.
    pub root: u8,
    /// Semitone offsets above the root.
    pub tones: Vec<u8>,
    pub symbol: String,
}

impl ChordSegment {
    pub fn new(start_tick: u64, end_tick: u64, symbol: &str) -> Self {
        Self {
            start_tick,
            end_tick,
            root: parse_chord_root(symbol),
            tones: chord_tones_for_symbol(symbol),
            symbol: symbol.to_string(),
        }
    }

    pub fn contains(&self, tick: u64) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }
}

fn is_no_chord(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    let rest = match lower.strip_prefix('n') {
        Some(rest) => rest,
        None => return false,
    };
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let rest = match rest.strip_prefix('c') {
        Some(rest) => rest,
        None => return false,
    };
    rest.is_empty() || rest == "."
}

/// Parse chord-chart text into bars.
///
/// # Examples
/// ```
/// use stylemap::chart::parse_chord_chart;
///
/// let chart = parse_chord_chart("Dm7 G7 |\nN.C. | Cmaj7");
/// assert_eq!(
///     chart.bars,
///     vec![
///         vec!["Dm7", "G7"],
///         vec!["G7"],
///         vec!["G7"],
///         vec!["Cmaj7"],
///     ]
/// );
/// ```
pub fn parse_chord_chart(text: &str) -> ChordChart {
    let sanitized = text.replace('\r', "").replace('\n', "|");
    let sanitized = sanitized.trim();
    let mut bars = Vec::new();
    if sanitized.is_empty() {
        return ChordChart { bars };
    }

    let mut last = DEFAULT_CHORD.to_string();
    for raw in sanitized.split('|') {
        let mut chords = Vec::new();
        for token in raw.split_whitespace() {
            if is_no_chord(token) {
                chords.push(last.clone());
            } else {
                chords.push(token.to_string());
                last = token.to_string();
            }
        }
        if chords.is_empty() {
            chords.push(last.clone());
        }
        bars.push(chords);
    }
    ChordChart { bars }
}

/// Length of one bar in ticks.
pub fn ticks_per_bar(time_signature: TimeSignature, ticks_per_beat: u32) -> f64 {
    ticks_per_beat as f64 * time_signature.beats_per_bar()
}

/// Expand a chart into contiguous chord segments.
///
/// The chart loops when `total_bars` exceeds its length. Each bar is split
/// evenly between its chords; a chord with the same root and tones as the
/// previous segment extends it instead of starting a new one, keeping the
/// earlier symbol.
///
/// # Examples
/// ```
/// use stylemap::chart::{build_chord_timeline, parse_chord_chart};
///
/// let chart = parse_chord_chart("C7 | C7 | C7 | C7");
/// let timeline = build_chord_timeline(&chart, Some(4), 3840.0);
/// assert_eq!(timeline.len(), 1);
/// assert_eq!((timeline[0].start_tick, timeline[0].end_tick), (0, 15360));
/// assert_eq!(timeline[0].tones, vec![0, 4, 7, 10]);
/// ```
pub fn build_chord_timeline(
    chart: &ChordChart,
    total_bars: Option<u32>,
    ticks_per_bar: f64,
) -> Vec<ChordSegment> {
    let default_bars = [vec![DEFAULT_CHORD.to_string()]];
    let bars: &[Vec<String>] = if chart.bars.is_empty() {
        &default_bars
    } else {
        &chart.bars
    };
    let bar_count = total_bars.map_or(bars.len(), |n| n as usize);

    let mut segments: Vec<ChordSegment> = Vec::new();
    for bar_index in 0..bar_count {
        let bar = &bars[bar_index % bars.len()];
        let chord_count = bar.len().max(1);
        let ticks_per_chord = ticks_per_bar / chord_count as f64;
        let bar_start = bar_index as f64 * ticks_per_bar;

        for chord_index in 0..chord_count {
            let symbol = bar
                .get(chord_index)
                .or_else(|| bar.last())
                .map_or(DEFAULT_CHORD, String::as_str);
            let start_tick = (bar_start + chord_index as f64 * ticks_per_chord).round() as u64;
            let end_tick = (bar_start + (chord_index + 1) as f64 * ticks_per_chord).round() as u64;
            if end_tick <= start_tick {
                debug!(symbol, start_tick, "Skipping chord with no ticks");
                continue;
            }
            let segment = ChordSegment::new(start_tick, end_tick, symbol);

            match segments.last_mut() {
                Some(last) if last.root == segment.root && last.tones == segment.tones => {
                    last.end_tick = end_tick;
                }
                _ => segments.push(segment),
            }
        }
    }

    debug!(bars = bar_count, segments = segments.len(), "Built chord timeline");
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_chart() {
        assert!(parse_chord_chart("   ").bars.is_empty());
        // A lone line break still separates two empty bars.
        assert_eq!(
            parse_chord_chart("  \r\n ").bars,
            vec![vec!["C7"], vec!["C7"]]
        );
        let timeline = build_chord_timeline(&parse_chord_chart(""), Some(2), 1920.0);
        assert_eq!(timeline, vec![ChordSegment::new(0, 3840, "C7")]);
    }

    #[test]
    fn test_no_chord_spellings() {
        for token in ["N.C.", "NC", "n.c", "N.C"] {
            assert!(is_no_chord(token), "{}", token);
        }
        assert!(!is_no_chord("N"));
        assert!(!is_no_chord("NCC"));
        let chart = parse_chord_chart("N.C. | F");
        assert_eq!(chart.bars, vec![vec!["C7"], vec!["F"]]);
    }

    #[test]
    fn test_leading_empty_bar_repeats_default() {
        let chart = parse_chord_chart("| Am");
        assert_eq!(chart.bars, vec![vec!["C7"], vec!["Am"]]);
    }

    #[test]
    fn test_chart_loops_and_splits_bars() {
        let chart = parse_chord_chart("Dm7 G7 | C");
        let timeline = build_chord_timeline(&chart, Some(3), 1920.0);
        let spans: Vec<(u64, u64, &str)> = timeline
            .iter()
            .map(|s| (s.start_tick, s.end_tick, s.symbol.as_str()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (0, 960, "Dm7"),
                (960, 1920, "G7"),
                (1920, 3840, "C"),
                (3840, 4800, "Dm7"),
                (4800, 5760, "G7"),
            ]
        );
    }

    #[test]
    fn test_uneven_split_rounds() {
        let chart = parse_chord_chart("C D E");
        let timeline = build_chord_timeline(&chart, None, 1000.0);
        let bounds: Vec<(u64, u64)> = timeline.iter().map(|s| (s.start_tick, s.end_tick)).collect();
        assert_eq!(bounds, vec![(0, 333), (333, 667), (667, 1000)]);
    }

    #[test]
    fn test_crowded_bar_skips_empty_spans() {
        let chart = parse_chord_chart("C D E F G");
        let timeline = build_chord_timeline(&chart, None, 4.0);
        let spans: Vec<(u64, u64, &str)> = timeline
            .iter()
            .map(|s| (s.start_tick, s.end_tick, s.symbol.as_str()))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 1, "C"), (1, 2, "D"), (2, 3, "F"), (3, 4, "G")]
        );
    }

    #[test]
    fn test_timeline_is_contiguous() {
        let chart = parse_chord_chart("C Am | F G7 | Em A7 Dm G7 | C");
        let timeline = build_chord_timeline(&chart, Some(9), 1440.0);
        assert_eq!(timeline.first().map(|s| s.start_tick), Some(0));
        assert_eq!(timeline.last().map(|s| s.end_tick), Some(9 * 1440));
        for pair in timeline.windows(2) {
            assert_eq!(pair[0].end_tick, pair[1].start_tick);
            assert!(pair[0].start_tick < pair[0].end_tick);
        }
    }

    #[test]
    fn test_ticks_per_bar() {
        let six_eight = TimeSignature {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(ticks_per_bar(six_eight, 960), 2880.0);
        assert_eq!(ticks_per_bar(TimeSignature::default(), 480), 1920.0);
    }
}
