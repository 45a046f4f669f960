//! Same-pitch overlap resolution
//!
//! Tiling and chord-span splitting can leave two notes of the same pitch on
//! the same channel sounding at once, which most synthesizers render as a
//! stuck or retriggered voice. [`resolve_overlaps`] removes those collisions.

use std::collections::HashMap;

use crate::types::NoteEvent;

/// Drop or shorten notes so no two notes of the same channel and pitch overlap.
///
/// Notes of each (channel, pitch) pair are swept in start order:
/// - a note entirely covered by an earlier one is dropped
/// - of two notes starting together, the longer survives (the earlier one on ties)
/// - otherwise the earlier note is cut where the later one starts
///
/// Survivors keep their input order. Running the resolver on its own output
/// changes nothing.
///
/// # Examples
/// ```
/// use stylemap::types::NoteEvent;
/// use stylemap::voicing::resolve_overlaps;
///
/// let note = |start_tick, duration| NoteEvent {
///     channel: 10,
///     pitch: 60,
///     velocity: 100,
///     start_tick,
///     duration,
/// };
/// let resolved = resolve_overlaps(vec![note(0, 480), note(240, 480)]);
/// assert_eq!(resolved, vec![note(0, 240), note(240, 480)]);
/// ```
pub fn resolve_overlaps(notes: Vec<NoteEvent>) -> Vec<NoteEvent> {
    let mut result: Vec<Option<NoteEvent>> = notes.into_iter().map(Some).collect();

    let mut groups: HashMap<(u8, u8), Vec<usize>> = HashMap::new();
    for (index, note) in result.iter().enumerate() {
        if let Some(note) = note {
            groups.entry((note.channel, note.pitch)).or_default().push(index);
        }
    }

    for indexes in groups.values_mut() {
        indexes.sort_by_key(|&i| (result[i].map_or(0, |n| n.start_tick), i));

        let mut active: Vec<usize> = Vec::new();
        for &current in indexes.iter() {
            let Some(note) = result[current] else {
                continue;
            };
            let end = note.end_tick();
            let mut dropped = false;

            while let Some(&held_index) = active.first() {
                let Some(held) = result[held_index] else {
                    active.remove(0);
                    continue;
                };
                let held_end = held.end_tick();
                if held_end <= note.start_tick {
                    active.remove(0);
                    continue;
                }
                if held_end >= end {
                    result[current] = None;
                    dropped = true;
                    break;
                }
                if held.start_tick == note.start_tick {
                    if note.duration <= held.duration {
                        result[current] = None;
                        dropped = true;
                        break;
                    }
                    result[held_index] = None;
                    active.remove(0);
                    continue;
                }
                result[held_index] = Some(NoteEvent {
                    duration: note.start_tick - held.start_tick,
                    ..held
                });
                active.remove(0);
            }

            if !dropped {
                active.push(current);
            }
        }
    }

    result.into_iter().flatten().collect()
}
