//! # CASM Metadata Parser
//!
//! Style files append a `CASM` chunk after the Standard MIDI File data. It
//! holds, for every part, the settings that tell the arranger how each source
//! channel follows chord changes.
//!
//! ## Layout
//! ```text
//! CASM <len>
//!   CSEG <len>
//!     Sdec <len> "Main A,Main B"     part names covered by this segment
//!     Ctab <len> ...                  plain channel table
//!     Ctb2 <len> ...                  zoned channel table (SFF2)
//!     Cntt <len> <ch> <ntt|bass>      late ntt override
//!   CSEG <len> ...
//! ```
//! Every block is a 4-byte ASCII tag followed by a big-endian `u32` length.
//!
//! ## Failure Policy
//! The parser never fails. A block whose declared length runs past its parent
//! ends the walk at that level only; short channel tables are skipped; an
//! unknown chord-type code keeps the previously known name. Missing settings
//! make the renderer fall back to plain root transposition.

mod reader;
mod types;

pub use types::{CasmInfo, CasmTable, ChannelSettings, Ctb2Settings, NttOverride, SffType};

use reader::{ByteReader, Sections};
use tracing::{debug, warn};

/// Style chord-type names indexed by `0x21 - code` (`0x22` maps to index 2).
const CHORD_TYPE_NAMES: [&str; 34] = [
    "1+2+5",
    "sus4",
    "1+5",
    "1+8",
    "7aug",
    "Maj7aug",
    "7(#9)",
    "7(b13)",
    "7(b9)",
    "7(13)",
    "7#11",
    "7(9)",
    "7b5",
    "7sus4",
    "7th",
    "dim7",
    "dim",
    "minMaj7(9)",
    "minMaj7",
    "min7(11)",
    "min7(9)",
    "min(9)",
    "m7b5",
    "min7",
    "min6",
    "min",
    "aug",
    "Maj6(9)",
    "Maj7(9)",
    "Maj(9)",
    "Maj7#11",
    "Maj7",
    "Maj6",
    "Maj",
];

/// Minimum size of a `Ctab`/`Ctb2` body: the channel header alone.
const CHANNEL_HEADER_LEN: usize = 20;

/// Chord-type name for a raw `CASM` code, `None` for unknown codes.
///
/// # Examples
/// ```
/// use stylemap::casm::chord_type_name;
///
/// assert_eq!(chord_type_name(0x00), Some("Maj"));
/// assert_eq!(chord_type_name(0x13), Some("7th"));
/// assert_eq!(chord_type_name(0x22), Some("1+5"));
/// assert_eq!(chord_type_name(0x23), None);
/// ```
pub fn chord_type_name(code: u8) -> Option<&'static str> {
    if code > 0x22 {
        return None;
    }
    let index = if code == 0x22 { 2 } else { (0x21 - code) as usize };
    CHORD_TYPE_NAMES.get(index).copied()
}

/// Normalize a part name or marker into a part id: trimmed, whitespace runs
/// replaced by `_`, lowercase.
///
/// # Examples
/// ```
/// use stylemap::casm::normalize_part_id;
///
/// assert_eq!(normalize_part_id("  Main  A "), "main_a");
/// assert_eq!(normalize_part_id("Fill In AA"), "fill_in_aa");
/// ```
pub fn normalize_part_id(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Parse the `CASM` block of a style file.
///
/// `bytes` is the whole file; the block is located by scanning for its tag.
/// A file without one yields an empty table.
pub fn parse_casm(bytes: &[u8], sff_type: Option<SffType>) -> CasmTable {
    let mut table = CasmTable::default();
    let Some(index) = bytes.windows(4).position(|w| w == b"CASM") else {
        debug!("No CASM block found");
        return table;
    };
    if index + 8 >= bytes.len() {
        debug!(offset = index, "CASM block has no payload");
        return table;
    }
    let declared = u32::from_be_bytes([
        bytes[index + 4],
        bytes[index + 5],
        bytes[index + 6],
        bytes[index + 7],
    ]);
    let start = index + 8;
    let end = start.saturating_add(declared as usize).min(bytes.len());

    let mut sections = Sections::new(ByteReader::new(&bytes[start..end]));
    for section in sections.by_ref() {
        if &section.tag == b"CSEG" {
            parse_segment(section.body, &mut table, sff_type);
        } else {
            debug!(tag = %section.tag_str(), "Skipping CASM section");
        }
    }
    if let Some((tag, len)) = sections.truncated {
        warn!(
            tag = %String::from_utf8_lossy(&tag),
            len,
            "CASM section runs past the end of the block"
        );
    }

    for info in table.infos_mut() {
        let CasmInfo {
            channels,
            overrides,
        } = info;
        for (channel, entry) in overrides.iter() {
            if let Some(ctb2) = channels.get_mut(channel).and_then(|s| s.ctb2.as_mut()) {
                ctb2.ntt = entry.ntt;
                ctb2.bass_on = entry.bass_on;
            }
        }
    }

    table
}

fn parse_segment(body: &[u8], table: &mut CasmTable, sff_type: Option<SffType>) {
    let mut reader = ByteReader::new(body);
    if reader.remaining() < 8 {
        debug!(len = body.len(), "CSEG too short");
        return;
    }
    if reader.read_tag().as_ref() != Some(b"Sdec") {
        debug!("CSEG does not start with Sdec");
        return;
    }
    let Some(names) = reader
        .read_u32_be()
        .and_then(|len| reader.read_bytes(len as usize))
    else {
        warn!("Sdec runs past the end of its CSEG");
        return;
    };

    let mut part_ids: Vec<String> = Vec::new();
    for id in part_names(names).iter().map(|name| normalize_part_id(name)) {
        if !id.is_empty() && !part_ids.contains(&id) {
            part_ids.push(id);
        }
    }
    if part_ids.is_empty() {
        return;
    }
    for id in &part_ids {
        table.entry(id);
    }

    let mut sections = Sections::new(reader);
    for section in sections.by_ref() {
        match &section.tag {
            b"Ctab" | b"Ctb2" => {
                let zoned = &section.tag == b"Ctb2";
                let Some(record) = ChannelRecord::parse(section.body, zoned, sff_type) else {
                    debug!(tag = %section.tag_str(), len = section.body.len(), "Channel table too short");
                    continue;
                };
                for id in &part_ids {
                    record.apply(table.entry(id));
                }
            }
            b"Cntt" => {
                if section.body.len() < 2 {
                    continue;
                }
                let channel = section.body[0];
                let (ntt, bass_on) = split_ntt(section.body[1]);
                for id in &part_ids {
                    table
                        .entry(id)
                        .overrides
                        .insert(channel, NttOverride { ntt, bass_on });
                }
            }
            _ => debug!(tag = %section.tag_str(), "Skipping CSEG section"),
        }
    }
    if let Some((tag, len)) = sections.truncated {
        warn!(
            tag = %String::from_utf8_lossy(&tag),
            len,
            "CSEG section runs past the end of its segment"
        );
    }
}

/// Split the `Sdec` payload into part names.
fn part_names(payload: &[u8]) -> Vec<String> {
    let text: String = payload
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bit 7 is the bass flag, bits 0-6 the table number.
fn split_ntt(byte: u8) -> (u8, bool) {
    (byte & 0x7F, byte & 0x80 == 0x80)
}

/// Parsed `Ctab`/`Ctb2` body.
struct ChannelRecord {
    source_channel: u8,
    dest_channel: u8,
    muted_notes: u16,
    muted_chords: [u8; 5],
    source_root: u8,
    source_quality: Option<&'static str>,
    ctb2: Option<Ctb2Settings>,
}

impl ChannelRecord {
    fn parse(body: &[u8], zoned: bool, sff_type: Option<SffType>) -> Option<Self> {
        if body.len() < CHANNEL_HEADER_LEN {
            return None;
        }
        let mut reader = ByteReader::new(body);
        let source_channel = reader.read_u8()?;
        reader.skip(8); // name
        let dest_channel = reader.read_u8()?;
        if dest_channel > 15 {
            warn!(source_channel, dest_channel, "Destination channel out of MIDI range");
        }
        reader.skip(1); // editable
        let muted_notes = reader.read_u16_be()?;
        let chords = reader.read_bytes(5)?;
        let muted_chords = [chords[0], chords[1], chords[2], chords[3], chords[4]];
        let source_root = reader.read_u8()?;
        let code = reader.read_u8()?;
        let source_quality = chord_type_name(code);
        if source_quality.is_none() {
            debug!(code, source_channel, "Unknown source chord type");
        }

        let ctb2 = if zoned {
            reader.skip(2); // middle zone low/high
            reader.skip(6); // low zone
            let middle = read_harmonization(&mut reader, sff_type);
            reader.skip(6); // high zone
            reader.skip(7);
            middle
        } else {
            let settings = read_harmonization(&mut reader, sff_type);
            if reader.read_u8().is_some_and(|special| special != 0) {
                reader.skip(4);
            }
            settings
        };
        if ctb2.is_none() {
            debug!(source_channel, "Channel table ends before its harmonization record");
        }

        Some(Self {
            source_channel,
            dest_channel,
            muted_notes,
            muted_chords,
            source_root,
            source_quality,
            ctb2,
        })
    }

    fn apply(&self, info: &mut CasmInfo) {
        let settings = info
            .channels
            .entry(self.source_channel)
            .or_insert_with(|| ChannelSettings {
                source_channel: self.source_channel,
                dest_channel: self.dest_channel,
                muted_notes: 0,
                muted_chords: [0; 5],
                source_root: 0,
                source_quality: None,
                ctb2: None,
            });
        settings.dest_channel = self.dest_channel;
        settings.muted_notes = self.muted_notes;
        settings.muted_chords = self.muted_chords;
        settings.source_root = self.source_root;
        if let Some(name) = self.source_quality {
            settings.source_quality = Some(name.to_string());
        }
        settings.ctb2 = self.ctb2;
    }
}

/// Read the 6-byte harmonization record: ntr, ntt|bass, chord root upper,
/// note low, note high, rtr.
fn read_harmonization(reader: &mut ByteReader<'_>, sff_type: Option<SffType>) -> Option<Ctb2Settings> {
    let bytes = reader.read_bytes(6)?;
    let ntr = bytes[0];
    let (mut ntt, mut bass_on) = split_ntt(bytes[1]);
    if sff_type == Some(SffType::Sff1) && ntr != 2 {
        match ntt {
            3 => {
                ntt = 1;
                bass_on = true;
            }
            4 => ntt = 3,
            _ => {}
        }
    }
    let mut note_low = bytes[3].min(127);
    let mut note_high = bytes[4].min(127);
    if note_low > note_high {
        std::mem::swap(&mut note_low, &mut note_high);
    }
    Some(Ctb2Settings {
        ntr,
        ntt,
        bass_on,
        chord_root_upper: bytes[2],
        note_low,
        note_high,
        rtr: bytes[5],
    })
}
