//! Track Table and Character Formats
//!
//! The constant card data played by the emulator: two track strings, each
//! paired with the character format of its stripe standard. Records are
//! compiled in and never mutated at runtime; correctness of their content is
//! an authoring-time concern, enforced here by [`validate_record`] rather
//! than by runtime checks inside the encode/playback hot path.

use std::fmt;
use std::ops::Range;

use nom::bytes::complete::take_while;
use nom::character::complete::char;
use nom::combinator::all_consuming;
use nom::sequence::delimited;
use nom::IResult;
use serde::Serialize;

use crate::{FluxError, Result};

/// Character format of one stripe standard
///
/// `bits_per_character` includes the trailing parity bit, so the data field
/// of each character is `bits_per_character - 1` bits wide. `code_offset` is
/// subtracted from the raw ASCII character to obtain the encoded data value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackFormat {
    /// Maximum number of characters the stripe standard allows per track
    pub max_characters: usize,
    /// Encoded width of one character, parity bit included
    pub bits_per_character: u8,
    /// ASCII offset of the format's code table
    pub code_offset: u8,
}

impl TrackFormat {
    /// 7-bit alphanumeric format used by the primary track (IATA)
    pub const IATA: TrackFormat = TrackFormat {
        max_characters: 79,
        bits_per_character: 7,
        code_offset: 32,
    };

    /// 5-bit numeric format used by the secondary track (ABA)
    pub const ABA: TrackFormat = TrackFormat {
        max_characters: 40,
        bits_per_character: 5,
        code_offset: 48,
    };

    /// Number of data bits per character (parity excluded)
    pub const fn data_bits(&self) -> u8 {
        self.bits_per_character - 1
    }

    /// Mask covering the data field of one character
    pub const fn data_mask(&self) -> u8 {
        (1 << self.data_bits()) - 1
    }

    /// Range of raw ASCII values representable in this format
    pub fn code_range(&self) -> Range<u8> {
        self.code_offset..self.code_offset + (1 << self.data_bits())
    }

    /// Start sentinel character of the stripe standard
    pub const fn start_sentinel(&self) -> u8 {
        match self.bits_per_character {
            7 => b'%',
            _ => b';',
        }
    }

    /// End sentinel character (shared by both standards)
    pub const END_SENTINEL: u8 = b'?';

    /// Short name of the stripe standard
    pub const fn name(&self) -> &'static str {
        match self.bits_per_character {
            7 => "IATA",
            _ => "ABA",
        }
    }
}

/// Identifies one of the two emulated tracks
///
/// Playback alternates between the two: the primary track session carries the
/// reversed secondary companion, the secondary session plays alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackIndex {
    /// Track 1 of the stripe (7-bit IATA format)
    Primary,
    /// Track 2 of the stripe (5-bit ABA format)
    Secondary,
}

impl TrackIndex {
    /// The other track, for round-robin playback
    pub const fn next(self) -> TrackIndex {
        match self {
            TrackIndex::Primary => TrackIndex::Secondary,
            TrackIndex::Secondary => TrackIndex::Primary,
        }
    }

    /// Stripe track number (1-based)
    pub const fn number(self) -> u8 {
        match self {
            TrackIndex::Primary => 1,
            TrackIndex::Secondary => 2,
        }
    }
}

impl fmt::Display for TrackIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.number())
    }
}

/// One track's character content plus its format
#[derive(Debug, Clone, Copy)]
pub struct TrackRecord {
    /// Track characters, start sentinel through end sentinel
    pub text: &'static str,
    /// Character format of the stripe standard
    pub format: TrackFormat,
}

impl TrackRecord {
    /// Number of characters in the record (check character excluded)
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True when the record holds no characters
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of characters emitted per playback, check character included
    pub fn encoded_len(&self) -> usize {
        self.text.len() + 1
    }
}

/// Primary track content (7-bit IATA format)
pub const PRIMARY_TRACK: &str =
    "%B123456781234567^LASTNAME/FIRST^YYMMSSSDDDDDDDDDDDDDDDDDDDDDDDDD?";

/// Secondary track content (5-bit ABA format)
pub const SECONDARY_TRACK: &str = ";123456781234567=2512101000000000000?";

/// Immutable table of the two emulated tracks
#[derive(Debug, Clone, Copy)]
pub struct TrackStore {
    records: [TrackRecord; 2],
}

impl TrackStore {
    /// The compiled-in card data
    pub const fn builtin() -> Self {
        TrackStore {
            records: [
                TrackRecord {
                    text: PRIMARY_TRACK,
                    format: TrackFormat::IATA,
                },
                TrackRecord {
                    text: SECONDARY_TRACK,
                    format: TrackFormat::ABA,
                },
            ],
        }
    }

    /// The compiled-in card data, with every record checked by
    /// [`validate_record`]
    pub fn validated() -> Result<Self> {
        let store = Self::builtin();
        for record in &store.records {
            validate_record(record)?;
        }
        Ok(store)
    }

    /// Access one track record
    pub fn record(&self, index: TrackIndex) -> &TrackRecord {
        match index {
            TrackIndex::Primary => &self.records[0],
            TrackIndex::Secondary => &self.records[1],
        }
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::builtin()
    }
}

fn framed_body(start: char, input: &str) -> IResult<&str, &str> {
    all_consuming(delimited(
        char(start),
        take_while(|c: char| c != '?'),
        char('?'),
    ))(input)
}

/// Authoring-time check of one track record
///
/// Verifies that the record fits the stripe standard: length within the
/// format's limit, every character inside the format's code range (an
/// out-of-range character would encode to a silently wrapped data value),
/// and the start-sentinel / body / end-sentinel framing.
pub fn validate_record(record: &TrackRecord) -> Result<()> {
    let format = record.format;

    if record.len() > format.max_characters {
        return Err(FluxError::InvalidTrack(format!(
            "{} record holds {} characters, format allows {}",
            format.name(),
            record.len(),
            format.max_characters
        )));
    }

    let range = format.code_range();
    for (pos, raw) in record.text.bytes().enumerate() {
        if !range.contains(&raw) {
            return Err(FluxError::InvalidTrack(format!(
                "character {:?} at position {} outside {} code range {}..{}",
                raw as char,
                pos,
                format.name(),
                range.start,
                range.end
            )));
        }
    }

    let (_, body) = framed_body(format.start_sentinel() as char, record.text).map_err(|_| {
        FluxError::InvalidTrack(format!(
            "{} record is not framed as {}...{}",
            format.name(),
            format.start_sentinel() as char,
            TrackFormat::END_SENTINEL as char
        ))
    })?;

    if body.is_empty() {
        return Err(FluxError::InvalidTrack(format!(
            "{} record carries no characters between its sentinels",
            format.name()
        )));
    }

    Ok(())
}
