//! Packed Reverse-Track Cache
//!
//! Precomputed byte-packed form of one track, built once before the first
//! primary-track playback and read-only afterwards. Walking the cache in
//! reverse character order while emitting each character's bits parity-first
//! reconstructs the exact time-reversed waveform of a backward swipe.

use crate::encoder::{EncodedCharacter, Encoder};
use crate::track::{TrackRecord, SECONDARY_TRACK};

/// Fixed capacity of the cache: secondary track characters plus check
/// character, with headroom matching the hardware buffer
pub const REVERSE_CAPACITY: usize = 41;

// Static sizing precondition: the compiled-in secondary track plus its check
// character must fit the cache.
const _: () = assert!(SECONDARY_TRACK.len() + 1 <= REVERSE_CAPACITY);

/// Byte-packed track image for reversed playback
///
/// One byte per character in [`EncodedCharacter::pack`] layout, check
/// character appended, terminated by the stored length. Contents are a pure
/// function of the track record; the cache is never modified after `build`.
#[derive(Debug, Clone)]
pub struct ReverseTrackCache {
    bytes: [u8; REVERSE_CAPACITY],
    len: usize,
    format: crate::track::TrackFormat,
}

impl ReverseTrackCache {
    /// Build the cache by walking the record exactly as forward playback
    /// does, packing instead of emitting
    pub fn build(record: &TrackRecord) -> Self {
        assert!(
            record.encoded_len() <= REVERSE_CAPACITY,
            "track record exceeds the reverse cache capacity"
        );

        let mut bytes = [0u8; REVERSE_CAPACITY];
        let mut len = 0;
        let mut encoder = Encoder::new(record.format);
        for raw in record.text.bytes() {
            bytes[len] = encoder.encode(raw).pack();
            len += 1;
        }
        bytes[len] = encoder.finalize().pack();
        len += 1;

        ReverseTrackCache {
            bytes,
            len,
            format: record.format,
        }
    }

    /// Number of stored characters, check character included
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stored packed bytes in forward order
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Characters in reverse order, unpacked for emission
    pub fn characters_reversed(&self) -> impl Iterator<Item = EncodedCharacter> + '_ {
        self.bytes[..self.len]
            .iter()
            .rev()
            .map(move |&byte| EncodedCharacter::unpack(byte, self.format))
    }
}
