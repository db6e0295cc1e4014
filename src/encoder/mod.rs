//! Character Encoding, Parity and LRC
//!
//! Converts raw track characters into fixed-width data+parity bit groups.
//! Every encoded character carries odd parity: the parity fold starts from 1
//! and XORs in each data bit, so data plus parity always holds an odd number
//! of one-bits. While encoding, a running longitudinal check (LRC)
//! accumulates the positionwise XOR of all data values; finalizing the
//! encoder turns that accumulator into the track's trailing check character.
//!
//! Storage layout is kept separate from encoding: [`EncodedCharacter::pack`]
//! places the data bits at their natural positions and the parity bit at a
//! fixed slot above the widest data field of any format, so the packed form
//! is format-independent and unpacking needs only the format's data mask.

use crate::track::{TrackFormat, TrackRecord};

/// Bit position of the parity bit in the packed byte form
///
/// One above the widest data field (6 bits, IATA format), so the slot is the
/// same for every format.
pub const PACKED_PARITY_BIT: u8 = 6;

/// One track character as emitted on the wire: data value plus parity bit
///
/// Data bits are emitted least-significant first, parity last. The struct
/// remembers its own data width so bit iteration does not need the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedCharacter {
    value: u8,
    parity: bool,
    width: u8,
}

impl EncodedCharacter {
    fn new(value: u8, format: TrackFormat) -> Self {
        let value = value & format.data_mask();
        EncodedCharacter {
            value,
            // Odd parity: fold seeded with 1, one XOR per data bit
            parity: value.count_ones() % 2 == 0,
            width: format.data_bits(),
        }
    }

    /// Encoded data value (parity excluded)
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Parity bit value
    pub fn parity(&self) -> bool {
        self.parity
    }

    /// Number of data bits
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Wire order: data bits least-significant first, then parity
    pub fn forward_bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.width)
            .map(move |bit| self.value >> bit & 1 == 1)
            .chain(std::iter::once(self.parity))
    }

    /// Time-reversed wire order: parity first, then data bits
    /// most-significant first
    pub fn reversed_bits(&self) -> impl Iterator<Item = bool> + '_ {
        std::iter::once(self.parity)
            .chain((0..self.width).rev().map(move |bit| self.value >> bit & 1 == 1))
    }

    /// Pack into one byte: data at natural positions, parity at
    /// [`PACKED_PARITY_BIT`]
    pub fn pack(&self) -> u8 {
        self.value | (self.parity as u8) << PACKED_PARITY_BIT
    }

    /// Rebuild a character from its packed byte form
    pub fn unpack(byte: u8, format: TrackFormat) -> Self {
        EncodedCharacter {
            value: byte & format.data_mask(),
            parity: byte >> PACKED_PARITY_BIT & 1 == 1,
            width: format.data_bits(),
        }
    }
}

/// Streaming character encoder with running LRC accumulation
///
/// Encode every character of a track in order, then call
/// [`Encoder::finalize`] once to obtain the trailing check character.
///
/// Raw characters are expected to lie in the format's code range; the
/// constant track table guarantees this at authoring time
/// (see [`crate::track::validate_record`]).
#[derive(Debug, Clone)]
pub struct Encoder {
    format: TrackFormat,
    lrc: u8,
}

impl Encoder {
    /// Create an encoder for one track format with a cleared LRC accumulator
    pub fn new(format: TrackFormat) -> Self {
        Encoder { format, lrc: 0 }
    }

    /// Encode one raw character and fold its data bits into the LRC
    pub fn encode(&mut self, raw: u8) -> EncodedCharacter {
        let value = raw.wrapping_sub(self.format.code_offset) & self.format.data_mask();
        self.lrc ^= value;
        EncodedCharacter::new(value, self.format)
    }

    /// Encode the LRC accumulator as the track's check character
    ///
    /// Uses the same parity rule as a normal character and leaves the
    /// accumulator untouched, so the result is stable across calls.
    pub fn finalize(&self) -> EncodedCharacter {
        EncodedCharacter::new(self.lrc, self.format)
    }
}

/// Full forward bitstream of one track record, check character included
///
/// Reference form of the data portion of a playback session (padding bits
/// excluded); playback itself streams characters to the modulator one at a
/// time instead of materializing this.
pub fn encode_track_bits(record: &TrackRecord) -> Vec<bool> {
    let mut encoder = Encoder::new(record.format);
    let mut bits =
        Vec::with_capacity(record.encoded_len() * record.format.bits_per_character as usize);
    for raw in record.text.bytes() {
        bits.extend(encoder.encode(raw).forward_bits());
    }
    bits.extend(encoder.finalize().forward_bits());
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TrackFormat, TrackStore, TrackIndex};

    fn one_bits(ch: &EncodedCharacter) -> u32 {
        ch.value().count_ones() + ch.parity() as u32
    }

    #[test]
    fn test_odd_parity_across_full_code_range() {
        for format in [TrackFormat::IATA, TrackFormat::ABA] {
            for raw in format.code_range() {
                let ch = Encoder::new(format).encode(raw);
                assert_eq!(
                    one_bits(&ch) % 2,
                    1,
                    "character {:?} in {} must have odd total one-bits",
                    raw as char,
                    format.name()
                );
            }
        }
    }

    #[test]
    fn test_data_value_is_offset_subtraction() {
        let mut encoder = Encoder::new(TrackFormat::ABA);
        assert_eq!(encoder.encode(b'0').value(), 0);
        assert_eq!(encoder.encode(b'9').value(), 9);
        assert_eq!(encoder.encode(b';').value(), 11);
        assert_eq!(encoder.encode(b'?').value(), 15);
    }

    #[test]
    fn test_lrc_is_positionwise_xor() {
        let store = TrackStore::builtin();
        let record = store.record(TrackIndex::Secondary);
        let mut encoder = Encoder::new(record.format);
        let mut expected = 0u8;
        for raw in record.text.bytes() {
            expected ^= encoder.encode(raw).value();
        }
        assert_eq!(encoder.finalize().value(), expected);
    }

    #[test]
    fn test_finalize_is_stable() {
        let mut encoder = Encoder::new(TrackFormat::ABA);
        encoder.encode(b'1');
        encoder.encode(b'2');
        assert_eq!(encoder.finalize(), encoder.finalize());
    }

    #[test]
    fn test_forward_bits_lsb_first_then_parity() {
        // '1' in ABA: value 1 -> data bits 1,0,0,0 then parity 0
        let ch = Encoder::new(TrackFormat::ABA).encode(b'1');
        let bits: Vec<bool> = ch.forward_bits().collect();
        assert_eq!(bits, vec![true, false, false, false, false]);
    }

    #[test]
    fn test_reversed_bits_mirror_forward_bits() {
        for raw in TrackFormat::IATA.code_range() {
            let ch = Encoder::new(TrackFormat::IATA).encode(raw);
            let mut forward: Vec<bool> = ch.forward_bits().collect();
            forward.reverse();
            let reversed: Vec<bool> = ch.reversed_bits().collect();
            assert_eq!(reversed, forward);
        }
    }

    #[test]
    fn test_pack_unpack_preserves_character() {
        for format in [TrackFormat::IATA, TrackFormat::ABA] {
            for raw in format.code_range() {
                let ch = Encoder::new(format).encode(raw);
                assert_eq!(EncodedCharacter::unpack(ch.pack(), format), ch);
            }
        }
    }

    #[test]
    fn test_parity_slot_clear_of_data_field() {
        // Widest data field is 6 bits; the parity slot must sit above it
        assert!(PACKED_PARITY_BIT >= TrackFormat::IATA.data_bits());
        let ch = Encoder::new(TrackFormat::IATA).encode(b' ');
        assert!(ch.parity());
        assert_eq!(ch.pack() & TrackFormat::IATA.data_mask(), 0);
    }

    #[test]
    fn test_track_bit_count() {
        let store = TrackStore::builtin();
        let record = store.record(TrackIndex::Primary);
        let bits = encode_track_bits(record);
        assert_eq!(bits.len(), record.encoded_len() * 7);
    }
}
