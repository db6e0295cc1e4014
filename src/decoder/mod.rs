//! Reader-Side Bitstream Verification
//!
//! Recovers track characters from a captured flux-transition sequence the
//! way a reader head would: bits from transition spacing (a mid-period
//! transition marks a `1`), characters from fixed-width groups with odd
//! parity, and the trailing LRC check. Used by tests and the CLI to verify
//! emitted waveforms; the firmware path never decodes.

use serde::Serialize;

use crate::track::TrackFormat;
use crate::{FluxError, Result};

/// Recover the bit sequence from flux-transition timestamps
///
/// Every bit period opens with a transition; a second transition closer
/// than 1.5 half-periods marks a `1`. The capture is assumed to start on a
/// bit boundary, which holds for every session the modulator emits.
pub fn bits_from_transitions(transitions: &[u64], half_period_us: u64) -> Vec<bool> {
    let threshold = half_period_us * 3 / 2;
    let mut bits = Vec::new();
    let mut i = 0;
    while i < transitions.len() {
        let has_mid_transition =
            i + 1 < transitions.len() && transitions[i + 1] - transitions[i] < threshold;
        if has_mid_transition {
            bits.push(true);
            i += 2;
        } else {
            bits.push(false);
            i += 1;
        }
    }
    bits
}

/// One decoded track with its verification results
#[derive(Debug, Clone, Serialize)]
pub struct DecodedTrack {
    /// Recovered characters, start sentinel through end sentinel
    pub text: String,
    /// Data value of the received check character
    pub lrc: u8,
    /// Whether the received check character matched the recomputed LRC
    pub lrc_ok: bool,
    /// Bits consumed from the input, leading zeros included
    pub bits_consumed: usize,
}

/// Decode one track from an aligned bit sequence
///
/// Skips leading zero padding, then reads fixed-width characters until the
/// end sentinel, followed by the check character. Fails on a parity
/// violation, a truncated stream, or a stream with no set bit at all.
pub fn decode_track(bits: &[bool], format: TrackFormat) -> Result<DecodedTrack> {
    let start = bits
        .iter()
        .position(|&b| b)
        .ok_or_else(|| FluxError::Decode("no set bit in capture".into()))?;

    let width = format.bits_per_character as usize;
    let mut text = String::new();
    let mut lrc = 0u8;
    let mut pos = start;
    loop {
        let value = read_character(bits, pos, width)?;
        pos += width;
        text.push((value + format.code_offset) as char);
        // The end sentinel's data value is part of the LRC too
        lrc ^= value;

        if value + format.code_offset == TrackFormat::END_SENTINEL {
            let received = read_character(bits, pos, width)?;
            pos += width;
            return Ok(DecodedTrack {
                text,
                lrc: received,
                lrc_ok: received == lrc,
                bits_consumed: pos,
            });
        }

        if text.len() > format.max_characters {
            return Err(FluxError::Decode(format!(
                "no end sentinel within {} characters",
                format.max_characters
            )));
        }
    }
}

fn read_character(bits: &[bool], pos: usize, width: usize) -> Result<u8> {
    let group = bits
        .get(pos..pos + width)
        .ok_or_else(|| FluxError::Decode("bitstream truncated mid-character".into()))?;

    let mut value = 0u8;
    for (bit_pos, &bit) in group[..width - 1].iter().enumerate() {
        value |= (bit as u8) << bit_pos;
    }
    let parity = group[width - 1];
    if (value.count_ones() + parity as u32) % 2 != 1 {
        return Err(FluxError::Decode(format!(
            "parity violation in character at bit {}",
            pos
        )));
    }
    Ok(value)
}
