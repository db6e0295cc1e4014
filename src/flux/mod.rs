//! F2F Bit Modulation
//!
//! Two-frequency, biphase coding of single bits onto the emulation coil.
//! Every bit period opens with one flux transition (a polarity reversal of
//! the complementary H-bridge outputs); a `1` bit adds a second transition
//! at mid-period. Readers recover their clock from transition spacing, not
//! wall-clock time, so the 2:1 transition-frequency ratio between ones and
//! zeros is what matters, not the absolute emission speed.

use crate::encoder::EncodedCharacter;
use crate::hal::{Hal, Level, OutputPin};

/// Half of one bit period in microseconds
///
/// Empirically validated against real readers; do not change without
/// hardware verification.
pub const HALF_PERIOD_US: u32 = 200;

/// Emits biphase-coded bits as coil polarity reversals
///
/// Constructed once per playback session so the polarity flag starts from a
/// known value and the session opens with a clean leading edge. Holds the
/// hardware borrow for the whole session; [`Modulator::quiesce`] returns the
/// coil to neutral at the end.
pub struct Modulator<'h, H: Hal> {
    hal: &'h mut H,
    polarity: bool,
}

impl<'h, H: Hal> Modulator<'h, H> {
    /// Start a session with the polarity flag reset
    pub fn new(hal: &'h mut H) -> Self {
        Modulator {
            hal,
            polarity: false,
        }
    }

    /// Emit one biphase-coded bit
    ///
    /// One transition at the period start; a second at mid-period when the
    /// bit is set. Each half-period is a blocking [`HALF_PERIOD_US`] delay.
    pub fn emit_bit(&mut self, bit: bool) {
        self.transition();
        self.hal.delay_us(HALF_PERIOD_US);
        if bit {
            self.transition();
        }
        self.hal.delay_us(HALF_PERIOD_US);
    }

    /// Emit `count` zero bits (clock-lock padding)
    pub fn emit_zeros(&mut self, count: usize) {
        for _ in 0..count {
            self.emit_bit(false);
        }
    }

    /// Emit one character in wire order: data bits LSB first, then parity
    pub fn emit_character(&mut self, character: &EncodedCharacter) {
        for bit in character.forward_bits() {
            self.emit_bit(bit);
        }
    }

    /// Emit one character time-reversed: parity first, then data MSB first
    pub fn emit_character_reversed(&mut self, character: &EncodedCharacter) {
        for bit in character.reversed_bits() {
            self.emit_bit(bit);
        }
    }

    /// Drop both drive outputs to neutral
    ///
    /// Leaves the H-bridge without standby current between sessions.
    pub fn quiesce(&mut self) {
        self.hal.set_output(OutputPin::CoilA, Level::Low);
        self.hal.set_output(OutputPin::CoilB, Level::Low);
    }

    fn transition(&mut self) {
        self.polarity = !self.polarity;
        let level = if self.polarity {
            Level::High
        } else {
            Level::Low
        };
        self.hal.set_output(OutputPin::CoilA, level);
        self.hal.set_output(OutputPin::CoilB, !level);
    }
}
