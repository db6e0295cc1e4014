//! Platform Pin/Timer/Power Abstraction
//!
//! The contract the playback core requires of the hardware: digital output
//! levels, a debounce-grade input read, blocking microsecond/millisecond
//! delays, global interrupt gating, and the low-power halt primitives used
//! by the sleep/wake loop. Firmware targets implement [`Hal`] over real
//! registers; tests and the CLI use the [`sim`] software double.

use std::fmt;

use serde::Serialize;

#[cfg(feature = "simulator")]
pub mod sim;

/// Digital line level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    /// Logic low
    Low,
    /// Logic high
    High,
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Output lines driven by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputPin {
    /// H-bridge drive A; always the complement of [`OutputPin::CoilB`]
    /// while a session is running
    CoilA,
    /// H-bridge drive B
    CoilB,
    /// Drive-stage enable; doubles as the indicator LED
    Enable,
}

impl fmt::Display for OutputPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPin::CoilA => write!(f, "coil A"),
            OutputPin::CoilB => write!(f, "coil B"),
            OutputPin::Enable => write!(f, "enable"),
        }
    }
}

/// Input lines read by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputPin {
    /// Wake/swipe button; active-low, pulled up when idle
    Button,
}

/// Platform collaborator contract
///
/// Everything the encode/playback core and the sleep/wake loop need from the
/// hardware. Delays are blocking with microsecond-order accuracy; during
/// waveform emission the caller disables interrupts, so implementations must
/// not rely on interrupt-driven timekeeping inside `delay_us`.
pub trait Hal {
    /// Drive one output line to the given level
    fn set_output(&mut self, pin: OutputPin, level: Level);

    /// Read one input line
    fn read_input(&mut self, pin: InputPin) -> Level;

    /// Block for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Block for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Enable global interrupts
    fn enable_interrupts(&mut self);

    /// Disable global interrupts
    fn disable_interrupts(&mut self);

    /// Arm the edge-triggered wake interrupt on the button line
    fn arm_wake_interrupt(&mut self);

    /// Disarm the wake interrupt source
    fn disarm_wake_interrupt(&mut self);

    /// Power the analog subsystem up or down around the low-power halt
    fn set_analog_enabled(&mut self, enabled: bool);

    /// Enter the deepest low-power halt until the armed wake interrupt fires
    ///
    /// Blocks with the processor halted, not polling. The wake handler does
    /// no work beyond ending the halt; debouncing happens after return.
    fn halt(&mut self);
}
