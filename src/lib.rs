//! Magnetic-Stripe Flux Waveform Emulator
//!
//! Emulates the electromagnetic signal a magstripe reader head senses during
//! a swipe by driving an emulation coil through a standards-compliant F2F
//! (two-frequency, biphase) flux-transition sequence. Track data is encoded
//! with odd per-character parity and a trailing LRC check character, played
//! forward, and for the primary track followed by the time-reversed secondary
//! track to emulate an up-then-down swipe.
//!
//! # Features
//! - F2F/biphase bit modulation with a fixed 200 µs half-period clock
//! - Odd-parity character encoding plus running LRC accumulation
//! - Forward playback with 25-bit clock-lock preamble and trailer
//! - Packed reverse-track cache for the backward-swipe companion emission
//! - Low-power sleep/wake control loop with two-phase button debounce
//! - Authoring-time validation of the constant track table
//!
//! # Crate feature flags
//! - `simulator` (default): software hardware-double with a virtual
//!   microsecond clock and flux-transition capture (`hal::sim`)
//! - `export` (opt-out): WAV rendering of captured waveforms (enables the
//!   optional `hound` dep)
//!
//! # Quick start
//! ```
//! # #[cfg(feature = "simulator")]
//! # {
//! use magflux::hal::sim::SimHal;
//! use magflux::player::TrackPlayer;
//! use magflux::track::{TrackIndex, TrackStore};
//!
//! let store = TrackStore::validated().unwrap();
//! let mut hal = SimHal::new();
//! let mut player = TrackPlayer::new(store);
//! player.play_track(&mut hal, TrackIndex::Primary);
//! assert!(!hal.coil_transitions().is_empty());
//! # }
//! ```

#![warn(missing_docs)]

// Domain modules
pub mod decoder; // Reader-side bitstream verification
pub mod device; // Sleep/debounce/play main loop
pub mod encoder; // Character encoding, parity, LRC
pub mod flux; // F2F bit modulation
pub mod hal; // Platform pin/timer/power abstraction
pub mod player; // Playback session orchestration
pub mod power; // Low-power halt and wake sequencing
pub mod track; // Constant track table and formats

#[cfg(feature = "export")]
pub mod export; // Waveform rendering and WAV output

/// Error types for emulator operations
#[derive(thiserror::Error, Debug)]
pub enum FluxError {
    /// Constant track table failed authoring-time validation
    #[error("Track validation error: {0}")]
    InvalidTrack(String),

    /// Captured bitstream could not be decoded back into track characters
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing the rendered waveform
    #[error("Export error: {0}")]
    Export(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for FluxError {
    /// Converts a String into `FluxError::Other`.
    fn from(msg: String) -> Self {
        FluxError::Other(msg)
    }
}

impl From<&str> for FluxError {
    /// Converts a string slice into `FluxError::Other`.
    fn from(msg: &str) -> Self {
        FluxError::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, FluxError>;

// Public API exports
pub use decoder::{bits_from_transitions, decode_track, DecodedTrack};
pub use device::Device;
pub use encoder::{EncodedCharacter, Encoder};
pub use flux::Modulator;
pub use player::{PlaybackPhase, PlaybackState, ReverseTrackCache, TrackPlayer};
pub use power::PowerController;
pub use track::{TrackFormat, TrackIndex, TrackRecord, TrackStore};

#[cfg(feature = "export")]
pub use export::{export_to_wav, render_waveform, ExportConfig};
#[cfg(feature = "simulator")]
pub use hal::sim::{SimHal, SimHandle};
