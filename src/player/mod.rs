//! Playback Session Orchestration
//!
//! Drives one complete emission session: clock-lock preamble, character
//! data with parity, the LRC check character, and for the primary track a
//! zero gap followed by the time-reversed secondary track, closing with a
//! zero trailer. The whole session runs with the drive stage enabled and is
//! treated by the caller as a non-preemptible critical section.

mod reverse;

pub use reverse::{ReverseTrackCache, REVERSE_CAPACITY};

use crate::encoder::Encoder;
use crate::flux::Modulator;
use crate::hal::{Hal, Level, OutputPin};
use crate::track::{TrackIndex, TrackStore};

/// Zero bits emitted before the first data character
pub const PREAMBLE_BITS: usize = 25;

/// Zero bits emitted after the last data character
pub const TRAILER_BITS: usize = 25;

/// Zero bits separating the forward primary track from the reversed
/// secondary companion
///
/// Like the preamble/trailer widths, reverse-engineered against real
/// readers; fixed by design.
pub const TRACK_GAP_BITS: usize = 53;

/// Phase of the playback state machine
///
/// Sessions step IDLE → PREAMBLE → DATA → CHECK → (primary only: GAP →
/// REVERSE_COMPANION) → TRAILER → IDLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No session running
    Idle,
    /// Leading clock-lock zeros
    Preamble,
    /// Track characters
    Data,
    /// Trailing LRC check character
    Check,
    /// Inter-track zero gap (primary sessions only)
    Gap,
    /// Time-reversed secondary track (primary sessions only)
    ReverseCompanion,
    /// Trailing zeros
    Trailer,
}

/// Mutable per-player state
///
/// The round-robin counter survives across sessions; the session polarity
/// lives in the per-session [`Modulator`] and is reset on construction.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackState {
    /// Track the next [`TrackPlayer::play_next`] call will emit
    pub next_track: TrackIndex,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState {
            next_track: TrackIndex::Primary,
        }
    }
}

/// Orchestrates full playback sessions over a [`Hal`]
///
/// Owns the track table, the precomputed reverse cache of the secondary
/// track (built at construction, before any playback can depend on it) and
/// the round-robin playback state.
#[derive(Debug)]
pub struct TrackPlayer {
    store: TrackStore,
    reverse: ReverseTrackCache,
    state: PlaybackState,
    phase: PlaybackPhase,
}

impl TrackPlayer {
    /// Create a player and precompute the secondary track's reverse cache
    pub fn new(store: TrackStore) -> Self {
        let reverse = ReverseTrackCache::build(store.record(TrackIndex::Secondary));
        TrackPlayer {
            store,
            reverse,
            state: PlaybackState::default(),
            phase: PlaybackPhase::Idle,
        }
    }

    /// Current state-machine phase
    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Round-robin state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The precomputed reverse cache
    pub fn reverse_cache(&self) -> &ReverseTrackCache {
        &self.reverse
    }

    /// Play the next track in round-robin order, then advance the counter
    ///
    /// Returns the index that was played.
    pub fn play_next<H: Hal>(&mut self, hal: &mut H) -> TrackIndex {
        let index = self.state.next_track;
        self.play_track(hal, index);
        self.state.next_track = index.next();
        index
    }

    /// Run one full playback session for the given track
    ///
    /// Asserts the drive-stage enable for the whole session and returns the
    /// coil to neutral at the end. Timing inside the session is driven by
    /// the modulator's fixed bit clock; the caller is responsible for
    /// keeping interrupts disabled around the call.
    pub fn play_track<H: Hal>(&mut self, hal: &mut H, index: TrackIndex) {
        let record = *self.store.record(index);

        hal.set_output(OutputPin::Enable, Level::High);
        let mut modulator = Modulator::new(hal);

        self.phase = PlaybackPhase::Preamble;
        modulator.emit_zeros(PREAMBLE_BITS);

        self.phase = PlaybackPhase::Data;
        let mut encoder = Encoder::new(record.format);
        for raw in record.text.bytes() {
            let character = encoder.encode(raw);
            modulator.emit_character(&character);
        }

        self.phase = PlaybackPhase::Check;
        modulator.emit_character(&encoder.finalize());

        if index == TrackIndex::Primary {
            self.phase = PlaybackPhase::Gap;
            modulator.emit_zeros(TRACK_GAP_BITS);

            self.phase = PlaybackPhase::ReverseCompanion;
            for character in self.reverse.characters_reversed() {
                modulator.emit_character_reversed(&character);
            }
        }

        self.phase = PlaybackPhase::Trailer;
        modulator.emit_zeros(TRAILER_BITS);

        modulator.quiesce();
        hal.set_output(OutputPin::Enable, Level::Low);
        self.phase = PlaybackPhase::Idle;
    }

    /// Total bits one session of `index` emits, padding included
    pub fn session_bit_count(&self, index: TrackIndex) -> usize {
        let record = self.store.record(index);
        let mut bits = PREAMBLE_BITS
            + record.encoded_len() * record.format.bits_per_character as usize
            + TRAILER_BITS;
        if index == TrackIndex::Primary {
            let companion = self.store.record(TrackIndex::Secondary);
            bits += TRACK_GAP_BITS
                + companion.encoded_len() * companion.format.bits_per_character as usize;
        }
        bits
    }
}

#[cfg(all(test, feature = "simulator"))]
mod tests {
    use super::*;
    use crate::decoder::bits_from_transitions;
    use crate::flux::HALF_PERIOD_US;
    use crate::hal::sim::SimHal;

    fn played_bits(index: TrackIndex) -> Vec<bool> {
        let mut hal = SimHal::new();
        let mut player = TrackPlayer::new(TrackStore::builtin());
        player.play_track(&mut hal, index);
        bits_from_transitions(&hal.coil_transitions(), u64::from(HALF_PERIOD_US))
    }

    #[test]
    fn test_secondary_session_bit_count() {
        let player = TrackPlayer::new(TrackStore::builtin());
        let bits = played_bits(TrackIndex::Secondary);
        assert_eq!(bits.len(), player.session_bit_count(TrackIndex::Secondary));
    }

    #[test]
    fn test_primary_session_carries_reverse_companion() {
        let player = TrackPlayer::new(TrackStore::builtin());
        let primary = played_bits(TrackIndex::Primary);
        let secondary = played_bits(TrackIndex::Secondary);
        assert_eq!(primary.len(), player.session_bit_count(TrackIndex::Primary));
        assert!(primary.len() > secondary.len());
    }

    #[test]
    fn test_session_bracketed_by_zero_padding() {
        let bits = played_bits(TrackIndex::Secondary);
        assert!(bits[..PREAMBLE_BITS].iter().all(|&b| !b));
        assert!(bits[bits.len() - TRAILER_BITS..].iter().all(|&b| !b));
        // First data bit is the start sentinel's LSB, always set
        assert!(bits[PREAMBLE_BITS]);
    }

    #[test]
    fn test_player_returns_to_idle() {
        let mut hal = SimHal::new();
        let mut player = TrackPlayer::new(TrackStore::builtin());
        assert_eq!(player.phase(), PlaybackPhase::Idle);
        player.play_track(&mut hal, TrackIndex::Primary);
        assert_eq!(player.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_play_next_alternates_tracks() {
        let mut hal = SimHal::new();
        let mut player = TrackPlayer::new(TrackStore::builtin());
        assert_eq!(player.play_next(&mut hal), TrackIndex::Primary);
        assert_eq!(player.play_next(&mut hal), TrackIndex::Secondary);
        assert_eq!(player.play_next(&mut hal), TrackIndex::Primary);
    }

    #[test]
    fn test_enable_asserted_for_whole_session() {
        let mut hal = SimHal::new();
        let mut player = TrackPlayer::new(TrackStore::builtin());
        player.play_track(&mut hal, TrackIndex::Secondary);

        let windows = hal.enable_windows();
        assert_eq!(windows.len(), 1);
        let (start, end) = windows[0];
        let transitions = hal.coil_transitions();
        assert!(transitions.iter().all(|&t| t >= start && t <= end));
    }
}
