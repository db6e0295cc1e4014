//! Sleep/Debounce/Play Main Loop
//!
//! Ties the pieces together: wait halted for a button edge, confirm a
//! stable press with a two-phase debounce, run one playback session with
//! interrupts disabled, guard against immediate re-triggering, re-arm
//! sleep. Emission is a non-preemptible critical section; a second button
//! edge cannot re-enter the player mid-playback.

use crate::hal::{Hal, InputPin, Level, OutputPin};
use crate::player::TrackPlayer;
use crate::power::PowerController;
use crate::track::{TrackIndex, TrackStore};

/// Debounce interval between the two press confirmations
pub const DEBOUNCE_MS: u32 = 50;

/// Guard interval after a playback session
pub const GUARD_MS: u32 = 400;

/// Number of startup indicator blinks
pub const STARTUP_BLINKS: u32 = 3;

/// On/off time of one startup blink
pub const BLINK_MS: u32 = 200;

/// The emulator device: hardware, player and power control
pub struct Device<H: Hal> {
    hal: H,
    player: TrackPlayer,
    power: PowerController,
}

impl<H: Hal> Device<H> {
    /// Bring the device up: blink the indicator and precompute the reverse
    /// cache (inside [`TrackPlayer::new`])
    pub fn new(mut hal: H, store: TrackStore) -> Self {
        for _ in 0..STARTUP_BLINKS {
            hal.set_output(OutputPin::Enable, Level::High);
            hal.delay_ms(BLINK_MS);
            hal.set_output(OutputPin::Enable, Level::Low);
            hal.delay_ms(BLINK_MS);
        }
        Device {
            hal,
            player: TrackPlayer::new(store),
            power: PowerController::new(),
        }
    }

    /// One sleep → debounce → play → guard cycle
    ///
    /// Interrupts stay disabled from the post-wake debounce through the end
    /// of the guard interval, so the emitted waveform cannot be distorted
    /// by a deferred handler and a second wake edge cannot re-enter.
    pub fn run_once(&mut self) -> TrackIndex {
        self.power.sleep_until_wake(&mut self.hal);

        self.hal.disable_interrupts();

        // Capture the full press: wait for release, debounce, confirm
        while self.hal.read_input(InputPin::Button) == Level::Low {}
        self.hal.delay_ms(DEBOUNCE_MS);
        while self.hal.read_input(InputPin::Button) == Level::Low {}

        let played = self.player.play_next(&mut self.hal);
        self.hal.delay_ms(GUARD_MS);

        self.hal.enable_interrupts();
        played
    }

    /// Run the device forever
    pub fn run(&mut self) -> ! {
        loop {
            self.run_once();
        }
    }

    /// The playback engine
    pub fn player(&self) -> &TrackPlayer {
        &self.player
    }

    /// The hardware backend
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Consume the device, returning its hardware backend
    pub fn into_hal(self) -> H {
        self.hal
    }
}

#[cfg(all(test, feature = "simulator"))]
mod tests {
    use super::*;
    use crate::hal::sim::SimHal;

    fn pressed_device(presses: u32) -> Device<SimHal> {
        let hal = SimHal::new();
        for _ in 0..presses {
            hal.script_press(100);
        }
        Device::new(hal.clone(), TrackStore::builtin())
    }

    #[test]
    fn test_startup_blinks_indicator() {
        let device = pressed_device(0);
        let windows = device.hal().enable_windows();
        assert_eq!(windows.len() as u32, STARTUP_BLINKS);
        for (start, end) in windows {
            assert_eq!(end - start, u64::from(BLINK_MS) * 1_000);
        }
    }

    #[test]
    fn test_presses_alternate_tracks() {
        let mut device = pressed_device(3);
        assert_eq!(device.run_once(), TrackIndex::Primary);
        assert_eq!(device.run_once(), TrackIndex::Secondary);
        assert_eq!(device.run_once(), TrackIndex::Primary);
    }

    #[test]
    fn test_debounce_waits_out_the_press() {
        let mut device = pressed_device(1);
        device.run_once();

        // Playback must not begin until the 100 ms press has been released
        // and the debounce interval has elapsed
        let sessions: Vec<_> = device
            .hal()
            .enable_windows()
            .into_iter()
            .skip(STARTUP_BLINKS as usize)
            .collect();
        assert_eq!(sessions.len(), 1);
        let press_end_us = 100 * 1_000 + u64::from(STARTUP_BLINKS * 2 * BLINK_MS) * 1_000;
        assert!(sessions[0].0 >= press_end_us + u64::from(DEBOUNCE_MS) * 1_000);
    }

    #[test]
    fn test_emission_runs_with_interrupts_disabled() {
        let mut device = pressed_device(1);
        device.run_once();

        let session = device.hal().enable_windows()[STARTUP_BLINKS as usize];
        let trace = device.hal().irq_trace();
        // Interrupt state at any instant is the last trace entry before it
        let state_at = |t: u64| {
            trace
                .iter()
                .rev()
                .find(|&&(at, _)| at <= t)
                .map(|&(_, on)| on)
                .unwrap_or(true)
        };
        assert!(!state_at(session.0), "interrupts off at session start");
        assert!(!state_at(session.1), "interrupts off at session end");
    }

    #[test]
    fn test_guard_interval_after_playback() {
        let mut device = pressed_device(2);
        device.run_once();
        let after_first = device.hal().now_us();
        device.run_once();

        let sessions = device.hal().enable_windows();
        let second_start = sessions[STARTUP_BLINKS as usize + 1].0;
        // First cycle ends with the guard delay; the next session cannot
        // start before it has fully elapsed
        assert!(after_first >= sessions[STARTUP_BLINKS as usize].1 + u64::from(GUARD_MS) * 1_000);
        assert!(second_start >= after_first);
    }
}
