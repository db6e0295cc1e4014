//! Software Hardware-Double
//!
//! A [`Hal`] implementation backed by a virtual microsecond clock instead of
//! real silicon. Blocking delays advance the clock, every output-pin edge is
//! recorded with its timestamp, and the low-power halt either consumes a
//! scripted button press or genuinely blocks until a [`SimHandle`] presses
//! the button from another thread.
//!
//! Button reads advance the clock by a small poll tick so the busy-wait
//! debounce phases of the main loop terminate under simulation.

use std::collections::VecDeque;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::{Hal, InputPin, Level, OutputPin};

/// Virtual-clock advance applied per button read
pub const BUTTON_POLL_US: u64 = 10;

bitflags! {
    /// Snapshot of the three output lines
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineState: u8 {
        /// H-bridge drive A
        const COIL_A = 0x01;
        /// H-bridge drive B
        const COIL_B = 0x02;
        /// Drive-stage enable / indicator LED
        const ENABLE = 0x04;
    }
}

impl LineState {
    fn bit(pin: OutputPin) -> LineState {
        match pin {
            OutputPin::CoilA => LineState::COIL_A,
            OutputPin::CoilB => LineState::COIL_B,
            OutputPin::Enable => LineState::ENABLE,
        }
    }
}

/// One recorded output-pin edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinEvent {
    /// Virtual-clock timestamp of the edge
    pub at_us: u64,
    /// Line that changed
    pub pin: OutputPin,
    /// Level after the edge
    pub level: Level,
}

#[derive(Debug)]
struct SimState {
    now_us: u64,
    lines: LineState,
    events: Vec<PinEvent>,
    irq_trace: Vec<(u64, bool)>,
    interrupts_enabled: bool,
    wake_armed: bool,
    analog_enabled: bool,
    scripted_presses: VecDeque<u64>,
    press_until_us: Option<u64>,
    external_press: Option<u64>,
}

impl SimState {
    fn new() -> Self {
        SimState {
            now_us: 0,
            lines: LineState::empty(),
            events: Vec::new(),
            irq_trace: Vec::new(),
            // Matches MCU reset state: interrupts on, wake source disarmed,
            // analog subsystem powered
            interrupts_enabled: true,
            wake_armed: false,
            analog_enabled: true,
            scripted_presses: VecDeque::new(),
            press_until_us: None,
            external_press: None,
        }
    }

    fn button_pressed(&mut self) -> bool {
        match self.press_until_us {
            Some(until) if self.now_us < until => true,
            Some(_) => {
                self.press_until_us = None;
                false
            }
            None => false,
        }
    }
}

/// Simulated hardware backend
///
/// Cloning yields another view of the same simulated device, so a test can
/// hand one clone to a [`crate::device::Device`] and inspect the capture
/// through the other.
#[derive(Clone)]
pub struct SimHal {
    state: Arc<Mutex<SimState>>,
    wake: Arc<Condvar>,
}

/// Cloneable handle that presses the simulated button from another thread
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
    wake: Arc<Condvar>,
}

impl SimHandle {
    /// Press the button for `hold_ms`, waking a blocked halt
    pub fn press_for_ms(&self, hold_ms: u32) {
        let mut state = self.state.lock();
        state.external_press = Some(u64::from(hold_ms) * 1_000);
        self.wake.notify_one();
    }
}

impl SimHal {
    /// Create a simulated device at virtual time zero
    pub fn new() -> Self {
        SimHal {
            state: Arc::new(Mutex::new(SimState::new())),
            wake: Arc::new(Condvar::new()),
        }
    }

    /// Handle for pressing the button from another thread
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
            wake: Arc::clone(&self.wake),
        }
    }

    /// Queue a button press consumed by the next halt
    pub fn script_press(&self, hold_ms: u32) {
        self.state
            .lock()
            .scripted_presses
            .push_back(u64::from(hold_ms) * 1_000);
    }

    /// Current virtual-clock value in microseconds
    pub fn now_us(&self) -> u64 {
        self.state.lock().now_us
    }

    /// All recorded output-pin edges
    pub fn events(&self) -> Vec<PinEvent> {
        self.state.lock().events.clone()
    }

    /// Timestamps of coil flux transitions
    ///
    /// Every modulator transition flips coil A, so its edges are the flux
    /// reversals a read head would sense. The end-of-session return to
    /// neutral coincides with the drive-stage disable and reverses no flux,
    /// so coil edges sharing a timestamp with a disable edge are excluded.
    pub fn coil_transitions(&self) -> Vec<u64> {
        let state = self.state.lock();
        let disables: Vec<u64> = state
            .events
            .iter()
            .filter(|e| e.pin == OutputPin::Enable && e.level == Level::Low)
            .map(|e| e.at_us)
            .collect();
        state
            .events
            .iter()
            .filter(|e| e.pin == OutputPin::CoilA && !disables.contains(&e.at_us))
            .map(|e| e.at_us)
            .collect()
    }

    /// (start, end) windows during which the drive stage was enabled
    pub fn enable_windows(&self) -> Vec<(u64, u64)> {
        let state = self.state.lock();
        let mut windows = Vec::new();
        let mut open = None;
        for event in state.events.iter().filter(|e| e.pin == OutputPin::Enable) {
            match (event.level, open) {
                (Level::High, None) => open = Some(event.at_us),
                (Level::Low, Some(start)) => {
                    windows.push((start, event.at_us));
                    open = None;
                }
                _ => {}
            }
        }
        windows
    }

    /// Timestamped global-interrupt enable/disable trace
    pub fn irq_trace(&self) -> Vec<(u64, bool)> {
        self.state.lock().irq_trace.clone()
    }

    /// Whether the wake interrupt source is currently armed
    pub fn is_wake_armed(&self) -> bool {
        self.state.lock().wake_armed
    }

    /// Whether the analog subsystem is currently powered
    pub fn is_analog_enabled(&self) -> bool {
        self.state.lock().analog_enabled
    }

    /// Whether global interrupts are currently enabled
    pub fn interrupts_enabled(&self) -> bool {
        self.state.lock().interrupts_enabled
    }

    /// Current levels of the output lines
    pub fn lines(&self) -> LineState {
        self.state.lock().lines
    }
}

impl Default for SimHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for SimHal {
    fn set_output(&mut self, pin: OutputPin, level: Level) {
        let mut state = self.state.lock();
        let bit = LineState::bit(pin);
        let current = if state.lines.contains(bit) {
            Level::High
        } else {
            Level::Low
        };
        if current != level {
            state.lines.set(bit, level == Level::High);
            let at_us = state.now_us;
            state.events.push(PinEvent { at_us, pin, level });
        }
    }

    fn read_input(&mut self, pin: InputPin) -> Level {
        let InputPin::Button = pin;
        let mut state = self.state.lock();
        state.now_us += BUTTON_POLL_US;
        if state.button_pressed() {
            Level::Low
        } else {
            Level::High
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.state.lock().now_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.state.lock().now_us += u64::from(ms) * 1_000;
    }

    fn enable_interrupts(&mut self) {
        let mut state = self.state.lock();
        state.interrupts_enabled = true;
        let at = state.now_us;
        state.irq_trace.push((at, true));
    }

    fn disable_interrupts(&mut self) {
        let mut state = self.state.lock();
        state.interrupts_enabled = false;
        let at = state.now_us;
        state.irq_trace.push((at, false));
    }

    fn arm_wake_interrupt(&mut self) {
        self.state.lock().wake_armed = true;
    }

    fn disarm_wake_interrupt(&mut self) {
        self.state.lock().wake_armed = false;
    }

    fn set_analog_enabled(&mut self, enabled: bool) {
        self.state.lock().analog_enabled = enabled;
    }

    fn halt(&mut self) {
        let mut state = self.state.lock();
        assert!(
            state.wake_armed,
            "halt entered with the wake interrupt disarmed; nothing could end it"
        );
        assert!(
            state.interrupts_enabled,
            "halt entered with global interrupts disabled"
        );

        if let Some(hold_us) = state.scripted_presses.pop_front() {
            state.press_until_us = Some(state.now_us + hold_us);
            return;
        }

        while state.external_press.is_none() {
            self.wake.wait(&mut state);
        }
        let hold_us = state.external_press.take().unwrap_or_default();
        state.press_until_us = Some(state.now_us + hold_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_delays_advance_virtual_clock() {
        let mut hal = SimHal::new();
        hal.delay_us(200);
        hal.delay_ms(3);
        assert_eq!(hal.now_us(), 3_200);
    }

    #[test]
    fn test_edges_recorded_once_per_change() {
        let mut hal = SimHal::new();
        hal.set_output(OutputPin::Enable, Level::High);
        hal.set_output(OutputPin::Enable, Level::High);
        hal.delay_ms(1);
        hal.set_output(OutputPin::Enable, Level::Low);
        let events = hal.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].at_us, 1_000);
        assert_eq!(hal.enable_windows(), vec![(0, 1_000)]);
    }

    #[test]
    fn test_scripted_press_ends_halt_and_holds_button() {
        let mut hal = SimHal::new();
        hal.script_press(5);
        hal.arm_wake_interrupt();
        hal.halt();

        // Pressed for 5 ms of virtual time, released afterwards
        assert_eq!(hal.read_input(InputPin::Button), Level::Low);
        hal.delay_ms(6);
        assert_eq!(hal.read_input(InputPin::Button), Level::High);
    }

    #[test]
    fn test_halt_blocks_until_external_press() {
        let mut hal = SimHal::new();
        hal.arm_wake_interrupt();
        let handle = hal.handle();

        let presser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.press_for_ms(10);
        });

        hal.halt();
        assert_eq!(hal.read_input(InputPin::Button), Level::Low);
        presser.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "wake interrupt disarmed")]
    fn test_halt_without_armed_wake_is_a_contract_violation() {
        let mut hal = SimHal::new();
        hal.halt();
    }

    #[test]
    fn test_teardown_edge_excluded_from_flux_capture() {
        let mut hal = SimHal::new();
        hal.set_output(OutputPin::Enable, Level::High);
        hal.set_output(OutputPin::CoilA, Level::High);
        hal.delay_us(400);
        // Return to neutral at the same instant as the drive-stage disable
        hal.set_output(OutputPin::CoilA, Level::Low);
        hal.set_output(OutputPin::Enable, Level::Low);
        assert_eq!(hal.events().len(), 4);
        assert_eq!(hal.coil_transitions(), vec![0]);
    }

    #[test]
    fn test_button_reads_advance_clock() {
        let mut hal = SimHal::new();
        let before = hal.now_us();
        hal.read_input(InputPin::Button);
        assert_eq!(hal.now_us(), before + BUTTON_POLL_US);
    }
}
