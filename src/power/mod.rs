//! Low-Power Halt and Wake Sequencing
//!
//! Between swipes the device sits in the deepest halt the platform offers,
//! woken only by the button edge. The wake handler does no work; all
//! debouncing happens after [`PowerController::sleep_until_wake`] returns,
//! in the main loop.

use crate::hal::Hal;

/// Arms, enters and tears down the low-power halt state
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerController;

impl PowerController {
    /// Create a power controller
    pub fn new() -> Self {
        PowerController
    }

    /// Halt until the wake line fires, then restore the pre-sleep state
    ///
    /// Sequence on entry: arm the edge-triggered wake interrupt, power down
    /// the analog subsystem, enable interrupts, halt. On wake: interrupts
    /// off while the wake source is disarmed and the analog subsystem
    /// repowered, then interrupts on again. Arming and analog state are
    /// restored exactly to their pre-sleep values.
    pub fn sleep_until_wake<H: Hal>(&self, hal: &mut H) {
        hal.arm_wake_interrupt();
        hal.set_analog_enabled(false);
        hal.enable_interrupts();
        hal.halt();

        hal.disable_interrupts();
        hal.disarm_wake_interrupt();
        hal.set_analog_enabled(true);
        hal.enable_interrupts();
    }
}
