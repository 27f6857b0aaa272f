//! Vibration motor driven as a slow square wave from the control cycle

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::config;
use crate::level::AlertLevel;

/// Haptic alarm sink
pub trait HapticOutput {
    /// Select the vibration pattern of a level, `NoAlert` stops the motor
    fn set_haptic_frequency(&mut self, level: AlertLevel);

    /// Advance the pattern by one control cycle
    fn tick(&mut self) {}
}

/// Cycles per half period for a frequency, 0 when the motor is off
const fn half_period_cycles(frequency_hz: u32) -> u32 {
    let cycle_ms = config::CYCLE_TIME.as_millis() as u32;
    if frequency_hz == 0 || cycle_ms == 0 {
        0
    } else {
        let cycles = 500 / (frequency_hz * cycle_ms);
        if cycles == 0 { 1 } else { cycles }
    }
}

pub struct VibrationMotor<P> {
    pin: P,
    half_period: u32,
    counter: u32,
    on: bool,
}

impl<P: OutputPin> VibrationMotor<P> {
    pub fn new(pin: P) -> Self {
        let mut motor = Self {
            pin,
            half_period: 0,
            counter: 0,
            on: false,
        };
        motor.drive(false);
        motor
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    fn drive(&mut self, on: bool) {
        self.on = on;
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("[HAPTIC] Failed to drive motor pin: {:?}", e);
        }
    }
}

impl<P: OutputPin> HapticOutput for VibrationMotor<P> {
    fn set_haptic_frequency(&mut self, level: AlertLevel) {
        self.half_period = half_period_cycles(level.haptic_frequency_hz());
        self.counter = 0;
        self.drive(self.half_period > 0);
    }

    fn tick(&mut self) {
        if self.half_period == 0 {
            return;
        }
        self.counter += 1;
        if self.counter >= self.half_period {
            self.counter = 0;
            self.drive(!self.on);
        }
    }
}
