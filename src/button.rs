//! # Button input
//! The user button is sampled once per control cycle. A level change is only
//! accepted when two consecutive samples agree, which debounces the contact
//! at the 50 ms cycle time.

use embedded_hal::digital::InputPin;
use log::{debug, warn};

/// Button edges consumed by the control loop
pub trait ButtonInput {
    /// Sample the button; true exactly once per debounced release
    fn was_released(&mut self) -> bool;
}

/// Polled, debounced push button
pub struct DebouncedButton<P> {
    /// The input pin for the button
    input: P,
    /// Pressed when the pin reads low
    active_low: bool,
    /// Debounced state, true = pressed
    pressed: bool,
    /// Previous raw sample
    last_sample: bool,
}

impl<P: InputPin> DebouncedButton<P> {
    /// Button wired to ground with a pull-up
    pub fn new(input: P) -> Self {
        Self::with_polarity(input, true)
    }

    pub fn with_polarity(input: P, active_low: bool) -> Self {
        Self {
            input,
            active_low,
            pressed: false,
            last_sample: false,
        }
    }

    fn sample(&mut self) -> Option<bool> {
        match self.input.is_high() {
            Ok(high) => Some(high != self.active_low),
            Err(e) => {
                warn!("[BUTTON] Failed to read button pin: {:?}", e);
                None
            }
        }
    }
}

impl<P: InputPin> ButtonInput for DebouncedButton<P> {
    fn was_released(&mut self) -> bool {
        let Some(sample) = self.sample() else {
            return false;
        };
        let stable = sample == self.last_sample;
        self.last_sample = sample;

        if !stable || sample == self.pressed {
            return false;
        }

        self.pressed = sample;
        debug!("[BUTTON] {}", if sample { "pressed" } else { "released" });
        !sample
    }
}
