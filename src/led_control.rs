use log::warn;
use smart_leds::{RGB8, SmartLedsWrite, brightness};

use crate::state_machine::DeviceState;

/// System state READY
pub const COLOR_READY: RGB8 = RGB8::new(0, 10, 0);

/// Alarm mild, phases 1 & 2
pub const COLOR_ALARM_MILD: [RGB8; 2] = [RGB8::new(150, 150, 0), RGB8::new(75, 75, 0)];

/// Alarm high, phases 1 & 2
pub const COLOR_ALARM_HIGH: [RGB8; 2] = [RGB8::new(200, 0, 0), RGB8::new(150, 100, 0)];

/// Global brightness of the status LED
pub const LED_BRIGHTNESS: u8 = 255;

/// Colour of an alarm state in the given blink phase
pub fn alarm_color(state: DeviceState, second_phase: bool) -> RGB8 {
    let shades = match state {
        DeviceState::Ready => return COLOR_READY,
        DeviceState::AlarmMild => &COLOR_ALARM_MILD,
        DeviceState::AlarmHigh | DeviceState::Alarm => &COLOR_ALARM_HIGH,
    };
    shades[usize::from(second_phase)]
}

/// Visual alarm sink
pub trait AlarmIndicator {
    fn draw_alarm_phase(&mut self, color: RGB8);
}

/// Single WS2812 status LED
pub struct StatusLed<W> {
    writer: W,
    brightness: u8,
    color: RGB8,
}

impl<W> StatusLed<W>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: core::fmt::Debug,
{
    /// Create a new LED controller
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            brightness: LED_BRIGHTNESS,
            color: RGB8::default(),
        }
    }

    pub fn set_brightness(&mut self, level: u8) {
        self.brightness = level;
    }

    /// Last colour drawn
    pub fn get_color(&self) -> RGB8 {
        self.color
    }

    fn show(&mut self) {
        let pixel = [self.color];
        if let Err(e) = self
            .writer
            .write(brightness(pixel.iter().copied(), self.brightness))
        {
            warn!("[LED] Failed to write status LED: {:?}", e);
        }
    }
}

impl<W> AlarmIndicator for StatusLed<W>
where
    W: SmartLedsWrite<Color = RGB8>,
    W::Error: core::fmt::Debug,
{
    fn draw_alarm_phase(&mut self, color: RGB8) {
        self.color = color;
        self.show();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingStrip {
        frames: std::vec::Vec<std::vec::Vec<RGB8>>,
    }

    impl SmartLedsWrite for RecordingStrip {
        type Error = ();
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            self.frames
                .push(iterator.into_iter().map(Into::into).collect());
            Ok(())
        }
    }

    #[test]
    fn alarm_shades() {
        assert_eq!(alarm_color(DeviceState::AlarmMild, false), COLOR_ALARM_MILD[0]);
        assert_eq!(alarm_color(DeviceState::AlarmMild, true), COLOR_ALARM_MILD[1]);
        assert_eq!(alarm_color(DeviceState::AlarmHigh, true), COLOR_ALARM_HIGH[1]);
        assert_eq!(alarm_color(DeviceState::Alarm, false), COLOR_ALARM_HIGH[0]);
        assert_eq!(alarm_color(DeviceState::Ready, true), COLOR_READY);
    }

    #[test]
    fn draws_one_pixel_per_phase() {
        let mut led = StatusLed::new(RecordingStrip::default());
        led.draw_alarm_phase(COLOR_ALARM_HIGH[0]);
        led.draw_alarm_phase(COLOR_READY);
        assert_eq!(led.get_color(), COLOR_READY);
        assert_eq!(led.writer.frames.len(), 2);
        assert_eq!(led.writer.frames[0], std::vec![COLOR_ALARM_HIGH[0]]);
    }

    #[test]
    fn brightness_scales_output() {
        let mut led = StatusLed::new(RecordingStrip::default());
        led.set_brightness(0);
        led.draw_alarm_phase(COLOR_ALARM_MILD[0]);
        assert_eq!(led.writer.frames[0], std::vec![RGB8::new(0, 0, 0)]);
    }
}
