//! Control loop module
//!
//! Runs once per control cycle: reads the alert level and the button, feeds
//! them to the state machine and drives the LED and the vibration motor.

use log::{info, warn};

use crate::button::ButtonInput;
use crate::channel::AlertChannel;
use crate::haptic::HapticOutput;
use crate::led_control::{AlarmIndicator, COLOR_READY};
use crate::level::AlertLevel;
use crate::state_machine::{Action, AlarmConfig, AlarmStateMachine, DeviceState};

pub struct ControlLoop<C, B, L, H> {
    channel: C,
    button: B,
    indicator: L,
    haptic: H,
    state_machine: AlarmStateMachine,
}

impl<C, B, L, H> ControlLoop<C, B, L, H>
where
    C: AlertChannel,
    B: ButtonInput,
    L: AlarmIndicator,
    H: HapticOutput,
{
    pub fn new(channel: C, button: B, indicator: L, haptic: H, config: AlarmConfig) -> Self {
        Self {
            channel,
            button,
            indicator,
            haptic,
            state_machine: AlarmStateMachine::new(config),
        }
    }

    /// Show READY and stop the motor
    pub fn init(&mut self) {
        self.state_machine.reset();
        self.indicator.draw_alarm_phase(COLOR_READY);
        self.haptic.set_haptic_frequency(AlertLevel::NoAlert);
        info!("[CONTROL] Ready");
    }

    /// Run one control cycle and return the resulting state
    pub fn cycle(&mut self) -> DeviceState {
        // Unstarted channel or malformed value: skip the cycle
        let level = self.channel.get_alert_level().ok();
        let released = self.button.was_released();

        for action in self.state_machine.step(level, released) {
            self.execute(action);
        }
        self.haptic.tick();

        self.state_machine.get_current_state()
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::ShowColor(color) => self.indicator.draw_alarm_phase(color),
            Action::SetHaptic(level) => self.haptic.set_haptic_frequency(level),
            Action::ClearRemoteLevel => {
                info!("[CONTROL] Alarm dismissed by user");
                if let Err(e) = self.channel.set_alert_level(AlertLevel::NoAlert, true) {
                    warn!("[CONTROL] Failed to clear alert level: {}", e);
                }
            }
        }
    }

    pub fn get_state_machine(&self) -> &AlarmStateMachine {
        &self.state_machine
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    pub fn haptic(&self) -> &H {
        &self.haptic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi_channel::{SharedAlertState, WifiAlertChannel};
    use smart_leds::RGB8;

    struct NoButton;

    impl ButtonInput for NoButton {
        fn was_released(&mut self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct LastColor(Option<RGB8>);

    impl AlarmIndicator for LastColor {
        fn draw_alarm_phase(&mut self, color: RGB8) {
            self.0 = Some(color);
        }
    }

    #[derive(Default)]
    struct LastHaptic(Option<AlertLevel>);

    impl HapticOutput for LastHaptic {
        fn set_haptic_frequency(&mut self, level: AlertLevel) {
            self.0 = Some(level);
        }
    }

    #[test]
    fn init_shows_ready() {
        let state = SharedAlertState::new();
        let mut control = ControlLoop::new(
            WifiAlertChannel::new(&state),
            NoButton,
            LastColor::default(),
            LastHaptic::default(),
            AlarmConfig::default(),
        );
        control.init();
        assert_eq!(control.indicator().0, Some(COLOR_READY));
        assert_eq!(control.haptic().0, Some(AlertLevel::NoAlert));
    }

    #[test]
    fn unstarted_channel_skips_cycles() {
        let state = SharedAlertState::new();
        let mut control = ControlLoop::new(
            WifiAlertChannel::new(&state),
            NoButton,
            LastColor::default(),
            LastHaptic::default(),
            AlarmConfig::default(),
        );
        for _ in 0..5 {
            assert_eq!(control.cycle(), DeviceState::Ready);
        }
        assert_eq!(control.indicator().0, None);
    }

    #[test]
    fn remote_level_raises_alarm() {
        let state = SharedAlertState::new();
        let mut control = ControlLoop::new(
            WifiAlertChannel::new(&state),
            NoButton,
            LastColor::default(),
            LastHaptic::default(),
            AlarmConfig::default(),
        );
        control.channel().start();
        state.store_remote_level(AlertLevel::Mild);

        assert_eq!(control.cycle(), DeviceState::AlarmMild);
        assert_eq!(control.haptic().0, Some(AlertLevel::Mild));
    }
}
