//! Alarm state machine module
//!
//! Decides, once per control cycle, how the device reacts to the alert level
//! read from the channel and to the user button.

use heapless::Vec;
use log::{debug, info};
use smart_leds::RGB8;

use crate::config;
use crate::led_control::{COLOR_READY, alarm_color};
use crate::level::AlertLevel;

/// Device states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    // Idle, no alarm signalled
    Ready,

    // Graded mode
    AlarmMild,
    AlarmHigh,

    // Binary mode
    Alarm,
}

/// Which state table the machine follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmMode {
    /// READY / ALARM_MILD / ALARM_HIGH
    #[default]
    Graded,
    /// READY / ALARM, mild and high share one alarm state
    Binary,
}

/// Tunable parameters of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmConfig {
    pub mode: AlarmMode,
    /// Cycles between two colour shades
    pub blink_cycles: u32,
    /// Cycles before the button may dismiss the alarm
    pub min_on_cycles: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            mode: AlarmMode::Graded,
            blink_cycles: config::ALARM_BLINK_NUM_CYCLES,
            min_on_cycles: config::ALARM_MIN_NUM_CYCLES,
        }
    }
}

/// Actions the control loop executes for the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Draw a colour on the status LED
    ShowColor(RGB8),
    /// Vibrate with the pattern of this level
    SetHaptic(AlertLevel),
    /// Write level 0 back to the channel and notify the peer
    ClearRemoteLevel,
}

/// At most three actions are emitted per cycle
pub type Actions = Vec<Action, 3>;

/// Transition result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// No information this cycle, nothing changes
    Skip,
    /// Stay in the current state
    Stay,
    /// Enter (or switch) alarm state
    Activate(DeviceState, AlertLevel),
    /// Back to ready; `dismissed` when the user pressed the button
    Deactivate { dismissed: bool },
    /// Keep signalling the current alarm
    Continue,
}

/// Alarm state machine
pub struct AlarmStateMachine {
    current_state: DeviceState,
    previous_state: Option<DeviceState>,
    config: AlarmConfig,
    /// Cycles since the alarm was raised, 0 in READY
    on_cycles: u32,
    /// false = first shade, true = second shade
    blink_phase: bool,
}

impl AlarmStateMachine {
    /// Create a new state machine instance
    pub fn new(config: AlarmConfig) -> Self {
        Self {
            current_state: DeviceState::Ready,
            previous_state: None,
            config,
            on_cycles: 0,
            blink_phase: false,
        }
    }

    /// Get the current state
    pub fn get_current_state(&self) -> DeviceState {
        self.current_state
    }

    /// Get the previous state
    pub fn get_previous_state(&self) -> Option<DeviceState> {
        self.previous_state
    }

    pub fn get_on_cycles(&self) -> u32 {
        self.on_cycles
    }

    /// Colour currently shown for the state
    pub fn get_color(&self) -> RGB8 {
        match self.current_state {
            DeviceState::Ready => COLOR_READY,
            state => alarm_color(state, self.blink_phase),
        }
    }

    /// Process one control cycle. `level` is `None` when the channel had no
    /// valid level this cycle.
    pub fn step(&mut self, level: Option<AlertLevel>, button_released: bool) -> Actions {
        let transition = self.get_state_transition(level, button_released);
        let mut actions = Actions::new();

        match transition {
            StateTransition::Skip | StateTransition::Stay => {}
            StateTransition::Activate(state, level) => {
                if self.current_state == DeviceState::Ready {
                    self.on_cycles = 1;
                }
                self.blink_phase = false;
                self.transition_to_state(state);
                let _ = actions.push(Action::ShowColor(self.get_color()));
                let _ = actions.push(Action::SetHaptic(level));
            }
            StateTransition::Deactivate { dismissed } => {
                if dismissed {
                    let _ = actions.push(Action::ClearRemoteLevel);
                }
                self.on_cycles = 0;
                self.blink_phase = false;
                self.transition_to_state(DeviceState::Ready);
                let _ = actions.push(Action::SetHaptic(AlertLevel::NoAlert));
                let _ = actions.push(Action::ShowColor(COLOR_READY));
            }
            StateTransition::Continue => {
                if self.on_cycles % self.config.blink_cycles.max(1) == 0 {
                    self.blink_phase = !self.blink_phase;
                    let _ = actions.push(Action::ShowColor(self.get_color()));
                }
                self.on_cycles = self.on_cycles.saturating_add(1);
            }
        }

        actions
    }

    /// Internal state change
    fn transition_to_state(&mut self, new_state: DeviceState) {
        if new_state != self.current_state {
            match new_state {
                DeviceState::Ready => info!("[ALARM] Alarm off"),
                state => info!("[ALARM] {:?}", state),
            }
            self.previous_state = Some(self.current_state);
            self.current_state = new_state;
        }
    }

    /// Alarm state for a non-zero level in the configured mode
    fn alarm_state_for(&self, level: AlertLevel) -> DeviceState {
        match (self.config.mode, level) {
            (AlarmMode::Binary, _) => DeviceState::Alarm,
            (AlarmMode::Graded, AlertLevel::High) => DeviceState::AlarmHigh,
            (AlarmMode::Graded, _) => DeviceState::AlarmMild,
        }
    }

    /// Transition rules
    fn get_state_transition(
        &self,
        level: Option<AlertLevel>,
        button_released: bool,
    ) -> StateTransition {
        let Some(level) = level else {
            debug!("[ALARM] No valid alert level, skipping cycle");
            return StateTransition::Skip;
        };

        match (self.current_state, level) {
            (DeviceState::Ready, AlertLevel::NoAlert) => StateTransition::Stay,
            (DeviceState::Ready, level) => {
                StateTransition::Activate(self.alarm_state_for(level), level)
            }

            // Level changed between mild and high
            (DeviceState::AlarmMild, AlertLevel::High) => {
                StateTransition::Activate(DeviceState::AlarmHigh, level)
            }
            (DeviceState::AlarmHigh, AlertLevel::Mild) => {
                StateTransition::Activate(DeviceState::AlarmMild, level)
            }

            // Remote peer cleared the alarm
            (_, AlertLevel::NoAlert) => StateTransition::Deactivate { dismissed: false },

            // User dismissed the alarm
            _ if button_released && self.on_cycles >= self.config.min_on_cycles => {
                StateTransition::Deactivate { dismissed: true }
            }

            _ => StateTransition::Continue,
        }
    }

    /// Force the ready state, e.g. after a restart of the control loop
    pub fn reset(&mut self) {
        self.on_cycles = 0;
        self.blink_phase = false;
        self.transition_to_state(DeviceState::Ready);
    }
}

impl Default for AlarmStateMachine {
    fn default() -> Self {
        Self::new(AlarmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led_control::{COLOR_ALARM_HIGH, COLOR_ALARM_MILD};

    fn raise(sm: &mut AlarmStateMachine, level: AlertLevel) -> Actions {
        sm.step(Some(level), false)
    }

    #[test]
    fn ready_stays_ready_on_zero() {
        let mut sm = AlarmStateMachine::default();
        assert!(sm.step(Some(AlertLevel::NoAlert), true).is_empty());
        assert_eq!(sm.get_current_state(), DeviceState::Ready);
    }

    #[test]
    fn mild_then_high() {
        let mut sm = AlarmStateMachine::default();
        let actions = raise(&mut sm, AlertLevel::Mild);
        assert_eq!(sm.get_current_state(), DeviceState::AlarmMild);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::ShowColor(COLOR_ALARM_MILD[0]),
                Action::SetHaptic(AlertLevel::Mild)
            ]
        );

        let actions = raise(&mut sm, AlertLevel::High);
        assert_eq!(sm.get_current_state(), DeviceState::AlarmHigh);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::ShowColor(COLOR_ALARM_HIGH[0]),
                Action::SetHaptic(AlertLevel::High)
            ]
        );
        assert_eq!(sm.get_previous_state(), Some(DeviceState::AlarmMild));
    }

    #[test]
    fn high_back_to_mild_recolours_and_resets_blink() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::High);
        for _ in 0..10 {
            sm.step(Some(AlertLevel::High), false);
        }
        assert_eq!(sm.get_color(), COLOR_ALARM_HIGH[1]);
        let cycles = sm.get_on_cycles();

        let actions = raise(&mut sm, AlertLevel::Mild);
        assert_eq!(sm.get_current_state(), DeviceState::AlarmMild);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::ShowColor(COLOR_ALARM_MILD[0]),
                Action::SetHaptic(AlertLevel::Mild)
            ]
        );
        assert_eq!(sm.get_on_cycles(), cycles);
        assert_eq!(sm.get_previous_state(), Some(DeviceState::AlarmHigh));
    }

    #[test]
    fn ready_jumps_straight_to_high() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::High);
        assert_eq!(sm.get_current_state(), DeviceState::AlarmHigh);
        assert_eq!(sm.get_on_cycles(), 1);
    }

    #[test]
    fn invalid_read_changes_nothing() {
        let mut sm = AlarmStateMachine::default();
        assert!(sm.step(None, true).is_empty());
        assert_eq!(sm.get_current_state(), DeviceState::Ready);

        raise(&mut sm, AlertLevel::Mild);
        let cycles = sm.get_on_cycles();
        assert!(sm.step(None, true).is_empty());
        assert_eq!(sm.get_current_state(), DeviceState::AlarmMild);
        assert_eq!(sm.get_on_cycles(), cycles);
    }

    #[test]
    fn remote_clear_returns_to_ready() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::High);
        let actions = raise(&mut sm, AlertLevel::NoAlert);
        assert_eq!(sm.get_current_state(), DeviceState::Ready);
        assert_eq!(sm.get_on_cycles(), 0);
        assert!(!actions.contains(&Action::ClearRemoteLevel));
        assert!(actions.contains(&Action::SetHaptic(AlertLevel::NoAlert)));
        assert!(actions.contains(&Action::ShowColor(COLOR_READY)));
    }

    #[test]
    fn button_ignored_before_min_cycles() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::High);
        while sm.get_on_cycles() < config::ALARM_MIN_NUM_CYCLES {
            let actions = sm.step(Some(AlertLevel::High), true);
            assert!(!actions.contains(&Action::ClearRemoteLevel));
            assert_eq!(sm.get_current_state(), DeviceState::AlarmHigh);
        }

        let actions = sm.step(Some(AlertLevel::High), true);
        assert_eq!(actions[0], Action::ClearRemoteLevel);
        assert_eq!(sm.get_current_state(), DeviceState::Ready);
    }

    #[test]
    fn blink_toggles_every_ten_cycles() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::Mild);

        let mut shades = std::vec::Vec::new();
        for _ in 0..30 {
            for action in sm.step(Some(AlertLevel::Mild), false) {
                if let Action::ShowColor(color) = action {
                    shades.push((sm.get_on_cycles() - 1, color));
                }
            }
        }
        assert_eq!(
            shades,
            std::vec![
                (10, COLOR_ALARM_MILD[1]),
                (20, COLOR_ALARM_MILD[0]),
                (30, COLOR_ALARM_MILD[1]),
            ]
        );
    }

    #[test]
    fn level_switch_resets_blink_but_not_counter() {
        let mut sm = AlarmStateMachine::default();
        raise(&mut sm, AlertLevel::Mild);
        for _ in 0..10 {
            sm.step(Some(AlertLevel::Mild), false);
        }
        assert_eq!(sm.get_color(), COLOR_ALARM_MILD[1]);
        let cycles = sm.get_on_cycles();

        raise(&mut sm, AlertLevel::High);
        assert_eq!(sm.get_color(), COLOR_ALARM_HIGH[0]);
        assert_eq!(sm.get_on_cycles(), cycles);
    }

    #[test]
    fn binary_mode_has_single_alarm_state() {
        let mut sm = AlarmStateMachine::new(AlarmConfig {
            mode: AlarmMode::Binary,
            ..AlarmConfig::default()
        });
        raise(&mut sm, AlertLevel::Mild);
        assert_eq!(sm.get_current_state(), DeviceState::Alarm);

        let actions = raise(&mut sm, AlertLevel::High);
        assert_eq!(sm.get_current_state(), DeviceState::Alarm);
        assert!(!actions.contains(&Action::SetHaptic(AlertLevel::High)));

        raise(&mut sm, AlertLevel::NoAlert);
        assert_eq!(sm.get_current_state(), DeviceState::Ready);
    }

    #[test]
    fn binary_mode_button_dismisses_after_min_cycles() {
        let mut sm = AlarmStateMachine::new(AlarmConfig {
            mode: AlarmMode::Binary,
            ..AlarmConfig::default()
        });
        raise(&mut sm, AlertLevel::Mild);
        for _ in 1..config::ALARM_MIN_NUM_CYCLES {
            let actions = sm.step(Some(AlertLevel::Mild), true);
            assert!(!actions.contains(&Action::ClearRemoteLevel));
            assert_eq!(sm.get_current_state(), DeviceState::Alarm);
        }

        let actions = sm.step(Some(AlertLevel::Mild), true);
        assert_eq!(
            actions.as_slice(),
            &[
                Action::ClearRemoteLevel,
                Action::SetHaptic(AlertLevel::NoAlert),
                Action::ShowColor(COLOR_READY)
            ]
        );
        assert_eq!(sm.get_current_state(), DeviceState::Ready);
    }
}
