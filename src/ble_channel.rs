//! BLE-backed alert channel
//!
//! Holds the value of the Alert Level characteristic of the Immediate Alert
//! service. The GATT server task reads and writes the raw value on behalf of
//! the central, the control loop reads and validates it once per cycle.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info};

use crate::AlertError;
use crate::channel::{AlertChannel, StartOutcome};
use crate::level::AlertLevel;

/// UUID of the Immediate Alert service
pub const SERVICE_UUID_IMMEDIATE_ALERT: u16 = 0x1802;

/// Largest value a central may store in the characteristic
pub const MAX_VALUE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawValue {
    bytes: [u8; MAX_VALUE_LEN],
    /// Length as written, may exceed `MAX_VALUE_LEN`
    len: usize,
}

impl RawValue {
    const EMPTY: Self = Self {
        bytes: [0; MAX_VALUE_LEN],
        len: 0,
    };

    fn single(byte: u8) -> Self {
        let mut value = Self::EMPTY;
        value.bytes[0] = byte;
        value.len = 1;
        value
    }

    fn from_slice(data: &[u8]) -> Self {
        let mut value = Self::EMPTY;
        let stored = data.len().min(MAX_VALUE_LEN);
        value.bytes[..stored].copy_from_slice(&data[..stored]);
        value.len = data.len();
        value
    }

    fn stored(&self) -> &[u8] {
        &self.bytes[..self.len.min(MAX_VALUE_LEN)]
    }
}

#[derive(Debug, Clone, Copy)]
struct CharacteristicState {
    value: RawValue,
    started: bool,
}

/// Alert Level characteristic value, shared with the GATT server task
pub struct AlertLevelCharacteristic {
    state: Mutex<CriticalSectionRawMutex, Cell<CharacteristicState>>,
    notification: Signal<CriticalSectionRawMutex, u8>,
}

impl AlertLevelCharacteristic {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(CharacteristicState {
                value: RawValue::EMPTY,
                started: false,
            })),
            notification: Signal::new(),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut CharacteristicState) -> R) -> R {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    fn snapshot(&self) -> CharacteristicState {
        self.state.lock(|cell| cell.get())
    }

    pub fn is_started(&self) -> bool {
        self.snapshot().started
    }

    /// Read request from the central. Returns the number of bytes copied.
    pub fn read_value(&self, out: &mut [u8]) -> usize {
        let value = self.snapshot().value;
        let stored = value.stored();
        let len = stored.len().min(out.len());
        out[..len].copy_from_slice(&stored[..len]);
        len
    }

    /// Write request from the central. The value is stored unchecked; the
    /// control loop rejects it on its next read if it is not a valid level.
    pub fn write_value(&self, data: &[u8]) {
        debug!("[BLE] Central wrote {} bytes: {:02x?}", data.len(), data);
        self.update(|state| state.value = RawValue::from_slice(data));
    }

    /// Level to notify, if a notification is pending
    pub fn take_notification(&self) -> Option<u8> {
        self.notification.try_take()
    }

    /// Wait until a notification is requested
    pub async fn wait_notification(&self) -> u8 {
        self.notification.wait().await
    }

    /// Drop a notification requested while no central was connected
    pub fn discard_notification(&self) {
        if let Some(level) = self.notification.try_take() {
            debug!("[BLE] Dropping notification {} without a central", level);
        }
    }
}

impl Default for AlertLevelCharacteristic {
    fn default() -> Self {
        Self::new()
    }
}

/// Alert channel backed by the Immediate Alert characteristic
pub struct BleAlertChannel<'a> {
    characteristic: &'a AlertLevelCharacteristic,
}

impl<'a> BleAlertChannel<'a> {
    pub fn new(characteristic: &'a AlertLevelCharacteristic) -> Self {
        Self { characteristic }
    }
}

impl AlertChannel for BleAlertChannel<'_> {
    fn start(&self) -> StartOutcome {
        let outcome = self.characteristic.update(|state| {
            if state.started {
                StartOutcome::AlreadyStarted
            } else {
                state.started = true;
                state.value = RawValue::single(AlertLevel::NoAlert.as_u8());
                StartOutcome::Started
            }
        });
        if outcome == StartOutcome::Started {
            info!(
                "[BLE] Immediate Alert service 0x{:04x} ready",
                SERVICE_UUID_IMMEDIATE_ALERT
            );
        }
        outcome
    }

    fn set_alert_level(&self, level: AlertLevel, notify: bool) -> Result<(), AlertError> {
        self.characteristic.update(|state| {
            if !state.started {
                return Err(AlertError::NotReady);
            }
            state.value = RawValue::single(level.as_u8());
            Ok(())
        })?;
        if notify {
            self.characteristic.notification.signal(level.as_u8());
        }
        Ok(())
    }

    fn get_alert_level(&self) -> Result<AlertLevel, AlertError> {
        let state = self.characteristic.snapshot();
        if !state.started {
            return Err(AlertError::NotReady);
        }
        if state.value.len != 1 {
            return Err(AlertError::BadLength(state.value.len));
        }
        AlertLevel::try_from(state.value.bytes[0]).inspect_err(|e| {
            debug!("[BLE] Rejecting characteristic value: {}", e);
        })
    }

    fn is_started(&self) -> bool {
        self.characteristic.is_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> AlertLevelCharacteristic {
        let characteristic = AlertLevelCharacteristic::new();
        BleAlertChannel::new(&characteristic).start();
        characteristic
    }

    #[test]
    fn start_stores_single_zero_byte() {
        let characteristic = started();
        let mut buf = [0xFF; 4];
        assert_eq!(characteristic.read_value(&mut buf), 1);
        assert_eq!(buf[0], 0);
        assert_eq!(characteristic.take_notification(), None);
    }

    #[test]
    fn unstarted_channel_rejects_everything() {
        let characteristic = AlertLevelCharacteristic::new();
        let channel = BleAlertChannel::new(&characteristic);
        assert_eq!(channel.get_alert_level(), Err(AlertError::NotReady));
        assert_eq!(
            channel.set_alert_level(AlertLevel::High, true),
            Err(AlertError::NotReady)
        );
        assert_eq!(characteristic.take_notification(), None);
    }

    #[test]
    fn central_write_is_read_back() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        characteristic.write_value(&[2]);
        assert_eq!(channel.get_alert_level(), Ok(AlertLevel::High));
    }

    #[test]
    fn wrong_length_is_invalid() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        characteristic.write_value(&[1, 1]);
        assert_eq!(channel.get_alert_level(), Err(AlertError::BadLength(2)));
        characteristic.write_value(&[]);
        assert_eq!(channel.get_alert_level(), Err(AlertError::BadLength(0)));
        characteristic.write_value(&[0; 20]);
        assert_eq!(channel.get_alert_level(), Err(AlertError::BadLength(20)));
    }

    #[test]
    fn out_of_range_value_is_invalid() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        characteristic.write_value(&[7]);
        assert_eq!(channel.get_alert_level(), Err(AlertError::InvalidLevel(7)));
    }

    #[test]
    fn set_with_notify_signals_level() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        channel.set_alert_level(AlertLevel::Mild, false).unwrap();
        assert_eq!(characteristic.take_notification(), None);
        channel.set_alert_level(AlertLevel::NoAlert, true).unwrap();
        assert_eq!(characteristic.take_notification(), Some(0));
        assert_eq!(channel.get_alert_level(), Ok(AlertLevel::NoAlert));
    }

    #[test]
    fn notification_without_central_is_dropped() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        channel.set_alert_level(AlertLevel::NoAlert, true).unwrap();
        characteristic.discard_notification();
        assert_eq!(characteristic.take_notification(), None);
        assert_eq!(channel.get_alert_level(), Ok(AlertLevel::NoAlert));

        channel.set_alert_level(AlertLevel::NoAlert, true).unwrap();
        assert_eq!(characteristic.take_notification(), Some(0));
    }

    #[test]
    fn second_start_keeps_value() {
        let characteristic = started();
        let channel = BleAlertChannel::new(&characteristic);
        channel.set_alert_level(AlertLevel::Mild, false).unwrap();
        assert_eq!(channel.start(), StartOutcome::AlreadyStarted);
        assert_eq!(channel.get_alert_level(), Ok(AlertLevel::Mild));
    }

    #[test]
    fn long_value_is_truncated_on_read() {
        let characteristic = started();
        characteristic.write_value(&[9; 12]);
        let mut buf = [0; 16];
        assert_eq!(characteristic.read_value(&mut buf), MAX_VALUE_LEN);
    }
}
