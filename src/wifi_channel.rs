//! TCP-backed alert channel
//!
//! The level and the pending-notify flag are shared between the TCP server
//! task and the control loop. The server writes the level when a remote
//! command arrives, the control loop writes it when the user dismisses the
//! alarm. Both go through one critical-section mutex so the pair is always
//! read and written as a whole.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info};

use crate::AlertError;
use crate::channel::{AlertChannel, StartOutcome};
use crate::level::AlertLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChannelState {
    level: AlertLevel,
    notify_pending: bool,
    started: bool,
}

/// Alert level shared between the TCP server task and the control loop
pub struct SharedAlertState {
    inner: Mutex<CriticalSectionRawMutex, Cell<ChannelState>>,
}

impl SharedAlertState {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(ChannelState {
                level: AlertLevel::NoAlert,
                notify_pending: false,
                started: false,
            })),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut ChannelState) -> R) -> R {
        self.inner.lock(|cell| {
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    fn snapshot(&self) -> ChannelState {
        self.inner.lock(|cell| cell.get())
    }

    pub fn level(&self) -> AlertLevel {
        self.snapshot().level
    }

    pub fn is_started(&self) -> bool {
        self.snapshot().started
    }

    pub fn is_notify_pending(&self) -> bool {
        self.snapshot().notify_pending
    }

    /// Level written by a remote command. Never schedules a notification.
    pub fn store_remote_level(&self, level: AlertLevel) {
        self.update(|state| state.level = level);
    }

    /// Clear the pending-notify flag and return the level to push, if any
    pub fn take_notification(&self) -> Option<AlertLevel> {
        self.update(|state| {
            if state.notify_pending {
                state.notify_pending = false;
                Some(state.level)
            } else {
                None
            }
        })
    }
}

impl Default for SharedAlertState {
    fn default() -> Self {
        Self::new()
    }
}

/// Alert channel backed by the TCP alert socket
pub struct WifiAlertChannel<'a> {
    state: &'a SharedAlertState,
}

impl<'a> WifiAlertChannel<'a> {
    pub fn new(state: &'a SharedAlertState) -> Self {
        Self { state }
    }
}

impl AlertChannel for WifiAlertChannel<'_> {
    fn start(&self) -> StartOutcome {
        let outcome = self.state.update(|state| {
            if state.started {
                StartOutcome::AlreadyStarted
            } else {
                state.started = true;
                state.level = AlertLevel::NoAlert;
                state.notify_pending = false;
                StartOutcome::Started
            }
        });
        match outcome {
            StartOutcome::Started => info!("[TCP] Alert channel started"),
            StartOutcome::AlreadyStarted => debug!("[TCP] Alert channel already started"),
        }
        outcome
    }

    fn set_alert_level(&self, level: AlertLevel, notify: bool) -> Result<(), AlertError> {
        self.state.update(|state| {
            if !state.started {
                return Err(AlertError::NotReady);
            }
            state.level = level;
            state.notify_pending = notify;
            Ok(())
        })
    }

    fn get_alert_level(&self) -> Result<AlertLevel, AlertError> {
        let state = self.state.snapshot();
        if state.started {
            Ok(state.level)
        } else {
            Err(AlertError::NotReady)
        }
    }

    fn is_started(&self) -> bool {
        self.state.is_started()
    }
}
