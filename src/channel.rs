//! Alert channel capability
//!
//! An alert channel carries the alert level between a remote peer and the
//! control loop. Two transports exist: the BLE Immediate Alert characteristic
//! and a TCP socket. The transport is chosen once at startup.

use core::str::FromStr;

use crate::AlertError;
use crate::ble_channel::BleAlertChannel;
use crate::level::AlertLevel;
use crate::wifi_channel::WifiAlertChannel;

/// Result of [`AlertChannel::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// First start: the caller brings up the transport task
    Started,
    /// Channel was already running, nothing changed
    AlreadyStarted,
}

/// Capability shared by both transports
pub trait AlertChannel {
    /// Mark the channel as running and reset the level to no alert without
    /// notifying. A second call does nothing.
    fn start(&self) -> StartOutcome;

    /// Store a new level. With `notify` set, a connected peer is pushed the
    /// new level.
    fn set_alert_level(&self, level: AlertLevel, notify: bool) -> Result<(), AlertError>;

    /// Last valid level, or the reason none is available this cycle.
    fn get_alert_level(&self) -> Result<AlertLevel, AlertError>;

    /// Validate a raw level before storing it.
    fn set_raw_alert_level(&self, raw: u8, notify: bool) -> Result<(), AlertError> {
        let level = AlertLevel::try_from(raw)?;
        self.set_alert_level(level, notify)
    }

    fn is_started(&self) -> bool;
}

impl<C: AlertChannel + ?Sized> AlertChannel for &C {
    fn start(&self) -> StartOutcome {
        (**self).start()
    }

    fn set_alert_level(&self, level: AlertLevel, notify: bool) -> Result<(), AlertError> {
        (**self).set_alert_level(level, notify)
    }

    fn get_alert_level(&self) -> Result<AlertLevel, AlertError> {
        (**self).get_alert_level()
    }

    fn is_started(&self) -> bool {
        (**self).is_started()
    }
}

/// Transport selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    Ble,
    #[default]
    Wifi,
}

impl FromStr for Transport {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ble") {
            Ok(Self::Ble)
        } else if s.eq_ignore_ascii_case("wifi") || s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Wifi)
        } else {
            Err(())
        }
    }
}

/// The alert channel of the device, one variant per transport
pub enum AlertService<'a> {
    Ble(BleAlertChannel<'a>),
    Wifi(WifiAlertChannel<'a>),
}

impl AlertService<'_> {
    pub fn transport(&self) -> Transport {
        match self {
            Self::Ble(_) => Transport::Ble,
            Self::Wifi(_) => Transport::Wifi,
        }
    }
}

impl AlertChannel for AlertService<'_> {
    fn start(&self) -> StartOutcome {
        match self {
            Self::Ble(channel) => channel.start(),
            Self::Wifi(channel) => channel.start(),
        }
    }

    fn set_alert_level(&self, level: AlertLevel, notify: bool) -> Result<(), AlertError> {
        match self {
            Self::Ble(channel) => channel.set_alert_level(level, notify),
            Self::Wifi(channel) => channel.set_alert_level(level, notify),
        }
    }

    fn get_alert_level(&self) -> Result<AlertLevel, AlertError> {
        match self {
            Self::Ble(channel) => channel.get_alert_level(),
            Self::Wifi(channel) => channel.get_alert_level(),
        }
    }

    fn is_started(&self) -> bool {
        match self {
            Self::Ble(channel) => channel.is_started(),
            Self::Wifi(channel) => channel.is_started(),
        }
    }
}
