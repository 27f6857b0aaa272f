#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Wearable Alert Board Library
//!
//! This library provides the alarm core of a wearable alert device: an alert
//! level channel (BLE Immediate Alert characteristic or TCP socket), the byte
//! protocol spoken on the TCP socket, and the alarm state machine that drives
//! the RGB indicator and the vibration motor once per control cycle.

pub mod ble_channel;
pub mod button;
pub mod channel;
pub mod control;
pub mod haptic;
pub mod led_control;
pub mod level;
pub mod protocol;
pub mod state_machine;
pub mod tcp_server;
pub mod wifi_channel;

#[cfg(feature = "esp32c3")]
pub mod ble_gatt;
#[cfg(feature = "esp32c3")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0";

/// Default configuration constants
pub mod config {
    use embassy_time::Duration;

    /// TCP port of the alert socket
    pub const ALERT_PORT: u16 = 8266;

    /// Status LED (WS2812) data GPIO pin
    pub const LED_DATA_PIN: u8 = 8;

    /// User button GPIO pin (active low, internal pull-up)
    pub const BUTTON_PIN: u8 = 9;

    /// Vibration motor GPIO pin
    pub const MOTOR_PIN: u8 = 10;

    /// Fixed cycle time of the control loop
    pub const CYCLE_TIME: Duration = Duration::from_millis(50);

    /// Number of cycles between two alarm colour shades
    pub const ALARM_BLINK_NUM_CYCLES: u32 = 10;

    /// Number of cycles an alarm must be on before the button may dismiss it
    pub const ALARM_MIN_NUM_CYCLES: u32 = 20;

    /// Delay between two iterations of a TCP client session
    pub const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Delay before accepting the next TCP client
    pub const ACCEPT_INTERVAL: Duration = Duration::from_millis(500);

    /// Keep-alive interval on the alert socket
    pub const TCP_KEEP_ALIVE: Duration = Duration::from_secs(5);

    /// A client silent for this long is dropped so the next one can connect
    pub const TCP_TIMEOUT: Duration = Duration::from_secs(15);

    /// TCP socket buffer sizes
    pub const TCP_RX_BUFFER_SIZE: usize = 256;
    pub const TCP_TX_BUFFER_SIZE: usize = 256;

    /// BLE device name used in advertising
    pub const BLE_DEVICE_NAME: &str = "ESP32_Alert";

    /// Transport selected at build time: "wifi" (TCP socket) or "ble"
    pub const ALERT_TRANSPORT: &str = env!("ALERT_TRANSPORT");

    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// WiFi reconnection interval
    pub const WIFI_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);
}

/// Error types for the alert board
///
/// None of these are fatal: the control loop and the TCP server log them and
/// carry on at their fixed cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertError {
    /// A level outside {0, 1, 2} was offered or read back
    InvalidLevel(u8),
    /// The channel was used before `start()`
    NotReady,
    /// The characteristic holds a value of unexpected length
    BadLength(usize),
    /// Unknown byte on the TCP protocol
    UnknownCommand(u8),
    /// Bytes were announced but the read returned none
    Receive,
    /// The connection failed or was reset by the peer
    Link,
    /// WiFi connection error
    WiFiError,
    /// BLE controller or attribute server error
    BleError,
}

impl core::fmt::Display for AlertError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidLevel(raw) => write!(f, "invalid alert level {}", raw),
            Self::NotReady => write!(f, "alert channel not started"),
            Self::BadLength(len) => write!(f, "alert level value has length {}", len),
            Self::UnknownCommand(byte) => write!(f, "unknown request 0x{:02x}", byte),
            Self::Receive => write!(f, "RX error"),
            Self::Link => write!(f, "connection error"),
            Self::WiFiError => write!(f, "WiFi error"),
            Self::BleError => write!(f, "BLE error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::config;

    #[test]
    fn socket_timeout_outlasts_keep_alive() {
        // Several keep-alives go out before an idle socket times out
        assert!(config::TCP_TIMEOUT > config::TCP_KEEP_ALIVE * 2);
        assert!(config::TCP_KEEP_ALIVE > config::SESSION_POLL_INTERVAL);
    }
}
