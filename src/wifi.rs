//! WiFi module for ESP32-C3 board
//!
//! Keeps the station associated with the configured access point and waits
//! for DHCP on the embassy-net stack. Only used with the TCP transport.

use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use esp_wifi::wifi::{
    AuthMethod, ClientConfiguration, Configuration, WifiController, WifiEvent,
};
use log::{info, warn};

use crate::{AlertError, config};

/// Attempts to wait for a DHCP lease after association
const DHCP_POLL_ATTEMPTS: u8 = 30;
const DHCP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// WiFi manager for handling network connectivity
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
    is_connected: bool,
}

impl<'a> WiFiManager<'a> {
    /// Create a new WiFi manager instance
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self {
            controller,
            stack,
            is_connected: false,
        }
    }

    /// Configure the station and start the radio if needed
    async fn ensure_started(&mut self, ssid: &str, password: &str) -> Result<(), AlertError> {
        if matches!(self.controller.is_started(), Ok(true)) {
            return Ok(());
        }

        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| AlertError::WiFiError)?,
            password: password.try_into().map_err(|_| AlertError::WiFiError)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| AlertError::WiFiError)?;

        info!("[WIFI] Starting WiFi station");
        self.controller
            .start_async()
            .await
            .map_err(|_| AlertError::WiFiError)
    }

    /// Connect to WiFi network and wait for an IPv4 address
    pub async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), AlertError> {
        self.ensure_started(ssid, password).await?;

        info!("[WIFI] Connecting to WiFi network: {}", ssid);
        if let Err(e) = self.controller.connect_async().await {
            warn!("[WIFI] Connect failed: {:?}", e);
            return Err(AlertError::WiFiError);
        }
        self.is_connected = true;

        for _ in 0..DHCP_POLL_ATTEMPTS {
            if self.stack.is_config_up() {
                break;
            }
            Timer::after(DHCP_POLL_INTERVAL).await;
        }

        match self.get_ip_address() {
            Some(ip) => {
                info!(
                    "[WIFI] DHCP assigned IP address: {}.{}.{}.{}",
                    ip[0], ip[1], ip[2], ip[3]
                );
                Ok(())
            }
            None => {
                warn!("[WIFI] DHCP configuration not available");
                let _ = self.controller.disconnect_async().await;
                self.is_connected = false;
                Err(AlertError::WiFiError)
            }
        }
    }

    /// Get current IP address from DHCP
    pub fn get_ip_address(&self) -> Option<[u8; 4]> {
        if !self.is_connected {
            return None;
        }
        self.stack
            .config_v4()
            .map(|config| config.address.address().octets())
    }

    /// Check if WiFi is connected
    pub fn is_connected(&self) -> bool {
        self.is_connected && self.controller.is_connected().unwrap_or(false)
    }

    /// Connect, wait for the link to drop, reconnect. Never returns.
    pub async fn run(&mut self) -> ! {
        loop {
            match self.connect(config::WIFI_SSID, config::WIFI_PASSWORD).await {
                Ok(()) => {
                    self.controller
                        .wait_for_event(WifiEvent::StaDisconnected)
                        .await;
                    self.is_connected = false;
                    warn!("[WIFI] WiFi connection lost!");
                }
                Err(e) => warn!("[WIFI] {}", e),
            }
            Timer::after(config::WIFI_RECONNECT_INTERVAL).await;
        }
    }
}
