//! Alert socket protocol
//!
//! One byte per request, no framing. Bytes 0x00..=0x02 set the alert level,
//! 0x03 asks for the current level (1 byte reply), 0x04 asks for the device
//! id (6 bytes reply, most significant byte first). Anything else is logged
//! and ignored.
//!
//! Only the first byte of a receive burst is interpreted. The rest of the
//! burst is drained and logged so it can never be mistaken for a command on
//! the next iteration.

use embassy_time::Timer;
use log::{debug, info, warn};

use crate::AlertError;
use crate::config;
use crate::level::{AlertLevel, DEVICE_ID_LEN, DeviceId};
use crate::wifi_channel::SharedAlertState;

/// Request byte: query the current level
pub const REQUEST_LEVEL: u8 = 0x03;

/// Request byte: query the device id
pub const REQUEST_DEVICE_ID: u8 = 0x04;

/// Read buffer for one receive burst; longer bursts are drained in chunks
const BURST_CAPACITY: usize = 64;

/// Decoded request byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetLevel(AlertLevel),
    QueryLevel,
    QueryDeviceId,
}

impl Command {
    pub fn parse(byte: u8) -> Result<Self, AlertError> {
        match byte {
            0x00 => Ok(Self::SetLevel(AlertLevel::NoAlert)),
            0x01 => Ok(Self::SetLevel(AlertLevel::Mild)),
            0x02 => Ok(Self::SetLevel(AlertLevel::High)),
            REQUEST_LEVEL => Ok(Self::QueryLevel),
            REQUEST_DEVICE_ID => Ok(Self::QueryDeviceId),
            other => Err(AlertError::UnknownCommand(other)),
        }
    }
}

/// Bytes written back for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    bytes: [u8; DEVICE_ID_LEN],
    len: usize,
}

impl Reply {
    pub const NONE: Self = Self {
        bytes: [0; DEVICE_ID_LEN],
        len: 0,
    };

    pub fn level(level: AlertLevel) -> Self {
        let mut reply = Self::NONE;
        reply.bytes[0] = level.as_u8();
        reply.len = 1;
        reply
    }

    pub fn device_id(id: DeviceId) -> Self {
        Self {
            bytes: *id.as_bytes(),
            len: DEVICE_ID_LEN,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One accepted client connection
#[allow(async_fn_in_trait)]
pub trait AlertLink {
    /// Number of received bytes waiting to be read
    fn pending(&self) -> usize;

    /// Whether the peer is still connected or unread data remains
    fn is_open(&self) -> bool;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AlertError>;

    /// Write all bytes and push them out on the wire
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AlertError>;
}

/// Interprets requests on the alert socket
pub struct ProtocolHandler<'a> {
    state: &'a SharedAlertState,
    device_id: DeviceId,
}

impl<'a> ProtocolHandler<'a> {
    pub fn new(state: &'a SharedAlertState, device_id: DeviceId) -> Self {
        Self { state, device_id }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Execute one request byte and build its reply
    pub fn dispatch(&self, byte: u8) -> Reply {
        match Command::parse(byte) {
            Ok(Command::SetLevel(level)) => {
                self.state.store_remote_level(level);
                info!("[TCP] Alert level set to {}", level.as_u8());
                Reply::NONE
            }
            Ok(Command::QueryLevel) => Reply::level(self.state.level()),
            Ok(Command::QueryDeviceId) => {
                info!("[TCP] Device id {:02X?}", self.device_id.as_bytes());
                Reply::device_id(self.device_id)
            }
            Err(e) => {
                warn!("[TCP] {}", e);
                Reply::NONE
            }
        }
    }

    /// One session iteration: push a pending notification, then interpret
    /// the first byte of whatever burst has arrived.
    pub async fn serve_iteration<L: AlertLink>(&self, link: &mut L) -> Result<(), AlertError> {
        if let Some(level) = self.state.take_notification() {
            link.write_all(&[level.as_u8()]).await?;
            info!("[TCP] Sent 1 byte: {} (server notification)", level.as_u8());
        }

        let available = link.pending();
        if available == 0 {
            return Ok(());
        }

        let mut burst = [0u8; BURST_CAPACITY];
        let received = link.read(&mut burst[..available.min(BURST_CAPACITY)]).await?;
        if received == 0 {
            warn!("[TCP] {} ({} bytes announced)", AlertError::Receive, available);
            return Ok(());
        }

        let command = burst[0];
        info!(
            "[TCP] Received {} bytes: {:02x?}",
            available,
            &burst[..received]
        );

        let mut drained = received;
        while drained < available {
            let chunk = (available - drained).min(BURST_CAPACITY);
            let n = link.read(&mut burst[..chunk]).await?;
            if n == 0 {
                break;
            }
            debug!("[TCP] Drained {} bytes: {:02x?}", n, &burst[..n]);
            drained += n;
        }

        let reply = self.dispatch(command);
        if !reply.is_empty() {
            link.write_all(reply.as_bytes()).await?;
            info!(
                "[TCP] Sent {} bytes: {:02x?} (response)",
                reply.as_bytes().len(),
                reply.as_bytes()
            );
        }

        Ok(())
    }

    /// Serve one client until it disconnects or the link fails
    pub async fn serve<L: AlertLink>(&self, link: &mut L) {
        while link.is_open() {
            if let Err(e) = self.serve_iteration(link).await {
                warn!("[TCP] Session ended: {}", e);
                break;
            }
            Timer::after(config::SESSION_POLL_INTERVAL).await;
        }
    }
}
