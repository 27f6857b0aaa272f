//! Alert level and device identifier types

use crate::AlertError;

/// Raw byte reported for "no valid level", never a valid level itself
pub const INVALID_LEVEL: u8 = 255;

/// Severity requested by the remote peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum AlertLevel {
    #[default]
    NoAlert = 0,
    Mild = 1,
    High = 2,
}

impl AlertLevel {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Vibration frequency for this level
    pub const fn haptic_frequency_hz(self) -> u32 {
        match self {
            Self::NoAlert => 0,
            Self::Mild => 1,
            Self::High => 2,
        }
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = AlertError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::NoAlert),
            1 => Ok(Self::Mild),
            2 => Ok(Self::High),
            other => Err(AlertError::InvalidLevel(other)),
        }
    }
}

impl From<AlertLevel> for u8 {
    fn from(level: AlertLevel) -> Self {
        level.as_u8()
    }
}

/// Length of the device identifier on the wire
pub const DEVICE_ID_LEN: usize = 6;

/// Unique hardware identifier sent in reply to the id request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId([u8; DEVICE_ID_LEN]);

impl DeviceId {
    /// Keep the lower 48 bits of a 64-bit platform id, most significant byte first
    pub const fn from_platform_id(id: u64) -> Self {
        let b = id.to_be_bytes();
        Self([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// Build the id from the factory base MAC.
    ///
    /// The MAC bytes are packed into the 64-bit id in memory order on a
    /// little-endian core, the same way the chip id is read on the ESP32.
    pub const fn from_mac(mac: [u8; 6]) -> Self {
        let id = u64::from_le_bytes([mac[0], mac[1], mac[2], mac[3], mac[4], mac[5], 0, 0]);
        Self::from_platform_id(id)
    }

    pub const fn as_bytes(&self) -> &[u8; DEVICE_ID_LEN] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_three_levels() {
        assert_eq!(AlertLevel::try_from(0), Ok(AlertLevel::NoAlert));
        assert_eq!(AlertLevel::try_from(1), Ok(AlertLevel::Mild));
        assert_eq!(AlertLevel::try_from(2), Ok(AlertLevel::High));
        for raw in 3..=u8::MAX {
            assert_eq!(AlertLevel::try_from(raw), Err(AlertError::InvalidLevel(raw)));
        }
    }

    #[test]
    fn sentinel_is_not_a_level() {
        assert!(AlertLevel::try_from(INVALID_LEVEL).is_err());
    }

    #[test]
    fn platform_id_drops_top_two_bytes() {
        let id = DeviceId::from_platform_id(0xAABB_1122_3344_5566);
        assert_eq!(id.as_bytes(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }

    #[test]
    fn mac_is_sent_reversed() {
        let id = DeviceId::from_mac([0x24, 0x0a, 0xc4, 0x01, 0x02, 0x03]);
        assert_eq!(id.as_bytes(), &[0x03, 0x02, 0x01, 0xc4, 0x0a, 0x24]);
    }

    #[test]
    fn haptic_frequencies() {
        assert_eq!(AlertLevel::NoAlert.haptic_frequency_hz(), 0);
        assert_eq!(AlertLevel::Mild.haptic_frequency_hz(), 1);
        assert_eq!(AlertLevel::High.haptic_frequency_hz(), 2);
    }
}
