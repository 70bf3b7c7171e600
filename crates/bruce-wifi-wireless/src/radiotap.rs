//! Radiotap header handling for replayed captures
//!
//! Monitor-mode captures usually carry a radiotap header in front of every
//! 802.11 frame. The replay radio strips it and keeps the signal strength and
//! channel so the frame reaches the classifier the way a live driver hands it.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, WirelessError};

/// Fixed part of every radiotap header: version, pad, length, first present word
const FIXED_LEN: usize = 8;

/// Bit in a present word announcing another present word
const EXT_BIT: u32 = 1 << 31;

/// Radiotap present flags walked by [`RadiotapInfo::parse`]
#[derive(Debug, Clone, Copy)]
#[repr(u32)]
pub enum RadiotapField {
    /// TSFT (timestamp)
    Tsft = 0,
    /// Flags
    Flags = 1,
    /// Data rate
    Rate = 2,
    /// Channel frequency and flags
    Channel = 3,
    /// FHSS hop set and pattern
    Fhss = 4,
    /// dBm antenna signal
    AntennaSignal = 5,
    /// dBm antenna noise
    AntennaNoise = 6,
}

impl RadiotapField {
    const WALKED: [RadiotapField; 7] = [
        Self::Tsft,
        Self::Flags,
        Self::Rate,
        Self::Channel,
        Self::Fhss,
        Self::AntennaSignal,
        Self::AntennaNoise,
    ];

    /// (alignment, size) in bytes
    fn layout(self) -> (usize, usize) {
        match self {
            Self::Tsft => (8, 8),
            Self::Flags | Self::Rate => (1, 1),
            Self::Channel => (2, 4),
            Self::Fhss => (1, 2),
            Self::AntennaSignal | Self::AntennaNoise => (1, 1),
        }
    }

    fn is_set(self, present: u32) -> bool {
        present & (1 << self as u32) != 0
    }
}

/// Split a radiotap-prefixed frame into (header, 802.11 frame)
pub fn split(data: &[u8]) -> Result<(&[u8], &[u8])> {
    if data.len() < FIXED_LEN {
        return Err(WirelessError::InvalidFrame("Radiotap header too short".into()));
    }

    if data[0] != 0 {
        return Err(WirelessError::InvalidFrame(format!(
            "Unknown radiotap version: {}",
            data[0]
        )));
    }

    let len = LittleEndian::read_u16(&data[2..4]) as usize;
    if len < FIXED_LEN || data.len() < len {
        return Err(WirelessError::InvalidFrame(format!(
            "Radiotap header length {} does not fit data length {}",
            len,
            data.len()
        )));
    }

    Ok(data.split_at(len))
}

/// Convert WiFi channel number to frequency in MHz
pub fn channel_to_frequency(channel: u8) -> Option<u16> {
    match channel {
        1..=13 => Some(2407 + channel as u16 * 5),
        14 => Some(2484),
        36..=177 => Some(5000 + channel as u16 * 5),
        _ => None,
    }
}

/// Convert frequency in MHz to WiFi channel number
pub fn frequency_to_channel(freq: u16) -> Option<u8> {
    match freq {
        2412..=2472 => Some(((freq - 2407) / 5) as u8),
        2484 => Some(14),
        5180..=5885 => Some(((freq - 5000) / 5) as u8),
        _ => None,
    }
}

/// Fields pulled out of a radiotap header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadiotapInfo {
    /// Signal strength in dBm
    pub signal_dbm: Option<i8>,
    /// Noise in dBm
    pub noise_dbm: Option<i8>,
    /// Data rate in 500kbps units
    pub rate: Option<u8>,
    /// Channel frequency in MHz
    pub frequency: Option<u16>,
    /// Channel number derived from frequency
    pub channel: Option<u8>,
}

impl RadiotapInfo {
    /// Walk the first present word of a header returned by [`split`].
    ///
    /// Fields past antenna noise are not needed and stop the walk; a
    /// truncated header yields whatever was read before the cut.
    pub fn parse(header: &[u8]) -> Self {
        let mut info = Self::default();
        if header.len() < FIXED_LEN {
            return info;
        }

        let present = LittleEndian::read_u32(&header[4..8]);

        // Skip extended present words
        let mut offset = FIXED_LEN;
        let mut word = present;
        while word & EXT_BIT != 0 {
            let Some(next) = header.get(offset..offset + 4) else {
                return info;
            };
            word = LittleEndian::read_u32(next);
            offset += 4;
        }

        for field in RadiotapField::WALKED {
            if !field.is_set(present) {
                continue;
            }
            let (align, size) = field.layout();
            offset = (offset + align - 1) & !(align - 1);
            let Some(bytes) = header.get(offset..offset + size) else {
                break;
            };
            match field {
                RadiotapField::Rate => info.rate = Some(bytes[0]),
                RadiotapField::Channel => {
                    let freq = LittleEndian::read_u16(&bytes[0..2]);
                    info.frequency = Some(freq);
                    info.channel = frequency_to_channel(freq);
                }
                RadiotapField::AntennaSignal => info.signal_dbm = Some(bytes[0] as i8),
                RadiotapField::AntennaNoise => info.noise_dbm = Some(bytes[0] as i8),
                _ => {}
            }
            offset += size;
        }

        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_frequency() {
        assert_eq!(channel_to_frequency(1), Some(2412));
        assert_eq!(channel_to_frequency(6), Some(2437));
        assert_eq!(channel_to_frequency(11), Some(2462));
        assert_eq!(channel_to_frequency(36), Some(5180));
        assert_eq!(channel_to_frequency(0), None);
    }

    #[test]
    fn test_frequency_channel() {
        assert_eq!(frequency_to_channel(2412), Some(1));
        assert_eq!(frequency_to_channel(2437), Some(6));
        assert_eq!(frequency_to_channel(2484), Some(14));
        assert_eq!(frequency_to_channel(5180), Some(36));
        assert_eq!(frequency_to_channel(900), None);
    }

    #[test]
    fn test_split_rejects_bad_headers() {
        assert!(split(&[0x00, 0x00, 0x08]).is_err());
        assert!(split(&[0x01, 0x00, 0x08, 0x00, 0, 0, 0, 0]).is_err());
        assert!(split(&[0x00, 0x00, 0x20, 0x00, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_parse_flags_rate_channel_signal() {
        // flags | rate | channel | antenna signal
        let present: u32 = (1 << 1) | (1 << 2) | (1 << 3) | (1 << 5);
        let mut data = vec![0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(&present.to_le_bytes());
        data.push(0x10); // flags
        data.push(0x02); // rate
        data.extend_from_slice(&2437u16.to_le_bytes());
        data.extend_from_slice(&0x00A0u16.to_le_bytes());
        data.push((-42i8) as u8);
        let len = data.len() as u16;
        data[2..4].copy_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&[0x08, 0x02]);

        let (header, frame) = split(&data).unwrap();
        assert_eq!(frame, &[0x08, 0x02]);

        let info = RadiotapInfo::parse(header);
        assert_eq!(info.rate, Some(0x02));
        assert_eq!(info.frequency, Some(2437));
        assert_eq!(info.channel, Some(6));
        assert_eq!(info.signal_dbm, Some(-42));
        assert_eq!(info.noise_dbm, None);
    }

    #[test]
    fn test_parse_aligns_after_tsft() {
        // tsft | antenna signal, with one extended present word
        let present: u32 = 1 | (1 << 5) | EXT_BIT;
        let mut data = vec![0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(&present.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]); // pad to 8
        data.extend_from_slice(&[0u8; 8]);
        data.push((-70i8) as u8);
        let len = data.len() as u16;
        data[2..4].copy_from_slice(&len.to_le_bytes());

        let info = RadiotapInfo::parse(&data);
        assert_eq!(info.signal_dbm, Some(-70));
    }
}
