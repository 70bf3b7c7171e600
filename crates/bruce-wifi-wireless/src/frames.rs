//! 802.11 Frame structures and types
//!
//! Rust representations of the IEEE 802.11 header fields the classifier reads
//! and the deauthentication frames the deauth driver transmits.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WirelessError};

/// Offset of Address 1 (receiver) in an 802.11 header
pub const ADDR1_OFFSET: usize = 4;
/// Offset of Address 2 (transmitter) in an 802.11 header
pub const ADDR2_OFFSET: usize = 10;
/// Offset of Address 3 (BSSID) in an 802.11 header
pub const ADDR3_OFFSET: usize = 16;

/// MAC address (6 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast address (FF:FF:FF:FF:FF:FF)
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Zero/null address
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    /// Create from bytes
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Create from slice (must be 6 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 6 {
            return Err(WirelessError::InvalidMac(format!(
                "Expected 6 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Read the address stored at `offset` of a frame, if the frame is long enough
    pub fn read_at(frame: &[u8], offset: usize) -> Option<Self> {
        let bytes = frame.get(offset..offset + 6)?;
        Self::from_slice(bytes).ok()
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if this is the all-zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }

    /// Lowercase hex without separators, as hashcat expects
    pub fn to_hex_lower(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = WirelessError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(WirelessError::InvalidMac(format!(
                "Expected 6 octets separated by ':', got '{}'",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| WirelessError::InvalidMac(format!("Invalid hex octet: '{}'", part)))?;
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = WirelessError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// 802.11 Frame Type (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Management frames (beacons, probes, auth, deauth, etc.)
    Management = 0,
    /// Control frames (ACK, RTS, CTS, etc.)
    Control = 1,
    /// Data frames (actual payload)
    Data = 2,
    /// Extension (802.11ad)
    Extension = 3,
}

impl FrameType {
    /// Parse from frame control field
    pub fn from_frame_control(fc: u16) -> Self {
        match (fc >> 2) & 0x03 {
            0 => Self::Management,
            1 => Self::Control,
            2 => Self::Data,
            _ => Self::Extension,
        }
    }

    /// Read the type from the first two bytes of a raw frame
    pub fn of_frame(frame: &[u8]) -> Option<Self> {
        if frame.len() < 2 {
            return None;
        }
        Some(Self::from_frame_control(LittleEndian::read_u16(&frame[0..2])))
    }
}

/// Deauthentication reason codes (IEEE 802.11-2016), the subset the driver uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DeauthReason {
    /// Unspecified reason
    Unspecified = 1,
    /// Previous authentication no longer valid
    AuthNoLongerValid = 2,
    /// Deauthenticated because sending station is leaving
    StationLeaving = 3,
    /// Class 3 frame received from nonassociated STA
    Class3FromNonAssoc = 7,
}

impl DeauthReason {
    /// Get as u16 value
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// 802.11 Frame Control field (2 bytes)
#[derive(Debug, Clone, Copy)]
pub struct FrameControl {
    raw: u16,
}

impl FrameControl {
    /// Create frame control for deauthentication frame
    pub fn deauth() -> Self {
        // Type: 0 (Management), Subtype: 12 (Deauth) = 0x00C0
        Self { raw: 0x00C0 }
    }

    /// To little-endian bytes
    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.raw.to_le_bytes()
    }
}

/// IEEE 802.11 MAC Header (24 bytes for management frames)
#[derive(Debug, Clone)]
pub struct Ieee80211Header {
    frame_control: FrameControl,
    duration: [u8; 2],
    addr1: MacAddress,
    addr2: MacAddress,
    addr3: MacAddress,
    seq_ctrl: [u8; 2],
}

impl Ieee80211Header {
    /// Header size in bytes
    pub const SIZE: usize = 24;

    /// Create a new header
    pub fn new(
        frame_control: FrameControl,
        dest: MacAddress,
        src: MacAddress,
        bssid: MacAddress,
    ) -> Self {
        Self {
            frame_control,
            duration: [0x3A, 0x01],
            addr1: dest,
            addr2: src,
            addr3: bssid,
            seq_ctrl: [0x00, 0x00],
        }
    }

    /// Set sequence number
    pub fn set_sequence(&mut self, seq: u16) {
        // Sequence number is in bits 4-15, fragment in bits 0-3
        let seq_ctrl = (seq << 4) & 0xFFF0;
        self.seq_ctrl = seq_ctrl.to_le_bytes();
    }

    /// Set the raw sequence control bytes
    pub fn set_sequence_control(&mut self, raw: [u8; 2]) {
        self.seq_ctrl = raw;
    }

    /// Serialize to wire order
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&self.frame_control.to_le_bytes());
        out[2..4].copy_from_slice(&self.duration);
        out[ADDR1_OFFSET..ADDR1_OFFSET + 6].copy_from_slice(&self.addr1.0);
        out[ADDR2_OFFSET..ADDR2_OFFSET + 6].copy_from_slice(&self.addr2.0);
        out[ADDR3_OFFSET..ADDR3_OFFSET + 6].copy_from_slice(&self.addr3.0);
        out[22..24].copy_from_slice(&self.seq_ctrl);
        out
    }
}

/// Complete Deauthentication Frame (26 bytes, no radiotap)
#[derive(Debug, Clone)]
pub struct DeauthFrame {
    header: Ieee80211Header,
    reason: u16,
}

impl DeauthFrame {
    /// Total frame size (without radiotap)
    pub const SIZE: usize = Ieee80211Header::SIZE + 2;

    /// Sequence control carried by the fixed generic template
    pub const GENERIC_SEQUENCE_CONTROL: [u8; 2] = [0xF0, 0xFF];

    /// Create a new deauth frame
    pub fn new(dest: MacAddress, src: MacAddress, bssid: MacAddress, reason: DeauthReason) -> Self {
        Self {
            header: Ieee80211Header::new(FrameControl::deauth(), dest, src, bssid),
            reason: reason.as_u16(),
        }
    }

    /// Create deauth frame pretending to be from AP
    pub fn from_ap(bssid: MacAddress, client: MacAddress, reason: DeauthReason) -> Self {
        // AP sends to client: dest=client, src=bssid, bssid=bssid
        Self::new(client, bssid, bssid, reason)
    }

    /// Create broadcast deauth (affects all clients)
    pub fn broadcast(bssid: MacAddress, reason: DeauthReason) -> Self {
        Self::from_ap(bssid, MacAddress::BROADCAST, reason)
    }

    /// The generic template: broadcast from the AP, reason 2, fixed sequence control
    pub fn generic(bssid: MacAddress) -> Self {
        let mut frame = Self::broadcast(bssid, DeauthReason::AuthNoLongerValid);
        frame.header.set_sequence_control(Self::GENERIC_SEQUENCE_CONTROL);
        frame
    }

    /// Set sequence number
    pub fn set_sequence(&mut self, seq: u16) {
        self.header.set_sequence(seq);
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.reason.to_le_bytes());
        bytes
    }

    /// Get destination MAC
    pub fn destination(&self) -> MacAddress {
        self.header.addr1
    }

    /// Get source MAC
    pub fn source(&self) -> MacAddress {
        self.header.addr2
    }

    /// Get BSSID
    pub fn bssid(&self) -> MacAddress {
        self.header.addr3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_parse() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert!("AA:BB:CC".parse::<MacAddress>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_address_display() {
        let mac = MacAddress([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC]);
        assert_eq!(format!("{}", mac), "12:34:56:78:9A:BC");
        assert_eq!(mac.to_hex_lower(), "123456789abc");
    }

    #[test]
    fn test_read_at_bounds() {
        let frame = [0u8; 15];
        assert!(MacAddress::read_at(&frame, ADDR1_OFFSET).is_some());
        assert!(MacAddress::read_at(&frame, ADDR2_OFFSET).is_none());
    }

    #[test]
    fn test_deauth_frame() {
        let bssid: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let frame = DeauthFrame::broadcast(bssid, DeauthReason::Class3FromNonAssoc);

        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), DeauthFrame::SIZE);

        // Check frame control (little endian)
        assert_eq!(bytes[0], 0xC0);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(FrameType::of_frame(&bytes), Some(FrameType::Management));

        // Check destination is broadcast
        assert_eq!(&bytes[4..10], &[0xFF; 6]);
        assert_eq!(&bytes[10..16], &bssid.0);
        assert_eq!(&bytes[24..26], &[0x07, 0x00]);
    }

    #[test]
    fn test_generic_template_layout() {
        let bssid = MacAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let bytes = DeauthFrame::generic(bssid).to_bytes();
        assert_eq!(&bytes[0..4], &[0xC0, 0x00, 0x3A, 0x01]);
        assert_eq!(&bytes[16..22], &bssid.0);
        assert_eq!(&bytes[22..24], &[0xF0, 0xFF]);
        assert_eq!(&bytes[24..26], &[0x02, 0x00]);
    }
}
