//! WPA/WPA2 4-way handshake assembly
//!
//! A [`HandshakeSession`] accumulates the EAPOL messages, addresses and PMKID
//! seen during one capture attempt. It is owned by the classifier for that
//! attempt and published to the controller as a snapshot when it completes.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, WirelessError};
use crate::frames::MacAddress;

/// Maximum network name length kept in a session
pub const MAX_SSID_LEN: usize = 32;

/// PMKID length in bytes
pub const PMKID_LEN: usize = 16;

/// One of the four messages of the 4-way handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageNumber {
    /// AP -> STA, carries ANonce and possibly the PMKID
    One,
    /// STA -> AP, carries SNonce and MIC
    Two,
    /// AP -> STA, carries GTK
    Three,
    /// STA -> AP, final acknowledgement
    Four,
}

impl MessageNumber {
    /// All messages in handshake order
    pub const ALL: [MessageNumber; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    /// Numeric value 1-4
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Zero-based slot index
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// Whether the access point sends this message
    pub fn from_ap(self) -> bool {
        matches!(self, Self::One | Self::Three)
    }
}

impl fmt::Display for MessageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.number())
    }
}

/// Pairwise Master Key Identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pmkid(pub [u8; PMKID_LEN]);

impl Pmkid {
    /// Create from slice (must be 16 bytes)
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; PMKID_LEN] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex
    pub fn to_hex_lower(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Pmkid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pmkid({})", self.to_hex_lower())
    }
}

/// A stored EAPOL message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolMessage {
    number: MessageNumber,
    payload: Vec<u8>,
    valid: bool,
}

impl EapolMessage {
    /// Largest EAPOL payload kept per message; longer frames are truncated
    pub const MAX_LEN: usize = 256;

    fn empty(number: MessageNumber) -> Self {
        Self {
            number,
            payload: Vec::new(),
            valid: false,
        }
    }

    fn stored(number: MessageNumber, payload: &[u8]) -> Self {
        let len = payload.len().min(Self::MAX_LEN);
        Self {
            number,
            payload: payload[..len].to_vec(),
            valid: true,
        }
    }

    /// Which handshake message this slot holds
    pub fn number(&self) -> MessageNumber {
        self.number
    }

    /// EAPOL bytes, starting at the EAPOL header
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether a frame has been stored in this slot
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Capture state for one target network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSession {
    bssid: MacAddress,
    station: MacAddress,
    ssid: Vec<u8>,
    ssid_len: u8,
    pmkid: Option<Pmkid>,
    slots: [EapolMessage; 4],
    complete: bool,
}

impl Default for HandshakeSession {
    fn default() -> Self {
        Self {
            bssid: MacAddress::ZERO,
            station: MacAddress::ZERO,
            ssid: Vec::new(),
            ssid_len: 0,
            pmkid: None,
            slots: MessageNumber::ALL.map(EapolMessage::empty),
            complete: false,
        }
    }
}

impl HandshakeSession {
    /// Size of [`HandshakeSession::encode`] output.
    ///
    /// Layout: bssid(6) station(6) ssid(32) ssid_len(1) pmkid(16), then four
    /// slots of number(1) valid(1) length(u16 LE) data(256), then
    /// pmkid_valid(1) complete(1).
    pub const ENCODED_LEN: usize = 6 + 6 + MAX_SSID_LEN + 1 + PMKID_LEN + 4 * SLOT_LEN + 2;

    /// Zeroed session
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed session with the target identifiers recorded
    pub fn for_target(bssid: MacAddress, ssid: &str) -> Self {
        let mut session = Self::new();
        session.set_target(bssid, ssid.as_bytes());
        session
    }

    /// Zero every field, clearing completion and PMKID
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record the network being attacked; the name is capped at 32 bytes
    pub fn set_target(&mut self, bssid: MacAddress, ssid: &[u8]) {
        self.bssid = bssid;
        let kept = ssid.len().min(MAX_SSID_LEN);
        self.ssid = ssid[..kept].to_vec();
        self.ssid_len = ssid.len().min(u8::MAX as usize) as u8;
    }

    /// Record the AP and station observed in message 1
    pub fn record_addresses(&mut self, ap: MacAddress, station: MacAddress) {
        self.bssid = ap;
        self.station = station;
    }

    /// Retain a PMKID extracted from message 1
    pub fn set_pmkid(&mut self, pmkid: Pmkid) {
        self.pmkid = Some(pmkid);
    }

    /// Store an EAPOL payload, replacing whatever the slot held
    pub fn store_message(&mut self, number: MessageNumber, eapol: &[u8]) {
        self.slots[number.index()] = EapolMessage::stored(number, eapol);
        if number == MessageNumber::Four {
            self.complete = true;
        }
    }

    /// Access point address
    pub fn bssid(&self) -> MacAddress {
        self.bssid
    }

    /// Station address seen in message 1
    pub fn station(&self) -> MacAddress {
        self.station
    }

    /// Network name bytes, at most 32
    pub fn ssid(&self) -> &[u8] {
        &self.ssid
    }

    /// Length of the network name as supplied, before capping
    pub fn ssid_len(&self) -> u8 {
        self.ssid_len
    }

    /// Stored PMKID
    pub fn pmkid(&self) -> Option<Pmkid> {
        self.pmkid
    }

    /// Whether a PMKID has been extracted
    pub fn has_pmkid(&self) -> bool {
        self.pmkid.is_some()
    }

    /// Whether a valid message 4 has been stored
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Message in a slot, if one was stored
    pub fn message(&self, number: MessageNumber) -> Option<&EapolMessage> {
        let slot = &self.slots[number.index()];
        slot.valid.then_some(slot)
    }

    /// All four slots, valid or not
    pub fn slots(&self) -> &[EapolMessage; 4] {
        &self.slots
    }

    /// Messages stored so far
    pub fn captured(&self) -> Vec<MessageNumber> {
        self.slots
            .iter()
            .filter(|slot| slot.valid)
            .map(|slot| slot.number)
            .collect()
    }

    /// Serialize into the fixed-size wire layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_LEN);
        out.extend_from_slice(&self.bssid.0);
        out.extend_from_slice(&self.station.0);

        let mut ssid = [0u8; MAX_SSID_LEN];
        ssid[..self.ssid.len()].copy_from_slice(&self.ssid);
        out.extend_from_slice(&ssid);
        out.push(self.ssid_len);

        out.extend_from_slice(&self.pmkid.unwrap_or_default().0);

        for slot in &self.slots {
            out.push(if slot.valid { slot.number.number() } else { 0 });
            out.push(slot.valid as u8);
            let mut len = [0u8; 2];
            LittleEndian::write_u16(&mut len, slot.payload.len() as u16);
            out.extend_from_slice(&len);
            let mut data = [0u8; EapolMessage::MAX_LEN];
            data[..slot.payload.len()].copy_from_slice(&slot.payload);
            out.extend_from_slice(&data);
        }

        out.push(self.pmkid.is_some() as u8);
        out.push(self.complete as u8);
        out
    }

    /// Parse the fixed-size wire layout produced by [`HandshakeSession::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(WirelessError::InvalidFrame(format!(
                "handshake record is {} bytes, expected {}",
                bytes.len(),
                Self::ENCODED_LEN
            )));
        }

        let mut session = Self::new();
        session.bssid = MacAddress::from_slice(&bytes[0..6])?;
        session.station = MacAddress::from_slice(&bytes[6..12])?;
        let ssid_len = bytes[44];
        let kept = (ssid_len as usize).min(MAX_SSID_LEN);
        session.ssid = bytes[12..12 + kept].to_vec();
        session.ssid_len = ssid_len;

        let pmkid = Pmkid::from_slice(&bytes[45..61]).unwrap_or_default();

        let mut pos = 61;
        for number in MessageNumber::ALL {
            let slot = &bytes[pos..pos + SLOT_LEN];
            let valid = slot[1] != 0;
            if valid {
                if slot[0] != number.number() {
                    return Err(WirelessError::InvalidFrame(format!(
                        "slot {} holds message number {}",
                        number.number(),
                        slot[0]
                    )));
                }
                let len = LittleEndian::read_u16(&slot[2..4]) as usize;
                if len > EapolMessage::MAX_LEN {
                    return Err(WirelessError::InvalidFrame(format!(
                        "slot {} length {} exceeds {}",
                        number.number(),
                        len,
                        EapolMessage::MAX_LEN
                    )));
                }
                session.slots[number.index()] = EapolMessage::stored(number, &slot[4..4 + len]);
            }
            pos += SLOT_LEN;
        }

        if bytes[pos] != 0 {
            session.pmkid = Some(pmkid);
        }
        session.complete = session.slots[MessageNumber::Four.index()].valid;
        if session.complete != (bytes[pos + 1] != 0) {
            return Err(WirelessError::InvalidFrame(
                "completion flag disagrees with message 4 slot".into(),
            ));
        }

        Ok(session)
    }
}

const SLOT_LEN: usize = 1 + 1 + 2 + EapolMessage::MAX_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_requires_message_four() {
        let mut session = HandshakeSession::new();
        for number in [MessageNumber::One, MessageNumber::Two, MessageNumber::Three] {
            session.store_message(number, &[0x02, 0x03, 0x00, 0x5F]);
            assert!(!session.is_complete());
        }
        session.store_message(MessageNumber::Four, &[0x02, 0x03, 0x00, 0x5F]);
        assert!(session.is_complete());
    }

    #[test]
    fn test_message_four_alone_completes() {
        // Ordering is not enforced: a lone message 4 marks the session complete.
        let mut session = HandshakeSession::new();
        session.store_message(MessageNumber::Four, &[0x02; 40]);
        assert!(session.is_complete());
        assert!(session.message(MessageNumber::One).is_none());
        assert_eq!(session.captured(), vec![MessageNumber::Four]);
    }

    #[test]
    fn test_store_truncates_and_overwrites() {
        let mut session = HandshakeSession::new();
        session.store_message(MessageNumber::Two, &[0xAA; 400]);
        assert_eq!(
            session.message(MessageNumber::Two).unwrap().payload().len(),
            EapolMessage::MAX_LEN
        );

        session.store_message(MessageNumber::Two, &[0xBB; 10]);
        let msg = session.message(MessageNumber::Two).unwrap();
        assert_eq!(msg.payload(), &[0xBB; 10]);
        assert!(msg.is_valid());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = HandshakeSession::for_target(MacAddress([1; 6]), "lab");
        session.set_pmkid(Pmkid([7; 16]));
        session.store_message(MessageNumber::Four, &[1, 2, 3]);
        session.reset();
        assert_eq!(session, HandshakeSession::default());
        assert!(!session.has_pmkid());
        assert!(!session.is_complete());
    }

    #[test]
    fn test_ssid_is_capped_but_length_kept() {
        let long = "x".repeat(40);
        let session = HandshakeSession::for_target(MacAddress::ZERO, &long);
        assert_eq!(session.ssid().len(), MAX_SSID_LEN);
        assert_eq!(session.ssid_len(), 40);
    }

    #[test]
    fn test_encode_decode() {
        let mut session = HandshakeSession::for_target(MacAddress([0xAA; 6]), "CoffeeShop");
        session.record_addresses(MacAddress([0xAA; 6]), MacAddress([0x11; 6]));
        session.set_pmkid(Pmkid([0x5A; 16]));
        session.store_message(MessageNumber::One, &[0x02, 0x03, 0x00, 0x5F, 0x02]);
        session.store_message(MessageNumber::Four, &[0x02, 0x01, 0x00, 0x5F]);

        let bytes = session.encode();
        assert_eq!(bytes.len(), HandshakeSession::ENCODED_LEN);
        assert_eq!(HandshakeSession::decode(&bytes).unwrap(), session);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        assert!(HandshakeSession::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_decode_rejects_inconsistent_completion() {
        let mut bytes = HandshakeSession::new().encode();
        let last = bytes.len() - 1;
        bytes[last] = 1;
        assert!(HandshakeSession::decode(&bytes).is_err());
    }
}
