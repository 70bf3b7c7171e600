//! EAPOL frame recognition
//!
//! Byte-level checks over one received 802.11 frame: is it EAPOL, is it a key
//! frame, which handshake message is it, and does message 1 carry a PMKID.
//! Every read is bounds-checked; a short frame is simply "not EAPOL".

use crate::frames::{MacAddress, ADDR1_OFFSET, ADDR2_OFFSET};
use crate::handshake::{MessageNumber, Pmkid, PMKID_LEN};

/// LLC/SNAP header starts right after the 24-byte 802.11 header
pub const LLC_SNAP_OFFSET: usize = 24;

/// EtherType carried in the last two bytes of LLC/SNAP
pub const ETHERTYPE_OFFSET: usize = LLC_SNAP_OFFSET + 6;

/// EAPOL EtherType (0x888E)
pub const EAPOL_ETHERTYPE: [u8; 2] = [0x88, 0x8E];

/// EAPOL header starts after the 802.11 and LLC/SNAP headers
pub const EAPOL_OFFSET: usize = LLC_SNAP_OFFSET + 8;

/// Leading EAPOL byte of a key frame
pub const KEY_FRAME_MARKER: u8 = 0x02;

/// Position of the key_info high byte within the EAPOL header
pub const KEY_INFO_HI_OFFSET: usize = 1;

/// Position of the key_info low byte within the EAPOL header
pub const KEY_INFO_LO_OFFSET: usize = 3;

/// Bytes of EAPOL header needed before a frame can be classified
pub const EAPOL_HEADER_MIN: usize = KEY_INFO_LO_OFFSET + 1;

/// Key data starts this far into the EAPOL header
pub const KEY_DATA_OFFSET: usize = 95;

/// Number of key-data positions probed for the PMKID element
pub const PMKID_SCAN_WINDOW: usize = 32;

/// Vendor-specific information element tag
pub const VENDOR_IE_TAG: u8 = 0xDD;

/// OUI 00-0F-AC followed by data type 4 (PMKID KDE)
pub const PMKID_KDE_SIGNATURE: [u8; 4] = [0x00, 0x0F, 0xAC, 0x04];

/// Offset of the signature from the tag byte (tag, length, then two skipped bytes)
const SIGNATURE_FROM_TAG: usize = 4;

/// Offset of the PMKID from the tag byte
const PMKID_FROM_TAG: usize = 8;

/// Map the two key_info bytes to a handshake message.
///
/// The arms are keyed on the high byte first, so messages 1 and 3 can never
/// collide with anything. Messages 2 and 4 share `hi == 0x01`; their masks
/// overlap when `lo & 0x8B == 0x0B`, and those values resolve to message 2.
pub fn classify_key_info(hi: u8, lo: u8) -> Option<MessageNumber> {
    match hi {
        0x03 if lo == 0x00 => Some(MessageNumber::One),
        0x01 if lo & 0x8A == 0x0A => Some(MessageNumber::Two),
        0x13 if lo & 0x89 == 0x09 => Some(MessageNumber::Three),
        0x01 if lo & 0x89 == 0x09 => Some(MessageNumber::Four),
        _ => None,
    }
}

/// Scan the key-data window for a PMKID KDE; first match wins.
pub fn find_pmkid(key_data: &[u8]) -> Option<Pmkid> {
    for start in 0..PMKID_SCAN_WINDOW {
        let end = start + PMKID_FROM_TAG + PMKID_LEN;
        let Some(element) = key_data.get(start..end) else {
            break;
        };
        if element[0] == VENDOR_IE_TAG
            && element[SIGNATURE_FROM_TAG..SIGNATURE_FROM_TAG + 4] == PMKID_KDE_SIGNATURE
        {
            return Pmkid::from_slice(&element[PMKID_FROM_TAG..]);
        }
    }
    None
}

/// A frame whose LLC/SNAP EtherType says EAPOL
#[derive(Debug, Clone, Copy)]
pub struct EapolFrame<'a> {
    frame: &'a [u8],
}

impl<'a> EapolFrame<'a> {
    /// Recognise an EAPOL frame by its EtherType
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        let ethertype = frame.get(ETHERTYPE_OFFSET..ETHERTYPE_OFFSET + 2)?;
        (ethertype == EAPOL_ETHERTYPE).then_some(Self { frame })
    }

    /// Whole 802.11 frame
    pub fn raw(&self) -> &'a [u8] {
        self.frame
    }

    /// Bytes from the EAPOL header to the end of the frame
    pub fn eapol(&self) -> &'a [u8] {
        self.frame.get(EAPOL_OFFSET..).unwrap_or(&[])
    }

    /// Whether the header is present and marks a key frame
    pub fn is_key_frame(&self) -> bool {
        let eapol = self.eapol();
        eapol.len() >= EAPOL_HEADER_MIN && eapol[0] == KEY_FRAME_MARKER
    }

    /// Handshake message number, if this is a recognised key frame
    pub fn message_number(&self) -> Option<MessageNumber> {
        if !self.is_key_frame() {
            return None;
        }
        let eapol = self.eapol();
        classify_key_info(eapol[KEY_INFO_HI_OFFSET], eapol[KEY_INFO_LO_OFFSET])
    }

    /// Address 2: the access point for message 1
    pub fn transmitter(&self) -> Option<MacAddress> {
        MacAddress::read_at(self.frame, ADDR2_OFFSET)
    }

    /// Address 1: the station for message 1
    pub fn receiver(&self) -> Option<MacAddress> {
        MacAddress::read_at(self.frame, ADDR1_OFFSET)
    }

    /// PMKID from the key-data window, if present
    pub fn pmkid(&self) -> Option<Pmkid> {
        let key_data = self.eapol().get(KEY_DATA_OFFSET..)?;
        find_pmkid(key_data)
    }
}
