//! Hashcat mode 22000 exports
//!
//! Nothing here cracks anything. These are the lines a host-side cracker
//! takes as input.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::frames::MacAddress;
use crate::handshake::{HandshakeSession, MessageNumber, Pmkid};

/// ANonce/SNonce position within the EAPOL header
const NONCE_RANGE: std::ops::Range<usize> = 17..49;

/// MIC position within the EAPOL header
const MIC_RANGE: std::ops::Range<usize> = 81..97;

/// Message pair code for M1 + M2, ANonce taken from M1
const MESSAGE_PAIR_M1_M2: &str = "00";

/// Short form shown on the device after a PMKID capture:
/// `*<SSID>:<bssid hex>:<pmkid hex>`
pub fn pmkid_display_hash(ssid: &str, bssid: MacAddress, pmkid: &Pmkid) -> String {
    format!("*{}:{}:{}", ssid, bssid.to_hex_lower(), pmkid.to_hex_lower())
}

/// PMKID capture ready for export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PmkidHash {
    pub bssid: MacAddress,
    pub station: MacAddress,
    #[serde(serialize_with = "hex_bytes")]
    pub ssid: Vec<u8>,
    #[serde(serialize_with = "pmkid_hex")]
    pub pmkid: Pmkid,
}

impl PmkidHash {
    pub fn new(bssid: MacAddress, station: MacAddress, ssid: &[u8], pmkid: Pmkid) -> Self {
        Self {
            bssid,
            station,
            ssid: ssid.to_vec(),
            pmkid,
        }
    }

    /// `WPA*01*PMKID*BSSID*STA*ESSID_HEX***`
    pub fn to_hashcat_22000(&self) -> String {
        format!(
            "WPA*01*{}*{}*{}*{}***",
            self.pmkid.to_hex_lower(),
            self.bssid.to_hex_lower(),
            self.station.to_hex_lower(),
            hex::encode(&self.ssid)
        )
    }
}

/// Handshake material for a `WPA*02` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeExport {
    pub bssid: MacAddress,
    pub station: MacAddress,
    pub ssid: Vec<u8>,
    pub anonce: [u8; 32],
    pub mic: [u8; 16],
    /// Message 2 EAPOL with the MIC field zeroed
    pub eapol: Vec<u8>,
}

impl HandshakeExport {
    /// Build from a session holding messages 1 and 2
    pub fn from_session(session: &HandshakeSession) -> Option<Self> {
        let m1 = session.message(MessageNumber::One)?.payload();
        let m2 = session.message(MessageNumber::Two)?.payload();

        let anonce: [u8; 32] = m1.get(NONCE_RANGE)?.try_into().ok()?;
        let mic: [u8; 16] = m2.get(MIC_RANGE)?.try_into().ok()?;

        let mut eapol = m2[..declared_len(m2)].to_vec();
        if eapol.len() < MIC_RANGE.end {
            return None;
        }
        eapol[MIC_RANGE].fill(0);

        Some(Self {
            bssid: session.bssid(),
            station: session.station(),
            ssid: session.ssid().to_vec(),
            anonce,
            mic,
            eapol,
        })
    }

    /// `WPA*02*MIC*BSSID*STA*ESSID_HEX*ANONCE*EAPOL*MESSAGEPAIR`
    pub fn to_hashcat_22000(&self) -> String {
        format!(
            "WPA*02*{}*{}*{}*{}*{}*{}*{}",
            hex::encode(self.mic),
            self.bssid.to_hex_lower(),
            self.station.to_hex_lower(),
            hex::encode(&self.ssid),
            hex::encode(self.anonce),
            hex::encode(&self.eapol),
            MESSAGE_PAIR_M1_M2
        )
    }
}

/// EAPOL length from the header (4 + body length), capped at what was stored
fn declared_len(eapol: &[u8]) -> usize {
    match eapol.get(2..4) {
        Some(len) => (BigEndian::read_u16(len) as usize + 4).min(eapol.len()),
        None => eapol.len(),
    }
}

fn hex_bytes<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

fn pmkid_hex<S: serde::Serializer>(pmkid: &Pmkid, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&pmkid.to_hex_lower())
}
