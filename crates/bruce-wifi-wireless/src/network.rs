//! Network descriptors and the NET_INFO payload

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WirelessError};
use crate::frames::MacAddress;
use crate::handshake::MAX_SSID_LEN;

/// Bytes before the SSID: channel, encryption, bssid, ssid length
pub const NET_INFO_FIXED_LEN: usize = 1 + 1 + 6 + 1;

/// Shortest payload the host accepts (fixed fields plus one SSID byte)
pub const NET_INFO_MIN_LEN: usize = NET_INFO_FIXED_LEN + 1;

/// Authentication mode as reported by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum EncryptionType {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Unknown(u8),
}

impl EncryptionType {
    pub fn code(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Wep => 1,
            Self::WpaPsk => 2,
            Self::Wpa2Psk => 3,
            Self::WpaWpa2Psk => 4,
            Self::Wpa2Enterprise => 5,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Wep => "WEP",
            Self::WpaPsk => "WPA/PSK",
            Self::Wpa2Psk => "WPA2/PSK",
            Self::WpaWpa2Psk => "WPA/WPA2/PSK",
            Self::Wpa2Enterprise => "WPA2/Enterprise",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// Whether association needs no password
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl From<u8> for EncryptionType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Open,
            1 => Self::Wep,
            2 => Self::WpaPsk,
            3 => Self::Wpa2Psk,
            4 => Self::WpaWpa2Psk,
            5 => Self::Wpa2Enterprise,
            other => Self::Unknown(other),
        }
    }
}

impl From<EncryptionType> for u8 {
    fn from(enc: EncryptionType) -> Self {
        enc.code()
    }
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({})", code),
            other => f.write_str(other.label()),
        }
    }
}

/// A target network as selected from a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub ssid: String,
    pub bssid: MacAddress,
    pub channel: u8,
    pub encryption: EncryptionType,
}

impl NetworkDescriptor {
    pub fn new(
        ssid: impl Into<String>,
        bssid: MacAddress,
        channel: u8,
        encryption: EncryptionType,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            bssid,
            channel,
            encryption,
        }
    }

    /// Same network reported with a different encryption code
    pub fn with_encryption(&self, encryption: EncryptionType) -> Self {
        Self {
            encryption,
            ..self.clone()
        }
    }

    /// NET_INFO payload; the SSID is cut to 32 bytes
    pub fn encode(&self) -> Vec<u8> {
        let ssid = self.ssid.as_bytes();
        let ssid = &ssid[..ssid.len().min(MAX_SSID_LEN)];

        let mut out = Vec::with_capacity(NET_INFO_FIXED_LEN + ssid.len());
        out.push(self.channel);
        out.push(self.encryption.code());
        out.extend_from_slice(self.bssid.as_bytes());
        out.push(ssid.len() as u8);
        out.extend_from_slice(ssid);
        out
    }

    /// Parse a NET_INFO payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < NET_INFO_MIN_LEN {
            return Err(WirelessError::InvalidFrame(format!(
                "NET_INFO payload is {} bytes, need at least {}",
                payload.len(),
                NET_INFO_MIN_LEN
            )));
        }

        let ssid_len = payload[8] as usize;
        let ssid = payload
            .get(NET_INFO_FIXED_LEN..NET_INFO_FIXED_LEN + ssid_len)
            .ok_or_else(|| {
                WirelessError::InvalidFrame(format!(
                    "NET_INFO SSID length {} runs past {} byte payload",
                    ssid_len,
                    payload.len()
                ))
            })?;

        Ok(Self {
            ssid: String::from_utf8_lossy(ssid).into_owned(),
            bssid: MacAddress::from_slice(&payload[2..8])?,
            channel: payload[0],
            encryption: EncryptionType::from(payload[1]),
        })
    }
}
