#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use bruce_wifi_wireless::eapol::{EAPOL_OFFSET, KEY_DATA_OFFSET};
use bruce_wifi_wireless::{
    EncryptionType, FrameHandler, MacAddress, NetworkDescriptor, Radio, RadioMode, Result, TxPath,
    WirelessError,
};

pub const AP: MacAddress = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
pub const STA: MacAddress = MacAddress([0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]);
pub const PMKID: [u8; 16] = [
    0x4D, 0x4F, 0xE7, 0xAA, 0xC3, 0xA2, 0xCE, 0xCA, 0xB1, 0x95, 0x32, 0x1C, 0xEB, 0x99, 0xA7,
    0xD0,
];

pub fn target() -> NetworkDescriptor {
    NetworkDescriptor::new("HomeNet", AP, 6, EncryptionType::Wpa2Psk)
}

/// Data frame AP -> STA (or STA -> AP) carrying an EAPOL header with the
/// given key_info bytes
pub fn key_frame(hi: u8, lo: u8, from_ap: bool) -> Vec<u8> {
    let (addr1, addr2) = if from_ap { (STA, AP) } else { (AP, STA) };
    let mut frame = Vec::with_capacity(EAPOL_OFFSET + 121);
    frame.extend_from_slice(&[0x08, if from_ap { 0x02 } else { 0x01 }, 0x3A, 0x01]);
    frame.extend_from_slice(&addr1.0);
    frame.extend_from_slice(&addr2.0);
    frame.extend_from_slice(&AP.0);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]);
    let mut eapol = vec![0u8; 121];
    eapol[0] = 0x02;
    eapol[1] = hi;
    eapol[3] = lo;
    frame.extend_from_slice(&eapol);
    frame
}

pub fn message_one() -> Vec<u8> {
    key_frame(0x03, 0x00, true)
}

/// Message 1 with the PMKID vendor element at `offset` into key data
pub fn message_one_with_pmkid(offset: usize) -> Vec<u8> {
    let mut frame = message_one();
    let start = EAPOL_OFFSET + KEY_DATA_OFFSET + offset;
    frame.resize(start + 24, 0);
    frame[start] = 0xDD;
    frame[start + 1] = 0x14;
    frame[start + 4..start + 8].copy_from_slice(&[0x00, 0x0F, 0xAC, 0x04]);
    frame[start + 8..start + 24].copy_from_slice(&PMKID);
    frame
}

pub fn message_two() -> Vec<u8> {
    key_frame(0x01, 0x0A, false)
}

pub fn message_three() -> Vec<u8> {
    key_frame(0x13, 0x09, true)
}

pub fn message_four() -> Vec<u8> {
    key_frame(0x01, 0x09, false)
}

/// Writer whose bytes stay readable after it is moved into the transport
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Radio that records transmissions and can be told to fail
#[derive(Default)]
pub struct MockRadio {
    pub mode: Option<RadioMode>,
    pub modes: Vec<RadioMode>,
    pub soft_ap: Option<(String, u8)>,
    pub fail_soft_ap: bool,
    pub fail_transmit_after: Option<usize>,
    pub transmitted: Vec<(Vec<u8>, TxPath)>,
}

impl Radio for MockRadio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<()> {
        self.mode = Some(mode);
        self.modes.push(mode);
        Ok(())
    }

    fn set_channel(&mut self, _channel: u8) -> Result<()> {
        Ok(())
    }

    fn enable_listen(&mut self, _handler: FrameHandler) -> Result<()> {
        Ok(())
    }

    fn disable_listen(&mut self) -> Result<()> {
        Ok(())
    }

    fn transmit_raw(&mut self, frame: &[u8], path: TxPath) -> Result<()> {
        if let Some(limit) = self.fail_transmit_after {
            if self.transmitted.len() >= limit {
                return Err(WirelessError::injection("tx queue full"));
            }
        }
        self.transmitted.push((frame.to_vec(), path));
        Ok(())
    }

    fn start_soft_ap(&mut self, ssid: &str, channel: u8) -> Result<()> {
        if self.fail_soft_ap {
            return Err(WirelessError::Capture("softAP refused".into()));
        }
        self.soft_ap = Some((ssid.to_string(), channel));
        Ok(())
    }

    fn stop_soft_ap(&mut self) -> Result<()> {
        self.soft_ap = None;
        Ok(())
    }
}
