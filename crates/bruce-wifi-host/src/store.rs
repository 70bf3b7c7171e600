use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use bruce_wifi_logging::targets::T_HOST;
use bruce_wifi_wireless::eapol::EapolFrame;
use bruce_wifi_wireless::pcap::{PcapWriter, LINKTYPE_IEEE802_11};
use bruce_wifi_wireless::{
    pmkid_display_hash, EncryptionType, HandshakeExport, HandshakeSession, MacAddress,
    NetworkDescriptor, Pmkid, PmkidHash, RecordKind,
};
use chrono::Local;
use serde::Serialize;

use crate::reader::{HostEvent, TargetInfo};

pub const NETWORKS_FILE: &str = "networks.json";
pub const PMKID_FILE: &str = "pmkid_hashes.txt";
pub const HASHCAT_FILE: &str = "hashcat_22000.txt";
pub const RAW_PCAP_FILE: &str = "raw_packets.pcap";

/// Counts of what has been written so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub networks: usize,
    pub pmkids: usize,
    pub handshakes: usize,
    pub raw_packets: usize,
    pub hashcat_lines: usize,
    pub rejected_records: usize,
}

/// Writes everything the device reports into one output directory.
pub struct CaptureStore {
    dir: PathBuf,
    networks: Vec<NetworkDescriptor>,
    target: Option<NetworkDescriptor>,
    last_station: Option<MacAddress>,
    pcap: Option<PcapWriter<BufWriter<File>>>,
    summary: StoreSummary,
}

impl CaptureStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            networks: Vec::new(),
            target: None,
            last_station: None,
            pcap: None,
            summary: StoreSummary::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn summary(&self) -> &StoreSummary {
        &self.summary
    }

    pub fn networks(&self) -> &[NetworkDescriptor] {
        &self.networks
    }

    /// Network the current capture is aimed at, if announced
    pub fn target(&self) -> Option<&NetworkDescriptor> {
        self.target.as_ref()
    }

    /// `hashcat -m 22000 ...` for the collected lines, once there are any
    pub fn suggested_command(&self) -> Option<String> {
        (self.summary.hashcat_lines > 0).then(|| {
            format!(
                "hashcat -m 22000 {} <wordlist>",
                self.dir.join(HASHCAT_FILE).display()
            )
        })
    }

    pub fn handle(&mut self, event: &HostEvent) -> Result<()> {
        match event {
            HostEvent::CaptureStart(target) | HostEvent::DeauthStart(target) => {
                self.set_target(target);
                Ok(())
            }
            HostEvent::Record { kind, payload } => self.store_record(*kind, payload),
            _ => Ok(()),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.flush().context("flushing raw packet capture")?;
        }
        Ok(())
    }

    fn set_target(&mut self, target: &TargetInfo) {
        self.target = Some(NetworkDescriptor::new(
            target.ssid.clone(),
            target.bssid,
            target.channel,
            EncryptionType::Wpa2Psk,
        ));
        self.last_station = None;
    }

    fn store_record(&mut self, kind: RecordKind, payload: &[u8]) -> Result<()> {
        match kind {
            RecordKind::NetInfo => self.store_network(payload),
            RecordKind::Pmkid => self.store_pmkid(payload),
            RecordKind::Handshake => self.store_handshake(payload),
            RecordKind::RawPacket => self.store_raw(payload),
        }
    }

    fn store_network(&mut self, payload: &[u8]) -> Result<()> {
        let network = match NetworkDescriptor::decode(payload) {
            Ok(network) => network,
            Err(err) => {
                self.reject("NET_INFO", &err);
                return Ok(());
            }
        };
        tracing::info!(target: T_HOST, ssid = %network.ssid, bssid = %network.bssid, channel = network.channel, "network");

        if let Some(target) = self.target.as_mut().filter(|t| t.bssid == network.bssid) {
            target.encryption = network.encryption;
        }
        match self.networks.iter_mut().find(|n| n.bssid == network.bssid) {
            Some(existing) => *existing = network,
            None => self.networks.push(network),
        }
        self.summary.networks = self.networks.len();

        let path = self.dir.join(NETWORKS_FILE);
        let data = serde_json::to_vec_pretty(&self.networks).context("serializing networks")?;
        fs::write(&path, data).with_context(|| format!("writing {}", path.display()))
    }

    fn store_pmkid(&mut self, payload: &[u8]) -> Result<()> {
        let Some(pmkid) = Pmkid::from_slice(payload) else {
            self.reject("PMKID", &format!("{} bytes", payload.len()));
            return Ok(());
        };
        let Some(target) = self.target.clone() else {
            self.reject("PMKID", &"no capture target announced");
            return Ok(());
        };

        let station = self.last_station.unwrap_or(MacAddress::ZERO);
        let shown = pmkid_display_hash(&target.ssid, target.bssid, &pmkid);
        let line = PmkidHash::new(target.bssid, station, target.ssid.as_bytes(), pmkid)
            .to_hashcat_22000();

        self.append_line(PMKID_FILE, &shown)?;
        self.append_line(HASHCAT_FILE, &line)?;
        self.summary.pmkids += 1;
        self.summary.hashcat_lines += 1;
        tracing::info!(target: T_HOST, ssid = %target.ssid, %station, "PMKID stored: {shown}");
        Ok(())
    }

    fn store_handshake(&mut self, payload: &[u8]) -> Result<()> {
        let session = match HandshakeSession::decode(payload) {
            Ok(session) => session,
            Err(err) => {
                self.reject("HANDSHAKE", &err);
                return Ok(());
            }
        };

        let path = self.unique_path(&format!(
            "handshake_{}",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        fs::write(&path, payload).with_context(|| format!("writing {}", path.display()))?;
        self.summary.handshakes += 1;
        tracing::info!(
            target: T_HOST,
            messages = ?session.captured(),
            path = %path.display(),
            "handshake stored"
        );

        match HandshakeExport::from_session(&session) {
            Some(export) => {
                self.append_line(HASHCAT_FILE, &export.to_hashcat_22000())?;
                self.summary.hashcat_lines += 1;
            }
            None => tracing::warn!(
                target: T_HOST,
                "handshake lacks messages 1 and 2; no hashcat line written"
            ),
        }
        Ok(())
    }

    fn store_raw(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(station) = station_of(payload) {
            self.last_station = Some(station);
        }

        if self.pcap.is_none() {
            let path = self.dir.join(RAW_PCAP_FILE);
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let writer = PcapWriter::new(BufWriter::new(file), LINKTYPE_IEEE802_11)
                .with_context(|| format!("writing pcap header to {}", path.display()))?;
            self.pcap = Some(writer);
        }
        if let Some(pcap) = self.pcap.as_mut() {
            pcap.write_packet(SystemTime::now(), payload)
                .context("writing raw packet")?;
        }
        self.summary.raw_packets += 1;
        Ok(())
    }

    fn append_line(&self, name: &str, line: &str) -> Result<()> {
        let path = self.dir.join(name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("appending to {}", path.display()))
    }

    fn unique_path(&self, stem: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{stem}.bin"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}_{n}.bin"));
            n += 1;
        }
        path
    }

    fn reject(&mut self, kind: &str, reason: &dyn std::fmt::Display) {
        self.summary.rejected_records += 1;
        tracing::warn!(target: T_HOST, "discarding {kind} record: {reason}");
    }
}

impl Drop for CaptureStore {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(target: T_HOST, "{err:#}");
        }
    }
}

/// Station address of a forwarded EAPOL frame: the receiver of AP messages,
/// the transmitter otherwise.
fn station_of(frame: &[u8]) -> Option<MacAddress> {
    let eapol = EapolFrame::parse(frame)?;
    match eapol.message_number()? {
        number if number.from_ap() => eapol.receiver(),
        _ => eapol.transmitter(),
    }
}
