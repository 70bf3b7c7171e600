//! Outbound serial stream
//!
//! Every fact worth reporting leaves the device as a self-delimiting block of
//! ASCII lines:
//!
//! ```text
//! BRUCE_WIFI_DATA
//! 1
//! <KIND>
//! <LENGTH>
//! <HEX PAYLOAD, uppercase>
//! END_BRUCE_WIFI_DATA
//! ```
//!
//! Session markers are bare lines interleaved with the records. Both go
//! through one bounded queue drained by a [`TransportWorker`] thread, so a
//! slow host link never blocks the frame handler.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::error::{FramingError, Result, WirelessError};
use crate::frames::MacAddress;
use crate::network::NetworkDescriptor;

/// Protocol version line sent after every header and tool marker
pub const PROTOCOL_VERSION: u32 = 1;

/// First line of every record
pub const RECORD_HEADER: &str = "BRUCE_WIFI_DATA";

/// Last line of every record
pub const RECORD_TRAILER: &str = "END_BRUCE_WIFI_DATA";

const LINE_END: &str = "\r\n";

/// Record kind carried on the KIND line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    NetInfo,
    Pmkid,
    Handshake,
    RawPacket,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [Self::NetInfo, Self::Pmkid, Self::Handshake, Self::RawPacket];

    pub fn label(self) -> &'static str {
        match self {
            Self::NetInfo => "NET_INFO",
            Self::Pmkid => "PMKID",
            Self::Handshake => "HANDSHAKE",
            Self::RawPacket => "RAW_PKT",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

/// A typed, non-empty payload ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    kind: RecordKind,
    payload: Vec<u8>,
}

impl OutboundRecord {
    pub fn new(kind: RecordKind, payload: Vec<u8>) -> std::result::Result<Self, FramingError> {
        if payload.is_empty() {
            return Err(FramingError::EmptyPayload);
        }
        Ok(Self { kind, payload })
    }

    /// NET_INFO record for a network
    pub fn net_info(network: &NetworkDescriptor) -> Self {
        // encode() always yields at least the fixed fields
        Self {
            kind: RecordKind::NetInfo,
            payload: network.encode(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Wire text of this record
    pub fn encode(&self) -> String {
        frame_lines(self.kind.label(), &self.payload)
    }
}

fn frame_lines(kind: &str, payload: &[u8]) -> String {
    let version = PROTOCOL_VERSION.to_string();
    let len = payload.len().to_string();
    let hex = hex::encode_upper(payload);

    let mut out = String::with_capacity(hex.len() + 64);
    for line in [
        RECORD_HEADER,
        version.as_str(),
        kind,
        len.as_str(),
        hex.as_str(),
        RECORD_TRAILER,
    ] {
        out.push_str(line);
        out.push_str(LINE_END);
    }
    out
}

/// Serialize a `(kind, payload)` pair into wire text.
///
/// Fails only on an empty kind or an empty payload.
pub fn encode_record(kind: &str, payload: &[u8]) -> std::result::Result<String, FramingError> {
    if kind.is_empty() {
        return Err(FramingError::MissingKind);
    }
    if payload.is_empty() {
        return Err(FramingError::EmptyPayload);
    }
    Ok(frame_lines(kind, payload))
}

/// Write one record synchronously to `out`.
///
/// Write errors on the channel are logged and otherwise ignored; the only
/// failures reported are the local precondition checks of [`encode_record`].
pub fn send_data_to_pc<W: Write>(
    out: &mut W,
    kind: &str,
    data: &[u8],
) -> std::result::Result<(), FramingError> {
    let text = encode_record(kind, data)?;
    if let Err(err) = write_text(out, &text) {
        tracing::warn!(target: "bruce_wifi::transport", kind, len = data.len(), "record write failed: {err}");
    }
    Ok(())
}

fn write_text<W: Write + ?Sized>(out: &mut W, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Plain-line session markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    ToolStart,
    ToolEnd,
    ScanResults {
        count: usize,
    },
    DeauthStart {
        ssid: String,
        bssid: MacAddress,
        channel: u8,
    },
    DeauthEnd,
    PmkidCaptureStart {
        ssid: String,
        bssid: MacAddress,
        channel: u8,
    },
    PmkidCaptureEnd,
}

impl Marker {
    pub fn deauth_start(target: &NetworkDescriptor) -> Self {
        Self::DeauthStart {
            ssid: target.ssid.clone(),
            bssid: target.bssid,
            channel: target.channel,
        }
    }

    pub fn capture_start(target: &NetworkDescriptor) -> Self {
        Self::PmkidCaptureStart {
            ssid: target.ssid.clone(),
            bssid: target.bssid,
            channel: target.channel,
        }
    }

    /// Lines of this marker, without terminators
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::ToolStart => vec!["BRUCE_WIFI_TOOL_START".into(), PROTOCOL_VERSION.to_string()],
            Self::ToolEnd => vec!["BRUCE_WIFI_TOOL_END".into(), PROTOCOL_VERSION.to_string()],
            Self::ScanResults { count } => vec!["SCAN_RESULTS".into(), count.to_string()],
            Self::DeauthStart {
                ssid,
                bssid,
                channel,
            } => target_lines("START_DEAUTH", ssid, bssid, *channel),
            Self::DeauthEnd => vec!["END_DEAUTH".into()],
            Self::PmkidCaptureStart {
                ssid,
                bssid,
                channel,
            } => target_lines("START_PMKID_CAPTURE", ssid, bssid, *channel),
            Self::PmkidCaptureEnd => vec!["END_PMKID_CAPTURE".into()],
        }
    }

    /// Wire text of this marker
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            let _ = write!(out, "{}{}", line, LINE_END);
        }
        out
    }
}

fn target_lines(marker: &str, ssid: &str, bssid: &MacAddress, channel: u8) -> Vec<String> {
    vec![
        marker.to_string(),
        format!("SSID:{}", ssid),
        format!("BSSID:{}", bssid),
        format!("CHANNEL:{}", channel),
    ]
}

/// One queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Record(OutboundRecord),
    Marker(Marker),
}

impl Outbound {
    fn encode(&self) -> String {
        match self {
            Self::Record(record) => record.encode(),
            Self::Marker(marker) => marker.encode(),
        }
    }
}

enum Command {
    Send(Outbound),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Items the queue holds before non-blocking submits start dropping
    pub queue_depth: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { queue_depth: 256 }
    }
}

/// Counters kept by the writer thread and its handles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub records_written: u64,
    pub markers_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    records_written: AtomicU64,
    markers_written: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> TransportStats {
        TransportStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            markers_written: self.markers_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the transport queue
#[derive(Clone)]
pub struct TransportHandle {
    tx: SyncSender<Command>,
    counters: Arc<Counters>,
}

impl TransportHandle {
    /// Queue a record, waiting for room
    pub fn send_record(&self, record: OutboundRecord) -> Result<()> {
        self.send(Outbound::Record(record))
    }

    /// Queue a marker, waiting for room
    pub fn send_marker(&self, marker: Marker) -> Result<()> {
        self.send(Outbound::Marker(marker))
    }

    fn send(&self, item: Outbound) -> Result<()> {
        self.tx
            .send(Command::Send(item))
            .map_err(|_| WirelessError::TransportClosed)
    }

    /// Queue a record without waiting; a full or closed queue drops it
    pub fn try_submit(&self, record: OutboundRecord) -> bool {
        let kind = record.kind();
        match self.tx.try_send(Command::Send(Outbound::Record(record))) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "bruce_wifi::transport", kind = kind.label(), "queue full, record dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "bruce_wifi::transport", kind = kind.label(), "transport closed, record dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }
}

/// Writer thread draining the queue into the serial channel
pub struct TransportWorker {
    tx: SyncSender<Command>,
    counters: Arc<Counters>,
    thread: JoinHandle<()>,
}

impl TransportWorker {
    /// Start the writer thread over `out`
    pub fn spawn<W>(out: W, config: &TransportConfig) -> Result<(TransportHandle, TransportWorker)>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(config.queue_depth.max(1));
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let thread = thread::Builder::new()
            .name("bruce-wifi-transport".to_string())
            .spawn(move || drain(out, rx, &worker_counters))?;

        let handle = TransportHandle {
            tx: tx.clone(),
            counters: Arc::clone(&counters),
        };
        Ok((
            handle,
            TransportWorker {
                tx,
                counters,
                thread,
            },
        ))
    }

    /// Write everything queued so far, stop the thread and return the counters
    pub fn join(self) -> TransportStats {
        let _ = self.tx.send(Command::Shutdown);
        if self.thread.join().is_err() {
            tracing::error!(target: "bruce_wifi::transport", "transport writer panicked");
        }
        self.counters.snapshot()
    }
}

fn drain<W: Write>(mut out: W, rx: Receiver<Command>, counters: &Counters) {
    tracing::debug!(target: "bruce_wifi::transport", "transport writer started");
    while let Ok(command) = rx.recv() {
        let item = match command {
            Command::Send(item) => item,
            Command::Shutdown => break,
        };
        let text = item.encode();
        match write_text(&mut out, &text) {
            Ok(()) => {
                let counter = match item {
                    Outbound::Record(_) => &counters.records_written,
                    Outbound::Marker(_) => &counters.markers_written,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                counters
                    .bytes_written
                    .fetch_add(text.len() as u64, Ordering::Relaxed);
            }
            Err(err) => {
                counters.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "bruce_wifi::transport", "stream write failed: {err}");
            }
        }
    }
    tracing::debug!(target: "bruce_wifi::transport", "transport writer stopped");
}

/// Where the frame handler puts the records it produces
pub trait RecordSink: Send {
    /// Hand over a record without blocking; false if it was not queued
    fn submit(&mut self, record: OutboundRecord) -> bool;
}

impl RecordSink for TransportHandle {
    fn submit(&mut self, record: OutboundRecord) -> bool {
        self.try_submit(record)
    }
}

impl RecordSink for Vec<OutboundRecord> {
    fn submit(&mut self, record: OutboundRecord) -> bool {
        self.push(record);
        true
    }
}
