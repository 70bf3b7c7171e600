//! # bruce-wifi-wireless
//!
//! WPA handshake and PMKID capture engine with the BRUCE_WIFI_DATA serial
//! framing used to ship captured material to a host.
//!
//! ## Features
//!
//! - EAPOL key frame recognition and 4-way handshake assembly
//! - PMKID extraction from message 1
//! - Line-oriented hex record framing over a bounded writer queue
//! - Capture controller with a bounded wait
//! - Deauthentication bursts to provoke a fresh handshake
//! - Pcap replay radio for running everything without hardware
//!
//! ## Example
//!
//! ```no_run
//! use bruce_wifi_wireless::{
//!     CaptureController, CaptureConfig, EncryptionType, NetworkDescriptor, PcapReplayRadio,
//!     ReplayConfig, TransportConfig, TransportWorker,
//! };
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut radio = PcapReplayRadio::open(Path::new("capture.pcap"), ReplayConfig::default())?;
//! let (transport, worker) = TransportWorker::spawn(std::io::stdout(), &TransportConfig::default())?;
//!
//! let target = NetworkDescriptor::new(
//!     "HomeNet",
//!     "AA:BB:CC:DD:EE:FF".parse()?,
//!     6,
//!     EncryptionType::Wpa2Psk,
//! );
//! let outcome = CaptureController::new(CaptureConfig::default()).run(&mut radio, &transport, &target)?;
//! if let Some(line) = &outcome.hash_line {
//!     eprintln!("{line}");
//! }
//!
//! drop(transport);
//! worker.join();
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod classifier;
pub mod deauth;
pub mod eapol;
pub mod error;
pub mod frames;
pub mod handshake;
pub mod hashcat;
pub mod network;
pub mod pcap;
pub mod radio;
pub mod radiotap;
pub mod replay;
pub mod toolkit;
pub mod transport;

pub use capture::{CaptureConfig, CaptureController, CaptureOutcome, CaptureState};
pub use classifier::{CaptureEvent, Classification, FrameClassifier};
pub use deauth::{DeauthConfig, DeauthDriver, DeauthStats};
pub use error::{FramingError, Result, WirelessError};
pub use frames::{DeauthFrame, DeauthReason, MacAddress};
pub use handshake::{EapolMessage, HandshakeSession, MessageNumber, Pmkid};
pub use hashcat::{pmkid_display_hash, HandshakeExport, PmkidHash};
pub use network::{EncryptionType, NetworkDescriptor};
pub use radio::{
    Connector, CredentialStore, FrameHandler, LinkStatus, PacketKind, Radio, RadioFrame,
    RadioMode, TxPath,
};
pub use replay::{PcapReplayRadio, ReplayConfig, ReplayFrame};
pub use toolkit::{ConnectConfig, ConnectOutcome, DeauthCaptureOutcome, ToolkitConfig, WifiToolkit};
pub use transport::{
    encode_record, send_data_to_pc, Marker, OutboundRecord, RecordKind, RecordSink,
    TransportConfig, TransportHandle, TransportStats, TransportWorker,
};
