//! Radio collaborator interfaces
//!
//! Monitor mode, raw injection, soft-AP and association are provided by the
//! underlying driver. The engine only talks to it through these traits.

use std::collections::HashMap;

use crate::error::Result;

/// Packet class reported by the driver alongside each received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Management frame
    Management,
    /// Control frame
    Control,
    /// Data frame
    Data,
    /// Anything the driver could not classify
    Misc,
}

impl PacketKind {
    /// Whether the classifier looks at this kind of frame at all
    pub fn carries_eapol(self) -> bool {
        matches!(self, Self::Management | Self::Data)
    }
}

/// One received frame, borrowed from the driver for a single handler call.
#[derive(Debug, Clone, Copy)]
pub struct RadioFrame<'a> {
    /// Driver-side packet class
    pub kind: PacketKind,
    /// 802.11 frame starting at frame control, no radiotap
    pub payload: &'a [u8],
    /// Received signal strength, if the driver reports it
    pub rssi: Option<i8>,
    /// Channel the frame was received on
    pub channel: Option<u8>,
}

impl<'a> RadioFrame<'a> {
    /// Frame with only kind and bytes
    pub fn new(kind: PacketKind, payload: &'a [u8]) -> Self {
        Self {
            kind,
            payload,
            rssi: None,
            channel: None,
        }
    }
}

/// Callback installed while listen mode is on
pub type FrameHandler = Box<dyn FnMut(RadioFrame<'_>) + Send + 'static>;

/// Radio operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    /// Station (client) mode
    Station,
    /// Soft access point
    AccessPoint,
    /// Radio off
    Off,
}

/// How a raw frame is handed to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPath {
    /// Driver's normal raw transmit path
    Standard,
    /// Raw transmit with the firmware frame sanity check bypassed
    SanityBypass,
}

/// Radio control surface
pub trait Radio: Send {
    /// Switch operating mode
    fn set_mode(&mut self, mode: RadioMode) -> Result<()>;

    /// Tune to a channel
    fn set_channel(&mut self, channel: u8) -> Result<()>;

    /// Enable listen mode and start delivering frames to `handler`
    fn enable_listen(&mut self, handler: FrameHandler) -> Result<()>;

    /// Disable listen mode; the handler is dropped before this returns
    fn disable_listen(&mut self) -> Result<()>;

    /// Transmit a raw 802.11 frame
    fn transmit_raw(&mut self, frame: &[u8], path: TxPath) -> Result<()>;

    /// Start a soft access point on `channel`
    fn start_soft_ap(&mut self, ssid: &str, channel: u8) -> Result<()>;

    /// Stop the soft access point
    fn stop_soft_ap(&mut self) -> Result<()>;
}

/// Association state reported by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not associated
    Disconnected,
    /// Association in progress
    Connecting,
    /// Associated
    Connected,
    /// Association rejected or timed out at driver level
    Failed,
}

/// Connection-attempt primitive
pub trait Connector {
    /// Begin associating with `ssid` using `password`
    fn begin(&mut self, ssid: &str, password: &str) -> Result<()>;

    /// Current association state
    fn status(&self) -> LinkStatus;

    /// Drop any association
    fn disconnect(&mut self) -> Result<()>;
}

/// Saved-credential lookup keyed by network name
pub trait CredentialStore {
    /// Stored password for `ssid`, if any
    fn password_for(&self, ssid: &str) -> Option<String>;
}

impl CredentialStore for HashMap<String, String> {
    fn password_for(&self, ssid: &str) -> Option<String> {
        self.get(ssid).cloned()
    }
}
