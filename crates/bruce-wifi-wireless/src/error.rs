//! Error types for bruce-wifi-wireless

use thiserror::Error;

/// Result type alias for wireless operations
pub type Result<T> = std::result::Result<T, WirelessError>;

/// Main error type for wireless operations
#[derive(Error, Debug)]
pub enum WirelessError {
    /// Radio could not be brought into the state an operation needs
    #[error("Radio setup error: {0}")]
    RadioSetup(String),

    /// Channel setting failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Raw frame transmission failed
    #[error("Injection error: {0}")]
    Injection(String),

    /// Listen (promiscuous) mode failed
    #[error("Capture error: {0}")]
    Capture(String),

    /// Association attempt failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// No stored credential for the requested network
    #[error("No saved password for network '{0}'")]
    NoSavedCredential(String),

    /// Invalid MAC address
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// Invalid frame format
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Malformed capture file
    #[error("Pcap error: {0}")]
    Pcap(String),

    /// Outbound record rejected before it reached the channel
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// The transport writer thread has gone away
    #[error("Transport closed")]
    TransportClosed,

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WirelessError {
    /// Create a radio setup error
    pub fn radio_setup(msg: impl Into<String>) -> Self {
        Self::RadioSetup(msg.into())
    }

    /// Create an injection error
    pub fn injection(msg: impl Into<String>) -> Self {
        Self::Injection(msg.into())
    }

    /// Check if this error came from radio setup
    pub fn is_radio_setup(&self) -> bool {
        matches!(self, Self::RadioSetup(_))
    }
}

/// Local precondition failures of the record framer.
///
/// These are the only failures the framer reports; write errors on the
/// channel itself are handled by the transport worker.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Record kind label was empty
    #[error("record kind is missing")]
    MissingKind,

    /// Payload was empty
    #[error("record payload is empty")]
    EmptyPayload,
}
