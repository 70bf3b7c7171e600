//! Capability surface for a menu or command line
//!
//! [`WifiToolkit`] bundles the device, the saved credentials and the
//! transport, and exposes one call per user-facing action.

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::capture::{CaptureConfig, CaptureController, CaptureOutcome};
use crate::deauth::{DeauthConfig, DeauthDriver, DeauthStats};
use crate::error::{Result, WirelessError};
use crate::network::NetworkDescriptor;
use crate::radio::{Connector, CredentialStore, LinkStatus, Radio, RadioMode};
use crate::transport::{Marker, OutboundRecord, TransportHandle};

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectOutcome {
    pub ssid: String,
    pub connected: bool,
    #[serde(serialize_with = "link_status_name")]
    pub status: LinkStatus,
    pub waited_ms: u64,
}

fn link_status_name<S: serde::Serializer>(status: &LinkStatus, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:?}", status).to_lowercase())
}

/// Result of deauth followed by capture
#[derive(Debug, Clone)]
pub struct DeauthCaptureOutcome {
    pub deauth: DeauthStats,
    pub capture: CaptureOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct ToolkitConfig {
    pub capture: CaptureConfig,
    pub deauth: DeauthConfig,
    pub connect: ConnectConfig,
}

pub struct WifiToolkit<D, S> {
    device: D,
    credentials: S,
    transport: TransportHandle,
    config: ToolkitConfig,
}

impl<D, S> WifiToolkit<D, S>
where
    D: Radio + Connector,
    S: CredentialStore,
{
    pub fn new(device: D, credentials: S, transport: TransportHandle, config: ToolkitConfig) -> Self {
        Self {
            device,
            credentials,
            transport,
            config,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// `BRUCE_WIFI_TOOL_START`
    pub fn begin_session(&self) -> Result<()> {
        self.transport.send_marker(Marker::ToolStart)
    }

    /// `BRUCE_WIFI_TOOL_END`
    pub fn end_session(&self) -> Result<()> {
        self.transport.send_marker(Marker::ToolEnd)
    }

    /// Report scan results: count line, then one NET_INFO per network
    pub fn report_scan(&self, networks: &[NetworkDescriptor]) -> Result<()> {
        self.transport.send_marker(Marker::ScanResults {
            count: networks.len(),
        })?;
        for network in networks {
            self.transport.send_record(OutboundRecord::net_info(network))?;
        }
        tracing::info!(target: "bruce_wifi::wifi", count = networks.len(), "scan results reported");
        Ok(())
    }

    pub fn start_capture(&mut self, target: &NetworkDescriptor) -> Result<CaptureOutcome> {
        let mut controller = CaptureController::new(self.config.capture.clone());
        controller.run(&mut self.device, &self.transport, target)
    }

    pub fn start_deauth(&mut self, target: &NetworkDescriptor) -> Result<DeauthStats> {
        DeauthDriver::new(self.config.deauth.clone()).run(&mut self.device, &self.transport, target)
    }

    /// Deauth to provoke a fresh handshake, then capture it.
    /// No capture is attempted when the deauth fails.
    pub fn deauth_and_capture(&mut self, target: &NetworkDescriptor) -> Result<DeauthCaptureOutcome> {
        let deauth = self.start_deauth(target)?;
        let capture = self.start_capture(target)?;
        Ok(DeauthCaptureOutcome { deauth, capture })
    }

    /// Associate with `target`; open networks ignore `password`
    pub fn connect(&mut self, target: &NetworkDescriptor, password: &str) -> Result<ConnectOutcome> {
        let password = if target.encryption.is_open() { "" } else { password };

        self.device.set_mode(RadioMode::Station)?;
        self.device.begin(&target.ssid, password)?;

        let started = Instant::now();
        let status = loop {
            let status = self.device.status();
            if matches!(status, LinkStatus::Connected | LinkStatus::Failed)
                || started.elapsed() >= self.config.connect.timeout
            {
                break status;
            }
            thread::sleep(self.config.connect.poll_interval);
        };

        let connected = status == LinkStatus::Connected;
        if connected {
            tracing::info!(target: "bruce_wifi::wifi", ssid = %target.ssid, "connected");
        } else {
            tracing::warn!(target: "bruce_wifi::wifi", ssid = %target.ssid, ?status, "connection failed");
            if let Err(err) = self.device.disconnect() {
                tracing::warn!(target: "bruce_wifi::wifi", "disconnect after failed connect: {err}");
            }
        }

        Ok(ConnectOutcome {
            ssid: target.ssid.clone(),
            connected,
            status,
            waited_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Associate using the saved password for `target`
    pub fn connect_saved(&mut self, target: &NetworkDescriptor) -> Result<ConnectOutcome> {
        if target.encryption.is_open() {
            return self.connect(target, "");
        }
        let password = self
            .credentials
            .password_for(&target.ssid)
            .ok_or_else(|| WirelessError::NoSavedCredential(target.ssid.clone()))?;
        self.connect(target, &password)
    }
}
