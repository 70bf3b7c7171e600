//! Capture session controller
//!
//! Drives one capture attempt: arm the radio with a fresh classifier, provoke
//! the target with a wrong password, wait for a PMKID or a complete handshake,
//! then disarm. A failed attempt is final; callers re-run the whole thing.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::classifier::{CaptureEvent, FrameClassifier};
use crate::error::Result;
use crate::frames::MacAddress;
use crate::handshake::{HandshakeSession, MessageNumber, Pmkid};
use crate::hashcat::pmkid_display_hash;
use crate::network::{EncryptionType, NetworkDescriptor};
use crate::radio::{Connector, Radio, RadioMode};
use crate::transport::{Marker, OutboundRecord, TransportHandle};

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Wall-clock bound on the waiting phase
    pub timeout: Duration,
    /// How often the controller wakes while waiting
    pub poll_interval: Duration,
    /// Credential used to provoke the handshake; never expected to work
    pub probe_password: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            poll_interval: Duration::from_millis(100),
            probe_password: "FAKEWRONGPASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Armed,
    Waiting,
    Succeeded,
    TimedOut,
}

/// Result of one capture attempt
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Succeeded or TimedOut
    pub state: CaptureState,
    pub pmkid: Option<Pmkid>,
    /// Station address from message 1
    pub station: Option<MacAddress>,
    /// Session snapshot taken when message 4 arrived
    pub handshake: Option<HandshakeSession>,
    pub messages_seen: Vec<MessageNumber>,
    pub waited: Duration,
    /// `*SSID:bssid:pmkid` line for local display
    pub hash_line: Option<String>,
}

impl CaptureOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == CaptureState::Succeeded
    }
}

#[derive(Default)]
struct Collected {
    pmkid: Option<(MacAddress, MacAddress, Pmkid)>,
    handshake: Option<HandshakeSession>,
    messages: Vec<MessageNumber>,
    undelivered: Vec<OutboundRecord>,
}

impl Collected {
    fn apply(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Message(number) => {
                if !self.messages.contains(&number) {
                    self.messages.push(number);
                }
            }
            CaptureEvent::Pmkid {
                bssid,
                station,
                pmkid,
            } => self.pmkid = Some((bssid, station, pmkid)),
            CaptureEvent::HandshakeComplete(session) => self.handshake = Some(*session),
            CaptureEvent::Undelivered(record) => self.undelivered.push(record),
        }
    }

    fn done(&self) -> bool {
        self.pmkid.is_some() || self.handshake.is_some()
    }
}

pub struct CaptureController {
    config: CaptureConfig,
    state: CaptureState,
    transitions: Vec<CaptureState>,
}

impl CaptureController {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            transitions: vec![CaptureState::Idle],
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// States visited by the last run, starting and ending at Idle
    pub fn transitions(&self) -> &[CaptureState] {
        &self.transitions
    }

    fn enter(&mut self, state: CaptureState) {
        tracing::debug!(target: "bruce_wifi::wifi", from = ?self.state, to = ?state, "capture state");
        self.state = state;
        self.transitions.push(state);
    }

    /// Run one capture attempt against `target`.
    ///
    /// A timeout is reported in the outcome, not as an error. Radio setup
    /// failures abort the attempt and are returned.
    pub fn run<D>(
        &mut self,
        device: &mut D,
        transport: &TransportHandle,
        target: &NetworkDescriptor,
    ) -> Result<CaptureOutcome>
    where
        D: Radio + Connector,
    {
        self.state = CaptureState::Idle;
        self.transitions = vec![CaptureState::Idle];

        tracing::info!(
            target: "bruce_wifi::wifi",
            ssid = %target.ssid,
            bssid = %target.bssid,
            channel = target.channel,
            "starting PMKID/handshake capture"
        );

        transport.send_marker(Marker::capture_start(target))?;
        transport.send_record(OutboundRecord::net_info(
            &target.with_encryption(EncryptionType::Wpa2Psk),
        ))?;

        let (events_tx, events_rx) = mpsc::channel();
        let session = HandshakeSession::for_target(target.bssid, &target.ssid);
        let classifier = FrameClassifier::new(session, transport.clone()).with_events(events_tx);

        if let Err(err) = self.arm(device, classifier, target.channel) {
            tracing::error!(target: "bruce_wifi::wifi", "capture setup failed: {err}");
            self.disarm(device);
            return Err(err);
        }
        self.enter(CaptureState::Armed);

        if let Err(err) = device.begin(&target.ssid, &self.config.probe_password) {
            tracing::error!(target: "bruce_wifi::wifi", "probe association failed to start: {err}");
            self.disarm(device);
            self.enter(CaptureState::Idle);
            return Err(err);
        }
        self.enter(CaptureState::Waiting);

        let started = Instant::now();
        let mut collected = self.wait(&events_rx);
        let waited = started.elapsed();

        self.enter(if collected.done() {
            CaptureState::Succeeded
        } else {
            CaptureState::TimedOut
        });
        let state = self.state;

        self.disarm(device);
        // Handler is gone now; anything it refused is still in the channel
        for event in events_rx.try_iter() {
            if let CaptureEvent::Undelivered(record) = event {
                collected.undelivered.push(record);
            }
        }
        for record in collected.undelivered.drain(..) {
            tracing::info!(
                target: "bruce_wifi::wifi",
                kind = record.kind().label(),
                "sending deferred record"
            );
            transport.send_record(record)?;
        }
        transport.send_marker(Marker::PmkidCaptureEnd)?;
        self.enter(CaptureState::Idle);

        let hash_line = collected
            .pmkid
            .as_ref()
            .map(|(_, _, pmkid)| pmkid_display_hash(&target.ssid, target.bssid, pmkid));

        match (&hash_line, &collected.handshake) {
            (Some(line), _) => {
                tracing::info!(target: "bruce_wifi::wifi", waited_ms = waited.as_millis() as u64, "PMKID captured: {line}")
            }
            (None, Some(_)) => {
                tracing::info!(target: "bruce_wifi::wifi", waited_ms = waited.as_millis() as u64, "full WPA handshake captured")
            }
            (None, None) => tracing::warn!(
                target: "bruce_wifi::wifi",
                messages = ?collected.messages,
                "no PMKID or handshake captured; router may not support PMKID"
            ),
        }

        Ok(CaptureOutcome {
            state,
            pmkid: collected.pmkid.map(|(_, _, pmkid)| pmkid),
            station: collected.pmkid.map(|(_, station, _)| station).or_else(|| {
                collected
                    .handshake
                    .as_ref()
                    .map(|session| session.station())
            }),
            handshake: collected.handshake,
            messages_seen: collected.messages,
            waited,
            hash_line,
        })
    }

    fn arm<D, S>(&mut self, device: &mut D, classifier: FrameClassifier<S>, channel: u8) -> Result<()>
    where
        D: Radio + Connector,
        S: crate::transport::RecordSink + 'static,
    {
        device.set_mode(RadioMode::Station)?;
        device.set_channel(channel)?;
        device.enable_listen(classifier.into_handler())?;
        Ok(())
    }

    fn wait(&self, events: &Receiver<CaptureEvent>) -> Collected {
        let mut collected = Collected::default();
        let deadline = Instant::now() + self.config.timeout;
        let poll = self.config.poll_interval.max(Duration::from_millis(1));

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(poll);
            match events.recv_timeout(slice) {
                Ok(event) => {
                    collected.apply(event);
                    // Pick up anything queued behind it before checking
                    for event in events.try_iter() {
                        collected.apply(event);
                    }
                    if collected.done() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Handler already gone; only the deadline can end the wait
                Err(RecvTimeoutError::Disconnected) => thread::sleep(slice),
            }
        }
        collected
    }

    fn disarm<D>(&mut self, device: &mut D)
    where
        D: Radio + Connector,
    {
        if let Err(err) = device.disable_listen() {
            tracing::warn!(target: "bruce_wifi::wifi", "failed to disable listen mode: {err}");
        }
        if let Err(err) = device.disconnect() {
            tracing::warn!(target: "bruce_wifi::wifi", "failed to disconnect: {err}");
        }
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new(CaptureConfig::default())
    }
}
