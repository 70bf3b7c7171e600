//! Frame classifier
//!
//! Runs inside the radio's frame handler. For each frame it decides whether
//! it is EAPOL, forwards it raw, classifies the handshake message, updates
//! the session it owns and reports progress to the capture controller.

use std::sync::mpsc::Sender;

use crate::eapol::EapolFrame;
use crate::frames::MacAddress;
use crate::handshake::{HandshakeSession, MessageNumber, Pmkid};
use crate::radio::{FrameHandler, RadioFrame};
use crate::transport::{OutboundRecord, RecordKind, RecordSink};

/// Progress published to the capture controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A handshake message was stored
    Message(MessageNumber),
    /// Message 1 carried a PMKID
    Pmkid {
        bssid: MacAddress,
        station: MacAddress,
        pmkid: Pmkid,
    },
    /// Message 4 was stored; snapshot of the session at that point
    HandshakeComplete(Box<HandshakeSession>),
    /// PMKID or HANDSHAKE record the sink had no room for; the controller
    /// sends it with a blocking write
    Undelivered(OutboundRecord),
}

/// What one call to [`FrameClassifier::handle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Wrong packet kind, wrong EtherType or too short
    Ignored,
    /// EAPOL frame forwarded raw but not a recognised key message
    Eapol,
    /// Handshake message stored
    Message {
        number: MessageNumber,
        pmkid: bool,
    },
}

pub struct FrameClassifier<S: RecordSink> {
    session: HandshakeSession,
    sink: S,
    events: Option<Sender<CaptureEvent>>,
}

impl<S: RecordSink> FrameClassifier<S> {
    pub fn new(session: HandshakeSession, sink: S) -> Self {
        Self {
            session,
            sink,
            events: None,
        }
    }

    /// Publish progress on `events`
    pub fn with_events(mut self, events: Sender<CaptureEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &HandshakeSession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (HandshakeSession, S) {
        (self.session, self.sink)
    }

    /// Classify one frame. Nothing borrowed from `frame` outlives the call.
    pub fn handle(&mut self, frame: RadioFrame<'_>) -> Classification {
        if !frame.kind.carries_eapol() {
            return Classification::Ignored;
        }
        let Some(eapol) = EapolFrame::parse(frame.payload) else {
            return Classification::Ignored;
        };

        if let Some(record) = frame_record(RecordKind::RawPacket, eapol.raw().to_vec()) {
            self.sink.submit(record);
        }

        let Some(number) = eapol.message_number() else {
            tracing::trace!(target: "bruce_wifi::wifi", len = frame.payload.len(), "EAPOL frame without a known key message");
            return Classification::Eapol;
        };

        let mut found_pmkid = false;
        if number == MessageNumber::One {
            if let (Some(ap), Some(station)) = (eapol.transmitter(), eapol.receiver()) {
                self.session.record_addresses(ap, station);
            }
            if let Some(pmkid) = eapol.pmkid() {
                found_pmkid = true;
                self.session.set_pmkid(pmkid);
                self.submit_artifact(RecordKind::Pmkid, pmkid.as_bytes().to_vec());
                tracing::info!(
                    target: "bruce_wifi::wifi",
                    bssid = %self.session.bssid(),
                    station = %self.session.station(),
                    "PMKID found in message 1"
                );
                self.publish(CaptureEvent::Pmkid {
                    bssid: self.session.bssid(),
                    station: self.session.station(),
                    pmkid,
                });
            }
        }

        self.session.store_message(number, eapol.eapol());
        tracing::debug!(target: "bruce_wifi::wifi", message = %number, rssi = ?frame.rssi, "handshake message stored");
        self.publish(CaptureEvent::Message(number));

        if number == MessageNumber::Four {
            self.submit_artifact(RecordKind::Handshake, self.session.encode());
            tracing::info!(
                target: "bruce_wifi::wifi",
                captured = ?self.session.captured(),
                "handshake complete"
            );
            self.publish(CaptureEvent::HandshakeComplete(Box::new(self.session.clone())));
        }

        Classification::Message {
            number,
            pmkid: found_pmkid,
        }
    }

    /// Artifacts must reach the host, so a refused one goes back to the
    /// controller instead of being dropped
    fn submit_artifact(&mut self, kind: RecordKind, payload: Vec<u8>) {
        let Some(record) = frame_record(kind, payload) else {
            return;
        };
        if !self.sink.submit(record.clone()) {
            tracing::debug!(target: "bruce_wifi::wifi", kind = kind.label(), "queue full, deferring record to controller");
            self.publish(CaptureEvent::Undelivered(record));
        }
    }

    fn publish(&self, event: CaptureEvent) {
        if let Some(events) = &self.events {
            // Controller may already have stopped listening
            let _ = events.send(event);
        }
    }
}

fn frame_record(kind: RecordKind, payload: Vec<u8>) -> Option<OutboundRecord> {
    match OutboundRecord::new(kind, payload) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(target: "bruce_wifi::wifi", kind = kind.label(), "record not framed: {err}");
            None
        }
    }
}

impl<S: RecordSink + 'static> FrameClassifier<S> {
    /// Box the classifier as a radio frame handler
    pub fn into_handler(mut self) -> FrameHandler {
        Box::new(move |frame| {
            self.handle(frame);
        })
    }
}
