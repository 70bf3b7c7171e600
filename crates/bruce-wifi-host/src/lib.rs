//! Host side of the BRUCE_WIFI_DATA link: parse the device stream and keep
//! what it captured.

pub mod cli;
pub mod error;
pub mod reader;
pub mod serial;
pub mod store;

use std::io::BufRead;

use anyhow::Result;
use bruce_wifi_logging::targets::T_HOST;
use serde::Serialize;

pub use cli::{Cli, OutputFormat};
pub use error::StreamError;
pub use reader::{EventReader, HostEvent, StreamParser, TargetInfo};
pub use store::{CaptureStore, StoreSummary};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub store: StoreSummary,
    pub events: usize,
    pub stream_errors: usize,
    pub sessions_completed: usize,
    pub suggested_command: Option<String>,
}

/// Drain `input` into `store` until end of stream. Malformed records are
/// logged and skipped; only I/O and storage failures stop the run.
pub fn consume<R: BufRead>(input: R, store: &mut CaptureStore) -> Result<SessionReport> {
    let mut report = SessionReport::default();
    for item in EventReader::new(input) {
        let event = match item {
            Ok(event) => event,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                report.stream_errors += 1;
                tracing::warn!(target: T_HOST, "{err}");
                continue;
            }
        };
        report.events += 1;
        log_event(&event);
        if matches!(event, HostEvent::ToolEnd { .. }) {
            report.sessions_completed += 1;
        }
        store.handle(&event)?;
    }

    store.flush()?;
    report.store = store.summary().clone();
    report.suggested_command = store.suggested_command();
    Ok(report)
}

fn log_event(event: &HostEvent) {
    match event {
        HostEvent::Text(text) => tracing::debug!(target: T_HOST, "device: {text}"),
        HostEvent::ScanResults { count } => {
            tracing::info!(target: T_HOST, count, "scan results")
        }
        HostEvent::DeauthStart(t) | HostEvent::CaptureStart(t) => tracing::info!(
            target: T_HOST,
            ssid = %t.ssid,
            bssid = %t.bssid,
            channel = t.channel,
            "{}",
            event.label()
        ),
        HostEvent::Record { kind, payload } => {
            tracing::debug!(target: T_HOST, kind = kind.label(), len = payload.len(), "record")
        }
        other => tracing::info!(target: T_HOST, "{}", other.label()),
    }
}
