//! Line parser for the device stream
//!
//! The device interleaves hex records, plain-line session markers and
//! whatever else it prints on the same serial link. Lines may end in CRLF or
//! LF. Anything outside a record or marker comes back as [`HostEvent::Text`].

use std::io::BufRead;
use std::mem;

use bruce_wifi_wireless::transport::{PROTOCOL_VERSION, RECORD_HEADER, RECORD_TRAILER};
use bruce_wifi_wireless::{MacAddress, RecordKind};

use crate::error::{Result, StreamError};

const TOOL_START: &str = "BRUCE_WIFI_TOOL_START";
const TOOL_END: &str = "BRUCE_WIFI_TOOL_END";
const SCAN_RESULTS: &str = "SCAN_RESULTS";
const START_DEAUTH: &str = "START_DEAUTH";
const END_DEAUTH: &str = "END_DEAUTH";
const START_CAPTURE: &str = "START_PMKID_CAPTURE";
const END_CAPTURE: &str = "END_PMKID_CAPTURE";

/// Target announced by a START_* marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub ssid: String,
    pub bssid: MacAddress,
    pub channel: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ToolStart { version: u32 },
    ToolEnd { version: u32 },
    ScanResults { count: usize },
    DeauthStart(TargetInfo),
    DeauthEnd,
    CaptureStart(TargetInfo),
    CaptureEnd,
    Record { kind: RecordKind, payload: Vec<u8> },
    Text(String),
}

impl HostEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToolStart { .. } => TOOL_START,
            Self::ToolEnd { .. } => TOOL_END,
            Self::ScanResults { .. } => SCAN_RESULTS,
            Self::DeauthStart(_) => START_DEAUTH,
            Self::DeauthEnd => END_DEAUTH,
            Self::CaptureStart(_) => START_CAPTURE,
            Self::CaptureEnd => END_CAPTURE,
            Self::Record { kind, .. } => kind.label(),
            Self::Text(_) => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetMarker {
    Deauth,
    Capture,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Scan,
    ToolVersion {
        end: bool,
    },
    ScanCount,
    TargetSsid(TargetMarker),
    TargetBssid(TargetMarker, String),
    TargetChannel(TargetMarker, String, MacAddress),
    RecordVersion,
    RecordKind,
    RecordLength(RecordKind),
    RecordPayload(RecordKind, usize),
    RecordTrailer(RecordKind, Vec<u8>),
}

impl State {
    fn context(&self) -> Option<&'static str> {
        match self {
            Self::Scan => None,
            Self::ToolVersion { .. } => Some("tool marker"),
            Self::ScanCount => Some("scan results marker"),
            Self::TargetSsid(_) | Self::TargetBssid(..) | Self::TargetChannel(..) => {
                Some("target marker")
            }
            _ => Some("data record"),
        }
    }
}

/// Feeds one line at a time. After an error the parser is back to scanning
/// for the next header, so a caller can log and keep going. A header or
/// marker line that cut the previous block short starts a new one.
#[derive(Debug, Default)]
pub struct StreamParser {
    state: State,
    line: u64,
    pending: Option<HostEvent>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines consumed so far
    pub fn line_number(&self) -> u64 {
        self.line
    }

    /// Event from a marker line that also ended the previous block with an error
    pub fn take_pending(&mut self) -> Option<HostEvent> {
        self.pending.take()
    }

    pub fn push_line(&mut self, raw: &str) -> Result<Option<HostEvent>> {
        self.line += 1;
        let line = raw.trim_end_matches(['\r', '\n']);
        let state = mem::take(&mut self.state);

        match self.step(state, line) {
            Ok((next, event)) => {
                self.state = next;
                Ok(event)
            }
            Err(err) => {
                if is_marker(line) {
                    let (next, event) = self.scan(line);
                    self.state = next;
                    self.pending = event;
                }
                Err(err)
            }
        }
    }

    fn step(&self, state: State, line: &str) -> Result<(State, Option<HostEvent>)> {
        let stepped = match state {
            State::Scan => self.scan(line),
            State::ToolVersion { end } => {
                let version = self.version(line)?;
                let event = if end {
                    HostEvent::ToolEnd { version }
                } else {
                    HostEvent::ToolStart { version }
                };
                (State::Scan, Some(event))
            }
            State::ScanCount => {
                let count = line.parse().map_err(|_| self.unexpected("network count", line))?;
                (State::Scan, Some(HostEvent::ScanResults { count }))
            }
            State::TargetSsid(marker) => {
                let ssid = line
                    .strip_prefix("SSID:")
                    .ok_or_else(|| self.unexpected("SSID: line", line))?;
                (State::TargetBssid(marker, ssid.to_string()), None)
            }
            State::TargetBssid(marker, ssid) => {
                let bssid = line
                    .strip_prefix("BSSID:")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| self.unexpected("BSSID: line", line))?;
                (State::TargetChannel(marker, ssid, bssid), None)
            }
            State::TargetChannel(marker, ssid, bssid) => {
                let channel = line
                    .strip_prefix("CHANNEL:")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| self.unexpected("CHANNEL: line", line))?;
                let target = TargetInfo {
                    ssid,
                    bssid,
                    channel,
                };
                let event = match marker {
                    TargetMarker::Deauth => HostEvent::DeauthStart(target),
                    TargetMarker::Capture => HostEvent::CaptureStart(target),
                };
                (State::Scan, Some(event))
            }
            State::RecordVersion => {
                self.version(line)?;
                (State::RecordKind, None)
            }
            State::RecordKind => {
                let kind = RecordKind::from_label(line).ok_or_else(|| StreamError::UnknownKind {
                    line: self.line,
                    kind: line.to_string(),
                })?;
                (State::RecordLength(kind), None)
            }
            State::RecordLength(kind) => {
                let declared = line
                    .parse::<usize>()
                    .ok()
                    .filter(|len| *len > 0)
                    .ok_or_else(|| StreamError::InvalidLength {
                        line: self.line,
                        value: line.to_string(),
                    })?;
                (State::RecordPayload(kind, declared), None)
            }
            State::RecordPayload(kind, declared) => {
                let payload =
                    hex::decode(line).map_err(|_| StreamError::InvalidHex { line: self.line })?;
                if payload.len() != declared {
                    return Err(StreamError::LengthMismatch {
                        line: self.line,
                        declared,
                        actual: payload.len(),
                    });
                }
                (State::RecordTrailer(kind, payload), None)
            }
            State::RecordTrailer(kind, payload) => {
                if line != RECORD_TRAILER {
                    return Err(self.unexpected(RECORD_TRAILER, line));
                }
                (State::Scan, Some(HostEvent::Record { kind, payload }))
            }
        };
        Ok(stepped)
    }

    /// Call at end of input; errors if a record or marker was cut short.
    pub fn finish(&mut self) -> Result<()> {
        match mem::take(&mut self.state).context() {
            Some(context) => Err(StreamError::Truncated(context)),
            None => Ok(()),
        }
    }

    fn scan(&self, line: &str) -> (State, Option<HostEvent>) {
        match line {
            RECORD_HEADER => (State::RecordVersion, None),
            TOOL_START => (State::ToolVersion { end: false }, None),
            TOOL_END => (State::ToolVersion { end: true }, None),
            SCAN_RESULTS => (State::ScanCount, None),
            START_DEAUTH => (State::TargetSsid(TargetMarker::Deauth), None),
            START_CAPTURE => (State::TargetSsid(TargetMarker::Capture), None),
            END_DEAUTH => (State::Scan, Some(HostEvent::DeauthEnd)),
            END_CAPTURE => (State::Scan, Some(HostEvent::CaptureEnd)),
            "" => (State::Scan, None),
            other => (State::Scan, Some(HostEvent::Text(other.to_string()))),
        }
    }

    fn version(&self, line: &str) -> Result<u32> {
        match line.parse::<u32>() {
            Ok(version) if version == PROTOCOL_VERSION => Ok(version),
            _ => Err(StreamError::UnsupportedVersion {
                line: self.line,
                found: line.to_string(),
            }),
        }
    }

    fn unexpected(&self, expected: &'static str, found: &str) -> StreamError {
        StreamError::Unexpected {
            line: self.line,
            expected,
            found: found.to_string(),
        }
    }
}

fn is_marker(line: &str) -> bool {
    matches!(
        line,
        RECORD_HEADER
            | TOOL_START
            | TOOL_END
            | SCAN_RESULTS
            | START_DEAUTH
            | END_DEAUTH
            | START_CAPTURE
            | END_CAPTURE
    )
}

/// Iterator of events over a buffered reader
pub struct EventReader<R: BufRead> {
    reader: R,
    parser: StreamParser,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: StreamParser::new(),
            buf: Vec::with_capacity(4096),
            done: false,
        }
    }

    pub fn line_number(&self) -> u64 {
        self.parser.line_number()
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<HostEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.parser.take_pending() {
            return Some(Ok(event));
        }
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return self.parser.finish().err().map(Err);
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    match self.parser.push_line(&line) {
                        Ok(Some(event)) => return Some(Ok(event)),
                        Ok(None) => continue,
                        Err(err) => return Some(Err(err)),
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
        None
    }
}
