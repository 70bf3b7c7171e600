//! Pcap replay radio
//!
//! A [`Radio`] + [`Connector`] that feeds a recorded capture into the frame
//! handler from a background thread and records every transmitted frame into
//! an optional output pcap. Lets the whole capture flow run without hardware.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crate::error::{Result, WirelessError};
use crate::frames::FrameType;
use crate::pcap::{PcapReader, PcapWriter, LINKTYPE_IEEE802_11, LINKTYPE_IEEE802_11_RADIOTAP};
use crate::radio::{
    Connector, FrameHandler, LinkStatus, PacketKind, Radio, RadioFrame, RadioMode, TxPath,
};
use crate::radiotap::{self, RadiotapInfo};

/// A frame loaded from the capture, radiotap already stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFrame {
    pub kind: PacketKind,
    pub data: Vec<u8>,
    pub rssi: Option<i8>,
    pub channel: Option<u8>,
}

impl ReplayFrame {
    /// Bare 802.11 frame; packet kind taken from its frame control
    pub fn from_80211(data: Vec<u8>) -> Self {
        let kind = match FrameType::of_frame(&data) {
            Some(FrameType::Management) => PacketKind::Management,
            Some(FrameType::Control) => PacketKind::Control,
            Some(FrameType::Data) => PacketKind::Data,
            Some(FrameType::Extension) | None => PacketKind::Misc,
        };
        Self {
            kind,
            data,
            rssi: None,
            channel: None,
        }
    }

    fn from_radiotap(data: &[u8]) -> Result<Self> {
        let (header, frame) = radiotap::split(data)?;
        let info = RadiotapInfo::parse(header);
        let mut replay = Self::from_80211(frame.to_vec());
        replay.rssi = info.signal_dbm;
        replay.channel = info.channel;
        Ok(replay)
    }

    fn as_radio_frame(&self) -> RadioFrame<'_> {
        RadioFrame {
            kind: self.kind,
            payload: &self.data,
            rssi: self.rssi,
            channel: self.channel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Pause between delivered frames
    pub frame_delay: Duration,
    /// Status reported once an association has begun
    pub link_status: LinkStatus,
    /// Only deliver frames whose recorded channel matches the tuned one
    pub honor_channel: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(5),
            link_status: LinkStatus::Failed,
            honor_channel: false,
        }
    }
}

struct Listener {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

pub struct PcapReplayRadio {
    frames: Arc<Vec<ReplayFrame>>,
    config: ReplayConfig,
    mode: RadioMode,
    channel: Option<u8>,
    listener: Option<Listener>,
    soft_ap: Option<(String, u8)>,
    transmitted: Option<PcapWriter<Box<dyn Write + Send>>>,
    frames_transmitted: u64,
    link: LinkStatus,
}

impl PcapReplayRadio {
    pub fn new(frames: Vec<ReplayFrame>, config: ReplayConfig) -> Self {
        Self {
            frames: Arc::new(frames),
            config,
            mode: RadioMode::Off,
            channel: None,
            listener: None,
            soft_ap: None,
            transmitted: None,
            frames_transmitted: 0,
            link: LinkStatus::Disconnected,
        }
    }

    /// Load every frame of a classic pcap file
    pub fn open(path: &Path, config: ReplayConfig) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| WirelessError::Pcap(format!("cannot open {}: {}", path.display(), e)))?;
        let frames = load_frames(BufReader::new(file))?;
        tracing::info!(target: "bruce_wifi::wifi", path = %path.display(), frames = frames.len(), "loaded replay capture");
        Ok(Self::new(frames, config))
    }

    /// Record transmitted frames into a LINKTYPE_IEEE802_11 pcap at `path`
    pub fn record_transmissions(&mut self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let out: Box<dyn Write + Send> = Box::new(BufWriter::new(file));
        self.transmitted = Some(PcapWriter::new(out, LINKTYPE_IEEE802_11)?);
        Ok(())
    }

    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn soft_ap(&self) -> Option<(&str, u8)> {
        self.soft_ap.as_ref().map(|(ssid, ch)| (ssid.as_str(), *ch))
    }

    pub fn frames_transmitted(&self) -> u64 {
        self.frames_transmitted
    }

    /// Flush the transmit pcap, if any
    pub fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.transmitted.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Block until every frame has been delivered, then drop the handler
    pub fn wait_replay_done(&mut self) {
        if let Some(listener) = self.listener.take() {
            if listener.thread.join().is_err() {
                tracing::error!(target: "bruce_wifi::wifi", "replay thread panicked");
            }
        }
    }

    fn stop_listener(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop.store(true, Ordering::Relaxed);
            if listener.thread.join().is_err() {
                tracing::error!(target: "bruce_wifi::wifi", "replay thread panicked");
            }
        }
    }
}

/// Parse a pcap stream into replay frames
pub fn load_frames<R: Read>(input: R) -> Result<Vec<ReplayFrame>> {
    let reader = PcapReader::new(input)?;
    let linktype = reader.linktype();
    if linktype != LINKTYPE_IEEE802_11 && linktype != LINKTYPE_IEEE802_11_RADIOTAP {
        return Err(WirelessError::Pcap(format!(
            "unsupported link type {} (need {} or {})",
            linktype, LINKTYPE_IEEE802_11, LINKTYPE_IEEE802_11_RADIOTAP
        )));
    }

    let mut frames = Vec::new();
    for packet in reader {
        let packet = packet?;
        if linktype == LINKTYPE_IEEE802_11 {
            frames.push(ReplayFrame::from_80211(packet.data));
            continue;
        }
        match ReplayFrame::from_radiotap(&packet.data) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                tracing::debug!(target: "bruce_wifi::wifi", "skipping packet: {err}")
            }
        }
    }
    Ok(frames)
}

fn replay(
    frames: Arc<Vec<ReplayFrame>>,
    mut handler: FrameHandler,
    stop: Arc<AtomicBool>,
    channel: Option<u8>,
    config: ReplayConfig,
) {
    let mut delivered = 0usize;
    for frame in frames.iter() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if config.honor_channel && frame.channel.is_some() && frame.channel != channel {
            continue;
        }
        handler(frame.as_radio_frame());
        delivered += 1;
        if !config.frame_delay.is_zero() {
            thread::sleep(config.frame_delay);
        }
    }
    tracing::debug!(target: "bruce_wifi::wifi", delivered, "replay finished");
}

impl Radio for PcapReplayRadio {
    fn set_mode(&mut self, mode: RadioMode) -> Result<()> {
        tracing::debug!(target: "bruce_wifi::wifi", ?mode, "replay radio mode");
        self.mode = mode;
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        if radiotap::channel_to_frequency(channel).is_none() {
            return Err(WirelessError::Channel(format!("Invalid channel: {}", channel)));
        }
        self.channel = Some(channel);
        Ok(())
    }

    fn enable_listen(&mut self, handler: FrameHandler) -> Result<()> {
        if self.mode == RadioMode::Off {
            return Err(WirelessError::Capture("radio is off".into()));
        }
        self.stop_listener();

        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::clone(&self.frames);
        let thread_stop = Arc::clone(&stop);
        let channel = self.channel;
        let config = self.config.clone();
        let thread = thread::Builder::new()
            .name("bruce-wifi-replay".to_string())
            .spawn(move || replay(frames, handler, thread_stop, channel, config))
            .map_err(|e| WirelessError::Capture(format!("failed to start replay thread: {}", e)))?;

        self.listener = Some(Listener { stop, thread });
        Ok(())
    }

    fn disable_listen(&mut self) -> Result<()> {
        self.stop_listener();
        Ok(())
    }

    fn transmit_raw(&mut self, frame: &[u8], path: TxPath) -> Result<()> {
        if self.mode == RadioMode::Off {
            return Err(WirelessError::injection("radio is off"));
        }
        if let Some(writer) = self.transmitted.as_mut() {
            writer
                .write_packet(SystemTime::now(), frame)
                .map_err(|e| WirelessError::injection(e.to_string()))?;
        }
        self.frames_transmitted += 1;
        tracing::trace!(target: "bruce_wifi::wifi", len = frame.len(), ?path, "replay radio transmit");
        Ok(())
    }

    fn start_soft_ap(&mut self, ssid: &str, channel: u8) -> Result<()> {
        if self.mode != RadioMode::AccessPoint {
            return Err(WirelessError::radio_setup("not in access point mode"));
        }
        self.set_channel(channel)
            .map_err(|e| WirelessError::radio_setup(e.to_string()))?;
        self.soft_ap = Some((ssid.to_string(), channel));
        Ok(())
    }

    fn stop_soft_ap(&mut self) -> Result<()> {
        self.soft_ap = None;
        Ok(())
    }
}

impl Connector for PcapReplayRadio {
    fn begin(&mut self, ssid: &str, _password: &str) -> Result<()> {
        if self.mode != RadioMode::Station {
            return Err(WirelessError::Connection("not in station mode".into()));
        }
        tracing::debug!(target: "bruce_wifi::wifi", ssid, "replay radio association");
        self.link = self.config.link_status;
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.link
    }

    fn disconnect(&mut self) -> Result<()> {
        self.link = LinkStatus::Disconnected;
        Ok(())
    }
}

impl Drop for PcapReplayRadio {
    fn drop(&mut self) {
        self.stop_listener();
        if let Err(err) = self.finish() {
            tracing::warn!(target: "bruce_wifi::wifi", "failed to flush transmit capture: {err}");
        }
    }
}
