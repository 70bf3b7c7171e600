use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bruce_wifi_wireless::{
    CaptureOutcome, DeauthStats, LinkStatus, NetworkDescriptor, PcapReplayRadio, ReplayConfig,
    ToolkitConfig, TransportHandle, TransportStats, TransportWorker, WifiToolkit,
};
use serde_json::{json, Value};

use crate::cli::{CaptureArgs, Commands, ConnectArgs, DeauthArgs, ReplayArgs, ReportArgs};
use crate::config::ToolConfig;
use crate::credentials::JsonCredentials;

pub type HandlerResult = (String, Value);

type Toolkit = WifiToolkit<PcapReplayRadio, JsonCredentials>;

/// Open the stream destination named on the command line
pub fn open_stream(path: &Path) -> Result<Box<dyn Write + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdout()));
    }
    let file = File::create(path).with_context(|| format!("creating stream file {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Run one command with the record stream going to `stream`.
pub fn dispatch_command<W>(
    root: &Path,
    config: &ToolConfig,
    command: Commands,
    stream: W,
) -> Result<HandlerResult>
where
    W: Write + Send + 'static,
{
    let (transport, worker) =
        TransportWorker::spawn(stream, &config.transport).context("starting transport writer")?;

    let link_failed = LinkStatus::Failed;
    let result = match command {
        Commands::Report(args) => {
            let replay = ReplayArgs::default();
            session(root, config.toolkit.clone(), &transport, &replay, link_failed, |tk| {
                handle_report(tk, args)
            })
        }
        Commands::Capture(args) => {
            let replay = args.replay.clone();
            let toolkit = capture_config(config, args.timeout_ms);
            session(root, toolkit, &transport, &replay, link_failed, |tk| {
                handle_capture(tk, args)
            })
        }
        Commands::DeauthCapture(args) => {
            let replay = args.replay.clone();
            let toolkit = capture_config(config, args.timeout_ms);
            session(root, toolkit, &transport, &replay, link_failed, |tk| {
                handle_deauth_capture(tk, args)
            })
        }
        Commands::Deauth(args) => {
            let replay = args.replay.clone();
            let mut toolkit = config.toolkit.clone();
            if let Some(bursts) = args.bursts {
                toolkit.deauth.bursts = bursts;
            }
            session(root, toolkit, &transport, &replay, link_failed, |tk| {
                handle_deauth(tk, args)
            })
        }
        Commands::Connect(args) => {
            let replay = args.replay.clone();
            let link = args.link.into();
            session(root, config.toolkit.clone(), &transport, &replay, link, |tk| {
                handle_connect(root, tk, args)
            })
        }
    };

    drop(transport);
    let stats = worker.join();
    let (message, mut data) = result?;
    if let Value::Object(map) = &mut data {
        map.insert("transport".into(), transport_json(&stats));
    }
    Ok((message, data))
}

fn capture_config(config: &ToolConfig, timeout_ms: Option<u64>) -> ToolkitConfig {
    let mut toolkit = config.toolkit.clone();
    if let Some(ms) = timeout_ms {
        toolkit.capture.timeout = Duration::from_millis(ms);
    }
    toolkit
}

/// Bracket `op` with the tool start/end markers on a fresh toolkit
fn session(
    root: &Path,
    config: ToolkitConfig,
    transport: &TransportHandle,
    replay: &ReplayArgs,
    link: LinkStatus,
    op: impl FnOnce(&mut Toolkit) -> Result<HandlerResult>,
) -> Result<HandlerResult> {
    let credentials = JsonCredentials::load(root)?;
    let radio = replay_radio(replay, link)?;
    let mut toolkit = WifiToolkit::new(radio, credentials, transport.clone(), config);

    toolkit.begin_session()?;
    let result = op(&mut toolkit);
    toolkit.end_session()?;

    let mut radio = toolkit.into_device();
    radio.finish().context("flushing transmit capture")?;
    result
}

fn replay_radio(args: &ReplayArgs, link: LinkStatus) -> Result<PcapReplayRadio> {
    let config = ReplayConfig {
        frame_delay: Duration::from_millis(args.frame_delay_ms),
        link_status: link,
        honor_channel: args.honor_channel,
    };
    let mut radio = match &args.pcap {
        Some(path) => PcapReplayRadio::open(path, config)
            .with_context(|| format!("loading replay capture {}", path.display()))?,
        None => PcapReplayRadio::new(Vec::new(), config),
    };
    if let Some(path) = &args.tx_pcap {
        radio
            .record_transmissions(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(radio)
}

fn handle_report(toolkit: &mut Toolkit, args: ReportArgs) -> Result<HandlerResult> {
    let contents = fs::read_to_string(&args.networks)
        .with_context(|| format!("reading {}", args.networks.display()))?;
    let networks: Vec<NetworkDescriptor> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", args.networks.display()))?;
    toolkit.report_scan(&networks)?;

    Ok((
        format!("Reported {} networks", networks.len()),
        json!({ "networks": networks }),
    ))
}

fn handle_capture(toolkit: &mut Toolkit, args: CaptureArgs) -> Result<HandlerResult> {
    let target = args.target.descriptor();
    let outcome = toolkit
        .start_capture(&target)
        .with_context(|| format!("capturing on {}", target.ssid))?;
    Ok((capture_message(&target, &outcome), capture_json(&outcome)))
}

fn handle_deauth(toolkit: &mut Toolkit, args: DeauthArgs) -> Result<HandlerResult> {
    let target = args.target.descriptor();
    let stats = toolkit
        .start_deauth(&target)
        .with_context(|| format!("deauthenticating {}", target.bssid))?;
    Ok((
        format!("Sent {} deauth frames to {}", stats.frames_sent, target.ssid),
        json!({ "deauth": deauth_json(&stats) }),
    ))
}

fn handle_deauth_capture(toolkit: &mut Toolkit, args: CaptureArgs) -> Result<HandlerResult> {
    let target = args.target.descriptor();
    let outcome = toolkit
        .deauth_and_capture(&target)
        .with_context(|| format!("deauth and capture on {}", target.ssid))?;
    let mut data = capture_json(&outcome.capture);
    if let Value::Object(map) = &mut data {
        map.insert("deauth".into(), deauth_json(&outcome.deauth));
    }
    Ok((capture_message(&target, &outcome.capture), data))
}

fn handle_connect(root: &Path, toolkit: &mut Toolkit, args: ConnectArgs) -> Result<HandlerResult> {
    let target = args.target.descriptor();
    let outcome = match &args.password {
        Some(password) => toolkit.connect(&target, password),
        None => toolkit.connect_saved(&target),
    }
    .with_context(|| format!("connecting to {}", target.ssid))?;

    if outcome.connected && args.save {
        if let Some(password) = &args.password {
            let mut credentials = JsonCredentials::load(root)?;
            credentials.set(&target.ssid, password);
            credentials.save()?;
            tracing::info!(ssid = %target.ssid, "password saved");
        }
    }

    let message = if outcome.connected {
        format!("Connected to {}", target.ssid)
    } else {
        format!("Could not connect to {}", target.ssid)
    };
    Ok((message, json!({ "connect": outcome })))
}

fn capture_message(target: &NetworkDescriptor, outcome: &CaptureOutcome) -> String {
    match (&outcome.hash_line, &outcome.handshake) {
        (Some(line), _) => format!("PMKID captured: {line}"),
        (None, Some(_)) => format!("Handshake captured for {}", target.ssid),
        (None, None) => format!(
            "No PMKID or handshake from {} within {} ms",
            target.ssid,
            outcome.waited.as_millis()
        ),
    }
}

fn capture_json(outcome: &CaptureOutcome) -> Value {
    let messages: Vec<u8> = outcome.messages_seen.iter().map(|m| m.number()).collect();
    json!({
        "state": outcome.state,
        "succeeded": outcome.succeeded(),
        "pmkid": outcome.pmkid.map(|p| p.to_hex_lower()),
        "station": outcome.station.map(|s| s.to_string()),
        "handshake_complete": outcome.handshake.as_ref().map(|h| h.is_complete()).unwrap_or(false),
        "messages_seen": messages,
        "waited_ms": outcome.waited.as_millis() as u64,
        "hash_line": outcome.hash_line,
    })
}

fn deauth_json(stats: &DeauthStats) -> Value {
    serde_json::to_value(stats).unwrap_or(Value::Null)
}

fn transport_json(stats: &TransportStats) -> Value {
    serde_json::to_value(stats).unwrap_or(Value::Null)
}
