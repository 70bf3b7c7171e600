use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use bruce_wifi_core::{dispatch_command, Cli, ToolConfig};
use bruce_wifi_wireless::pcap::{PcapReader, PcapWriter, LINKTYPE_IEEE802_11};
use clap::Parser;

const BSSID: &str = "00:11:22:33:44:55";
const AP: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
const STA: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB];

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quick_config() -> ToolConfig {
    let mut config = ToolConfig::default();
    config.toolkit.capture.timeout = Duration::from_secs(3);
    config.toolkit.capture.poll_interval = Duration::from_millis(10);
    config.toolkit.deauth.interval = Duration::from_millis(1);
    config.toolkit.deauth.settle = Duration::from_millis(1);
    config.toolkit.connect.timeout = Duration::from_millis(200);
    config.toolkit.connect.poll_interval = Duration::from_millis(10);
    config
}

/// Message 1 from the AP carrying a PMKID KDE at key-data offset 0
fn message_one_with_pmkid() -> Vec<u8> {
    let mut frame = vec![0x08, 0x02, 0x3A, 0x01];
    frame.extend_from_slice(&STA);
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&AP);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]);
    let mut eapol = vec![0u8; 95 + 24];
    eapol[0] = 0x02;
    eapol[1] = 0x03;
    eapol[95] = 0xDD;
    eapol[96] = 0x14;
    eapol[99..103].copy_from_slice(&[0x00, 0x0F, 0xAC, 0x04]);
    for (i, b) in eapol[103..119].iter_mut().enumerate() {
        *b = 0xA0 + i as u8;
    }
    frame.extend_from_slice(&eapol);
    frame
}

fn write_pcap(path: &Path, frames: &[Vec<u8>]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = PcapWriter::new(file, LINKTYPE_IEEE802_11).unwrap();
    for frame in frames {
        writer.write_packet(SystemTime::now(), frame).unwrap();
    }
    writer.flush().unwrap();
}

fn target_args<'a>(cmd: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "bruce-wifi",
        cmd,
        "--ssid",
        "HomeNet",
        "--bssid",
        BSSID,
        "--channel",
        "6",
    ];
    args.extend_from_slice(extra);
    args
}

fn run(root: &Path, args: &[&str]) -> (anyhow::Result<bruce_wifi_core::HandlerResult>, String) {
    let cli = Cli::parse_from(args);
    let buf = SharedBuf::default();
    let result = dispatch_command(root, &quick_config(), cli.command, buf.clone());
    (result, buf.text())
}

#[test]
fn capture_from_replayed_pcap() {
    let dir = tempfile::tempdir().unwrap();
    let pcap = dir.path().join("in.pcap");
    write_pcap(&pcap, &[message_one_with_pmkid()]);

    let pcap_arg = pcap.to_str().unwrap();
    let (result, stream) = run(
        dir.path(),
        &target_args("capture", &["--pcap", pcap_arg, "--frame-delay-ms", "1"]),
    );
    let (message, data) = result.unwrap();

    let pmkid = "a0a1a2a3a4a5a6a7a8a9aaabacadaeaf";
    assert_eq!(message, format!("PMKID captured: *HomeNet:001122334455:{pmkid}"));
    assert_eq!(data["succeeded"], true);
    assert_eq!(data["state"], "succeeded");
    assert_eq!(data["pmkid"], pmkid);
    assert_eq!(data["station"], "66:77:88:99:AA:BB");
    assert_eq!(data["transport"]["dropped"], 0);

    assert!(stream.starts_with(
        "BRUCE_WIFI_TOOL_START\r\n1\r\nSTART_PMKID_CAPTURE\r\nSSID:HomeNet\r\nBSSID:00:11:22:33:44:55\r\nCHANNEL:6\r\n"
    ));
    assert!(stream.contains(&format!("\r\nPMKID\r\n16\r\n{}\r\n", pmkid.to_uppercase())));
    assert!(stream.ends_with("END_PMKID_CAPTURE\r\nBRUCE_WIFI_TOOL_END\r\n1\r\n"));
}

#[test]
fn capture_times_out_without_traffic() {
    let dir = tempfile::tempdir().unwrap();
    let (result, stream) = run(dir.path(), &target_args("capture", &["--timeout-ms", "200"]));
    let (message, data) = result.unwrap();

    assert!(message.starts_with("No PMKID or handshake from HomeNet"));
    assert_eq!(data["succeeded"], false);
    assert_eq!(data["state"], "timed_out");
    assert!(data["waited_ms"].as_u64().unwrap() >= 200);
    assert!(data["pmkid"].is_null());
    assert!(stream.contains("END_PMKID_CAPTURE\r\n"));
}

#[test]
fn deauth_records_transmissions() {
    let dir = tempfile::tempdir().unwrap();
    let tx = dir.path().join("tx.pcap");
    let tx_arg = tx.to_str().unwrap();
    let (result, stream) = run(
        dir.path(),
        &target_args("deauth", &["--bursts", "4", "--tx-pcap", tx_arg]),
    );
    let (_, data) = result.unwrap();
    assert_eq!(data["deauth"]["bursts"], 4);
    assert_eq!(data["deauth"]["frames_sent"], 8);
    assert!(stream.contains("START_DEAUTH\r\nSSID:HomeNet\r\n"));
    assert!(stream.contains("END_DEAUTH\r\n"));

    let reader = PcapReader::new(fs::File::open(&tx).unwrap()).unwrap();
    let frames: Vec<_> = reader.map(|p| p.unwrap().data).collect();
    assert_eq!(frames.len(), 8);
    assert!(frames.iter().all(|f| f[0] == 0xC0 && f[16..22] == AP));
}

#[test]
fn deauth_capture_runs_both() {
    let dir = tempfile::tempdir().unwrap();
    let (result, stream) = run(
        dir.path(),
        &target_args("deauth-capture", &["--timeout-ms", "100"]),
    );
    let (_, data) = result.unwrap();
    assert_eq!(data["deauth"]["bursts"], 10);
    assert_eq!(data["succeeded"], false);
    let deauth_end = stream.find("END_DEAUTH").unwrap();
    let capture_start = stream.find("START_PMKID_CAPTURE").unwrap();
    assert!(deauth_end < capture_start);
}

#[test]
fn report_streams_networks() {
    let dir = tempfile::tempdir().unwrap();
    let networks = dir.path().join("networks.json");
    fs::write(
        &networks,
        r#"[
            {"ssid": "HomeNet", "bssid": "00:11:22:33:44:55", "channel": 6, "encryption": 3},
            {"ssid": "Cafe", "bssid": "66:77:88:99:AA:BB", "channel": 1, "encryption": 0}
        ]"#,
    )
    .unwrap();

    let (result, stream) = run(
        dir.path(),
        &["bruce-wifi", "report", "--networks", networks.to_str().unwrap()],
    );
    let (message, _) = result.unwrap();
    assert_eq!(message, "Reported 2 networks");
    assert!(stream.starts_with("BRUCE_WIFI_TOOL_START\r\n1\r\nSCAN_RESULTS\r\n2\r\n"));
    assert_eq!(stream.matches("\r\nNET_INFO\r\n").count(), 2);
    assert!(stream.contains("\r\nNET_INFO\r\n16\r\n060300112233445507486F6D654E6574\r\n"));
}

#[test]
fn connect_saved_without_password_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (result, stream) = run(dir.path(), &target_args("connect", &["--link", "connected"]));
    let err = result.unwrap_err();
    let chain: Vec<String> = err.chain().map(|c| c.to_string()).collect();
    assert_eq!(chain[0], "connecting to HomeNet");
    assert!(chain.iter().any(|c| c.contains("No saved password for network 'HomeNet'")));
    assert!(stream.ends_with("BRUCE_WIFI_TOOL_END\r\n1\r\n"));
}

#[test]
fn connect_saves_then_reuses_password() {
    let dir = tempfile::tempdir().unwrap();
    let (result, _) = run(
        dir.path(),
        &target_args(
            "connect",
            &["--link", "connected", "--password", "hunter22", "--save"],
        ),
    );
    let (message, data) = result.unwrap();
    assert_eq!(message, "Connected to HomeNet");
    assert_eq!(data["connect"]["status"], "connected");

    let saved = fs::read_to_string(dir.path().join("config/credentials.json")).unwrap();
    assert!(saved.contains("\"HomeNet\": \"hunter22\""));

    let (result, _) = run(dir.path(), &target_args("connect", &["--link", "connected"]));
    assert_eq!(result.unwrap().1["connect"]["connected"], true);
}

#[test]
fn failed_connect_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let (result, _) = run(
        dir.path(),
        &target_args("connect", &["--password", "wrong"]),
    );
    let (message, data) = result.unwrap();
    assert_eq!(message, "Could not connect to HomeNet");
    assert_eq!(data["connect"]["status"], "failed");
}
