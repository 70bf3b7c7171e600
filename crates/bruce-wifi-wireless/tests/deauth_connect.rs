mod common;

use std::collections::HashMap;
use std::time::Duration;

use bruce_wifi_wireless::{
    ConnectConfig, Connector, DeauthConfig, DeauthDriver, EncryptionType, LinkStatus, MacAddress,
    NetworkDescriptor, PcapReplayRadio, RadioMode, ReplayConfig, ToolkitConfig, TransportConfig,
    TransportWorker, TxPath, WifiToolkit, WirelessError,
};

use common::*;

fn quick_deauth() -> DeauthConfig {
    DeauthConfig {
        interval: Duration::from_millis(1),
        settle: Duration::from_millis(1),
        ..Default::default()
    }
}

#[test]
fn deauth_sends_both_templates_every_burst() {
    let mut radio = MockRadio::default();
    let buf = SharedBuf::default();
    let (transport, worker) =
        TransportWorker::spawn(buf.clone(), &TransportConfig::default()).unwrap();

    let stats = DeauthDriver::new(quick_deauth())
        .run(&mut radio, &transport, &target())
        .unwrap();

    assert_eq!(stats.bursts, 10);
    assert_eq!(stats.frames_sent, 20);
    assert_eq!(radio.transmitted.len(), 20);
    for pair in radio.transmitted.chunks(2) {
        assert_eq!(pair[0].1, TxPath::SanityBypass);
        assert_eq!(pair[1].1, TxPath::Standard);
        for (frame, _) in pair {
            assert_eq!(frame.len(), 26);
            assert_eq!(frame[0], 0xC0);
            assert_eq!(&frame[4..10], &MacAddress::BROADCAST.0);
            assert_eq!(&frame[10..16], &AP.0);
            assert_eq!(&frame[16..22], &AP.0);
        }
        assert_eq!(&pair[1].0[22..24], &[0xF0, 0xFF]);
    }

    assert!(radio.soft_ap.is_none());
    assert_eq!(radio.modes, vec![RadioMode::AccessPoint, RadioMode::Station]);

    drop(transport);
    worker.join();
    assert_eq!(
        buf.text(),
        "START_DEAUTH\r\nSSID:HomeNet\r\nBSSID:00:11:22:33:44:55\r\nCHANNEL:6\r\nEND_DEAUTH\r\n"
    );
}

#[test]
fn deauth_aborts_when_soft_ap_fails() {
    let mut radio = MockRadio {
        fail_soft_ap: true,
        ..Default::default()
    };
    let buf = SharedBuf::default();
    let (transport, worker) =
        TransportWorker::spawn(buf.clone(), &TransportConfig::default()).unwrap();

    let err = DeauthDriver::new(quick_deauth())
        .run(&mut radio, &transport, &target())
        .unwrap_err();
    assert!(err.is_radio_setup());
    assert!(radio.transmitted.is_empty());
    assert_eq!(radio.mode, Some(RadioMode::Station));

    drop(transport);
    worker.join();
    assert!(buf.text().is_empty());
}

#[test]
fn deauth_stops_on_first_transmit_error() {
    let mut radio = MockRadio {
        fail_transmit_after: Some(3),
        ..Default::default()
    };
    let (transport, worker) =
        TransportWorker::spawn(std::io::sink(), &TransportConfig::default()).unwrap();

    let err = DeauthDriver::new(quick_deauth())
        .run(&mut radio, &transport, &target())
        .unwrap_err();
    assert!(matches!(err, WirelessError::Injection(_)));
    assert_eq!(radio.transmitted.len(), 3);
    assert!(radio.soft_ap.is_none());

    drop(transport);
    assert_eq!(worker.join().markers_written, 2);
}

fn toolkit(
    link: LinkStatus,
    saved: &[(&str, &str)],
) -> WifiToolkit<PcapReplayRadio, HashMap<String, String>> {
    let radio = PcapReplayRadio::new(
        Vec::new(),
        ReplayConfig {
            link_status: link,
            ..Default::default()
        },
    );
    let credentials = saved
        .iter()
        .map(|(ssid, pw)| (ssid.to_string(), pw.to_string()))
        .collect();
    let (transport, _worker) =
        TransportWorker::spawn(std::io::sink(), &TransportConfig::default()).unwrap();
    let config = ToolkitConfig {
        connect: ConnectConfig {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        },
        ..Default::default()
    };
    WifiToolkit::new(radio, credentials, transport, config)
}

#[test]
fn connect_saved_without_password_fails() {
    let mut toolkit = toolkit(LinkStatus::Connected, &[]);
    let err = toolkit.connect_saved(&target()).unwrap_err();
    assert!(matches!(err, WirelessError::NoSavedCredential(ref ssid) if ssid == "HomeNet"));
}

#[test]
fn connect_saved_uses_stored_password() {
    let mut toolkit = toolkit(LinkStatus::Connected, &[("HomeNet", "hunter22")]);
    let outcome = toolkit.connect_saved(&target()).unwrap();
    assert!(outcome.connected);
    assert_eq!(outcome.status, LinkStatus::Connected);
}

#[test]
fn open_network_needs_no_saved_password() {
    let mut toolkit = toolkit(LinkStatus::Connected, &[]);
    let open = NetworkDescriptor::new("Cafe", AP, 1, EncryptionType::Open);
    assert!(toolkit.connect_saved(&open).unwrap().connected);
}

#[test]
fn failed_connect_disconnects() {
    let mut toolkit = toolkit(LinkStatus::Connecting, &[]);
    let outcome = toolkit.connect(&target(), "wrong").unwrap();
    assert!(!outcome.connected);
    assert!(outcome.waited_ms >= 200);
    assert_eq!(toolkit.device().status(), LinkStatus::Disconnected);
}
