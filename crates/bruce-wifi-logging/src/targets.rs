//! Tracing targets that get their own log file

/// Frame classification, capture, deauth, radio
pub const T_WIFI: &str = "bruce_wifi::wifi";

/// Serial record stream
pub const T_TRANSPORT: &str = "bruce_wifi::transport";

/// Host-side stream consumer
pub const T_HOST: &str = "bruce_wifi::host";

/// (target, file name) for every subsystem log
pub const SUBSYSTEMS: [(&str, &str); 3] = [
    (T_WIFI, "wifi.log"),
    (T_TRANSPORT, "transport.log"),
    (T_HOST, "host.log"),
];
