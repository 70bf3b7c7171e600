use std::path::PathBuf;

use bruce_wifi_wireless::{EncryptionType, LinkStatus, MacAddress, NetworkDescriptor};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "bruce-wifi",
    author,
    version,
    about = "WPA handshake/PMKID capture with a serial record stream for the host"
)]
pub struct Cli {
    /// Root holding config/ and logs/ (defaults to /var/lib/bruce-wifi or current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Where the BRUCE_WIFI_DATA stream goes; `-` is stdout
    #[arg(long, global = true, default_value = "-")]
    pub stream: PathBuf,

    /// Format of the summary printed on stderr
    #[arg(
        long = "output",
        value_enum,
        default_value_t = OutputFormat::Json,
        global = true
    )]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe the target with a wrong password and wait for PMKID or handshake
    Capture(CaptureArgs),
    /// Send deauthentication bursts at the target
    Deauth(DeauthArgs),
    /// Deauth, then capture
    DeauthCapture(CaptureArgs),
    /// Report a list of scanned networks to the host
    Report(ReportArgs),
    /// Associate with the target
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    #[arg(long)]
    pub ssid: String,

    /// Access point address, AA:BB:CC:DD:EE:FF
    #[arg(long)]
    pub bssid: MacAddress,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=196))]
    pub channel: u8,

    /// Encryption code as reported by the scanner (0 open .. 5 WPA2 enterprise)
    #[arg(long, default_value_t = 3)]
    pub encryption: u8,
}

impl TargetArgs {
    pub fn descriptor(&self) -> NetworkDescriptor {
        NetworkDescriptor::new(
            self.ssid.clone(),
            self.bssid,
            self.channel,
            EncryptionType::from(self.encryption),
        )
    }
}

/// Frames come from a recorded capture instead of a live radio
#[derive(Args, Debug, Clone, Default)]
pub struct ReplayArgs {
    /// pcap (802.11 or radiotap) replayed as received traffic
    #[arg(long)]
    pub pcap: Option<PathBuf>,

    /// Delay between replayed frames
    #[arg(long, default_value_t = 5)]
    pub frame_delay_ms: u64,

    /// Only replay frames recorded on the tuned channel
    #[arg(long)]
    pub honor_channel: bool,

    /// Record injected frames into this pcap
    #[arg(long)]
    pub tx_pcap: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub replay: ReplayArgs,

    /// Override the capture wait bound
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DeauthArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub replay: ReplayArgs,

    /// Override the number of bursts
    #[arg(long)]
    pub bursts: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// JSON array of networks ({ssid, bssid, channel, encryption})
    #[arg(long)]
    pub networks: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Password to use; the saved one is looked up when omitted
    #[arg(long)]
    pub password: Option<String>,

    /// Save the password after a successful connect
    #[arg(long, requires = "password")]
    pub save: bool,

    /// Link state the replay radio reports once association begins
    #[arg(long, value_enum, default_value_t = SimulatedLink::Failed)]
    pub link: SimulatedLink,

    #[command(flatten)]
    pub replay: ReplayArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SimulatedLink {
    Connected,
    Connecting,
    Failed,
}

impl From<SimulatedLink> for LinkStatus {
    fn from(link: SimulatedLink) -> Self {
        match link {
            SimulatedLink::Connected => LinkStatus::Connected,
            SimulatedLink::Connecting => LinkStatus::Connecting,
            SimulatedLink::Failed => LinkStatus::Failed,
        }
    }
}
