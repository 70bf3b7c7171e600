use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::serial::DEFAULT_BAUD;

#[derive(Parser, Debug)]
#[command(
    name = "bruce-wifi-host",
    author,
    version,
    about = "Collect PMKIDs, handshakes and raw frames streamed by the device"
)]
pub struct Cli {
    /// Serial port or recorded stream file; `-` reads stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Baud rate when the input is a serial port
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    /// Directory for captured material
    #[arg(long, short = 'o', default_value = "bruce_wifi_captures")]
    pub output_dir: PathBuf,

    /// Root holding config/ and logs/ (defaults to the output directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Summary format
    #[arg(long = "output", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
