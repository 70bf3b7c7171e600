//! Serial port setup for the device link

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{bail, Context, Result};
use nix::sys::termios::{self, BaudRate, SetArg};

pub const DEFAULT_BAUD: u32 = 115_200;

fn baud_rate(baud: u32) -> Result<BaudRate> {
    Ok(match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        921_600 => BaudRate::B921600,
        other => bail!("unsupported baud rate {other}"),
    })
}

/// Open a tty in raw mode at `baud`.
pub fn open_serial(path: &Path, baud: u32) -> Result<File> {
    let speed = baud_rate(baud)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("opening serial port {}", path.display()))?;

    let mut tio = termios::tcgetattr(&file)
        .with_context(|| format!("reading terminal attributes of {}", path.display()))?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, speed).context("setting baud rate")?;
    termios::tcsetattr(&file, SetArg::TCSANOW, &tio)
        .with_context(|| format!("configuring {}", path.display()))?;

    tracing::info!(port = %path.display(), baud, "serial port configured");
    Ok(file)
}

/// Whether `path` names a character device rather than a capture file
pub fn is_tty(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}
