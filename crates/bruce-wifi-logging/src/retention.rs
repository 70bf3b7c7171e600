use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

use crate::config::LoggingConfig;
use crate::targets::SUBSYSTEMS;

const MAX_LOG_BYTES: u64 = 200 * 1024 * 1024;

const COMPONENT_PREFIXES: [&str; 2] = ["bruce-wifi.log", "bruce-wifi-host.log"];

struct LogFile {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

/// Delete rolled logs older than `keep_days`, then the oldest ones until the
/// directory fits under the size cap.
pub fn run_retention(root: &Path, cfg: &LoggingConfig) -> Result<()> {
    prune(&root.join("logs"), cfg.keep_days, MAX_LOG_BYTES)
}

fn prune(log_root: &Path, keep_days: u64, max_bytes: u64) -> Result<()> {
    let mut entries = collect_log_files(log_root)?;

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(keep_days.saturating_mul(24 * 60 * 60)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    entries.retain(|entry| {
        if entry.modified >= cutoff {
            return true;
        }
        match fs::remove_file(&entry.path) {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!("Failed to remove old log {}: {}", entry.path.display(), err);
                true
            }
        }
    });

    let mut total_size: u64 = entries.iter().map(|e| e.size).sum();
    if total_size <= max_bytes {
        return Ok(());
    }

    entries.sort_by_key(|e| e.modified);
    for entry in entries {
        if total_size <= max_bytes {
            break;
        }
        if let Err(err) = fs::remove_file(&entry.path) {
            tracing::warn!(
                "Failed to remove log {} during size cap cleanup: {}",
                entry.path.display(),
                err
            );
            continue;
        }
        total_size = total_size.saturating_sub(entry.size);
    }

    Ok(())
}

fn collect_log_files(log_root: &Path) -> Result<Vec<LogFile>> {
    let mut files = Vec::new();
    if !log_root.exists() {
        return Ok(files);
    }

    let entries =
        fs::read_dir(log_root).with_context(|| format!("reading {}", log_root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("iterating {}", log_root.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_log_name(name) {
            continue;
        }

        let metadata = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        files.push(LogFile {
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
            path,
        });
    }

    Ok(files)
}

fn is_log_name(name: &str) -> bool {
    COMPONENT_PREFIXES
        .iter()
        .chain(SUBSYSTEMS.iter().map(|(_, file)| file))
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![b'x'; len]).unwrap();
        path
    }

    #[test]
    fn test_missing_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        run_retention(dir.path(), &LoggingConfig::default()).unwrap();
    }

    #[test]
    fn test_expired_logs_removed_others_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let wifi = touch(dir.path(), "wifi.log.2026-01-01", 10);
        let notes = touch(dir.path(), "notes.txt", 10);
        std::thread::sleep(Duration::from_millis(20));

        prune(dir.path(), 0, MAX_LOG_BYTES).unwrap();
        assert!(!wifi.exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_recent_logs_kept() {
        let dir = tempfile::tempdir().unwrap();
        let host = touch(dir.path(), "host.log.2026-10-17", 10);
        prune(dir.path(), 14, MAX_LOG_BYTES).unwrap();
        assert!(host.exists());
    }

    #[test]
    fn test_size_cap_removes_until_under() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<_> = ["transport.log.1", "transport.log.2", "transport.log.3"]
            .iter()
            .map(|name| touch(dir.path(), name, 100))
            .collect();

        prune(dir.path(), 14, 150).unwrap();
        let left = files.iter().filter(|p| p.exists()).count();
        assert_eq!(left, 1);
    }

    #[test]
    fn test_log_names() {
        assert!(is_log_name("bruce-wifi.log.2026-10-17"));
        assert!(is_log_name("transport.log"));
        assert!(!is_log_name("capture.pcap"));
    }
}
