use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::LoggingConfig;

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config").join("logging.json")
}

/// Load `<root>/config/logging.json`, seeding it with defaults on first run.
/// A malformed file falls back to defaults without being overwritten.
pub fn read_config(root: &Path) -> LoggingConfig {
    let path = config_path(root);
    match fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), err);
            LoggingConfig::default()
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let cfg = LoggingConfig::default();
            let _ = write_config_atomic(root, &cfg);
            cfg
        }
        Err(_) => LoggingConfig::default(),
    }
}

pub fn write_config_atomic(root: &Path, cfg: &LoggingConfig) -> Result<()> {
    let path = config_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating logging config dir {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cfg).context("serializing logging config")?;

    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&tmp_path)
        .with_context(|| format!("opening {}", tmp_path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("syncing {}", tmp_path.display()))?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_read_seeds_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = read_config(dir.path());
        assert_eq!(cfg, LoggingConfig::default());
        assert!(config_path(dir.path()).exists());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            level: "bruce_wifi::wifi=trace,warn".into(),
            keep_days: 3,
            ..Default::default()
        };
        write_config_atomic(dir.path(), &cfg).unwrap();
        assert_eq!(read_config(dir.path()), cfg);
        assert!(!config_path(dir.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_malformed_falls_back_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        assert_eq!(read_config(dir.path()), LoggingConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[cfg(unix)]
    #[test]
    fn test_config_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        write_config_atomic(dir.path(), &LoggingConfig::default()).unwrap();
        let mode = fs::metadata(config_path(dir.path())).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
