//! Saved network passwords, `<root>/config/credentials.json`

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bruce_wifi_wireless::CredentialStore;

pub fn credentials_path(root: &Path) -> PathBuf {
    root.join("config").join("credentials.json")
}

#[derive(Debug, Clone, Default)]
pub struct JsonCredentials {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonCredentials {
    /// Load the file under `root`; a missing file is an empty store.
    pub fn load(root: &Path) -> Result<Self> {
        let path = credentials_path(root);
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        Ok(Self { path, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, ssid: &str, password: &str) {
        self.entries.insert(ssid.to_string(), password.to_string());
    }

    pub fn remove(&mut self, ssid: &str) -> bool {
        self.entries.remove(ssid).is_some()
    }

    /// Atomic replace, owner-only permissions
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&self.entries).context("serializing credentials")?;

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

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("renaming {} -> {}", tmp_path.display(), self.path.display())
        })
    }
}

impl CredentialStore for JsonCredentials {
    fn password_for(&self, ssid: &str) -> Option<String> {
        self.entries.get(ssid).cloned()
    }
}
