use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

const SETTINGS_DIR: &str = "mount-smb-shares";
const SETTINGS_FILE: &str = "settings.toml";

/// Tool settings, read from `settings.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Packages installed before mounting.
    pub required_packages: Vec<String>,
    /// Per-command timeout; 0 waits forever.
    pub command_timeout_secs: u64,
    /// Pause between unmounting and mounting a share.
    pub unmount_settle_millis: u64,
    pub log_to_file: bool,
    pub log_file: String,
    /// Look up domain credentials in the Secret Service before prompting.
    pub use_keyring: bool,
    pub keyring_profile: String,
    /// Share file used when `--file` is not given.
    pub default_config: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            required_packages: vec!["cifs-utils".to_string()],
            command_timeout_secs: 60,
            unmount_settle_millis: 0,
            log_to_file: true,
            log_file: "~/.mount-smb-shares.log".to_string(),
            use_keyring: false,
            keyring_profile: "domain".to_string(),
            default_config: "~/.pygmount.rc".to_string(),
        }
    }
}

impl Settings {
    /// Loads `path`, or the default location when `None`. A missing file gives defaults.
    pub fn load(path: Option<&Path>, home: &Path) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_path(home),
        };

        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| Error::Settings {
            path,
            reason: e.to_string(),
        })
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    pub fn unmount_settle(&self) -> Duration {
        Duration::from_millis(self.unmount_settle_millis)
    }

    pub fn log_file_path(&self, home: &Path) -> PathBuf {
        expand_tilde(&self.log_file, home)
    }

    pub fn default_config_path(&self, home: &Path) -> PathBuf {
        expand_tilde(&self.default_config, home)
    }
}

fn default_path(home: &Path) -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".config"));
    base.join(SETTINGS_DIR).join(SETTINGS_FILE)
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("nope.toml")), dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.command_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "required_packages = []\ncommand_timeout_secs = 0\nuse_keyring = true\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path), dir.path()).unwrap();
        assert!(settings.required_packages.is_empty());
        assert_eq!(settings.command_timeout(), None);
        assert!(settings.use_keyring);
        assert_eq!(settings.keyring_profile, "domain");
    }

    #[test]
    fn invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "command_timeout_secs = \"soon\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path), dir.path()),
            Err(Error::Settings { .. })
        ));
    }

    #[test]
    fn paths_expand_under_home() {
        let home = Path::new("/home/alice");
        let settings = Settings::default();
        assert_eq!(
            settings.default_config_path(home),
            PathBuf::from("/home/alice/.pygmount.rc")
        );
        assert_eq!(expand_tilde("/var/log/x.log", home), PathBuf::from("/var/log/x.log"));
    }
}
