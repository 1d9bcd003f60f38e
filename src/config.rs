//! # Configuration
//!
//! Settings are read from a TOML file. Resolution order:
//! 1. **CLI flags**: `--store` overrides `store_path`.
//! 2. **Config file**: `--config <path>`, else `config.toml` in the OS config
//!    directory (via the `directories` crate).
//! 3. **Compiled defaults**.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `store_path` | `<data dir>/applications.db` | The application store |
//! | `tolerance_secs` | `2.0` | Mtime drift still treated as "unchanged" |
//! | `backup_dir` | unset | Copy the store here before every write |

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};

const APP_NAME: &str = "applied";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub tolerance_secs: f64,
    pub backup_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            tolerance_secs: 2.0,
            backup_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&text).map_err(|reason| TrackerError::Config { path, reason })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Config = toml::from_str(text).map_err(|e| e.to_string())?;
        config.tolerance()?;
        Ok(config)
    }

    /// The tolerance window as a `Duration`.
    pub fn tolerance(&self) -> std::result::Result<Duration, String> {
        Duration::try_from_secs_f64(self.tolerance_secs).map_err(|_| {
            format!(
                "tolerance_secs must be a non-negative number, got {}",
                self.tolerance_secs
            )
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|d| d.config_dir().join("config.toml"))
}

fn default_store_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().join("applications.db"),
        None => PathBuf::from("applications.db"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("tolerance_secs = 5.5").unwrap();
        assert_eq!(config.tolerance().unwrap(), Duration::from_millis(5500));
        assert_eq!(config.store_path, Config::default().store_path);
        assert_eq!(config.backup_dir, None);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            store_path = "/tmp/jobs.db"
            tolerance_secs = 1.0
            backup_dir = "/tmp/backups"
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/jobs.db"));
        assert_eq!(config.tolerance().unwrap(), Duration::from_secs(1));
        assert_eq!(config.backup_dir, Some(PathBuf::from("/tmp/backups")));
    }

    #[test]
    fn test_negative_tolerance_is_rejected() {
        assert!(Config::from_toml("tolerance_secs = -1.0").is_err());
        assert!(Config::from_toml("tolerance_secs = nan").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tolerance_secs = \"soon\"").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(TrackerError::Config { .. })
        ));
    }
}
