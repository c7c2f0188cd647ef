//! # Settings
//!
//! User-level configuration, read once by the binary and passed down explicitly.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults.
//! 2. `<config_dir>/charty/config.toml` (all keys optional, unknown keys rejected).
//! 3. `CHARTY_SHELL` and `CHARTY_SCRATCH_DIR` environment variables.
//!
//! ```toml
//! shell = "bash -c"
//! stream_output = true
//! scratch_dir = "~/.cache/charty"
//! ```

use crate::core::paths::{self, PathError};
use crate::system::executor::{ExecutionError, ShellExecutor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SHELL_ENV: &str = "CHARTY_SHELL";
pub const SCRATCH_DIR_ENV: &str = "CHARTY_SCRATCH_DIR";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Failed to read settings file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid shell '{shell}': {source}")]
    Shell {
        shell: String,
        #[source]
        source: ExecutionError,
    },
}

/// On-disk shape of `config.toml`.
#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    shell: Option<String>,
    stream_output: Option<bool>,
    scratch_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Shell invocation prefix, e.g. `bash -c`. `None` uses the platform default.
    pub shell: Option<String>,
    /// Mirror child output to the console while capturing it.
    pub stream_output: bool,
    /// Parent of every scratch directory charty creates.
    pub scratch_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: None,
            stream_output: true,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl Settings {
    /// Loads the user's settings file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let path = paths::config_file()?;
        Self::from_file(&path)?.with_env(|key| std::env::var(key).ok())
    }

    /// Reads `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        if !path.is_file() {
            log::debug!("No settings file at '{}', using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SettingsFile = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded settings from '{}'", path.display());

        let mut settings = Self::default();
        settings.shell = file.shell;
        if let Some(stream) = file.stream_output {
            settings.stream_output = stream;
        }
        if let Some(dir) = file.scratch_dir {
            settings.scratch_dir = paths::expand_path(&dir)?;
        }
        Ok(settings)
    }

    /// Applies `CHARTY_SHELL` / `CHARTY_SCRATCH_DIR` as resolved by `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup(SHELL_ENV).filter(|s| !s.trim().is_empty()) {
            self.shell = Some(shell);
        }
        if let Some(dir) = lookup(SCRATCH_DIR_ENV).filter(|s| !s.trim().is_empty()) {
            self.scratch_dir = paths::expand_path(&dir)?;
        }
        Ok(self)
    }

    /// Builds the executor commands will run through.
    pub fn executor(&self) -> Result<ShellExecutor, SettingsError> {
        match &self.shell {
            None => Ok(ShellExecutor::default().with_streaming(self.stream_output)),
            Some(shell) => ShellExecutor::new(shell, self.stream_output).map_err(|source| {
                SettingsError::Shell {
                    shell: shell.clone(),
                    source,
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.stream_output);
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "shell = \"bash -c\"\nstream_output = false\nscratch_dir = \"/tmp/charty-scratch\"\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.shell.as_deref(), Some("bash -c"));
        assert!(!settings.stream_output);
        assert_eq!(settings.scratch_dir, PathBuf::from("/tmp/charty-scratch"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "stream_output = \"sometimes\"").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(SettingsError::Parse { .. })
        ));

        std::fs::write(&path, "unknown_key = 1").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_the_file() {
        let env: HashMap<&str, &str> =
            HashMap::from([(SHELL_ENV, "zsh -c"), (SCRATCH_DIR_ENV, "/var/tmp/c")]);
        let settings = Settings::default()
            .with_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.shell.as_deref(), Some("zsh -c"));
        assert_eq!(settings.scratch_dir, PathBuf::from("/var/tmp/c"));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let settings = Settings::default()
            .with_env(|_| Some("  ".to_string()))
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn executor_rejects_unparseable_shells() {
        let settings = Settings {
            shell: Some("bash \"-c".into()),
            ..Settings::default()
        };
        assert!(matches!(settings.executor(), Err(SettingsError::Shell { .. })));
        assert!(Settings::default().executor().is_ok());
    }
}
