// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILENAME};
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref CHARTY_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Failed to expand path '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// Returns the charty configuration directory (`~/.config/charty` on Linux).
///
/// Memoized: the first call asks the OS, later calls return the cached value.
/// The directory is not created; charty only ever reads from it.
pub fn config_dir() -> Result<PathBuf, PathError> {
    // A poisoned lock only means another thread panicked mid-lookup; the cached value is still usable.
    let mut cached = CHARTY_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);
    *cached = Some(path.clone());
    Ok(path)
}

/// Returns the path of `config.toml`, whether or not it exists.
pub fn config_file() -> Result<PathBuf, PathError> {
    config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a user-supplied path.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_the_charty_dir() {
        let Ok(file) = config_file() else {
            return; // no config dir on this machine
        };
        assert!(file.ends_with("charty/config.toml"));
        assert_eq!(config_dir().unwrap(), file.parent().unwrap());
    }

    #[test]
    fn expand_path_resolves_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_path("~/scratch").unwrap(), home.join("scratch"));
        assert_eq!(expand_path("/plain/path").unwrap(), PathBuf::from("/plain/path"));
    }

    #[test]
    fn expand_path_reports_unknown_variables() {
        let err = expand_path("$CHARTY_SURELY_UNSET_VARIABLE/x").unwrap_err();
        assert!(matches!(err, PathError::Expansion { .. }));
    }
}
