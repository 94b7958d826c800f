//! Platform-specific configuration and data paths.

use crate::constants::{APP_NAME, DATABASE_FILE_NAME};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/birdfuse/`
/// - macOS: `~/Library/Application Support/birdfuse/`
/// - Windows: `%APPDATA%\birdfuse\`
pub fn config_dir() -> Result<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the data directory holding the database and dead-letter file.
///
/// - Linux: `~/.local/share/birdfuse/`
/// - macOS: `~/Library/Application Support/birdfuse/`
/// - Windows: `%APPDATA%\birdfuse\data\`
pub fn data_dir() -> Result<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(Error::DataDirNotFound)
}

/// Default database location when none is configured.
pub fn default_database_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DATABASE_FILE_NAME))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_returns_path() {
        let path = config_dir().unwrap();
        assert!(path.to_string_lossy().contains("birdfuse"));
    }

    #[test]
    fn test_config_file_path_ends_with_toml() {
        let path = config_file_path().unwrap();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_default_database_path_in_data_dir() {
        let path = default_database_path().unwrap();
        assert!(path.starts_with(data_dir().unwrap()));
        assert!(path.ends_with(DATABASE_FILE_NAME));
    }
}
