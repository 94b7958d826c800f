//! Configuration file loading and saving.
//!
//! Files are validated in both directions so an out-of-range window or
//! confidence is reported against the file that carries it.

use crate::config::{Config, validate_config};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config).map_err(|e| in_file(path, e))?;
    Ok(config)
}

/// Load configuration from the platform config directory.
pub fn load_default_config() -> Result<Config> {
    super::config_file_path().map_or_else(|_| Ok(Config::default()), |path| load_config_file(&path))
}

/// Validate and write configuration to a TOML file, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    validate_config(config).map_err(|e| in_file(path, e))?;

    let write_error = |source: std::io::Error| Error::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|source| Error::ConfigSerialize { source })?;
    std::fs::write(path, contents).map_err(write_error)
}

/// Write configuration to the platform config directory.
pub fn save_default_config(config: &Config) -> Result<PathBuf> {
    let path = super::config_file_path()?;
    save_config(config, &path)?;
    Ok(path)
}

fn in_file(path: &Path, error: Error) -> Error {
    match error {
        Error::ConfigValidation { message } => Error::ConfigValidation {
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    }
}
