//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{load_config_file, load_default_config, save_config, save_default_config};
pub use paths::{config_dir, config_file_path, data_dir, default_database_path};
pub use types::{Config, CorrelationConfig, ExportConfig, StorageConfig};
pub use validate::{validate_config, validate_correlation, validate_export, validate_storage};
