//! Persistent configuration storage.

pub mod config;

pub use config::{
    config_file_path, load_config, save_config, CaptureSection, ConfigFileError, FileConfig,
    LoggingSection, ServerSection,
};
