//! Persistent device configuration.
//!
//! Settings live in `~/.inkroute/config.ini`. A missing file means
//! defaults; every value that is present is validated on load.
//!
//! # Layout
//!
//! - [`settings`] - typed settings structs, one per INI section
//! - [`defaults`] - `DEFAULT_*` constants and `ConfigFile::default()`
//! - `parser` / `writer` - INI ↔ [`ConfigFile`]
//! - [`ConfigStore`] - the collaborator the orchestrator reads and writes

pub mod defaults;
mod file;
mod parser;
pub mod settings;
mod store;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AutoUpdateSettings, ConfigFile, DisplaySettings, GpsSettings, GpxSettings,
    NavigationSettings, PrefetchSettings,
};
pub use store::{ConfigStore, IniConfigStore};
pub use writer::to_config_string;
