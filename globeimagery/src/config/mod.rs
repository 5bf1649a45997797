//! User configuration for globeimagery.
//!
//! Settings are read from `~/.globeimagery/config.ini`:
//!
//! ```ini
//! [provider]
//! url = https://earth.example.com
//! channel = 1234
//! path = /default_map
//! proxy = /proxy/
//!
//! [http]
//! timeout = 30
//! ```
//!
//! A missing file yields defaults. Command-line flags take precedence over
//! anything loaded here.

mod file;
mod parser;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, HttpSettings,
    ProviderSettings,
};
