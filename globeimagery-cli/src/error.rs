//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use globeimagery::config::ConfigFileError;
use globeimagery::provider::{MetadataError, ProviderError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create the provider or HTTP client
    ProviderCreation(ProviderError),
    /// Server definitions could not be resolved
    Metadata(MetadataError),
    /// Failed to download tile
    Download(ProviderError),
    /// Failed to write output file
    FileWrite {
        path: String,
        error: image::ImageError,
    },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Metadata(MetadataError::Unreachable { .. }) => {
                eprintln!();
                eprintln!("Check that:");
                eprintln!("  1. --url points at a Google Earth Enterprise server");
                eprintln!("  2. --path matches the server's map path (default /default_map)");
                eprintln!("  3. A --proxy is configured if the server is not directly reachable");
            }
            CliError::Metadata(MetadataError::ChannelNotFound(_)) => {
                eprintln!();
                eprintln!("The server does not publish that channel. Check --channel.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ProviderCreation(e) => write!(f, "Failed to create provider: {}", e),
            CliError::Metadata(e) => write!(f, "Failed to resolve server metadata: {}", e),
            CliError::Download(e) => write!(f, "Failed to download tile: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ProviderCreation(e) => Some(e),
            CliError::Metadata(e) => Some(e),
            CliError::Download(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<MetadataError> for CliError {
    fn from(e: MetadataError) -> Self {
        CliError::Metadata(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
