//! Common types and utilities shared across CLI commands.

use clap::Args;
use globeimagery::config::ConfigFile;
use globeimagery::provider::{GoogleEarthConfig, GoogleEarthImageryProvider, ReqwestClient};
use tracing::info;

use crate::error::CliError;

/// Server selection. Each flag overrides the matching config.ini value.
#[derive(Debug, Clone, Default, Args)]
pub struct ServerArgs {
    /// Base URL of the Google Earth Enterprise server
    #[arg(long)]
    pub url: Option<String>,

    /// Layer channel (id) to request
    #[arg(long)]
    pub channel: Option<u32>,

    /// Map path on the server (default: /default_map; pass "" for none)
    #[arg(long)]
    pub path: Option<String>,

    /// Proxy endpoint; requests become <proxy>?<encoded url>
    #[arg(long)]
    pub proxy: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Tile coordinates.
#[derive(Debug, Clone, Copy, Args)]
pub struct TileArgs {
    /// Tile column
    #[arg(long)]
    pub x: u32,

    /// Tile row
    #[arg(long)]
    pub y: u32,

    /// Tile level (0-23)
    #[arg(long)]
    pub level: u32,
}

/// Merge CLI flags over config-file values.
///
/// CLI takes precedence, then config.
pub fn resolve_settings(args: &ServerArgs, config: &ConfigFile) -> ConfigFile {
    let mut merged = config.clone();
    if let Some(url) = &args.url {
        merged.provider.url = Some(url.clone());
    }
    if let Some(channel) = args.channel {
        merged.provider.channel = Some(channel);
    }
    if let Some(path) = &args.path {
        merged.provider.path = Some(path.clone());
    }
    if let Some(proxy) = &args.proxy {
        merged.provider.proxy = Some(proxy.clone());
    }
    if let Some(timeout) = args.timeout {
        merged.http.timeout = timeout;
    }
    merged
}

/// Resolve provider options from CLI args and config.
pub fn resolve_provider(
    args: &ServerArgs,
    config: &ConfigFile,
) -> Result<GoogleEarthConfig, CliError> {
    resolve_settings(args, config).provider_config().map_err(|e| {
        CliError::Config(format!(
            "{}. Set it in config.ini or pass the matching command-line flag",
            e
        ))
    })
}

/// Create the provider and wait until its metadata has resolved.
pub async fn connect(
    args: &ServerArgs,
    config: &ConfigFile,
) -> Result<GoogleEarthImageryProvider<ReqwestClient>, CliError> {
    let settings = resolve_settings(args, config);
    let provider_config = resolve_provider(args, config)?;

    let client =
        ReqwestClient::with_timeout(settings.http.timeout).map_err(CliError::ProviderCreation)?;
    let provider = GoogleEarthImageryProvider::new(provider_config, client)
        .map_err(CliError::ProviderCreation)?;

    info!(url = provider.url(), channel = provider.channel(), "Connecting to server");
    provider.ready().await?;
    Ok(provider)
}
