//! `url`: print the URL a tile would be fetched from.

use clap::Args;
use globeimagery::config::ConfigFile;
use globeimagery::provider::{ImageryProvider, ProviderError};

use super::common::{connect, ServerArgs, TileArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct UrlArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub tile: TileArgs,
}

pub async fn run(args: UrlArgs, config: &ConfigFile) -> Result<(), CliError> {
    let provider = connect(&args.server, config).await?;

    let TileArgs { x, y, level } = args.tile;
    provider.check_level(level).map_err(CliError::Download)?;
    let url = provider
        .tile_url(x, y, level)
        .ok_or(CliError::Download(ProviderError::NotReady))?;

    println!("{}", url);
    Ok(())
}
