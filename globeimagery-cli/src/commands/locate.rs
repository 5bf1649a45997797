//! `locate`: find the tile containing a longitude/latitude.

use clap::Args;
use globeimagery::config::ConfigFile;
use globeimagery::provider::{ImageryProvider, ProviderError};
use globeimagery::tiling::{Cartographic, TileGrid};

use super::common::{connect, ServerArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct LocateArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Tile level (0-23)
    #[arg(long)]
    pub level: u32,
}

pub async fn run(args: LocateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let provider = connect(&args.server, config).await?;
    provider.check_level(args.level).map_err(CliError::Download)?;

    let scheme = provider
        .tiling_scheme()
        .ok_or(CliError::Download(ProviderError::NotReady))?;
    let position = Cartographic::from_degrees(args.lon, args.lat);

    match scheme.position_to_tile_xy(&position, args.level) {
        Some(tile) => {
            println!("{} ({})", tile, scheme.name());
            Ok(())
        }
        None => Err(CliError::Config(format!(
            "{}, {} is outside the {} extent {}",
            args.lat,
            args.lon,
            scheme.name(),
            scheme.extent()
        ))),
    }
}
