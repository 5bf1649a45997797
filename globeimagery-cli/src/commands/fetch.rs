//! `fetch`: download one tile and save it as an image file.

use std::path::PathBuf;

use clap::Args;
use globeimagery::config::ConfigFile;
use globeimagery::event::RetryDecision;
use globeimagery::provider::ImageryProvider;
use tracing::warn;

use super::common::{connect, ServerArgs, TileArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub tile: TileArgs,

    /// Output file path (format from extension: .png, .jpg, ...)
    #[arg(long, short)]
    pub output: PathBuf,

    /// Number of times to retry a failed tile request
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
}

pub async fn run(args: FetchArgs, config: &ConfigFile) -> Result<(), CliError> {
    let provider = connect(&args.server, config).await?;

    let retries = args.retries;
    provider.error_event().add_listener(move |error| {
        if error.times_retried < retries {
            warn!(
                times_retried = error.times_retried,
                "{}, retrying",
                error
            );
            RetryDecision::Retry
        } else {
            RetryDecision::Abort
        }
    });

    let TileArgs { x, y, level } = args.tile;
    let image = provider
        .request_image(x, y, level)
        .await
        .map_err(CliError::Download)?;

    image
        .image()
        .save(&args.output)
        .map_err(|error| CliError::FileWrite {
            path: args.output.display().to_string(),
            error,
        })?;

    println!(
        "Saved {}x{} tile X: {} Y: {} Level: {} to {}",
        image.width(),
        image.height(),
        x,
        y,
        level,
        args.output.display()
    );
    if let Some(credit) = provider.credit() {
        println!("Imagery: {}", credit.text);
    }

    Ok(())
}
