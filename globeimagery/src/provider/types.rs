//! Provider types and traits

use std::future::Future;

use thiserror::Error;

use crate::event::ErrorEvent;
use crate::pipeline::DecodedImage;
use crate::tiling::{Extent, TileCoord, TilingScheme};

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Required construction options are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Invalid response data from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Response bytes could not be decoded as an image
    #[error("Failed to decode image from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The provider has not finished resolving its metadata
    #[error("Imagery provider is not ready")]
    NotReady,

    /// Level outside the provider's supported range
    #[error("Level {level} not supported by provider (range {minimum}..={maximum})")]
    UnsupportedLevel {
        level: u32,
        minimum: u32,
        maximum: u32,
    },

    /// A tile request failed and no error listener asked for a retry
    #[error("Failed to obtain image tile {tile} after {times_retried} retries")]
    TileFetch {
        tile: TileCoord,
        times_retried: u32,
        #[source]
        source: Box<ProviderError>,
    },
}

/// Attribution displayed for imagery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub text: String,
    pub link: Option<String>,
}

impl Credit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Capability set shared by every imagery service.
///
/// Queries other than [`is_ready`](ImageryProvider::is_ready),
/// [`name`](ImageryProvider::name) and
/// [`error_event`](ImageryProvider::error_event) return `None` until the
/// provider is ready.
pub trait ImageryProvider: Send + Sync {
    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// True once tiling scheme, extent and levels are available.
    fn is_ready(&self) -> bool;

    /// Tiling scheme the service's tiles are laid out in.
    fn tiling_scheme(&self) -> Option<TilingScheme>;

    /// Extent covered by the imagery.
    fn extent(&self) -> Option<Extent>;

    /// Width of each tile in pixels.
    fn tile_width(&self) -> Option<u32>;

    /// Height of each tile in pixels.
    fn tile_height(&self) -> Option<u32>;

    /// Lowest level with imagery.
    fn minimum_level(&self) -> Option<u32>;

    /// Highest level with imagery.
    fn maximum_level(&self) -> Option<u32>;

    /// Attribution for the imagery.
    fn credit(&self) -> Option<Credit>;

    /// Event raised for metadata and tile failures.
    fn error_event(&self) -> &ErrorEvent;

    /// Requests the image for a tile.
    ///
    /// Fails with [`ProviderError::NotReady`] before the provider is ready and
    /// with [`ProviderError::UnsupportedLevel`] outside the level range;
    /// neither raises the error event. Transport and decode failures go
    /// through the error event, whose listeners decide whether to retry.
    fn request_image(
        &self,
        x: u32,
        y: u32,
        level: u32,
    ) -> impl Future<Output = Result<DecodedImage, ProviderError>> + Send;

    /// Validates a level, producing the error `request_image` reports.
    fn check_level(&self, level: u32) -> Result<(), ProviderError> {
        match (self.minimum_level(), self.maximum_level()) {
            (Some(minimum), Some(maximum)) if level < minimum || level > maximum => {
                Err(ProviderError::UnsupportedLevel {
                    level,
                    minimum,
                    maximum,
                })
            }
            (Some(_), Some(_)) => Ok(()),
            _ => Err(ProviderError::NotReady),
        }
    }
}
