//! Imagery provider abstraction
//!
//! This module provides the [`ImageryProvider`] trait and its implementations
//! for Google Earth Enterprise servers and plain `{z}/{x}/{y}` template
//! services.
//!
//! Every provider takes its HTTP client as a constructor argument:
//!
//! ```ignore
//! use globeimagery::provider::{GoogleEarthConfig, GoogleEarthImageryProvider, ReqwestClient};
//!
//! let client = ReqwestClient::new()?;
//! let config = GoogleEarthConfig::new("https://earth.example.com").with_channel(1234);
//! let provider = GoogleEarthImageryProvider::new(config, client)?;
//! provider.ready().await?;
//! let image = provider.request_image(0, 0, 0).await?;
//! ```

mod google_earth;
mod http;
mod types;
mod xyz;

pub use google_earth::{
    metadata_url, parse_server_definitions, GoogleEarthConfig, GoogleEarthImageryProvider,
    LayerMetadata, MetadataError, MetadataResolver, Projection, ResolvedState,
    ServerDefinitions, TileUrlBuilder, DEFAULT_PATH, METADATA_QUERY,
};
pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use types::{Credit, ImageryProvider, ProviderError};
pub use xyz::{XyzConfig, XyzImageryProvider};

#[cfg(test)]
pub use http::tests::{png_bytes, MockAsyncHttpClient};
