//! globeimagery - Tiled imagery for globe renderers
//!
//! This library fetches and decodes imagery tiles from tiled map services for
//! display on a 3D globe. It provides:
//!
//! - [`tiling`]: geographic and Web Mercator tiling schemes
//! - [`provider`]: the [`provider::ImageryProvider`] trait, a Google Earth
//!   Enterprise provider that bootstraps from server metadata, and a
//!   `{z}/{x}/{y}` template provider
//! - [`event`]: error listeners that decide whether failed requests retry
//! - [`imagery`]: reference-counted tile handles driven by provider requests
//! - [`cubemap`]: concurrent loading of six-face cube maps
//! - [`config`] and [`logging`]: user configuration and tracing setup
//!
//! # Example
//!
//! ```ignore
//! use globeimagery::event::RetryDecision;
//! use globeimagery::provider::{
//!     GoogleEarthConfig, GoogleEarthImageryProvider, ImageryProvider, ReqwestClient,
//! };
//!
//! let client = ReqwestClient::new()?;
//! let config = GoogleEarthConfig::new("https://earth.example.com").with_channel(1234);
//! let provider = GoogleEarthImageryProvider::new(config, client)?;
//!
//! provider.error_event().add_listener(|error| {
//!     if error.times_retried < 3 {
//!         RetryDecision::Retry
//!     } else {
//!         RetryDecision::Abort
//!     }
//! });
//!
//! provider.ready().await?;
//! let image = provider.request_image(0, 0, 0).await?;
//! ```

pub mod config;
pub mod cubemap;
pub mod event;
pub mod imagery;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod proxy;
pub mod tiling;
