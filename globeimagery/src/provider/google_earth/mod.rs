//! Google Earth Enterprise imagery provider.
//!
//! Construction returns immediately. The server definitions are fetched on a
//! spawned task, and the provider becomes ready once they resolve. Until
//! then every query other than [`is_ready`](ImageryProvider::is_ready)
//! returns `None` and [`request_image`](ImageryProvider::request_image)
//! fails with [`ProviderError::NotReady`].
//!
//! Metadata failures are terminal: the error event is raised once and
//! [`GoogleEarthImageryProvider::ready`] reports the failure. There is no
//! metadata retry. Listeners passed in through
//! [`GoogleEarthConfig::with_error_event`] are registered before resolution
//! starts; a listener added later still hears a failure that happened while
//! nobody was listening.

mod metadata;
mod url;

pub use metadata::{
    metadata_url, parse_server_definitions, LayerMetadata, MetadataError, MetadataResolver,
    Projection, ResolvedState, ServerDefinitions, METADATA_QUERY,
};
pub use url::TileUrlBuilder;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{error, info, trace};

use crate::event::{ErrorEvent, TileProviderError};
use crate::pipeline::{DecodedImage, ImageRequestPipeline};
use crate::provider::{AsyncHttpClient, Credit, ImageryProvider, ProviderError};
use crate::proxy::Proxy;
use crate::tiling::{Extent, TileCoord, TilingScheme};

/// Server path used when none is configured.
pub const DEFAULT_PATH: &str = "/default_map";

const PROVIDER_NAME: &str = "Google Earth Enterprise";
const TILE_SIZE: u32 = 256;
const MINIMUM_LEVEL: u32 = 0;
const MAXIMUM_LEVEL: u32 = 23;
const CREDIT_TEXT: &str = "Google Imagery";
const CREDIT_LINK: &str = "http://www.google.com/enterprise/mapsearch/";

/// Construction options for [`GoogleEarthImageryProvider`].
///
/// `url` and `channel` are required.
#[derive(Debug, Clone, Default)]
pub struct GoogleEarthConfig {
    pub url: Option<String>,
    pub channel: Option<u32>,
    pub path: Option<String>,
    pub proxy: Option<Arc<dyn Proxy>>,
    /// Error event to use, with any listeners already registered.
    pub error_event: Option<ErrorEvent>,
}

impl GoogleEarthConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_error_event(mut self, error_event: ErrorEvent) -> Self {
        self.error_event = Some(error_event);
        self
    }
}

#[derive(Debug, Clone)]
enum MetadataState {
    Pending,
    Ready(Arc<ResolvedState>),
    Failed(MetadataError),
}

/// Imagery from a Google Earth Enterprise server.
pub struct GoogleEarthImageryProvider<C: AsyncHttpClient> {
    url: String,
    path: String,
    channel: u32,
    proxy: Option<Arc<dyn Proxy>>,
    metadata_url: String,
    state: watch::Receiver<MetadataState>,
    urls: TileUrlBuilder,
    pipeline: ImageRequestPipeline<C>,
}

impl<C> GoogleEarthImageryProvider<C>
where
    C: AsyncHttpClient + Clone + 'static,
{
    /// Validates `config` and starts resolving the server definitions.
    ///
    /// Must be called from within a Tokio runtime. Fails synchronously when
    /// `url` or `channel` is missing; every later failure is reported through
    /// the error event and [`ready`](Self::ready).
    pub fn new(config: GoogleEarthConfig, client: C) -> Result<Self, ProviderError> {
        let url = config
            .url
            .ok_or_else(|| ProviderError::Configuration("url is required.".to_string()))?;
        let channel = config
            .channel
            .ok_or_else(|| ProviderError::Configuration("channel is required.".to_string()))?;
        let path = config.path.unwrap_or_else(|| DEFAULT_PATH.to_string());
        let proxy = config.proxy;

        let runtime = Handle::try_current().map_err(|e| {
            ProviderError::Configuration(format!(
                "provider must be created inside a Tokio runtime: {}",
                e
            ))
        })?;

        let metadata_url = metadata_url(&url, &path, proxy.as_deref());
        let error_event = config.error_event.unwrap_or_default();
        let (state_tx, state) = watch::channel(MetadataState::Pending);

        let resolver = MetadataResolver::new(client.clone(), metadata_url.clone(), channel);
        let event = error_event.clone();
        runtime.spawn(async move {
            match resolver.resolve().await {
                Ok(resolved) => {
                    info!(
                        url = resolver.url(),
                        channel = resolved.channel,
                        version = resolved.version,
                        tiling_scheme = resolved.tiling_scheme.name(),
                        "Imagery provider ready"
                    );
                    state_tx.send_replace(MetadataState::Ready(Arc::new(resolved)));
                }
                Err(e) => {
                    error!(url = resolver.url(), error = %e, "Metadata resolution failed");
                    // Raised before publishing so `ready()` returns after delivery.
                    event.raise_terminal(&TileProviderError::for_provider(
                        PROVIDER_NAME,
                        e.to_string(),
                    ));
                    state_tx.send_replace(MetadataState::Failed(e));
                }
            }
        });

        Ok(Self {
            urls: TileUrlBuilder::new(url.clone(), path.clone(), proxy.clone()),
            pipeline: ImageRequestPipeline::new(PROVIDER_NAME, client, error_event),
            url,
            path,
            channel,
            proxy,
            metadata_url,
            state,
        })
    }
}

impl<C: AsyncHttpClient> GoogleEarthImageryProvider<C> {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn proxy(&self) -> Option<&Arc<dyn Proxy>> {
        self.proxy.as_ref()
    }

    /// Layer version from the server definitions, once ready.
    pub fn version(&self) -> Option<u32> {
        self.resolved().map(|r| r.version)
    }

    /// Layer request type from the server definitions, once ready.
    pub fn request_type(&self) -> Option<String> {
        self.resolved().map(|r| r.request_type.clone())
    }

    /// URL that [`request_image`](ImageryProvider::request_image) would fetch
    /// for tile (x, y, level). `None` until ready.
    pub fn tile_url(&self, x: u32, y: u32, level: u32) -> Option<String> {
        self.resolved()
            .map(|resolved| self.urls.build(&resolved, x, y, level))
    }

    /// Waits until metadata resolution finishes.
    ///
    /// Resolves immediately if it already has. Every caller observes the same
    /// outcome, regardless of when it started waiting.
    pub async fn ready(&self) -> Result<(), MetadataError> {
        let mut state = self.state.clone();
        let outcome = match state
            .wait_for(|s| !matches!(s, MetadataState::Pending))
            .await
        {
            Ok(current) => match &*current {
                MetadataState::Failed(e) => Err(e.clone()),
                _ => Ok(()),
            },
            Err(_) => Err(MetadataError::Unreachable {
                url: self.metadata_url.clone(),
                reason: "metadata resolution was cancelled".to_string(),
            }),
        };
        outcome
    }

    fn resolved(&self) -> Option<Arc<ResolvedState>> {
        match &*self.state.borrow() {
            MetadataState::Ready(resolved) => Some(Arc::clone(resolved)),
            _ => None,
        }
    }
}

impl<C: AsyncHttpClient> ImageryProvider for GoogleEarthImageryProvider<C> {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_ready(&self) -> bool {
        matches!(&*self.state.borrow(), MetadataState::Ready(_))
    }

    fn tiling_scheme(&self) -> Option<TilingScheme> {
        self.resolved().map(|r| r.tiling_scheme.clone())
    }

    fn extent(&self) -> Option<Extent> {
        self.resolved().map(|r| r.extent)
    }

    fn tile_width(&self) -> Option<u32> {
        self.is_ready().then_some(TILE_SIZE)
    }

    fn tile_height(&self) -> Option<u32> {
        self.is_ready().then_some(TILE_SIZE)
    }

    fn minimum_level(&self) -> Option<u32> {
        self.is_ready().then_some(MINIMUM_LEVEL)
    }

    fn maximum_level(&self) -> Option<u32> {
        self.is_ready().then_some(MAXIMUM_LEVEL)
    }

    fn credit(&self) -> Option<Credit> {
        self.is_ready()
            .then(|| Credit::new(CREDIT_TEXT).with_link(CREDIT_LINK))
    }

    fn error_event(&self) -> &ErrorEvent {
        self.pipeline.error_event()
    }

    async fn request_image(
        &self,
        x: u32,
        y: u32,
        level: u32,
    ) -> Result<DecodedImage, ProviderError> {
        let resolved = self.resolved().ok_or(ProviderError::NotReady)?;
        self.check_level(level)?;

        let url = self.urls.build(&resolved, x, y, level);
        trace!(url = %url, "Built tile URL");
        self.pipeline.request(&url, TileCoord::new(x, y, level)).await
    }
}
