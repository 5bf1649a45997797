//! URL-template imagery provider.
//!
//! Serves any tiled service whose tile URLs can be produced by substituting
//! coordinates into a template:
//!
//! - `{x}`: column, west to east
//! - `{y}`: row, north to south
//! - `{reverseY}`: row, south to north
//! - `{z}`: level
//!
//! For example `https://tile.example.com/{z}/{x}/{y}.png`.
//!
//! The provider has no metadata to resolve and is ready as soon as it is
//! constructed.

use std::sync::Arc;

use crate::event::ErrorEvent;
use crate::pipeline::{DecodedImage, ImageRequestPipeline};
use crate::provider::{AsyncHttpClient, Credit, ImageryProvider, ProviderError};
use crate::proxy::Proxy;
use crate::tiling::{Extent, TileCoord, TileGrid, TilingScheme, WebMercatorTilingScheme};

const DEFAULT_TILE_SIZE: u32 = 256;
const DEFAULT_MAXIMUM_LEVEL: u32 = 18;

/// Construction options for [`XyzImageryProvider`].
#[derive(Debug, Clone)]
pub struct XyzConfig {
    pub url_template: String,
    pub tiling_scheme: TilingScheme,
    pub tile_width: u32,
    pub tile_height: u32,
    pub minimum_level: u32,
    pub maximum_level: u32,
    pub credit: Option<Credit>,
    pub proxy: Option<Arc<dyn Proxy>>,
}

impl XyzConfig {
    /// Web Mercator, 256-pixel tiles, levels 0 to 18.
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            tiling_scheme: WebMercatorTilingScheme::new().into(),
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            minimum_level: 0,
            maximum_level: DEFAULT_MAXIMUM_LEVEL,
            credit: None,
            proxy: None,
        }
    }

    pub fn with_tiling_scheme(mut self, tiling_scheme: impl Into<TilingScheme>) -> Self {
        self.tiling_scheme = tiling_scheme.into();
        self
    }

    pub fn with_levels(mut self, minimum_level: u32, maximum_level: u32) -> Self {
        self.minimum_level = minimum_level;
        self.maximum_level = maximum_level;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_credit(mut self, credit: Credit) -> Self {
        self.credit = Some(credit);
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

/// Imagery from a `{z}/{x}/{y}` style tile service.
pub struct XyzImageryProvider<C: AsyncHttpClient> {
    config: XyzConfig,
    pipeline: ImageRequestPipeline<C>,
}

impl<C: AsyncHttpClient> XyzImageryProvider<C> {
    /// Creates a provider for `config`.
    ///
    /// Fails if the template has no coordinate placeholders, the level
    /// range is empty, or the maximum level is too deep for the tiling
    /// scheme's tile indices.
    pub fn new(config: XyzConfig, client: C) -> Result<Self, ProviderError> {
        let template = &config.url_template;
        let has_row = template.contains("{y}") || template.contains("{reverseY}");
        if !template.contains("{x}") || !has_row {
            return Err(ProviderError::Configuration(format!(
                "url template '{}' must contain {{x}} and {{y}} or {{reverseY}}",
                template
            )));
        }
        if config.minimum_level > config.maximum_level {
            return Err(ProviderError::Configuration(format!(
                "minimum level {} exceeds maximum level {}",
                config.minimum_level, config.maximum_level
            )));
        }
        if !config.tiling_scheme.has_level(config.maximum_level) {
            return Err(ProviderError::Configuration(format!(
                "maximum level {} is too deep for the {} tiling scheme",
                config.maximum_level,
                config.tiling_scheme.name()
            )));
        }

        let name = format!("XYZ {}", config.url_template);
        Ok(Self {
            pipeline: ImageRequestPipeline::new(name, client, ErrorEvent::new()),
            config,
        })
    }

    pub fn url_template(&self) -> &str {
        &self.config.url_template
    }

    /// URL of tile (x, y, level), proxied when a proxy is configured.
    pub fn build_url(&self, x: u32, y: u32, level: u32) -> String {
        let rows = self.config.tiling_scheme.number_of_y_tiles_at_level(level);
        let reverse_y = rows.saturating_sub(1).saturating_sub(y);

        let url = self
            .config
            .url_template
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{reverseY}", &reverse_y.to_string())
            .replace("{z}", &level.to_string());

        match &self.config.proxy {
            Some(proxy) => proxy.get_url(&url),
            None => url,
        }
    }
}

impl<C: AsyncHttpClient> ImageryProvider for XyzImageryProvider<C> {
    fn name(&self) -> &str {
        "XYZ"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn tiling_scheme(&self) -> Option<TilingScheme> {
        Some(self.config.tiling_scheme.clone())
    }

    fn extent(&self) -> Option<Extent> {
        Some(self.config.tiling_scheme.extent())
    }

    fn tile_width(&self) -> Option<u32> {
        Some(self.config.tile_width)
    }

    fn tile_height(&self) -> Option<u32> {
        Some(self.config.tile_height)
    }

    fn minimum_level(&self) -> Option<u32> {
        Some(self.config.minimum_level)
    }

    fn maximum_level(&self) -> Option<u32> {
        Some(self.config.maximum_level)
    }

    fn credit(&self) -> Option<Credit> {
        self.config.credit.clone()
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
        self.check_level(level)?;
        let url = self.build_url(x, y, level);
        self.pipeline.request(&url, TileCoord::new(x, y, level)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RetryDecision;
    use crate::provider::{png_bytes, MockAsyncHttpClient};
    use crate::proxy::DefaultProxy;
    use crate::tiling::GeographicTilingScheme;

    fn ok_client() -> MockAsyncHttpClient {
        MockAsyncHttpClient::with_response(Ok(png_bytes(256, 256)))
    }

    #[test]
    fn test_rejects_template_without_placeholders() {
        let config = XyzConfig::new("https://tiles.invalid/tile.png");
        let result = XyzImageryProvider::new(config, ok_client());
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[test]
    fn test_rejects_inverted_levels() {
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png").with_levels(5, 2);
        assert!(XyzImageryProvider::new(config, ok_client()).is_err());
    }

    #[test]
    fn test_rejects_levels_beyond_tile_indices() {
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png").with_levels(0, 40);
        let result = XyzImageryProvider::new(config, ok_client());
        assert!(matches!(result, Err(ProviderError::Configuration(_))));

        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png")
            .with_tiling_scheme(GeographicTilingScheme::new())
            .with_levels(0, 31);
        assert!(XyzImageryProvider::new(config, ok_client()).is_err());

        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png").with_levels(0, 31);
        assert!(XyzImageryProvider::new(config, ok_client()).is_ok());
    }

    #[tokio::test]
    async fn test_deep_level_request_is_rejected_without_panic() {
        let provider = XyzImageryProvider::new(
            XyzConfig::new("https://t.invalid/{z}/{x}/{reverseY}.png").with_levels(0, 31),
            ok_client(),
        )
        .unwrap();

        let err = provider.request_image(0, 0, 32).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedLevel { level: 32, .. }));
        // Out-of-range URLs still build.
        assert_eq!(
            provider.build_url(0, 0, 40),
            format!("https://t.invalid/40/0/{}.png", u32::MAX - 1)
        );
    }

    #[test]
    fn test_build_url() {
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png");
        let provider = XyzImageryProvider::new(config, ok_client()).unwrap();
        assert_eq!(provider.build_url(3, 5, 4), "https://t.invalid/4/3/5.png");
    }

    #[test]
    fn test_reverse_y() {
        let provider = XyzImageryProvider::new(
            XyzConfig::new("https://t.invalid/{z}/{x}/{reverseY}.png"),
            ok_client(),
        )
        .unwrap();
        // Level 2 has 4 rows in Web Mercator.
        assert_eq!(provider.build_url(0, 0, 2), "https://t.invalid/2/0/3.png");
        assert_eq!(provider.build_url(0, 3, 2), "https://t.invalid/2/0/0.png");
    }

    #[test]
    fn test_geographic_scheme() {
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{reverseY}")
            .with_tiling_scheme(GeographicTilingScheme::new());
        let provider = XyzImageryProvider::new(config, ok_client()).unwrap();

        assert!(provider.is_ready());
        assert!(matches!(provider.tiling_scheme(), Some(TilingScheme::Geographic(_))));
        // Level 0 has a single row in the geographic scheme.
        assert_eq!(provider.build_url(1, 0, 0), "https://t.invalid/0/1/0");
    }

    #[test]
    fn test_proxy() {
        let proxy: Arc<dyn Proxy> = Arc::new(DefaultProxy::new("/proxy/"));
        let config = XyzConfig::new("http://t.invalid/{z}/{x}/{y}").with_proxy(proxy);
        let provider = XyzImageryProvider::new(config, ok_client()).unwrap();
        assert_eq!(
            provider.build_url(0, 0, 0),
            "/proxy/?http%3A%2F%2Ft.invalid%2F0%2F0%2F0"
        );
    }

    #[tokio::test]
    async fn test_request_image() {
        let client = ok_client();
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png")
            .with_credit(Credit::new("Example tiles"));
        let provider = XyzImageryProvider::new(config, client.clone()).unwrap();

        let image = provider.request_image(1, 1, 1).await.unwrap();
        assert_eq!(image.width(), 256);
        assert_eq!(client.requests(), vec!["https://t.invalid/1/1/1.png".to_string()]);
        assert_eq!(provider.credit().unwrap().text, "Example tiles");
    }

    #[tokio::test]
    async fn test_level_out_of_range_skips_error_event() {
        let provider = XyzImageryProvider::new(
            XyzConfig::new("https://t.invalid/{z}/{x}/{y}.png").with_levels(0, 3),
            ok_client(),
        )
        .unwrap();
        provider.error_event().add_listener(|_| panic!("listener must not run"));

        let err = provider.request_image(0, 0, 4).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::UnsupportedLevel {
                level: 4,
                minimum: 0,
                maximum: 3
            }
        );
    }

    #[tokio::test]
    async fn test_retries_through_error_event() {
        let client = MockAsyncHttpClient::with_response(Err(ProviderError::HttpError(
            "HTTP 500".into(),
        )));
        let config = XyzConfig::new("https://t.invalid/{z}/{x}/{y}");
        let provider = XyzImageryProvider::new(config, client.clone()).unwrap();
        provider.error_event().add_listener(|error| {
            if error.times_retried < 1 {
                RetryDecision::Retry
            } else {
                RetryDecision::Abort
            }
        });

        assert!(provider.request_image(0, 0, 0).await.is_err());
        assert_eq!(client.requests().len(), 2);
    }
}
