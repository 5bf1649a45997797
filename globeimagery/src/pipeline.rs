//! Per-tile image request pipeline.
//!
//! A request moves through a small state machine:
//!
//! ```text
//!            ┌──────────── Retry ◄──────────────┐
//!            ▼                                  │
//!  Issued ──fetch+decode──► ok ──► Received     │
//!            │                                  │
//!            └── err ──► raise ErrorEvent ──────┤
//!                                               │
//!                              Abort ──► Failed ┘
//! ```
//!
//! The pipeline never retries on its own and enforces no retry ceiling; the
//! error listeners own that policy. Requests for the same tile are not
//! de-duplicated, and dropping the returned future abandons the request.

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, trace};

use crate::event::{ErrorEvent, RetryDecision, TileProviderError};
use crate::provider::{AsyncHttpClient, ProviderError};
use crate::tiling::TileCoord;

/// A decoded tile image, ready for upload.
///
/// Cheap to clone; the pixel data is shared.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: Arc<DynamicImage>,
}

impl DecodedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Decodes PNG, JPEG or any other format the `image` crate recognizes.
    pub fn decode(bytes: &[u8], url: &str) -> Result<Self, ProviderError> {
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| ProviderError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// RGBA8 pixels, converting if the source had another layout.
    pub fn to_rgba8(&self) -> image::RgbaImage {
        self.image.to_rgba8()
    }
}

/// Fetches and decodes one image with no retry handling.
pub async fn fetch_image<C: AsyncHttpClient>(
    client: &C,
    url: &str,
) -> Result<DecodedImage, ProviderError> {
    let bytes = client.get(url).await?;
    trace!(url = url, bytes = bytes.len(), "Decoding image");
    DecodedImage::decode(&bytes, url)
}

/// Issues tile requests and runs the retry protocol.
pub struct ImageRequestPipeline<C: AsyncHttpClient> {
    provider: String,
    client: C,
    error_event: ErrorEvent,
}

impl<C: AsyncHttpClient> ImageRequestPipeline<C> {
    /// Creates a pipeline reporting failures on `error_event`.
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider name placed in error payloads
    /// * `client` - Transport used for every attempt
    /// * `error_event` - Event whose listeners decide on retries
    pub fn new(provider: impl Into<String>, client: C, error_event: ErrorEvent) -> Self {
        Self {
            provider: provider.into(),
            client,
            error_event,
        }
    }

    pub fn error_event(&self) -> &ErrorEvent {
        &self.error_event
    }

    /// Requests `url` for `tile` until it succeeds or listeners give up.
    ///
    /// Every failed attempt raises the error event with the number of
    /// retries made so far. If any listener returns
    /// [`RetryDecision::Retry`], the same URL is requested again.
    pub async fn request(&self, url: &str, tile: TileCoord) -> Result<DecodedImage, ProviderError> {
        let mut times_retried = 0;

        loop {
            debug!(
                provider = %self.provider,
                url = url,
                x = tile.x,
                y = tile.y,
                level = tile.level,
                times_retried,
                "Requesting tile image"
            );

            let cause = match fetch_image(&self.client, url).await {
                Ok(image) => {
                    trace!(
                        url = url,
                        width = image.width(),
                        height = image.height(),
                        "Tile image received"
                    );
                    return Ok(image);
                }
                Err(e) => e,
            };

            let error =
                TileProviderError::for_tile(&self.provider, tile, times_retried, cause.clone());

            match self.error_event.raise(&error) {
                RetryDecision::Retry => {
                    times_retried += 1;
                }
                RetryDecision::Abort => {
                    debug!(url = url, times_retried, "Tile request abandoned");
                    return Err(ProviderError::TileFetch {
                        tile,
                        times_retried,
                        source: Box::new(cause),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{png_bytes, MockAsyncHttpClient};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    const URL: &str = "http://example.invalid/query?x=0&y=0&z=1";

    fn failing_then_ok(failures: u32) -> MockAsyncHttpClient {
        let attempts = AtomicU32::new(0);
        let png = png_bytes(16, 16);
        MockAsyncHttpClient::with_handler(move |url| {
            if attempts.fetch_add(1, Ordering::SeqCst) < failures {
                Err(ProviderError::HttpError(format!("HTTP 503 from {}", url)))
            } else {
                Ok(png.clone())
            }
        })
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let client = failing_then_ok(0);
        let pipeline = ImageRequestPipeline::new("test", client.clone(), ErrorEvent::new());

        let image = pipeline.request(URL, TileCoord::new(0, 0, 0)).await.unwrap();
        assert_eq!((image.width(), image.height()), (16, 16));
        assert_eq!(client.requests(), vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn test_failure_without_listeners_is_permanent() {
        let client = failing_then_ok(1);
        let pipeline = ImageRequestPipeline::new("test", client.clone(), ErrorEvent::new());

        let err = pipeline
            .request(URL, TileCoord::new(0, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::TileFetch {
                times_retried: 0,
                ..
            }
        ));
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_listener_retries_until_success() {
        let client = failing_then_ok(2);
        let event = ErrorEvent::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observed = Arc::clone(&seen);
        event.add_listener(move |error| {
            let mut observed = observed.lock();
            observed.push(error.times_retried);
            if observed.len() < 3 {
                RetryDecision::Retry
            } else {
                RetryDecision::Abort
            }
        });

        let pipeline = ImageRequestPipeline::new("test", client.clone(), event);
        let image = pipeline.request(URL, TileCoord::new(0, 0, 0)).await;

        assert!(image.is_ok());
        assert_eq!(*seen.lock(), vec![0, 1]);
        assert_eq!(client.requests(), vec![URL.to_string(); 3]);
    }

    #[tokio::test]
    async fn test_listener_gives_up() {
        let client = failing_then_ok(u32::MAX);
        let event = ErrorEvent::new();
        event.add_listener(|error| {
            if error.times_retried < 2 {
                RetryDecision::Retry
            } else {
                RetryDecision::Abort
            }
        });

        let pipeline = ImageRequestPipeline::new("test", client.clone(), event);
        let err = pipeline
            .request(URL, TileCoord::new(3, 4, 5))
            .await
            .unwrap_err();

        match err {
            ProviderError::TileFetch {
                tile,
                times_retried,
                ..
            } => {
                assert_eq!(tile, TileCoord::new(3, 4, 5));
                assert_eq!(times_retried, 2);
            }
            other => panic!("Expected TileFetch, got {:?}", other),
        }
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_undecodable_body_raises_error() {
        let client = MockAsyncHttpClient::with_response(Ok(b"not an image".to_vec()));
        let event = ErrorEvent::new();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        event.add_listener(move |error| {
            sink.lock().push(error.error.clone());
            RetryDecision::Abort
        });

        let pipeline = ImageRequestPipeline::new("test", client, event);
        assert!(pipeline.request(URL, TileCoord::new(0, 0, 0)).await.is_err());

        let messages = messages.lock();
        assert!(matches!(messages[0], Some(ProviderError::Decode { .. })));
    }
}
