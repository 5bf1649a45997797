//! Reference-counted tile handles and the layer-side request driver.
//!
//! An [`Imagery`] tracks one tile of one provider through its lifecycle:
//!
//! ```text
//! Unloaded ──request──► Transitioning ──ok──► Received ──(upload)──► Ready
//!                            │
//!                            └──err──► Failed
//! ```
//!
//! [`request_imagery`] drives `Transitioning` to `Received` or `Failed`.
//! `Ready` and `Invalid` belong to the consumer that uploads the image.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::pipeline::DecodedImage;
use crate::provider::{ImageryProvider, ProviderError};
use crate::tiling::TileCoord;

/// Lifecycle state of an [`Imagery`] tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageryState {
    Unloaded,
    Transitioning,
    Received,
    Ready,
    Failed,
    Invalid,
}

impl fmt::Display for ImageryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageryState::Unloaded => "unloaded",
            ImageryState::Transitioning => "transitioning",
            ImageryState::Received => "received",
            ImageryState::Ready => "ready",
            ImageryState::Failed => "failed",
            ImageryState::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Inner {
    state: ImageryState,
    image: Option<DecodedImage>,
    references: u32,
}

/// One tile of imagery, shared between the tiles that display it.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct Imagery {
    coord: TileCoord,
    inner: Arc<Mutex<Inner>>,
}

impl Imagery {
    /// Creates an unloaded tile with no references.
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self {
            coord: TileCoord::new(x, y, level),
            inner: Arc::new(Mutex::new(Inner {
                state: ImageryState::Unloaded,
                image: None,
                references: 0,
            })),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn x(&self) -> u32 {
        self.coord.x
    }

    pub fn y(&self) -> u32 {
        self.coord.y
    }

    pub fn level(&self) -> u32 {
        self.coord.level
    }

    pub fn state(&self) -> ImageryState {
        self.inner.lock().state
    }

    pub fn set_state(&self, state: ImageryState) {
        self.inner.lock().state = state;
    }

    /// The received image, if any.
    pub fn image(&self) -> Option<DecodedImage> {
        self.inner.lock().image.clone()
    }

    pub fn references(&self) -> u32 {
        self.inner.lock().references
    }

    /// Adds a reference and returns the new count.
    pub fn add_reference(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.references += 1;
        inner.references
    }

    /// Drops a reference and returns the remaining count.
    ///
    /// The last release frees the image and returns the tile to
    /// [`ImageryState::Unloaded`].
    pub fn release_reference(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.references = inner.references.saturating_sub(1);
        if inner.references == 0 {
            trace!(tile = %self.coord, "Releasing imagery");
            inner.image = None;
            inner.state = ImageryState::Unloaded;
        }
        inner.references
    }

    fn begin_request(&self) {
        self.inner.lock().state = ImageryState::Transitioning;
    }

    fn receive(&self, image: DecodedImage) {
        let mut inner = self.inner.lock();
        inner.image = Some(image);
        inner.state = ImageryState::Received;
    }

    fn fail(&self) {
        let mut inner = self.inner.lock();
        inner.image = None;
        inner.state = ImageryState::Failed;
    }
}

/// Requests an imagery tile from `provider` and records the outcome.
///
/// Sets the tile to `Transitioning`, then to `Received` with the image or to
/// `Failed`. A provider that is not ready yet leaves the tile `Unloaded` so it
/// can be requested again. The provider's error is returned for logging.
pub async fn request_imagery<P>(provider: &P, imagery: &Imagery) -> Result<(), ProviderError>
where
    P: ImageryProvider,
{
    let coord = imagery.coord();
    imagery.begin_request();

    match provider.request_image(coord.x, coord.y, coord.level).await {
        Ok(image) => {
            debug!(provider = provider.name(), tile = %coord, "Imagery received");
            imagery.receive(image);
            Ok(())
        }
        Err(ProviderError::NotReady) => {
            imagery.set_state(ImageryState::Unloaded);
            Err(ProviderError::NotReady)
        }
        Err(e) => {
            debug!(provider = provider.name(), tile = %coord, error = %e, "Imagery failed");
            imagery.fail();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RetryDecision;
    use crate::provider::{png_bytes, MockAsyncHttpClient, XyzConfig, XyzImageryProvider};
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEMPLATE: &str = "https://t.invalid/{z}/{x}/{y}.png";

    fn provider(failures: u32) -> XyzImageryProvider<MockAsyncHttpClient> {
        let attempts = AtomicU32::new(0);
        let png = png_bytes(256, 256);
        let client = MockAsyncHttpClient::with_handler(move |url| {
            if attempts.fetch_add(1, Ordering::SeqCst) < failures {
                Err(ProviderError::HttpError(format!("HTTP 503 from {}", url)))
            } else {
                Ok(png.clone())
            }
        });
        XyzImageryProvider::new(XyzConfig::new(TEMPLATE), client).unwrap()
    }

    #[test]
    fn test_new_imagery_is_unloaded() {
        let imagery = Imagery::new(1, 2, 3);
        assert_eq!(imagery.state(), ImageryState::Unloaded);
        assert_eq!(imagery.coord(), TileCoord::new(1, 2, 3));
        assert_eq!(imagery.references(), 0);
        assert!(imagery.image().is_none());
    }

    #[test]
    fn test_reference_counting() {
        let imagery = Imagery::new(0, 0, 0);
        assert_eq!(imagery.add_reference(), 1);
        assert_eq!(imagery.add_reference(), 2);
        assert_eq!(imagery.release_reference(), 1);
        assert_eq!(imagery.release_reference(), 0);
        assert_eq!(imagery.release_reference(), 0);
    }

    #[tokio::test]
    async fn test_request_success_sets_received() {
        let provider = provider(0);
        let imagery = Imagery::new(0, 0, 0);

        request_imagery(&provider, &imagery).await.unwrap();
        assert_eq!(imagery.state(), ImageryState::Received);
        assert_eq!(imagery.image().unwrap().width(), 256);
    }

    #[tokio::test]
    async fn test_request_failure_sets_failed() {
        let provider = provider(1);
        let imagery = Imagery::new(0, 0, 0);

        assert!(request_imagery(&provider, &imagery).await.is_err());
        assert_eq!(imagery.state(), ImageryState::Failed);
        assert!(imagery.image().is_none());
    }

    #[tokio::test]
    async fn test_retried_request_ends_received() {
        let provider = provider(2);
        provider.error_event().add_listener(|error| {
            if error.times_retried < 2 {
                RetryDecision::Retry
            } else {
                RetryDecision::Abort
            }
        });
        let imagery = Imagery::new(0, 0, 0);

        request_imagery(&provider, &imagery).await.unwrap();
        assert_eq!(imagery.state(), ImageryState::Received);
    }

    #[tokio::test]
    async fn test_release_to_zero_unloads() {
        let provider = provider(0);
        let imagery = Imagery::new(0, 0, 0);
        imagery.add_reference();

        request_imagery(&provider, &imagery).await.unwrap();
        imagery.set_state(ImageryState::Ready);
        assert_eq!(imagery.release_reference(), 0);

        assert_eq!(imagery.state(), ImageryState::Unloaded);
        assert!(imagery.image().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_level_fails_tile() {
        let provider = provider(0);
        let imagery = Imagery::new(0, 0, 30);

        let err = request_imagery(&provider, &imagery).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedLevel { .. }));
        assert_eq!(imagery.state(), ImageryState::Failed);
    }
}
