//! Error event channel for asynchronous provider failures.
//!
//! Failures that happen after a call has returned (metadata resolution, tile
//! fetches) are not thrown. They are raised on the provider's [`ErrorEvent`],
//! and each listener returns a [`RetryDecision`]. For tile fetches the
//! request pipeline re-issues the request if any listener asked for it.
//!
//! # Ordering
//!
//! Listeners run synchronously, in registration order, on the task that
//! observed the failure. Every listener runs for every failure; the decision
//! is read only after the last one returns.
//!
//! # Example
//!
//! ```ignore
//! use globeimagery::event::RetryDecision;
//!
//! provider.error_event().add_listener(|error| {
//!     if error.times_retried < 3 {
//!         RetryDecision::Retry
//!     } else {
//!         RetryDecision::Abort
//!     }
//! });
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::provider::ProviderError;
use crate::tiling::TileCoord;

/// What a listener wants done about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the failed request.
    Retry,
    /// Give up on the request.
    Abort,
}

/// Payload delivered to error listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct TileProviderError {
    /// Name of the provider that failed.
    pub provider: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// The tile being requested, or `None` for metadata failures.
    pub tile: Option<TileCoord>,
    /// Number of retries already made for this request.
    pub times_retried: u32,
    /// Underlying cause, when there is one.
    pub error: Option<ProviderError>,
}

impl TileProviderError {
    /// Describes a failed tile request.
    pub fn for_tile(
        provider: impl Into<String>,
        tile: TileCoord,
        times_retried: u32,
        error: ProviderError,
    ) -> Self {
        Self {
            provider: provider.into(),
            message: format!("Failed to obtain image tile {}.", tile),
            tile: Some(tile),
            times_retried,
            error: Some(error),
        }
    }

    /// Describes a failure that is not tied to a tile.
    pub fn for_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            tile: None,
            times_retried: 0,
            error: None,
        }
    }
}

impl fmt::Display for TileProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(error) = &self.error {
            write!(f, " ({})", error)?;
        }
        Ok(())
    }
}

/// Handle returned by [`ErrorEvent::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&TileProviderError) -> RetryDecision + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
    /// Terminal failure raised while nobody was listening.
    unheard: Option<TileProviderError>,
}

/// Ordered set of error listeners.
///
/// Clones share the same listeners.
#[derive(Clone, Default)]
pub struct ErrorEvent {
    registry: Arc<Mutex<Registry>>,
}

impl ErrorEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener after all existing ones.
    ///
    /// If a terminal failure was raised before any listener existed, the new
    /// listener receives it immediately. Its decision is ignored.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TileProviderError) -> RetryDecision + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let (id, unheard) = {
            let mut registry = self.registry.lock();
            let id = ListenerId(registry.next_id);
            registry.next_id += 1;
            registry.listeners.push((id, Arc::clone(&listener)));
            (id, registry.unheard.take())
        };

        if let Some(error) = unheard {
            let _ = listener(&error);
        }
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    pub fn number_of_listeners(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    /// Delivers `error` to every listener and combines their decisions.
    ///
    /// Returns [`RetryDecision::Retry`] if at least one listener asked for a
    /// retry. With no listeners the failure is logged and aborted.
    pub fn raise(&self, error: &TileProviderError) -> RetryDecision {
        // Snapshot so listeners may add or remove listeners while running.
        let listeners = self.snapshot();

        if listeners.is_empty() {
            warn!(
                provider = %error.provider,
                times_retried = error.times_retried,
                "{}",
                error
            );
            return RetryDecision::Abort;
        }

        Self::notify(&listeners, error)
    }

    /// Delivers a failure that cannot be retried.
    ///
    /// With no listeners the failure is logged and held until the next
    /// [`add_listener`](Self::add_listener), so a listener registered just
    /// after the failure still hears it. Only the latest held failure is
    /// kept.
    pub fn raise_terminal(&self, error: &TileProviderError) {
        let listeners = {
            let mut registry = self.registry.lock();
            if registry.listeners.is_empty() {
                registry.unheard = Some(error.clone());
            }
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect::<Vec<Listener>>()
        };

        if listeners.is_empty() {
            warn!(provider = %error.provider, "{} (held for the next listener)", error);
            return;
        }
        let _ = Self::notify(&listeners, error);
    }

    fn snapshot(&self) -> Vec<Listener> {
        self.registry
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn notify(listeners: &[Listener], error: &TileProviderError) -> RetryDecision {
        let mut decision = RetryDecision::Abort;
        for listener in listeners {
            if listener(error) == RetryDecision::Retry {
                decision = RetryDecision::Retry;
            }
        }
        decision
    }
}

impl fmt::Debug for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorEvent")
            .field("listeners", &self.number_of_listeners())
            .finish()
    }
}
