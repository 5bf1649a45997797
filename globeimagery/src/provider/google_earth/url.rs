//! Tile URL construction for Google Earth Enterprise servers.

use std::sync::Arc;

use super::metadata::ResolvedState;
use crate::proxy::Proxy;

/// Builds tile URLs from the provider's base URL, path and proxy.
#[derive(Debug, Clone)]
pub struct TileUrlBuilder {
    url: String,
    path: String,
    proxy: Option<Arc<dyn Proxy>>,
}

impl TileUrlBuilder {
    pub fn new(
        url: impl Into<String>,
        path: impl Into<String>,
        proxy: Option<Arc<dyn Proxy>>,
    ) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            proxy,
        }
    }

    /// URL of tile (x, y, level).
    ///
    /// The server numbers levels from 1, so `z` is `level + 1`.
    pub fn build(&self, resolved: &ResolvedState, x: u32, y: u32, level: u32) -> String {
        let url = format!(
            "{}{}/query?request={}&channel={}&version={}&x={}&y={}&z={}",
            self.url,
            self.path,
            resolved.request_type,
            resolved.channel,
            resolved.version,
            x,
            y,
            level + 1
        );

        match &self.proxy {
            Some(proxy) => proxy.get_url(&url),
            None => url,
        }
    }
}
