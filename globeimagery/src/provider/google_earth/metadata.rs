//! Server definitions bootstrap for Google Earth Enterprise servers.
//!
//! Before any tile can be requested the provider reads the server
//! definitions document from
//! `<url><path>/query?request=Json&vars=geeServerDefs&is2d=t`. The document
//! lists the server's layers (channels) and, optionally, its projection.
//!
//! # Permissive Parsing
//!
//! Servers emit a JavaScript object literal rather than strict JSON:
//!
//! ```text
//! {
//! isAuthenticated: true,
//! layers: [
//!    { id: 1234, requestType: "ImageryMaps", version: 1, },
//! ],
//! // comments happen too
//! serverUrl: "https://example.invalid",
//! }
//! ```
//!
//! The text is parsed as JSON first. If that fails it is rewritten outside
//! string literals (comments stripped, bare keys and single-quoted strings
//! re-quoted, trailing commas dropped) and parsed again.
//!
//! Layer entries that do not describe a usable layer, such as ones without a
//! numeric `id`, are skipped. Only the configured channel's entry matters.

use std::f64::consts::PI;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, trace};

use crate::provider::AsyncHttpClient;
use crate::proxy::Proxy;
use crate::tiling::{
    Extent, GeographicTilingScheme, TileGrid, TilingScheme, WebMercatorTilingScheme,
};

/// Query that returns the server definitions document.
pub const METADATA_QUERY: &str = "/query?request=Json&vars=geeServerDefs&is2d=t";

/// Errors that prevent a provider from becoming ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// The document has no layer whose id equals the channel.
    #[error("Could not find layer with channel (id) of {0}.")]
    ChannelNotFound(u32),

    /// The channel's layer carries no version.
    #[error("Could not find a version in channel (id) {0}.")]
    VersionNotFound(u32),

    /// The document names a projection other than `mercator` or `flat`.
    #[error("Unsupported projection {0}.")]
    UnsupportedProjection(String),

    /// The document could not be fetched.
    #[error("An error occurred while accessing {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The document could not be parsed, even permissively.
    #[error("An error occurred while accessing {url}: malformed server definitions ({reason})")]
    Malformed { url: String, reason: String },
}

/// One layer entry of the server definitions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetadata {
    /// Channel number of the layer.
    pub id: u32,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub version: Option<u32>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub initial_state: Option<bool>,
    #[serde(default)]
    pub look_at: Option<serde_json::Value>,
}

/// The server definitions document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDefinitions {
    #[serde(default)]
    pub is_authenticated: Option<bool>,
    #[serde(default, deserialize_with = "usable_layers")]
    pub layers: Vec<LayerMetadata>,
    #[serde(default)]
    pub projection: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub use_google_layers: Option<bool>,
}

impl ServerDefinitions {
    /// First layer whose id is `channel`.
    pub fn layer(&self, channel: u32) -> Option<&LayerMetadata> {
        self.layers.iter().find(|layer| layer.id == channel)
    }
}

fn usable_layers<'de, D>(deserializer: D) -> Result<Vec<LayerMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(layer) => Some(layer),
            Err(e) => {
                debug!(error = %e, "Skipping unusable layer entry");
                None
            }
        })
        .collect())
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid version '{}'", s))),
    }
}

/// Projection declared by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Web Mercator. Also assumed when the server declares nothing.
    Mercator,
    /// Plate carrée over a square `[-π, π]²` extent.
    Flat,
}

impl Projection {
    /// Interprets the document's `projection` field.
    pub fn from_field(value: Option<&str>) -> Result<Self, MetadataError> {
        match value {
            None | Some("mercator") => Ok(Projection::Mercator),
            Some("flat") => Ok(Projection::Flat),
            Some(other) => Err(MetadataError::UnsupportedProjection(other.to_string())),
        }
    }

    /// Tiling scheme the server's tiles are cut in.
    pub fn tiling_scheme(self) -> TilingScheme {
        match self {
            Projection::Mercator => WebMercatorTilingScheme::new().into(),
            Projection::Flat => {
                GeographicTilingScheme::with_extent(Extent::new(-PI, -PI, PI, PI), 2, 2).into()
            }
        }
    }
}

/// Everything a provider needs once its metadata has resolved.
///
/// Published in a single write; the provider is ready exactly when this
/// exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedState {
    pub tiling_scheme: TilingScheme,
    pub extent: Extent,
    pub channel: u32,
    pub version: u32,
    pub request_type: String,
}

impl ResolvedState {
    /// Resolves the configured channel against a parsed document.
    pub fn resolve(definitions: &ServerDefinitions, channel: u32) -> Result<Self, MetadataError> {
        let layer = definitions
            .layer(channel)
            .ok_or(MetadataError::ChannelNotFound(channel))?;
        let version = layer
            .version
            .ok_or(MetadataError::VersionNotFound(channel))?;
        let projection = Projection::from_field(definitions.projection.as_deref())?;
        let tiling_scheme = projection.tiling_scheme();

        Ok(Self {
            extent: tiling_scheme.extent(),
            tiling_scheme,
            channel: layer.id,
            version,
            request_type: layer
                .request_type
                .clone()
                .unwrap_or_else(|| "ImageryMaps".to_string()),
        })
    }
}

/// Builds the server definitions URL, proxied when a proxy is configured.
pub fn metadata_url(url: &str, path: &str, proxy: Option<&dyn Proxy>) -> String {
    let url = format!("{}{}{}", url, path, METADATA_QUERY);
    match proxy {
        Some(proxy) => proxy.get_url(&url),
        None => url,
    }
}

/// Parses server definitions, tolerating JavaScript object-literal syntax.
pub fn parse_server_definitions(text: &str) -> Result<ServerDefinitions, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(definitions) => Ok(definitions),
        Err(strict_error) => {
            trace!(error = %strict_error, "Strict JSON parse failed, relaxing");
            serde_json::from_str(&relax_object_literal(text))
        }
    }
}

/// Rewrites a JavaScript object literal into JSON.
///
/// Only text outside string literals is touched. Comments are dropped, bare
/// keys quoted and trailing commas removed; single-quoted strings become
/// double-quoted ones.
fn relax_object_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => copy_double_quoted(&mut chars, &mut out),
            '\'' => requote_single_quoted(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                out.push(' ');
            }
            ']' | '}' => {
                drop_trailing_comma(&mut out);
                out.push(c);
            }
            c if is_identifier_start(c) => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_identifier_part(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }

                let is_key = chars.clone().find(|c| !c.is_whitespace()) == Some(':');
                if is_key {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else {
                    out.push_str(&word);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Copies the rest of a `"` string, opening quote already consumed.
fn copy_double_quoted(chars: &mut impl Iterator<Item = char>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => return,
            _ => {}
        }
    }
}

/// Re-emits the rest of a `'` string as a JSON string.
fn requote_single_quoted(chars: &mut impl Iterator<Item = char>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push('\\'),
            },
            '\'' => {
                out.push('"');
                return;
            }
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
}

/// Removes a `,` that is followed only by whitespace.
fn drop_trailing_comma(out: &mut String) {
    let end = out.trim_end().len();
    if out[..end].ends_with(',') {
        out.remove(end - 1);
    }
}

/// Fetches and resolves a provider's metadata.
pub struct MetadataResolver<C: AsyncHttpClient> {
    client: C,
    url: String,
    channel: u32,
}

impl<C: AsyncHttpClient> MetadataResolver<C> {
    /// Creates a resolver for the document at `url` (already proxied).
    pub fn new(client: C, url: impl Into<String>, channel: u32) -> Self {
        Self {
            client,
            url: url.into(),
            channel,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issues the single metadata request and resolves the channel.
    pub async fn resolve(&self) -> Result<ResolvedState, MetadataError> {
        debug!(url = %self.url, channel = self.channel, "Fetching server definitions");

        let bytes = self
            .client
            .get(&self.url)
            .await
            .map_err(|e| MetadataError::Unreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let text = String::from_utf8_lossy(&bytes);
        let definitions =
            parse_server_definitions(&text).map_err(|e| MetadataError::Malformed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        ResolvedState::resolve(&definitions, self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockAsyncHttpClient, ProviderError};
    use crate::proxy::DefaultProxy;

    const MALFORMED: &str = r#"{
isAuthenticated: true,
layers: [
   {
        icon: "icons/773_l.png",
        id: 1234,
        initialState: true,
        label: "Imagery",
        lookAt: "none",
        requestType: "ImageryMaps",
        version: 1
    },{
        icon: "icons/773_l.png",
        id: 1007,
        initialState: true,
        label: "Labels",
        lookAt: "none",
        requestType: "VectorMapsRaster",
        version: 8
    }
],
serverUrl: "https://example.invalid",
useGoogleLayers: false
}"#;

    fn definitions(projection: Option<&str>) -> ServerDefinitions {
        let projection = projection
            .map(|p| format!(r#""projection": "{}","#, p))
            .unwrap_or_default();
        parse_server_definitions(&format!(
            r#"{{"isAuthenticated": true, {} "layers": [{{"id": 1234, "requestType": "ImageryMaps", "version": 1}}]}}"#,
            projection
        ))
        .unwrap()
    }

    #[test]
    fn test_parses_strict_json() {
        let defs = definitions(None);
        assert_eq!(defs.layers.len(), 1);
        assert_eq!(defs.layer(1234).unwrap().version, Some(1));
        assert_eq!(defs.is_authenticated, Some(true));
    }

    #[test]
    fn test_parses_object_literal() {
        let defs = parse_server_definitions(MALFORMED).unwrap();
        assert_eq!(defs.layers.len(), 2);
        let labels = defs.layer(1007).unwrap();
        assert_eq!(labels.request_type.as_deref(), Some("VectorMapsRaster"));
        assert_eq!(labels.version, Some(8));
        assert_eq!(defs.server_url.as_deref(), Some("https://example.invalid"));
        assert_eq!(defs.use_google_layers, Some(false));
    }

    #[test]
    fn test_parses_comments_and_trailing_commas() {
        let text = r#"{
            // layer catalog
            layers: [ { id: 7, version: "3", requestType: "ImageryMaps", }, ],
            /* projection: "flat", */
            serverUrl: "http://host//path",
        }"#;
        let defs = parse_server_definitions(text).unwrap();
        assert_eq!(defs.layer(7).unwrap().version, Some(3));
        assert_eq!(defs.projection, None);
        assert_eq!(defs.server_url.as_deref(), Some("http://host//path"));
    }

    #[test]
    fn test_parses_single_quoted_strings() {
        let defs = parse_server_definitions(
            r#"{layers: [{id: 1234, requestType: 'ImageryMaps', version: 1, label: 'Say "hi" it\'s'}]}"#,
        )
        .unwrap();
        let layer = defs.layer(1234).unwrap();
        assert_eq!(layer.request_type.as_deref(), Some("ImageryMaps"));
        assert_eq!(layer.label.as_deref(), Some(r#"Say "hi" it's"#));
    }

    #[test]
    fn test_string_contents_are_left_alone() {
        let text = r#"{layers: [{id: 1234, label: "Roads, Rivers: 2020", icon: "a,}b // c", version: 1}]}"#;
        let layer = parse_server_definitions(text).unwrap().layers.remove(0);
        assert_eq!(layer.label.as_deref(), Some("Roads, Rivers: 2020"));
        assert_eq!(layer.icon.as_deref(), Some("a,}b // c"));
    }

    #[test]
    fn test_skips_unusable_layers() {
        let text = r#"{layers: [
            {id: 1234, requestType: "ImageryMaps", version: 1},
            {label: "Terrain", requestType: "Terrain"},
            {id: "terrain", version: 2},
        ]}"#;
        let defs = parse_server_definitions(text).unwrap();
        assert_eq!(defs.layers.len(), 1);

        let resolved = ResolvedState::resolve(&defs, 1234).unwrap();
        assert_eq!(resolved.version, 1);
    }

    #[test]
    fn test_relax_object_literal() {
        assert_eq!(
            relax_object_literal("{ a: 'x:y', /* b: 1, */ c: [1, 2, ], }"),
            r#"{ "a": "x:y",   "c": [1, 2 ] }"#
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_server_definitions("<html>oops</html>").is_err());
    }

    #[test]
    fn test_missing_projection_is_mercator() {
        let resolved = ResolvedState::resolve(&definitions(None), 1234).unwrap();
        assert!(matches!(resolved.tiling_scheme, TilingScheme::WebMercator(_)));
        assert_eq!(resolved.extent, WebMercatorTilingScheme::new().extent());
        assert_eq!(resolved.version, 1);
        assert_eq!(resolved.request_type, "ImageryMaps");
    }

    #[test]
    fn test_explicit_mercator_matches_missing() {
        let explicit = ResolvedState::resolve(&definitions(Some("mercator")), 1234).unwrap();
        let implicit = ResolvedState::resolve(&definitions(None), 1234).unwrap();
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_flat_projection_is_geographic() {
        let resolved = ResolvedState::resolve(&definitions(Some("flat")), 1234).unwrap();
        assert!(matches!(resolved.tiling_scheme, TilingScheme::Geographic(_)));
        assert_eq!(resolved.extent, Extent::new(-PI, -PI, PI, PI));
        assert_eq!(resolved.tiling_scheme.number_of_x_tiles_at_level(0), 2);
        assert_eq!(resolved.tiling_scheme.number_of_y_tiles_at_level(0), 2);
    }

    #[test]
    fn test_unsupported_projection() {
        let err = ResolvedState::resolve(&definitions(Some("polar")), 1234).unwrap_err();
        assert_eq!(err, MetadataError::UnsupportedProjection("polar".into()));
        assert!(err.to_string().contains("Unsupported projection"));
    }

    #[test]
    fn test_channel_not_found() {
        let err = ResolvedState::resolve(&definitions(None), 1235).unwrap_err();
        assert!(err
            .to_string()
            .contains("Could not find layer with channel"));
    }

    #[test]
    fn test_version_not_found() {
        let text = r#"{layers: [{id: 1234, requestType: "ImageryMaps"}]}"#;
        let defs = parse_server_definitions(text).unwrap();
        let err = ResolvedState::resolve(&defs, 1234).unwrap_err();
        assert!(err
            .to_string()
            .contains("Could not find a version in channel"));
    }

    #[test]
    fn test_metadata_url() {
        assert_eq!(
            metadata_url("http://example.invalid", "/default_map", None),
            "http://example.invalid/default_map/query?request=Json&vars=geeServerDefs&is2d=t"
        );

        let proxy = DefaultProxy::new("/proxy/");
        let proxied = metadata_url("http://example.invalid", "", Some(&proxy));
        assert_eq!(
            proxied,
            proxy.get_url("http://example.invalid/query?request=Json&vars=geeServerDefs&is2d=t")
        );
    }

    #[tokio::test]
    async fn test_resolver_reports_url_on_failure() {
        let client = MockAsyncHttpClient::with_response(Err(ProviderError::HttpError(
            "connection refused".into(),
        )));
        let url = metadata_url("invalid.localhost", "/default_map", None);
        let resolver = MetadataResolver::new(client, url.clone(), 1234);

        let err = resolver.resolve().await.unwrap_err();
        assert!(err.to_string().contains("invalid.localhost"));
        assert!(matches!(err, MetadataError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_resolver_resolves_malformed_document() {
        let client = MockAsyncHttpClient::with_response(Ok(MALFORMED.as_bytes().to_vec()));
        let resolver = MetadataResolver::new(client.clone(), "http://x/query", 1007);

        let resolved = resolver.resolve().await.unwrap();
        assert_eq!(resolved.version, 8);
        assert_eq!(resolved.request_type, "VectorMapsRaster");
        assert_eq!(client.requests(), vec!["http://x/query".to_string()]);
    }
}
