//! URL rewriting for routing requests through an intermediary server.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped by URI-component encoding.
///
/// Everything except ASCII alphanumerics and `-_.!~*'()`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Rewrites outbound URLs.
///
/// Implementations must be deterministic: the same resource always maps to
/// the same proxied URL.
pub trait Proxy: Send + Sync + fmt::Debug {
    /// Returns the URL to request in place of `resource`.
    fn get_url(&self, resource: &str) -> String;
}

/// Proxy that passes the target URL as the query string of a proxy endpoint.
///
/// `DefaultProxy::new("/proxy/")` turns `http://a/b?c=d` into
/// `/proxy/?http%3A%2F%2Fa%2Fb%3Fc%3Dd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultProxy {
    proxy: String,
}

impl DefaultProxy {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
        }
    }

    /// The proxy endpoint.
    pub fn proxy(&self) -> &str {
        &self.proxy
    }
}

impl Proxy for DefaultProxy {
    fn get_url(&self, resource: &str) -> String {
        format!(
            "{}?{}",
            self.proxy,
            utf8_percent_encode(resource, URI_COMPONENT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_resource_as_query() {
        let proxy = DefaultProxy::new("/proxy/");
        assert_eq!(
            proxy.get_url("http://example.invalid/query?request=ImageryMaps&x=0"),
            "/proxy/?http%3A%2F%2Fexample.invalid%2Fquery%3Frequest%3DImageryMaps%26x%3D0"
        );
    }

    #[test]
    fn test_leaves_unreserved_marks() {
        let proxy = DefaultProxy::new("/p");
        assert_eq!(proxy.get_url("a-b_c.d!e~f*g'h(i)"), "/p?a-b_c.d!e~f*g'h(i)");
        assert_eq!(proxy.get_url("a b"), "/p?a%20b");
    }

    #[test]
    fn test_deterministic() {
        let proxy = DefaultProxy::new("/proxy/");
        let url = "http://example.invalid/default_map/query?x=1";
        assert_eq!(proxy.get_url(url), proxy.get_url(url));
        assert_eq!(proxy.proxy(), "/proxy/");
    }
}
