//! Egress proxy endpoints
//!
//! The pool is fixed once loaded; only the manager's cursor moves.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy protocol spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Socks5,
    #[default]
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Socks5 => "socks5",
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured egress relay
///
/// Configured as `{ url = "host:port", type = "socks5", username, password }`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    /// `host:port` of the relay
    pub url: String,
    /// Protocol spoken by the relay
    #[serde(rename = "type", default)]
    pub scheme: ProxyScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Endpoint without credentials
    pub fn new(url: impl Into<String>, scheme: ProxyScheme) -> Self {
        Self {
            url: url.into(),
            scheme,
            username: None,
            password: None,
        }
    }

    /// Attach credentials embedded into the proxy URL
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Full proxy URL handed to the HTTP client, credentials included
    pub fn proxy_url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("{}://{}:{}@{}", self.scheme, user, pass, self.url)
            }
            (Some(user), None) => format!("{}://{}@{}", self.scheme, user, self.url),
            _ => format!("{}://{}", self.scheme, self.url),
        }
    }
}

// Credentials stay out of logs
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.url)
    }
}

impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("url", &self.url)
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Ordered, immutable list of egress endpoints
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// An empty pool means requests go out directly
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ProxyEndpoint> {
        self.endpoints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyEndpoint> {
        self.endpoints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url_without_credentials() {
        let endpoint = ProxyEndpoint::new("127.0.0.1:1080", ProxyScheme::Socks5);
        assert_eq!(endpoint.proxy_url(), "socks5://127.0.0.1:1080");
    }

    #[test]
    fn test_proxy_url_with_credentials() {
        let endpoint =
            ProxyEndpoint::new("relay.example.com:8443", ProxyScheme::Https).with_credentials("u", "p");
        assert_eq!(endpoint.proxy_url(), "https://u:p@relay.example.com:8443");
    }

    #[test]
    fn test_display_hides_credentials() {
        let endpoint =
            ProxyEndpoint::new("10.0.0.2:3128", ProxyScheme::Http).with_credentials("user", "hunter2");
        assert_eq!(endpoint.to_string(), "http://10.0.0.2:3128");
        assert!(!format!("{:?}", endpoint).contains("hunter2"));
    }

    #[test]
    fn test_scheme_deserialization() {
        let endpoint: ProxyEndpoint =
            serde_json::from_str(r#"{"url": "10.0.0.1:1080", "type": "socks5"}"#).unwrap();
        assert_eq!(endpoint.scheme, ProxyScheme::Socks5);

        let endpoint: ProxyEndpoint = serde_json::from_str(r#"{"url": "10.0.0.1:80"}"#).unwrap();
        assert_eq!(endpoint.scheme, ProxyScheme::Http);
    }

    #[test]
    fn test_pool_accessors() {
        let pool = ProxyPool::new(vec![
            ProxyEndpoint::new("a:1", ProxyScheme::Http),
            ProxyEndpoint::new("b:2", ProxyScheme::Http),
        ]);
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_empty());
        assert_eq!(pool.get(1).map(|e| e.url.as_str()), Some("b:2"));
        assert!(pool.get(2).is_none());
        assert!(ProxyPool::default().is_empty());
    }
}
