//! Outbound HTTP transport
//!
//! Requests never follow redirects and never keep cookies on the client:
//! every hop is explicit and cookies live in [`CookieJar`]s owned by the
//! caller.

use crate::config::NetworkSettings;
use crate::network::ProxyEndpoint;
use crate::session::CookieJar;
use crate::utils::decode_text;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, LOCATION, SET_COOKIE};
use reqwest::{Client, Method, Proxy, StatusCode, Url, redirect};
use std::collections::HashMap;
use tracing::debug;

/// A single outbound request, independent of the client that sends it
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl OutboundRequest {
    /// GET request for `url`
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::get_url(Url::parse(url)?))
    }

    pub fn get_url(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST of an `application/x-www-form-urlencoded` body
    pub fn post_form(url: &str, fields: &[(&str, &str)]) -> Result<Self> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        Ok(Self {
            method: Method::POST,
            url: Url::parse(url)?,
            headers: vec![(
                CONTENT_TYPE.as_str().to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        })
    }

    /// Add header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attach the cookies of `jar` that apply to this request's URL
    pub fn with_cookies(self, jar: &CookieJar) -> Self {
        match jar.header_for(&self.url) {
            Some(value) => self.with_header(COOKIE.as_str(), value),
            None => self,
        }
    }
}

/// Fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL that produced this response
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Raw `Location` header
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// `Location` resolved against the request URL
    pub fn resolved_location(&self) -> Option<Url> {
        self.location().and_then(|loc| self.url.join(loc).ok())
    }

    /// True for a 302 carrying a `Location`
    pub fn is_found_redirect(&self) -> bool {
        self.status == StatusCode::FOUND && self.location().is_some()
    }

    /// Every `Set-Cookie` header value
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Body decoded with the portal charset fallbacks
    pub fn text(&self) -> String {
        decode_text(&self.body)
    }
}

/// Sends one request through one egress path
///
/// `endpoint` is `None` for a direct connection.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn execute(
        &self,
        endpoint: Option<&ProxyEndpoint>,
        request: &OutboundRequest,
    ) -> Result<HttpResponse>;
}

/// reqwest-backed transport with one client per egress path
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    direct: Client,
    proxied: HashMap<String, Client>,
}

impl ReqwestTransport {
    /// Build clients for a direct path plus every endpoint
    pub fn new(network: &NetworkSettings, endpoints: &[ProxyEndpoint]) -> Result<Self> {
        let direct = Self::build_client(network, None)?;

        let mut proxied = HashMap::new();
        for endpoint in endpoints {
            let client = Self::build_client(network, Some(endpoint))?;
            proxied.insert(endpoint.proxy_url(), client);
        }

        Ok(Self { direct, proxied })
    }

    fn build_client(network: &NetworkSettings, endpoint: Option<&ProxyEndpoint>) -> Result<Client> {
        let mut client_builder = Client::builder()
            .user_agent(network.user_agent.as_str())
            .timeout(network.request_timeout)
            .redirect(redirect::Policy::none());

        if let Some(endpoint) = endpoint {
            let proxy = Proxy::all(endpoint.proxy_url()).map_err(|e| {
                crate::Error::proxy(endpoint.to_string(), format!("Invalid proxy URL: {}", e))
            })?;
            client_builder = client_builder.proxy(proxy);
        } else {
            client_builder = client_builder.no_proxy();
        }

        if network.disable_tls_verification {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        client_builder.build().map_err(|e| {
            crate::Error::proxy(
                "client_builder".to_string(),
                format!("Failed to create HTTP client: {}", e),
            )
        })
    }

    fn client_for(&self, endpoint: Option<&ProxyEndpoint>) -> Result<&Client> {
        match endpoint {
            None => Ok(&self.direct),
            Some(endpoint) => self.proxied.get(&endpoint.proxy_url()).ok_or_else(|| {
                Error::proxy(
                    endpoint.to_string(),
                    "Endpoint is not part of the configured pool".to_string(),
                )
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        endpoint: Option<&ProxyEndpoint>,
        request: &OutboundRequest,
    ) -> Result<HttpResponse> {
        let client = self.client_for(endpoint)?;

        let mut builder = client.request(request.method.clone(), request.url.clone());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            via = endpoint.map(|e| e.to_string()).unwrap_or_else(|| "direct".to_string()),
            "Outbound request completed"
        );

        Ok(HttpResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
