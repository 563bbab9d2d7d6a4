//! Proxy selection, rotation and failover
//!
//! Two failover modes share one cursor:
//! - `try_all` walks the whole pool inside a single call and only fails once
//!   every endpoint failed;
//! - `sticky` uses the current endpoint once and leaves advancing to an
//!   external caller (the keep-alive watchdog).

use crate::config::{FailoverMode, ProxySettings, RotationPolicy, Settings};
use crate::error::format_error;
use crate::network::{
    HttpResponse, HttpTransport, OutboundRequest, ProxyEndpoint, ProxyPool, ReqwestTransport,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Routes every outbound request through the egress pool
#[derive(Debug)]
pub struct ProxyManager {
    transport: Arc<dyn HttpTransport>,
    pool: ProxyPool,
    rotation: RotationPolicy,
    failover: FailoverMode,
    retry_delay: Duration,
    /// Index of the current endpoint; serialises concurrent advances
    cursor: Mutex<usize>,
}

impl ProxyManager {
    /// Create a manager over an explicit transport and pool
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        pool: ProxyPool,
        proxy: &ProxySettings,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            pool,
            rotation: proxy.rotation,
            failover: proxy.failover,
            retry_delay,
            cursor: Mutex::new(0),
        }
    }

    /// Build the reqwest transport and pool described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let endpoints = settings.active_proxy_endpoints();
        let transport = ReqwestTransport::new(&settings.network, &endpoints)?;

        if endpoints.is_empty() {
            info!("Proxy pool empty, outbound requests go direct");
        } else {
            info!(
                endpoints = endpoints.len(),
                rotation = ?settings.proxy.rotation,
                failover = ?settings.proxy.failover,
                "Proxy pool loaded"
            );
        }

        Ok(Self::new(
            Arc::new(transport),
            ProxyPool::new(endpoints),
            &settings.proxy,
            settings.network.retry_delay(),
        ))
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn failover(&self) -> FailoverMode {
        self.failover
    }

    /// Current cursor position
    pub fn cursor(&self) -> usize {
        *self.cursor.lock()
    }

    /// Endpoint under the cursor, `None` when going direct
    pub fn current(&self) -> Option<&ProxyEndpoint> {
        if self.pool.is_empty() {
            return None;
        }
        self.pool.get(self.cursor() % self.pool.len())
    }

    /// Move the cursor one position, wrapping at the end of the pool
    pub fn advance(&self) -> Option<&ProxyEndpoint> {
        if self.pool.is_empty() {
            return None;
        }
        let next = {
            let mut cursor = self.cursor.lock();
            *cursor = (*cursor + 1) % self.pool.len();
            *cursor
        };
        let endpoint = self.pool.get(next);
        if let Some(endpoint) = endpoint {
            info!(endpoint = %endpoint, index = next, "Switched egress endpoint");
        }
        endpoint
    }

    /// Issue a GET for `url`
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = OutboundRequest::get(url)?;
        self.request(&request).await
    }

    /// Send `request` according to the failover mode
    pub async fn request(&self, request: &OutboundRequest) -> Result<HttpResponse> {
        if self.pool.is_empty() {
            return self
                .transport
                .execute(None, request)
                .await
                .map_err(|e| Self::into_transport_error(e, 1));
        }

        match self.failover {
            FailoverMode::TryAll => self.request_try_all(request).await,
            FailoverMode::Sticky => self.request_sticky(request).await,
        }
    }

    async fn request_sticky(&self, request: &OutboundRequest) -> Result<HttpResponse> {
        let index = self.cursor() % self.pool.len();
        let endpoint = self
            .pool
            .get(index)
            .ok_or_else(|| Error::internal("proxy cursor out of range"))?;

        self.attempt(endpoint, request)
            .await
            .map_err(|message| Error::transport(format!("{}: {}", endpoint, message), 1))
    }

    async fn request_try_all(&self, request: &OutboundRequest) -> Result<HttpResponse> {
        let order = self.attempt_order();
        let total = order.len();
        let mut last_failure = String::new();

        for (attempt, index) in order.into_iter().enumerate() {
            let Some(endpoint) = self.pool.get(index) else {
                continue;
            };

            match self.attempt(endpoint, request).await {
                Ok(response) => return Ok(response),
                Err(message) => {
                    warn!(
                        endpoint = %endpoint,
                        attempt = attempt + 1,
                        of = total,
                        "Egress attempt failed: {}",
                        message
                    );
                    last_failure = format!("{}: {}", endpoint, message);
                }
            }

            if attempt + 1 < total {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(Error::transport(last_failure, total))
    }

    /// Every pool index exactly once, starting from the rotation choice
    fn attempt_order(&self) -> Vec<usize> {
        let len = self.pool.len();
        match self.rotation {
            RotationPolicy::RoundRobin => {
                let start = {
                    let mut cursor = self.cursor.lock();
                    let start = *cursor % len;
                    *cursor = (start + 1) % len;
                    start
                };
                (0..len).map(|offset| (start + offset) % len).collect()
            }
            RotationPolicy::Random => {
                let mut order: Vec<usize> = (0..len).collect();
                order.shuffle(&mut rand::thread_rng());
                order
            }
        }
    }

    /// One attempt through one endpoint; `Err` carries the failure description
    async fn attempt(
        &self,
        endpoint: &ProxyEndpoint,
        request: &OutboundRequest,
    ) -> std::result::Result<HttpResponse, String> {
        match self.transport.execute(Some(endpoint), request).await {
            Ok(response) if response.status.is_client_error() || response.status.is_server_error() => {
                Err(format!("HTTP status {}", response.status))
            }
            Ok(response) => {
                debug!(endpoint = %endpoint, status = response.status.as_u16(), "Egress attempt succeeded");
                Ok(response)
            }
            Err(e) => Err(format_error(&e)),
        }
    }

    fn into_transport_error(error: Error, attempts: usize) -> Error {
        match error {
            Error::Http(e) => Error::transport(e.to_string(), attempts),
            other => other,
        }
    }
}
