//! # Session management
//!
//! [`SessionManager`] is the entry point scraped endpoints use to get an
//! authenticated cookie jar. It layers three things over the auth clients:
//!
//! - the session cache, with a validity probe before any cached jar is
//!   handed out (the fast path);
//! - invalidation of stale entries before the full protocol runs;
//! - single-flight per `(system, principal)`: concurrent misses for the
//!   same account wait for the first login and then take the fast path.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use campus_gateway::{Settings, SessionManager};
//! use campus_gateway::types::Principal;
//!
//! # async fn example() -> campus_gateway::Result<()> {
//! let manager = SessionManager::from_settings(&Settings::default()).await?;
//! let jar = manager.login(&Principal::new("2021040501", "password"), false).await?;
//! println!("{} cookies", jar.len());
//! # Ok(())
//! # }
//! ```

use crate::auth::{CasClient, LabBridge, follow_redirects};
use crate::config::{PortalSettings, Settings};
use crate::network::{HttpResponse, OutboundRequest, ProxyManager};
use crate::session::store::{SessionCache, SessionStore, TargetSystem, open_store};
use crate::session::CookieJar;
use crate::types::Principal;
use crate::{Error, Result};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Markers of the lab platform index page
const LAB_MARKERS: [&str; 2] = ["实验教学管理平台", "实践教学管理平台"];

type FlightKey = (TargetSystem, String);

/// Options for [`SessionManager::login_with`]
#[derive(Debug, Clone, Copy)]
pub struct LoginOptions {
    /// Skip the cache fast path
    pub force_refresh: bool,
    /// Also seed academic-system cookies into the jar
    pub cross_system: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            force_refresh: false,
            cross_system: true,
        }
    }
}

type FlightMap = parking_lot::Mutex<HashMap<FlightKey, Arc<tokio::sync::Mutex<()>>>>;

/// Membership in a single-flight group
///
/// Dropping it, on completion or cancellation, removes the map entry once
/// no other caller holds the lock.
struct Flight<'a> {
    flights: &'a FlightMap,
    key: FlightKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock();
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) <= 2 {
            flights.remove(&self.key);
        }
    }
}

/// Login and lab-derivation front door with caching
#[derive(Debug)]
pub struct SessionManager {
    proxy: Arc<ProxyManager>,
    cache: SessionCache,
    cas: CasClient,
    lab: LabBridge,
    portal: PortalSettings,
    max_redirect_hops: u32,
    flights: FlightMap,
}

impl SessionManager {
    /// Assemble a manager from explicit parts
    pub fn new(
        settings: &Settings,
        proxy: Arc<ProxyManager>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let cas = CasClient::new(proxy.clone(), settings.portal.clone(), &settings.session)?;
        let lab = LabBridge::new(proxy.clone(), settings.portal.clone());

        Ok(Self {
            proxy,
            cache: SessionCache::new(store, settings.session.ttl()),
            cas,
            lab,
            portal: settings.portal.clone(),
            max_redirect_hops: settings.session.max_redirect_hops,
            flights: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Build the proxy manager and session store described by `settings`
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let proxy = Arc::new(ProxyManager::from_settings(settings)?);
        let store = open_store(settings).await?;
        Self::new(settings, proxy, store)
    }

    /// Shared proxy manager, also driven by the keep-alive watchdog
    pub fn proxy(&self) -> &Arc<ProxyManager> {
        &self.proxy
    }

    /// Primary-system jar for `principal`, academic cookies included
    pub async fn login(&self, principal: &Principal, force_refresh: bool) -> Result<CookieJar> {
        self.login_with(
            principal,
            LoginOptions {
                force_refresh,
                ..LoginOptions::default()
            },
        )
        .await
    }

    /// Primary-system jar with explicit options
    pub async fn login_with(&self, principal: &Principal, options: LoginOptions) -> Result<CookieJar> {
        principal.validate()?;

        let flight = self.flight(TargetSystem::Primary, &principal.id);
        let _guard = flight.lock.lock().await;
        self.login_locked(principal, options).await
    }

    async fn login_locked(&self, principal: &Principal, options: LoginOptions) -> Result<CookieJar> {
        if !options.force_refresh
            && let Some(jar) = self.primary_fast_path(principal, options.cross_system).await?
        {
            return Ok(jar);
        }

        let jar = self.cas.authenticate(principal, options.cross_system).await?;
        self.cache
            .store(TargetSystem::Primary, &principal.id, &jar)
            .await?;
        Ok(jar)
    }

    /// Revalidated cached jar, or `None` after invalidating a stale one
    async fn primary_fast_path(
        &self,
        principal: &Principal,
        cross_system: bool,
    ) -> Result<Option<CookieJar>> {
        let Some(mut jar) = self.cache.load(TargetSystem::Primary, &principal.id).await? else {
            return Ok(None);
        };

        let valid = match self.cas.validate_session(&mut jar, cross_system).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(principal = %principal.id, "Cached session probe failed: {}", e);
                false
            }
        };

        if valid {
            self.cache
                .store(TargetSystem::Primary, &principal.id, &jar)
                .await?;
            debug!(principal = %principal.id, "Served cached portal session");
            return Ok(Some(jar));
        }

        self.cache
            .invalidate(TargetSystem::Primary, &principal.id)
            .await?;
        info!(principal = %principal.id, "Cached portal session expired, logging in again");
        Ok(None)
    }

    /// Lab-platform jar for `principal`
    pub async fn lab_login(&self, principal: &Principal) -> Result<CookieJar> {
        principal.validate()?;

        let flight = self.flight(TargetSystem::Lab, &principal.id);
        let _guard = flight.lock.lock().await;
        self.lab_login_locked(principal).await
    }

    async fn lab_login_locked(&self, principal: &Principal) -> Result<CookieJar> {
        if let Some(jar) = self.lab_fast_path(principal).await? {
            return Ok(jar);
        }

        let primary = self.login(principal, false).await?;
        let jar = self
            .derive_lab_cookies(&primary)
            .await?
            .ok_or_else(|| Error::derivation("lab hand-off did not complete"))?;

        self.cache.store(TargetSystem::Lab, &principal.id, &jar).await?;
        Ok(jar)
    }

    async fn lab_fast_path(&self, principal: &Principal) -> Result<Option<CookieJar>> {
        let Some(mut jar) = self.cache.load(TargetSystem::Lab, &principal.id).await? else {
            return Ok(None);
        };

        let probe = match OutboundRequest::get(&self.portal.lab_probe_url) {
            Ok(request) => self.proxy.request(&request.with_cookies(&jar)).await,
            Err(e) => Err(e),
        };

        match probe {
            Ok(response) if Self::is_lab_index(&response) => {
                jar.absorb(&response);
                self.cache.store(TargetSystem::Lab, &principal.id, &jar).await?;
                debug!(principal = %principal.id, "Served cached lab session");
                return Ok(Some(jar));
            }
            Ok(response) => {
                debug!(
                    principal = %principal.id,
                    status = response.status.as_u16(),
                    "Cached lab session rejected"
                );
            }
            Err(e) => warn!(principal = %principal.id, "Cached lab session probe failed: {}", e),
        }

        self.cache.invalidate(TargetSystem::Lab, &principal.id).await?;
        Ok(None)
    }

    fn is_lab_index(response: &HttpResponse) -> bool {
        if response.status != StatusCode::OK {
            return false;
        }
        let body = response.text();
        LAB_MARKERS.iter().any(|marker| body.contains(marker))
    }

    /// Six-hop lab hand-off from a primary jar, uncached
    pub async fn derive_lab_cookies(&self, primary: &CookieJar) -> Result<Option<CookieJar>> {
        self.lab.derive(primary).await
    }

    /// Redirect-follow primitive bound to this manager's proxy and hop limit
    pub async fn follow_redirects(&self, jar: &mut CookieJar, url: &str) -> Result<HttpResponse> {
        follow_redirects(&self.proxy, jar, url, self.max_redirect_hops).await
    }

    /// Per-key lock shared by every caller currently working on `key`
    fn flight(&self, system: TargetSystem, principal_id: &str) -> Flight<'_> {
        let key = (system, principal_id.to_string());
        let lock = self.flights.lock().entry(key.clone()).or_default().clone();
        Flight {
            flights: &self.flights,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
