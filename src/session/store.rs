//! Session cache
//!
//! Cookie jars are stored as JSON strings under `"cookie" + id` for the
//! primary system and `"experiment" + id` for the lab system, each with a
//! TTL. Stores only promise single-key atomicity.

use crate::config::{CacheBackend, Settings};
use crate::session::CookieJar;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key/value store with per-key expiry
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: evict lazily
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::cache("set_ex", format!("TTL out of range: {}", e)))?;
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        // Sweep accounts that never came back for their entry
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Redis-backed store shared between gateway instances
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url` (`redis://[user:pass@]host:port/db`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection_manager = ConnectionManager::new(client).await?;
        info!("Connected to redis session store");
        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Build the store selected by `cache.backend`
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn SessionStore>> {
    match settings.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        CacheBackend::Redis => {
            let url = settings.cache.redis_url.as_deref().ok_or_else(|| {
                Error::config("cache.redis_url", "The redis backend needs a connection URL")
            })?;
            Ok(Arc::new(RedisStore::connect(url).await?))
        }
    }
}

/// Which system a cached jar authenticates against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSystem {
    /// Central SSO plus the academic system
    Primary,
    /// Lab-experiment platform
    Lab,
}

impl TargetSystem {
    pub fn key_prefix(&self) -> &'static str {
        match self {
            TargetSystem::Primary => "cookie",
            TargetSystem::Lab => "experiment",
        }
    }

    /// Store key for `principal_id`
    pub fn cache_key(&self, principal_id: &str) -> String {
        format!("{}{}", self.key_prefix(), principal_id)
    }
}

/// Typed jar cache over a [`SessionStore`]
#[derive(Debug, Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached jar, if any
    ///
    /// An entry that no longer deserializes is deleted and reported as a miss.
    pub async fn load(&self, system: TargetSystem, principal_id: &str) -> Result<Option<CookieJar>> {
        let key = system.cache_key(principal_id);
        let Some(raw) = self.store.get(&key).await? else {
            debug!(key = %key, "Session cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<CookieJar>(&raw) {
            Ok(jar) => {
                debug!(key = %key, cookies = jar.len(), "Session cache hit");
                Ok(Some(jar))
            }
            Err(e) => {
                warn!(key = %key, "Discarding unreadable cached jar: {}", e);
                self.store.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// Write `jar` with the full TTL, replacing any previous entry
    pub async fn store(&self, system: TargetSystem, principal_id: &str, jar: &CookieJar) -> Result<()> {
        let key = system.cache_key(principal_id);
        let raw = serde_json::to_string(jar)?;
        self.store.set_ex(&key, &raw, self.ttl).await?;
        debug!(key = %key, cookies = jar.len(), ttl_secs = self.ttl.as_secs(), "Session cached");
        Ok(())
    }

    pub async fn invalidate(&self, system: TargetSystem, principal_id: &str) -> Result<()> {
        let key = system.cache_key(principal_id);
        self.store.delete(&key).await?;
        debug!(key = %key, "Session invalidated");
        Ok(())
    }
}
