//! Periodic egress probe
//!
//! Every tick GETs an academic-system URL through the proxy manager without
//! following redirects. A 302 means the egress path works. A transport
//! failure marks egress down and moves the proxy cursor so the next tick
//! uses another endpoint. Inside the quiet window only the warning is
//! skipped; state changes and the advance still happen.

use crate::config::Settings;
use crate::network::{OutboundRequest, ProxyManager};
use crate::watchdog::ConnectivityState;
use crate::{Error, Result};
use chrono::{Local, NaiveTime};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Local-time span in which failure warnings are not logged
///
/// `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` bounds
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
                Error::config(
                    format!("watchdog.{}", field),
                    format!("expected HH:MM, got '{}': {}", value, e),
                )
            })
        };
        Ok(Self::new(parse("quiet_start", start)?, parse("quiet_end", end)?))
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The probe got its 302
    Healthy,
    /// The request went through but answered something else
    Unexpected(StatusCode),
    /// Transport failure; `logged` is false inside the quiet window
    Unhealthy { logged: bool },
}

/// Keep-alive watchdog bound to one proxy manager
#[derive(Debug, Clone)]
pub struct KeepAlive {
    proxy: Arc<ProxyManager>,
    state: Arc<ConnectivityState>,
    probe_url: String,
    interval: Duration,
    quiet: QuietWindow,
}

impl KeepAlive {
    pub fn new(
        proxy: Arc<ProxyManager>,
        state: Arc<ConnectivityState>,
        probe_url: impl Into<String>,
        interval: Duration,
        quiet: QuietWindow,
    ) -> Self {
        Self {
            proxy,
            state,
            probe_url: probe_url.into(),
            interval,
            quiet,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        proxy: Arc<ProxyManager>,
        state: Arc<ConnectivityState>,
    ) -> Result<Self> {
        Ok(Self::new(
            proxy,
            state,
            settings.watchdog.probe_url.clone(),
            settings.watchdog.interval,
            settings.watchdog.quiet_window()?,
        ))
    }

    pub fn state(&self) -> &Arc<ConnectivityState> {
        &self.state
    }

    /// Probe once using the current local time
    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(Local::now().time()).await
    }

    /// Probe once as if the local time were `now`
    pub async fn tick_at(&self, now: NaiveTime) -> TickOutcome {
        let probe = match OutboundRequest::get(&self.probe_url) {
            Ok(request) => self.proxy.request(&request).await,
            Err(e) => Err(e),
        };

        match probe {
            Ok(response) if response.status == StatusCode::FOUND => {
                if !self.state.is_ok() {
                    info!("Egress recovered");
                }
                self.state.record_success();
                debug!("Keep-alive probe healthy");
                TickOutcome::Healthy
            }
            Ok(response) => {
                debug!(
                    status = response.status.as_u16(),
                    "Keep-alive probe answered without redirect"
                );
                TickOutcome::Unexpected(response.status)
            }
            Err(e) => {
                let failures = self.state.record_failure();
                let next = self.proxy.advance();
                let logged = !self.quiet.contains(now);
                if logged {
                    warn!(
                        consecutive_failures = failures,
                        next_endpoint = next.map(|e| e.to_string()).unwrap_or_else(|| "direct".to_string()),
                        "Keep-alive probe failed: {}",
                        e
                    );
                }
                TickOutcome::Unhealthy { logged }
            }
        }
    }

    /// Run forever on the configured interval; the first tick is immediate
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                url = %self.probe_url,
                "Keep-alive watchdog started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
