//! CAS login state machine
//!
//! Drives the portal's hand-rolled CAS flow: fetch the login form, scrape
//! the one-time `execution` token, encrypt the password with the portal's
//! public key, submit without following redirects, then classify where the
//! portal sent us.

use crate::auth::credential::{CredentialEncoder, PublicKeyMaterial};
use crate::auth::redirect::follow_redirects;
use crate::config::{PortalSettings, SessionSettings};
use crate::error::AuthFailure;
use crate::network::{HttpResponse, OutboundRequest, ProxyManager};
use crate::session::CookieJar;
use crate::types::Principal;
use crate::{Error, Result};
use regex::Regex;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Only present on pages served to an authenticated portal session
pub const AUTHENTICATED_MARKER: &str = "自定义门户";
/// Title of the academic system landing page
pub const ACADEMIC_MARKER: &str = "教学管理信息服务平台";
/// The login page shows this while the portal is unreachable
const MAINTENANCE_MARKER: &str = "Loading...";

const EXECUTION_PATTERN: &str = r#"name="execution" value="(.*?)""#;

/// Map a post-login page onto the rejection it reports, if any
///
/// Markers are checked in priority order; the generic CAS title only
/// counts when nothing more specific matched.
pub fn classify_login_page(body: &str) -> Option<AuthFailure> {
    const MARKERS: [(&str, AuthFailure); 4] = [
        ("用户名或密码错误", AuthFailure::BadCredentials),
        ("完成，进入门户", AuthFailure::PhoneNotBound),
        ("当前账号无权登录", AuthFailure::Unauthorized),
        ("统一身份认证", AuthFailure::Unknown),
    ];

    MARKERS
        .iter()
        .find(|(marker, _)| body.contains(marker))
        .map(|(_, failure)| *failure)
}

/// Client for the central SSO
#[derive(Debug)]
pub struct CasClient {
    proxy: Arc<ProxyManager>,
    portal: PortalSettings,
    max_attempts: u32,
    max_hops: u32,
    execution_pattern: Regex,
}

impl CasClient {
    pub fn new(
        proxy: Arc<ProxyManager>,
        portal: PortalSettings,
        session: &SessionSettings,
    ) -> Result<Self> {
        let execution_pattern = Regex::new(EXECUTION_PATTERN)
            .map_err(|e| Error::internal(format!("invalid execution pattern: {}", e)))?;

        Ok(Self {
            proxy,
            portal,
            max_attempts: session.max_login_attempts,
            max_hops: session.max_redirect_hops,
            execution_pattern,
        })
    }

    /// Probe whether a cached jar is still logged in
    ///
    /// Cookies returned by the probes are merged into `jar`. With
    /// `cross_system`, the academic system must also accept the jar.
    pub async fn validate_session(&self, jar: &mut CookieJar, cross_system: bool) -> Result<bool> {
        let request = OutboundRequest::get(&self.portal.login_test_url)?.with_cookies(jar);
        let response = self.proxy.request(&request).await?;

        if response.status != StatusCode::OK || !response.text().contains(AUTHENTICATED_MARKER) {
            debug!(status = response.status.as_u16(), "Cached portal session rejected");
            return Ok(false);
        }
        jar.absorb(&response);

        if cross_system {
            let response =
                follow_redirects(&self.proxy, jar, &self.portal.academic_url, self.max_hops)
                    .await?;
            if response.status != StatusCode::OK || !response.text().contains(ACADEMIC_MARKER) {
                debug!(
                    status = response.status.as_u16(),
                    "Cached academic session rejected"
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Run the full login protocol and return the resulting jar
    pub async fn authenticate(&self, principal: &Principal, cross_system: bool) -> Result<CookieJar> {
        let (response, jar) = self.submit_with_recovery(principal).await?;
        let jar = self.complete(response, jar).await?;
        let jar = if cross_system {
            self.seed_academic(jar).await?
        } else {
            jar
        };

        info!(principal = %principal.id, cookies = jar.len(), "CAS login succeeded");
        Ok(jar)
    }

    /// Repeat the protocol while the portal reports a flow decoding error
    async fn submit_with_recovery(&self, principal: &Principal) -> Result<(HttpResponse, CookieJar)> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.attempt_login(principal).await {
                Ok((response, jar)) if self.is_decoding_error(&response) => {
                    warn!(
                        principal = %principal.id,
                        attempt,
                        "Portal failed to decode the login flow, resubmitting"
                    );
                    last_error = Some(Error::upstream(
                        "login_submit",
                        "portal failed to decode the flow execution",
                    ));
                }
                Ok(result) => return Ok(result),
                Err(e) if Self::is_recoverable(&e) => {
                    warn!(
                        principal = %principal.id,
                        attempt,
                        "Login attempt failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("no login attempt was made")))
    }

    /// Steps a to d: login page, execution token, public key, form POST
    async fn attempt_login(&self, principal: &Principal) -> Result<(HttpResponse, CookieJar)> {
        let page = self
            .proxy
            .request(&OutboundRequest::get(&self.portal.login_url)?)
            .await?;
        if !page.status.is_success() {
            return Err(Error::upstream(
                "login_page",
                format!("unexpected status {}", page.status),
            ));
        }

        let mut jar = CookieJar::from_response(&page);
        let content = page.text();
        if content.contains(MAINTENANCE_MARKER) {
            return Err(Error::upstream("login_page", "portal is in maintenance"));
        }
        let execution = self.extract_execution(&content)?;

        let encoder = self.fetch_public_key(&mut jar).await?;
        let password = encoder.encrypt_password(principal.secret.expose())?;

        let form = OutboundRequest::post_form(
            &self.portal.login_url,
            &[
                ("authcode", ""),
                ("_eventId", "submit"),
                ("execution", execution.as_str()),
                ("username", principal.id.as_str()),
                ("password", password.as_str()),
            ],
        )?
        .with_cookies(&jar);

        let response = self.proxy.request(&form).await?;
        debug!(
            status = response.status.as_u16(),
            location = response.location().unwrap_or_default(),
            "Login form submitted"
        );
        Ok((response, jar))
    }

    /// One-time `execution` token embedded in the login form
    pub fn extract_execution(&self, page: &str) -> Result<String> {
        self.execution_pattern
            .captures(page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::upstream("login_page", "execution token missing"))
    }

    async fn fetch_public_key(&self, jar: &mut CookieJar) -> Result<CredentialEncoder> {
        let request = OutboundRequest::get(&self.portal.public_key_url)?.with_cookies(jar);
        let response = self.proxy.request(&request).await?;
        jar.absorb(&response);

        let material: PublicKeyMaterial = serde_json::from_slice(&response.body)
            .map_err(|e| Error::upstream("public_key", format!("malformed key response: {}", e)))?;
        CredentialEncoder::from_material(&material)
    }

    /// Classify the submit response and finish the redirect chain
    async fn complete(&self, response: HttpResponse, mut jar: CookieJar) -> Result<CookieJar> {
        if response.status == StatusCode::FOUND
            && response
                .location()
                .is_some_and(|loc| loc.contains(&self.portal.password_change_url))
        {
            return Err(Error::PasswordExpired);
        }
        jar.absorb(&response);

        let terminal = match response.resolved_location() {
            Some(next) if response.status == StatusCode::FOUND => {
                follow_redirects(&self.proxy, &mut jar, next.as_str(), self.max_hops).await?
            }
            _ => response,
        };

        if let Some(failure) = classify_login_page(&terminal.text()) {
            return Err(Error::auth(failure));
        }

        Ok(jar)
    }

    /// Traverse the academic entry URL so its cookies join the jar
    async fn seed_academic(&self, mut jar: CookieJar) -> Result<CookieJar> {
        let response =
            follow_redirects(&self.proxy, &mut jar, &self.portal.academic_url, self.max_hops)
                .await?;
        debug!(
            status = response.status.as_u16(),
            "Academic system cookies seeded"
        );
        Ok(jar)
    }

    fn is_decoding_error(&self, response: &HttpResponse) -> bool {
        let Some(location) = response.location() else {
            return false;
        };
        if location == self.portal.decoding_error_location {
            return true;
        }

        let expected = Url::parse(&self.portal.login_url)
            .and_then(|base| base.join(&self.portal.decoding_error_location));
        matches!((expected, response.resolved_location()), (Ok(a), Some(b)) if a == b)
    }

    fn is_recoverable(error: &Error) -> bool {
        matches!(
            error,
            Error::Transport { .. } | Error::Upstream { .. } | Error::Http(_) | Error::Json(_)
        )
    }
}
