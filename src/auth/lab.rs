//! Lab-system cookie derivation
//!
//! The lab platform trusts the central SSO through a ticket hand-off. Six
//! fixed hops turn a primary jar into the two cookies the lab platform
//! checks, `JSESSIONID` and `aexpsid`. Tickets are single-use, so nothing
//! here retries.

use crate::config::PortalSettings;
use crate::network::{HttpResponse, OutboundRequest, ProxyManager};
use crate::session::CookieJar;
use crate::Result;
use reqwest::Url;
use reqwest::header::REFERER;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SESSION_COOKIE: &str = "JSESSIONID";
const LAB_COOKIE: &str = "aexpsid";

/// Ticket-exchange client for the lab platform
#[derive(Debug)]
pub struct LabBridge {
    proxy: Arc<ProxyManager>,
    portal: PortalSettings,
}

impl LabBridge {
    pub fn new(proxy: Arc<ProxyManager>, portal: PortalSettings) -> Self {
        Self { proxy, portal }
    }

    /// Mint lab cookies from a logged-in primary jar
    ///
    /// Returns `Ok(None)` when one of the first four hops does not answer
    /// with a 302 and a `Location`; transport failures are returned as
    /// errors.
    pub async fn derive(&self, primary: &CookieJar) -> Result<Option<CookieJar>> {
        // 1. Lab SSO entry redirects to the central CAS
        let entry = self
            .get(OutboundRequest::get(&self.portal.lab_service_url)?)
            .await?;
        let Some(cas_url) = Self::expect_redirect(1, &entry) else {
            return Ok(None);
        };

        // 2. CAS recognises the primary session and issues a ticket
        let cas = self
            .get(OutboundRequest::get_url(cas_url).with_cookies(primary))
            .await?;
        let Some(ticket_url) = Self::expect_redirect(2, &cas) else {
            return Ok(None);
        };

        // 3. Ticket validation opens the lab session
        let ticket = self.get(OutboundRequest::get_url(ticket_url)).await?;
        let Some(session_url) = Self::expect_redirect(3, &ticket) else {
            return Ok(None);
        };
        let mut lab = CookieJar::from_response(&ticket);
        let Some(session_id) = lab.get(SESSION_COOKIE).map(str::to_string) else {
            warn!(step = 3, "Lab ticket hop did not set {}", SESSION_COOKIE);
            return Ok(None);
        };

        // 4. Session hop sets the lab platform cookie
        let session = self
            .get(OutboundRequest::get_url(session_url).with_cookies(&lab))
            .await?;
        let Some(home_url) = Self::expect_redirect(4, &session) else {
            return Ok(None);
        };
        lab.absorb(&session);
        let mut lab_id = lab.get(LAB_COOKIE).map(str::to_string);

        // 5. Student home
        let home = self
            .get(OutboundRequest::get_url(home_url).with_cookies(&lab))
            .await?;
        lab.absorb(&home);
        if lab_id.is_none() {
            lab_id = lab.get(LAB_COOKIE).map(str::to_string);
        }

        // 6. Menu, then platform index with the menu as referer
        let menu = self
            .get(OutboundRequest::get(&self.portal.lab_menu_url)?.with_cookies(&lab))
            .await?;
        lab.absorb(&menu);
        let platform = self
            .get(
                OutboundRequest::get(&self.portal.lab_platform_url)?
                    .with_cookies(&lab)
                    .with_header(REFERER.as_str(), self.portal.lab_menu_url.as_str()),
            )
            .await?;
        lab.absorb(&platform);

        let jar = self.finalize(lab, &session_id, lab_id.as_deref());
        info!(cookies = jar.len(), "Lab cookies derived");
        Ok(Some(jar))
    }

    /// Keep only the lab session cookies, backfilling values seen earlier
    fn finalize(&self, mut lab: CookieJar, session_id: &str, lab_id: Option<&str>) -> CookieJar {
        lab.retain(|c| c.name == SESSION_COOKIE || c.name == LAB_COOKIE);

        if !lab.contains(SESSION_COOKIE) {
            lab.set(SESSION_COOKIE, session_id, &self.portal.lab_host, "/");
        }
        if !lab.contains(LAB_COOKIE)
            && let Some(lab_id) = lab_id
        {
            lab.set(LAB_COOKIE, lab_id, &self.portal.lab_host, "/");
        }

        lab
    }

    async fn get(&self, request: OutboundRequest) -> Result<HttpResponse> {
        debug!(url = %request.url, "Lab hand-off hop");
        self.proxy.request(&request).await
    }

    fn expect_redirect(step: u8, response: &HttpResponse) -> Option<Url> {
        if !response.is_found_redirect() {
            warn!(
                step,
                status = response.status.as_u16(),
                "Lab hand-off stopped: expected a 302 with Location"
            );
            return None;
        }
        let next = response.resolved_location();
        if next.is_none() {
            warn!(step, "Lab hand-off stopped: unusable Location");
        }
        next
    }
}
