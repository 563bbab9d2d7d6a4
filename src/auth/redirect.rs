//! Manual redirect following with cookie accumulation

use crate::network::{HttpResponse, OutboundRequest, ProxyManager};
use crate::session::CookieJar;
use crate::{Error, Result};
use reqwest::Url;
use tracing::debug;

/// Absolute http(s) target of the response's `Location`, if any
pub(crate) fn next_hop(response: &HttpResponse) -> Option<Url> {
    let location = response.location()?;
    if !(location.starts_with("http://") || location.starts_with("https://")) {
        return None;
    }
    Url::parse(location).ok()
}

/// GET `url` and keep following absolute `Location`s
///
/// Cookies from every hop are merged into `jar`. Stops at the first response
/// without an absolute http(s) `Location` and returns it. More than
/// `max_hops` redirects is an upstream error.
pub async fn follow_redirects(
    manager: &ProxyManager,
    jar: &mut CookieJar,
    url: &str,
    max_hops: u32,
) -> Result<HttpResponse> {
    let mut url = Url::parse(url)?;
    let mut hops = 0;

    loop {
        let request = OutboundRequest::get_url(url).with_cookies(jar);
        let response = manager.request(&request).await?;
        jar.absorb(&response);

        let Some(next) = next_hop(&response) else {
            debug!(hops, status = response.status.as_u16(), "Redirect chain finished");
            return Ok(response);
        };

        hops += 1;
        if hops > max_hops {
            return Err(Error::upstream(
                "redirect",
                format!("too many redirects (more than {})", max_hops),
            ));
        }

        debug!(hop = hops, location = %next, "Following redirect");
        url = next;
    }
}
