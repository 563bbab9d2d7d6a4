//! Cookie jars
//!
//! A jar is an ordered list of `(name, value, domain, path)` cookies. Merging
//! replaces an existing cookie with the same name and domain in place, so the
//! original ordering survives refreshes.

use crate::network::HttpResponse;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// One stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host the cookie belongs to, without a leading dot
    pub domain: String,
    pub path: String,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
        }
    }

    /// Whether this cookie should be sent to `url`
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain_ok = host.eq_ignore_ascii_case(&self.domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", self.domain.to_ascii_lowercase()));
        domain_ok && url.path().starts_with(&self.path)
    }
}

/// Outcome of parsing one `Set-Cookie` header
enum SetCookie {
    Store(Cookie),
    /// `Max-Age=0` or a past expiry: drop the named cookie
    Remove { name: String, domain: String },
}

/// Session cookies for one target system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Insert or overwrite by name and domain
    pub fn insert(&mut self, cookie: Cookie) {
        match self
            .cookies
            .iter_mut()
            .find(|c| c.name == cookie.name && c.domain.eq_ignore_ascii_case(&cookie.domain))
        {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn set(&mut self, name: &str, value: &str, domain: &str, path: &str) {
        self.insert(Cookie::new(name, value, domain, path));
    }

    /// Merge `other` into this jar; its values win
    pub fn merge(&mut self, other: &CookieJar) {
        for cookie in &other.cookies {
            self.insert(cookie.clone());
        }
    }

    /// Value of the first cookie called `name`, whatever its domain
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str, domain: &str) {
        self.cookies
            .retain(|c| !(c.name == name && c.domain.eq_ignore_ascii_case(domain)));
    }

    pub fn retain<F: FnMut(&Cookie) -> bool>(&mut self, f: F) {
        self.cookies.retain(f);
    }

    /// `Cookie` header value for a request to `url`
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Merge every `Set-Cookie` of `response`; returns how many were applied
    pub fn absorb(&mut self, response: &HttpResponse) -> usize {
        let default_domain = response.url.host_str().unwrap_or_default().to_string();
        let mut applied = 0;

        for header in response.set_cookies() {
            match parse_set_cookie(header, &default_domain) {
                Some(SetCookie::Store(cookie)) => {
                    self.insert(cookie);
                    applied += 1;
                }
                Some(SetCookie::Remove { name, domain }) => {
                    self.remove(&name, &domain);
                    applied += 1;
                }
                None => {}
            }
        }

        applied
    }

    /// Cookies carried by `response` alone
    pub fn from_response(response: &HttpResponse) -> Self {
        let mut jar = Self::new();
        jar.absorb(response);
        jar
    }
}

fn parse_set_cookie(header: &str, default_domain: &str) -> Option<SetCookie> {
    let parsed = cookie::Cookie::parse(header).ok()?;
    let name = parsed.name().trim();
    if name.is_empty() {
        return None;
    }

    let domain = parsed
        .domain()
        .map(|d| d.trim_start_matches('.'))
        .filter(|d| !d.is_empty())
        .unwrap_or(default_domain)
        .to_string();
    let path = parsed
        .path()
        .filter(|p| p.starts_with('/'))
        .unwrap_or("/")
        .to_string();

    // Max-Age takes precedence over Expires (RFC 6265 5.3)
    let expired = match parsed.max_age() {
        Some(max_age) => max_age.whole_seconds() <= 0,
        None => parsed
            .expires_datetime()
            .is_some_and(|at| at < cookie::time::OffsetDateTime::now_utc()),
    };

    if expired {
        Some(SetCookie::Remove {
            name: name.to_string(),
            domain,
        })
    } else {
        Some(SetCookie::Store(Cookie::new(
            name,
            parsed.value().trim_matches('"'),
            domain,
            path,
        )))
    }
}
