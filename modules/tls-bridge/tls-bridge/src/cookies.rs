use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tls_bridge_sdk::WireCookie;
use url::Url;

use crate::headers::HeaderMap;

/// A single cookie with its scope and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Empty for cookies created from a plain name/value mapping.
    pub domain: String,
    pub path: String,
    /// Unix timestamp in seconds; `None` is a session cookie.
    pub expires: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    /// A session cookie with no domain and path `/`.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_owned(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain
    }

    /// Wire form for `requestCookies`. The engine rejects `"` in values,
    /// so quotes are stripped.
    #[must_use]
    pub fn to_wire(&self) -> WireCookie {
        WireCookie {
            domain: self.domain.clone(),
            expires: self.expires,
            name: self.name.clone(),
            path: self.path.clone(),
            value: self.value.replace('"', ""),
        }
    }

    /// Parse one `Set-Cookie` header value.
    ///
    /// `default_domain` applies when the header carries no `Domain`
    /// attribute; the path defaults to `/`. `Max-Age` wins over `Expires`.
    #[must_use]
    pub fn parse_set_cookie(header: &str, default_domain: &str, now: i64) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim()).with_domain(default_domain);
        let mut max_age = None;
        let mut expires = None;
        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr.trim(), None),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    if let Some(domain) = val
                        .map(|d| d.trim_start_matches('.'))
                        .filter(|d| !d.is_empty())
                    {
                        cookie.domain = domain.to_ascii_lowercase();
                    }
                }
                "path" => {
                    if let Some(path) = val.filter(|p| p.starts_with('/')) {
                        path.clone_into(&mut cookie.path);
                    }
                }
                "max-age" => max_age = val.and_then(|v| v.parse::<i64>().ok()),
                "expires" => {
                    expires = val.and_then(parse_cookie_date).map(unix_seconds);
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }
        cookie.expires = max_age.map(|age| now.saturating_add(age)).or(expires);
        Some(cookie)
    }
}

/// HTTP dates plus the dashed Netscape form `Thu, 01-Jan-1970 00:00:01 GMT`.
fn parse_cookie_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value)
        .or_else(|_| httpdate::parse_http_date(&value.replace('-', " ")))
        .ok()
}

fn unix_seconds(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

fn now_unix() -> i64 {
    unix_seconds(SystemTime::now())
}

/// Cookie store scoped by name and domain.
///
/// Setting a cookie replaces any cookie with the same name and domain.
/// Merges are functional: they build a new jar and leave their inputs
/// untouched, so per-hop snapshots taken during redirects stay independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar of session cookies with no domain and path `/`.
    #[must_use]
    pub fn from_mapping<I, K, V>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut jar = Self::new();
        for (name, value) in mapping {
            jar.set(Cookie::new(name, value));
        }
        jar
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.cookies.iter()
    }

    /// Value of the first cookie called `name`, whatever its domain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    #[must_use]
    pub fn get_in(&self, name: &str, domain: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|c| c.name == name && c.domain == domain)
    }

    /// Insert or replace by name and domain.
    pub fn set(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Remove every cookie called `name`; returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|c| c.name != name);
        before - self.cookies.len()
    }

    /// A new jar holding `base` overlaid by `overlay`.
    #[must_use]
    pub fn merge(base: &CookieJar, overlay: &CookieJar) -> CookieJar {
        let mut merged = base.clone();
        merged.absorb(overlay);
        merged
    }

    /// Overlay `other` onto this jar. An expired cookie in `other` deletes
    /// the matching cookie here instead of being stored.
    pub fn absorb(&mut self, other: &CookieJar) {
        let now = now_unix();
        for cookie in other.iter() {
            if cookie.is_expired_at(now) {
                self.cookies.retain(|c| !c.same_slot(cookie));
            } else {
                self.set(cookie.clone());
            }
        }
    }

    /// Cookies set by one response.
    ///
    /// Parses every `Set-Cookie` header, then adds the engine's own parsed
    /// `cookies` map for names the headers did not cover. The default
    /// domain is the request's `Host` header if present, else the URL host.
    #[must_use]
    pub fn from_response(
        request_url: &str,
        request_headers: &HeaderMap,
        response_headers: &[(String, Vec<String>)],
        response_cookies: &BTreeMap<String, String>,
    ) -> CookieJar {
        Self::from_response_at(
            request_url,
            request_headers,
            response_headers,
            response_cookies,
            now_unix(),
        )
    }

    fn from_response_at(
        request_url: &str,
        request_headers: &HeaderMap,
        response_headers: &[(String, Vec<String>)],
        response_cookies: &BTreeMap<String, String>,
        now: i64,
    ) -> CookieJar {
        let domain = default_domain(request_url, request_headers);
        let mut jar = CookieJar::new();
        for (name, values) in response_headers {
            if !name.eq_ignore_ascii_case("set-cookie") {
                continue;
            }
            for value in values {
                if let Some(cookie) = Cookie::parse_set_cookie(value, &domain, now) {
                    jar.set(cookie);
                }
            }
        }
        for (name, value) in response_cookies {
            if jar.get(name).is_none() {
                jar.set(Cookie::new(name.as_str(), value.as_str()).with_domain(domain.as_str()));
            }
        }
        jar
    }

    /// `jar` updated with the cookies set by one response.
    #[must_use]
    pub fn extract_from_response(
        request_url: &str,
        request_headers: &HeaderMap,
        jar: &CookieJar,
        response_headers: &[(String, Vec<String>)],
    ) -> CookieJar {
        let set = Self::from_response(request_url, request_headers, response_headers, &BTreeMap::new());
        Self::merge(jar, &set)
    }

    /// Unexpired cookies in wire form.
    #[must_use]
    pub fn to_wire(&self) -> Vec<WireCookie> {
        let now = now_unix();
        self.cookies
            .iter()
            .filter(|c| !c.is_expired_at(now))
            .map(Cookie::to_wire)
            .collect()
    }
}

impl<'a> IntoIterator for &'a CookieJar {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn default_domain(request_url: &str, request_headers: &HeaderMap) -> String {
    let from_host_header = request_headers
        .get("host")
        .and_then(|host| host.split(':').next())
        .filter(|host| !host.is_empty())
        .map(str::to_ascii_lowercase);
    from_host_header.unwrap_or_else(|| {
        Url::parse(request_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default()
    })
}
