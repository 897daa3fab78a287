use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;

use crate::cookies::CookieJar;
use crate::error::ClientError;
use crate::headers::HeaderMap;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Request body supplied through [`RequestOptions::data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Sent as-is.
    Text(String),
    /// Sent base64-encoded with the byte-request flag set.
    Bytes(Bytes),
    /// Form-urlencoded; sets `Content-Type` unless one is present.
    Form(Vec<(String, String)>),
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        RequestBody::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        RequestBody::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        RequestBody::Bytes(value)
    }
}

/// Proxy configuration.
///
/// Only the `http` entry of a per-scheme map is forwarded; the engine takes
/// a single proxy URL for every scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    Url(String),
    ByScheme(BTreeMap<String, String>),
}

impl Default for Proxy {
    fn default() -> Self {
        Proxy::ByScheme(BTreeMap::new())
    }
}

impl Proxy {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Proxy::Url(url) => url.is_empty(),
            Proxy::ByScheme(map) => map.is_empty(),
        }
    }

    /// The single URL handed to the engine, or `""` for none.
    #[must_use]
    pub fn resolve(&self) -> String {
        match self {
            Proxy::Url(url) => url.clone(),
            Proxy::ByScheme(map) => map.get("http").cloned().unwrap_or_default(),
        }
    }

    /// The call's proxy when it is non-empty, else the session's.
    pub(crate) fn resolve_for_call(call: Option<&Proxy>, session: &Proxy) -> String {
        call.filter(|p| !p.is_empty()).unwrap_or(session).resolve()
    }
}

impl From<&str> for Proxy {
    fn from(value: &str) -> Self {
        Proxy::Url(value.to_owned())
    }
}

impl From<String> for Proxy {
    fn from(value: String) -> Self {
        Proxy::Url(value)
    }
}

/// Per-call options for [`Session::request`](crate::Session::request).
///
/// ```
/// use tls_bridge::RequestOptions;
///
/// let options = RequestOptions::new()
///     .param("q", "rust")
///     .header("X-Trace", "1")
///     .remove_header("Accept-Encoding")
///     .allow_redirects(false);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    params: Vec<(String, String)>,
    data: Option<RequestBody>,
    json: Option<serde_json::Value>,
    headers: Vec<(String, Option<String>)>,
    cookies: CookieJar,
    allow_redirects: Option<bool>,
    insecure_skip_verify: bool,
    timeout_seconds: Option<u64>,
    timeout: Option<Duration>,
    proxy: Option<Proxy>,
    byte_response: bool,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one query parameter. Repeat for list values.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the body. Takes precedence over [`json`](Self::json).
    #[must_use]
    pub fn data(mut self, body: impl Into<RequestBody>) -> Self {
        self.data = Some(body.into());
        self
    }

    #[must_use]
    pub fn form<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.data(RequestBody::Form(fields))
    }

    /// Serialize `value` as the JSON body. Ignored when `data` is set.
    ///
    /// # Errors
    /// Returns [`ClientError::Decode`] if `value` cannot be serialized.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, ClientError> {
        self.json = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Override a session header for this call.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Drop a session header for this call.
    #[must_use]
    pub fn remove_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push((name.into(), None));
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.set(crate::cookies::Cookie::new(name, value));
        self
    }

    /// Cookies for this call only; they override session cookies with the
    /// same name and domain and are not stored in the session jar.
    #[must_use]
    pub fn cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = jar;
        self
    }

    #[must_use]
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    #[must_use]
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Takes precedence over [`timeout`](Self::timeout).
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Whole seconds only; the engine has no finer resolution.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Ask the engine for the body as a base64 data URL. Decode it with
    /// [`Response::content`](crate::Response::content).
    #[must_use]
    pub fn byte_response(mut self, enabled: bool) -> Self {
        self.byte_response = enabled;
        self
    }

    // -----------------------------------------------------------------------
    // Resolution against session state
    // -----------------------------------------------------------------------

    pub(crate) fn call_cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub(crate) fn follows_redirects(&self) -> bool {
        self.allow_redirects.unwrap_or(true)
    }

    pub(crate) fn skips_verification(&self) -> bool {
        self.insecure_skip_verify
    }

    pub(crate) fn wants_bytes(&self) -> bool {
        self.byte_response
    }

    pub(crate) fn proxy_override(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub(crate) fn effective_timeout(&self, session_default: u64) -> u64 {
        self.timeout_seconds
            .or_else(|| self.timeout.map(whole_seconds))
            .unwrap_or(session_default)
    }

    /// `url` with session params then call params appended.
    pub(crate) fn encode_url(
        &self,
        url: &str,
        session_params: &[(String, String)],
    ) -> Result<String, ClientError> {
        let pairs: Vec<&(String, String)> = session_params.iter().chain(&self.params).collect();
        if pairs.is_empty() {
            return Ok(url.to_owned());
        }
        let query = serde_urlencoded::to_string(&pairs)
            .map_err(|e| ClientError::BuildError(format!("invalid query parameters: {e}")))?;
        let (base, fragment) = url.split_once('#').map_or((url, None), |(b, f)| (b, Some(f)));
        let separator = if base.contains('?') { '&' } else { '?' };
        Ok(match fragment {
            Some(fragment) => format!("{base}{separator}{query}#{fragment}"),
            None => format!("{base}{separator}{query}"),
        })
    }

    /// Merge headers and encode the body.
    ///
    /// An inferred `Content-Type` is applied beneath the call's header
    /// overrides, so the call can still replace or drop it. Session headers
    /// are never modified.
    pub(crate) fn prepare(&self, session_headers: &HeaderMap) -> Result<PreparedBody, ClientError> {
        let (body, content_type) = self.encode_body()?;
        let mut headers = session_headers.clone();
        if let Some(content_type) = content_type {
            if !headers.contains_key("content-type") {
                headers.insert("Content-Type", content_type.to_owned());
            }
        }
        for (name, value) in &self.headers {
            match value {
                Some(value) => {
                    headers.insert(name.as_str(), value.clone());
                }
                None => {
                    headers.remove(name);
                }
            }
        }
        Ok(PreparedBody { headers, ..body })
    }

    fn encode_body(&self) -> Result<(PreparedBody, Option<&'static str>), ClientError> {
        let empty = PreparedBody::default();
        match (&self.data, &self.json) {
            (Some(RequestBody::Text(text)), _) => Ok((
                PreparedBody {
                    body: Some(text.clone()),
                    ..empty
                },
                None,
            )),
            (Some(RequestBody::Bytes(bytes)), _) => Ok((
                PreparedBody {
                    body: Some(STANDARD.encode(bytes)),
                    is_bytes: true,
                    ..empty
                },
                None,
            )),
            (Some(RequestBody::Form(fields)), _) => {
                let encoded = serde_urlencoded::to_string(fields)
                    .map_err(|e| ClientError::BuildError(format!("invalid form body: {e}")))?;
                Ok((
                    PreparedBody {
                        body: Some(encoded),
                        ..empty
                    },
                    Some(FORM_CONTENT_TYPE),
                ))
            }
            (None, Some(value)) => {
                let encoded = match value {
                    serde_json::Value::String(raw) => raw.clone(),
                    other => serde_json::to_string(other)?,
                };
                Ok((
                    PreparedBody {
                        body: Some(encoded),
                        ..empty
                    },
                    Some(JSON_CONTENT_TYPE),
                ))
            }
            (None, None) => Ok((empty, None)),
        }
    }
}

/// Whole seconds, rounding any fraction up so a short timeout never becomes 0.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout
        .as_secs()
        .saturating_add(u64::from(timeout.subsec_nanos() > 0))
}

/// Merged headers and encoded body for one call.
#[derive(Debug, Default)]
pub(crate) struct PreparedBody {
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub is_bytes: bool,
}
