use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use tls_bridge_sdk::{
    ClientIdentifier, CustomTlsClient, DestroyOutcome, DestroySessionPayload, FingerprintPayload,
    RequestPayload, TransportGateway, TransportOptions,
};

use crate::cookies::CookieJar;
use crate::error::ClientError;
use crate::gateway;
use crate::headers::HeaderMap;
use crate::request::{PreparedBody, Proxy, RequestOptions};
use crate::response::Response;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_REDIRECTS: usize = 30;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The TLS/HTTP2 fingerprint a session presents.
#[derive(Debug, Clone, PartialEq)]
pub enum Fingerprint {
    /// A named browser profile built into the engine.
    Profile {
        identifier: ClientIdentifier,
        random_extension_order: bool,
    },
    /// A fully custom bundle.
    Custom(Box<CustomTlsClient>),
}

impl Default for Fingerprint {
    fn default() -> Self {
        Fingerprint::Custom(Box::default())
    }
}

impl Fingerprint {
    fn to_payload(&self) -> FingerprintPayload {
        match self {
            Fingerprint::Profile {
                identifier,
                random_extension_order,
            } => FingerprintPayload::Identifier {
                tls_client_identifier: *identifier,
                with_random_tls_extension_order: *random_extension_order,
            },
            Fingerprint::Custom(bundle) => FingerprintPayload::Custom {
                custom_tls_client: bundle.as_ref().clone(),
            },
        }
    }
}

/// Engine transport flags fixed for the lifetime of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportSettings {
    pub force_http1: bool,
    pub catch_panics: bool,
    pub debug: bool,
    pub header_order: Option<Vec<String>>,
    /// Extra decoding the engine applies to the body (`gzip`, `br`, ...).
    pub additional_decode: Option<String>,
    pub transport_options: Option<TransportOptions>,
    /// Headers sent on the proxy `CONNECT` request.
    pub connect_headers: Option<BTreeMap<String, Vec<String>>>,
}

fn default_headers() -> HeaderMap {
    [
        ("User-Agent", DEFAULT_USER_AGENT),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Accept", "*/*"),
        ("Connection", "keep-alive"),
    ]
    .into_iter()
    .map(|(k, v)| (k, v.to_owned()))
    .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Session`].
///
/// Choosing a profile and choosing a custom bundle replace each other, so a
/// built session carries exactly one fingerprint.
#[derive(Default)]
#[must_use]
pub struct SessionBuilder {
    fingerprint: Fingerprint,
    random_extension_order: bool,
    transport: TransportSettings,
    headers: Option<HeaderMap>,
    cookies: CookieJar,
    proxies: Proxy,
    params: Vec<(String, String)>,
    timeout_seconds: Option<u64>,
    max_redirects: Option<usize>,
    gateway: Option<Arc<dyn TransportGateway>>,
}

impl SessionBuilder {
    pub fn client(mut self, identifier: ClientIdentifier) -> Self {
        self.fingerprint = Fingerprint::Profile {
            identifier,
            random_extension_order: false,
        };
        self
    }

    /// Randomize TLS extension order. Applies to profiles only.
    pub fn random_tls_extension_order(mut self, enabled: bool) -> Self {
        self.random_extension_order = enabled;
        self
    }

    pub fn custom(mut self, bundle: CustomTlsClient) -> Self {
        self.fingerprint = Fingerprint::Custom(Box::new(bundle));
        self
    }

    pub fn transport(mut self, settings: TransportSettings) -> Self {
        self.transport = settings;
        self
    }

    pub fn force_http1(mut self, enabled: bool) -> Self {
        self.transport.force_http1 = enabled;
        self
    }

    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.transport.catch_panics = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.transport.debug = enabled;
        self
    }

    pub fn header_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transport.header_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the default header set.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<Proxy>) -> Self {
        self.proxies = proxy.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Use `gateway` instead of the process-wide engine handle.
    pub fn gateway(mut self, gateway: Arc<dyn TransportGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn build(self) -> Session {
        let fingerprint = match self.fingerprint {
            Fingerprint::Profile { identifier, .. } => Fingerprint::Profile {
                identifier,
                random_extension_order: self.random_extension_order,
            },
            custom @ Fingerprint::Custom(_) => custom,
        };
        Session {
            id: Uuid::new_v4().to_string(),
            headers: self.headers.unwrap_or_else(default_headers),
            cookies: self.cookies,
            proxies: self.proxies,
            params: self.params,
            timeout_seconds: self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            max_redirects: self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
            fingerprint,
            transport: self.transport,
            gateway: OnceCell::new_with(self.gateway),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A cookie- and header-carrying client bound to one engine session.
///
/// Requests take `&mut self`: a session runs one request at a time and
/// updates its cookie jar between redirect hops.
pub struct Session {
    id: String,
    headers: HeaderMap,
    cookies: CookieJar,
    proxies: Proxy,
    params: Vec<(String, String)>,
    timeout_seconds: u64,
    max_redirects: usize,
    fingerprint: Fingerprint,
    transport: TransportSettings,
    gateway: OnceCell<Arc<dyn TransportGateway>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("proxies", &self.proxies)
            .field("params", &self.params)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_redirects", &self.max_redirects)
            .field("fingerprint", &self.fingerprint)
            .field("transport", &self.transport)
            .field("gateway", &self.gateway.initialized())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with default headers, the default custom fingerprint and
    /// the process-wide engine.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Engine session id, a random UUID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    #[must_use]
    pub fn proxies(&self) -> &Proxy {
        &self.proxies
    }

    pub fn set_proxies(&mut self, proxy: impl Into<Proxy>) {
        self.proxies = proxy.into();
    }

    /// Query parameters appended to every request before the call's own.
    pub fn params_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.params
    }

    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn set_timeout_seconds(&mut self, seconds: u64) {
        self.timeout_seconds = seconds;
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    #[must_use]
    pub fn transport_settings(&self) -> &TransportSettings {
        &self.transport
    }

    async fn gateway(&self) -> Result<Arc<dyn TransportGateway>, ClientError> {
        self.gateway
            .get_or_try_init(gateway::shared_gateway)
            .await
            .cloned()
    }

    /// Send one request, following redirects unless disabled.
    ///
    /// Cookies set by each hop are stored in the session jar before the
    /// next hop is sent; the returned response's history holds the
    /// redirect hops in order.
    ///
    /// # Errors
    /// - [`ClientError::Transport`] when the engine reports status 0.
    /// - [`ClientError::TooManyRedirects`] past the session's redirect limit.
    /// - [`ClientError::Decode`] for a malformed engine document.
    /// - Gateway and engine bootstrap failures.
    pub async fn request(
        &mut self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let engine = self.gateway().await?;
        let timeout_seconds = options.effective_timeout(self.timeout_seconds);
        let mut url = options.encode_url(url, &self.params)?;
        let prepared = options.prepare(&self.headers)?;
        let proxy_url = Proxy::resolve_for_call(options.proxy_override(), &self.proxies);
        let mut history = Vec::new();

        loop {
            let cookies = CookieJar::merge(&self.cookies, options.call_cookies());
            let payload = self.payload(&PayloadParts {
                method,
                url: &url,
                options: &options,
                prepared: &prepared,
                cookies: &cookies,
                proxy_url: &proxy_url,
                timeout_seconds,
            });
            debug!(
                session_id = %self.id,
                method,
                url = %url,
                hop = history.len(),
                "dispatching request"
            );
            let descriptor = gateway::exchange(Arc::clone(&engine), serde_json::to_vec(&payload)?).await?;
            debug!(
                session_id = %self.id,
                status = descriptor.status,
                protocol = %descriptor.used_protocol,
                "received response"
            );

            let set_cookies = CookieJar::from_response(
                &url,
                &prepared.headers,
                &descriptor.headers,
                &descriptor.cookies,
            );
            self.cookies.absorb(&set_cookies);
            let mut response = Response::from_payload(descriptor, set_cookies, options.wants_bytes());

            let next = if options.follows_redirects() && response.is_redirect() {
                response.location().map(|location| resolve_location(&url, location))
            } else {
                None
            };
            let Some(next) = next else {
                response.set_history(history);
                return Ok(response);
            };
            if history.len() >= self.max_redirects {
                return Err(ClientError::TooManyRedirects(self.max_redirects));
            }
            info!(
                session_id = %self.id,
                status = response.status_code(),
                location = %next,
                "following redirect"
            );
            history.push(response);
            url = next;
        }
    }

    fn payload(&self, parts: &PayloadParts<'_>) -> RequestPayload {
        RequestPayload {
            session_id: self.id.clone(),
            // Redirects are followed here so cookies are updated per hop.
            follow_redirects: false,
            force_http1: self.transport.force_http1,
            with_debug: self.transport.debug,
            catch_panics: self.transport.catch_panics,
            headers: parts
                .prepared
                .headers
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect(),
            header_order: self.transport.header_order.clone(),
            insecure_skip_verify: parts.options.skips_verification(),
            is_byte_request: parts.prepared.is_bytes,
            is_byte_response: parts.options.wants_bytes(),
            additional_decode: self.transport.additional_decode.clone(),
            proxy_url: parts.proxy_url.to_owned(),
            request_url: parts.url.to_owned(),
            request_method: parts.method.to_owned(),
            request_body: parts.prepared.body.clone(),
            request_cookies: parts.cookies.to_wire(),
            timeout_seconds: parts.timeout_seconds,
            transport_options: self.transport.transport_options.clone(),
            connect_headers: self.transport.connect_headers.clone(),
            fingerprint: self.fingerprint.to_payload(),
        }
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn get(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("GET", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn options(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("OPTIONS", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn head(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("HEAD", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn post(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("POST", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn put(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("PUT", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn patch(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("PATCH", url, options).await
    }

    /// # Errors
    /// Same as [`request`](Self::request).
    pub async fn delete(&mut self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        self.request("DELETE", url, options).await
    }

    /// Close this session's engine-side state.
    ///
    /// # Errors
    /// Gateway or decode failures.
    pub async fn destroy(&self) -> Result<DestroyOutcome, ClientError> {
        let engine = self.gateway().await?;
        let payload = serde_json::to_vec(&DestroySessionPayload {
            session_id: self.id.clone(),
        })?;
        let outcome = gateway::destroy_session(engine, payload).await?;
        info!(session_id = %self.id, success = outcome.success, "destroyed session");
        Ok(outcome)
    }
}

struct PayloadParts<'a> {
    method: &'a str,
    url: &'a str,
    options: &'a RequestOptions,
    prepared: &'a PreparedBody,
    cookies: &'a CookieJar,
    proxy_url: &'a str,
    timeout_seconds: u64,
}

/// Resolve a `Location` value against the URL that produced it.
fn resolve_location(current: &str, location: &str) -> String {
    Url::parse(current)
        .and_then(|base| base.join(location))
        .map_or_else(|_| location.to_owned(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_headers_and_fingerprint() {
        let session = Session::new();

        let keys: Vec<_> = session.headers().keys().collect();
        assert_eq!(keys, ["User-Agent", "Accept-Encoding", "Accept", "Connection"]);
        assert_eq!(session.timeout_seconds(), 30);
        assert!(matches!(session.fingerprint(), Fingerprint::Custom(_)));
        assert!(Uuid::parse_str(session.id()).is_ok());
    }

    #[test]
    fn profile_and_custom_replace_each_other() {
        let session = Session::builder()
            .custom(CustomTlsClient::from_ja3("771,4865"))
            .client(ClientIdentifier::Firefox120)
            .random_tls_extension_order(true)
            .build();

        assert_eq!(
            session.fingerprint(),
            &Fingerprint::Profile {
                identifier: ClientIdentifier::Firefox120,
                random_extension_order: true,
            }
        );
    }

    #[test]
    fn sessions_get_distinct_ids() {
        assert_ne!(Session::new().id(), Session::new().id());
    }

    #[test]
    fn location_resolution() {
        assert_eq!(
            resolve_location("https://a.example/x/y?q=1", "/login"),
            "https://a.example/login"
        );
        assert_eq!(
            resolve_location("https://a.example/x/y", "z"),
            "https://a.example/x/z"
        );
        assert_eq!(
            resolve_location("https://a.example/", "https://b.example/dest"),
            "https://b.example/dest"
        );
    }
}
