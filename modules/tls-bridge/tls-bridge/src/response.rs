use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tls_bridge_sdk::ResponsePayload;

use crate::cookies::CookieJar;
use crate::error::ClientError;
use crate::headers::HeaderMap;

const REDIRECT_STATUSES: [u16; 6] = [300, 301, 302, 303, 307, 308];

/// A response header value. Headers the engine reports with exactly one
/// value collapse to [`HeaderField::Single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderField {
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            HeaderField::Single(value) => Some(value.as_str()),
            HeaderField::Multiple(values) => values.first().map(String::as_str),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            HeaderField::Single(value) => std::slice::from_ref(value),
            HeaderField::Multiple(values) => values.as_slice(),
        }
    }
}

impl From<Vec<String>> for HeaderField {
    fn from(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            HeaderField::Single(values.remove(0))
        } else {
            HeaderField::Multiple(values)
        }
    }
}

impl PartialEq<str> for HeaderField {
    fn eq(&self, other: &str) -> bool {
        matches!(self, HeaderField::Single(value) if value == other)
    }
}

impl PartialEq<&str> for HeaderField {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

#[derive(Debug)]
enum Content {
    Pending,
    Loaded(Bytes),
    Consumed,
}

/// A completed exchange.
///
/// The body is available as text immediately. Byte content is derived from
/// it on first access and cached; [`take_content`](Self::take_content)
/// moves it out, after which further content access fails.
#[derive(Debug)]
pub struct Response {
    url: String,
    status_code: u16,
    text: String,
    headers: HeaderMap<HeaderField>,
    cookies: CookieJar,
    history: Vec<Response>,
    session_id: String,
    used_protocol: String,
    byte_body: bool,
    content: Content,
}

impl Response {
    /// Build from an engine response document.
    ///
    /// `cookies` are the cookies this response set. `byte_body` marks a body
    /// the engine returned as a base64 data URL.
    #[must_use]
    pub fn from_payload(payload: ResponsePayload, cookies: CookieJar, byte_body: bool) -> Self {
        let headers = payload
            .headers
            .into_iter()
            .map(|(name, values)| (name, HeaderField::from(values)))
            .collect();
        Self {
            url: payload.target,
            status_code: payload.status,
            text: payload.body,
            headers,
            cookies,
            history: Vec::new(),
            session_id: payload.session_id,
            used_protocol: payload.used_protocol,
            byte_body,
            content: Content::Pending,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status_code)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap<HeaderField> {
        &self.headers
    }

    /// First value of header `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(HeaderField::first)
    }

    /// Cookies set by this response.
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Redirect responses that led here, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Response] {
        &self.history
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn used_protocol(&self) -> &str {
        &self.used_protocol
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status_code) && self.headers.contains_key("location")
    }

    pub(crate) fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub(crate) fn set_history(&mut self, history: Vec<Response>) {
        self.history = history;
    }

    /// The body as bytes, loaded on first access.
    ///
    /// # Errors
    /// [`ClientError::ContentConsumed`] after [`take_content`](Self::take_content);
    /// [`ClientError::InvalidBody`] when a byte response is not valid base64.
    pub fn content(&mut self) -> Result<&[u8], ClientError> {
        if matches!(self.content, Content::Pending) {
            self.content = Content::Loaded(self.decode_content()?);
        }
        match &self.content {
            Content::Loaded(bytes) => Ok(bytes.as_ref()),
            Content::Pending | Content::Consumed => Err(ClientError::ContentConsumed),
        }
    }

    /// Move the body bytes out of the response.
    ///
    /// # Errors
    /// Same as [`content`](Self::content).
    pub fn take_content(&mut self) -> Result<Bytes, ClientError> {
        self.content()?;
        match std::mem::replace(&mut self.content, Content::Consumed) {
            Content::Loaded(bytes) => Ok(bytes),
            Content::Pending | Content::Consumed => Err(ClientError::ContentConsumed),
        }
    }

    /// Deserialize the text body as JSON.
    ///
    /// # Errors
    /// [`ClientError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    fn decode_content(&self) -> Result<Bytes, ClientError> {
        if self.status_code == 0 {
            return Ok(Bytes::new());
        }
        if !self.byte_body {
            return Ok(Bytes::copy_from_slice(self.text.as_bytes()));
        }
        let encoded = self
            .text
            .split_once("base64,")
            .map_or(self.text.as_str(), |(_, data)| data);
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|e| ClientError::InvalidBody(e.to_string()))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response [{}]>", self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn payload(status: u16, body: &str) -> ResponsePayload {
        ResponsePayload {
            id: "r1".to_owned(),
            session_id: "s1".to_owned(),
            target: "https://example.com/".to_owned(),
            used_protocol: "HTTP/2.0".to_owned(),
            status,
            body: body.to_owned(),
            headers: vec![
                ("Set-Cookie".to_owned(), vec!["a=1".to_owned(), "b=2".to_owned()]),
                ("Content-Type".to_owned(), vec!["text/plain".to_owned()]),
            ],
            cookies: BTreeMap::new(),
        }
    }

    #[test]
    fn single_value_headers_collapse() {
        let response = Response::from_payload(payload(200, "OK"), CookieJar::new(), false);

        assert_eq!(response.headers().get("content-type").unwrap(), &"text/plain");
        assert_eq!(
            response.headers().get("set-cookie").unwrap().values(),
            ["a=1", "b=2"]
        );
    }

    #[test]
    fn headers_iterate_in_engine_order() {
        let response = Response::from_payload(payload(200, "OK"), CookieJar::new(), false);
        let names: Vec<_> = response.headers().keys().collect();
        assert_eq!(names, ["Set-Cookie", "Content-Type"]);
    }

    #[test]
    fn content_encodes_text_and_can_be_taken_once() {
        let mut response = Response::from_payload(payload(200, "Hello"), CookieJar::new(), false);

        assert_eq!(response.content().unwrap(), b"Hello");
        assert_eq!(response.take_content().unwrap(), Bytes::from_static(b"Hello"));
        assert!(matches!(response.content(), Err(ClientError::ContentConsumed)));
        assert_eq!(response.text(), "Hello");
    }

    #[test]
    fn status_zero_has_empty_content() {
        let mut response = Response::from_payload(payload(0, "boom"), CookieJar::new(), false);
        assert!(response.content().unwrap().is_empty());
    }

    #[test]
    fn byte_response_decodes_data_url() {
        let mut response = Response::from_payload(
            payload(200, "data:application/octet-stream;base64,AJ+Slg=="),
            CookieJar::new(),
            true,
        );
        assert_eq!(response.content().unwrap(), [0_u8, 159, 146, 150]);
    }

    #[test]
    fn invalid_byte_response_is_reported() {
        let mut response =
            Response::from_payload(payload(200, "data:x;base64,!!!"), CookieJar::new(), true);
        assert!(matches!(response.content(), Err(ClientError::InvalidBody(_))));
    }

    #[test]
    fn display_and_json() {
        let response = Response::from_payload(payload(201, r#"{"id":7}"#), CookieJar::new(), false);
        assert_eq!(response.to_string(), "<Response [201]>");
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
    }
}
