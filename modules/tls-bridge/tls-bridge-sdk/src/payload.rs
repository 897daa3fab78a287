use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::custom::{CustomTlsClient, TransportOptions};
use crate::fingerprint::ClientIdentifier;

// ---------------------------------------------------------------------------
// Request document
// ---------------------------------------------------------------------------

/// The request document handed to the engine. Built fresh for every
/// dispatch and never reused.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct RequestPayload {
    pub session_id: String,
    pub follow_redirects: bool,
    pub force_http1: bool,
    pub with_debug: bool,
    pub catch_panics: bool,
    /// Merged request headers in wire order.
    #[serde(serialize_with = "ordered_map")]
    pub headers: Vec<(String, String)>,
    pub header_order: Option<Vec<String>>,
    pub insecure_skip_verify: bool,
    pub is_byte_request: bool,
    pub is_byte_response: bool,
    pub additional_decode: Option<String>,
    /// Empty string when no proxy applies, never null.
    pub proxy_url: String,
    pub request_url: String,
    pub request_method: String,
    /// Base64 when `is_byte_request` is set.
    pub request_body: Option<String>,
    pub request_cookies: Vec<WireCookie>,
    pub timeout_seconds: u64,
    pub transport_options: Option<TransportOptions>,
    pub connect_headers: Option<BTreeMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub fingerprint: FingerprintPayload,
}

/// Exactly one of the two fingerprint field sets.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FingerprintPayload {
    Custom {
        #[serde(rename = "customTlsClient")]
        custom_tls_client: CustomTlsClient,
    },
    Identifier {
        #[serde(rename = "tlsClientIdentifier")]
        tls_client_identifier: ClientIdentifier,
        #[serde(rename = "withRandomTLSExtensionOrder")]
        with_random_tls_extension_order: bool,
    },
}

/// A cookie as the engine reads it from `requestCookies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireCookie {
    pub domain: String,
    /// Unix timestamp in seconds; null for session cookies.
    pub expires: Option<i64>,
    pub name: String,
    pub path: String,
    pub value: String,
}

fn ordered_map<S: Serializer>(entries: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}

// ---------------------------------------------------------------------------
// Response document
// ---------------------------------------------------------------------------

/// The response document returned by the engine.
///
/// `status == 0` means the engine failed to complete the exchange; `body`
/// then carries the failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// Correlation id used to release the document's engine-side memory.
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub used_protocol: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    /// Response headers in the order the engine reported them.
    #[serde(default, deserialize_with = "ordered_entries")]
    pub headers: Vec<(String, Vec<String>)>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cookies: BTreeMap<String, String>,
}

impl ResponsePayload {
    /// Whether the engine reported a transport failure.
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, Vec<String>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, Vec<String>)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to value lists, or null")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, values)) = map.next_entry::<String, Option<Vec<String>>>()? {
                entries.push((name, values.unwrap_or_default()));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}

// ---------------------------------------------------------------------------
// Session teardown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroySessionPayload {
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DestroyOutcome {
    pub id: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(fingerprint: FingerprintPayload) -> RequestPayload {
        RequestPayload {
            session_id: "sid".to_owned(),
            follow_redirects: true,
            force_http1: false,
            with_debug: false,
            catch_panics: false,
            headers: vec![
                ("User-Agent".to_owned(), "ua".to_owned()),
                ("Accept".to_owned(), "*/*".to_owned()),
            ],
            header_order: None,
            insecure_skip_verify: false,
            is_byte_request: false,
            is_byte_response: false,
            additional_decode: None,
            proxy_url: String::new(),
            request_url: "https://example.com/".to_owned(),
            request_method: "GET".to_owned(),
            request_body: None,
            request_cookies: vec![WireCookie {
                domain: "example.com".to_owned(),
                expires: None,
                name: "a".to_owned(),
                path: "/".to_owned(),
                value: "1".to_owned(),
            }],
            timeout_seconds: 30,
            transport_options: None,
            connect_headers: None,
            fingerprint,
        }
    }

    #[test]
    fn identifier_payload_carries_identifier_fields_only() {
        let value = serde_json::to_value(payload(FingerprintPayload::Identifier {
            tls_client_identifier: ClientIdentifier::Chrome120,
            with_random_tls_extension_order: true,
        }))
        .unwrap();

        assert_eq!(value["tlsClientIdentifier"], json!("chrome_120"));
        assert_eq!(value["withRandomTLSExtensionOrder"], json!(true));
        assert!(value.get("customTlsClient").is_none());
    }

    #[test]
    fn custom_payload_carries_bundle_only() {
        let value = serde_json::to_value(payload(FingerprintPayload::Custom {
            custom_tls_client: CustomTlsClient::from_ja3("771,4865,0,29,0"),
        }))
        .unwrap();

        assert_eq!(value["customTlsClient"]["ja3String"], json!("771,4865,0,29,0"));
        assert!(value.get("tlsClientIdentifier").is_none());
        assert!(value.get("withRandomTLSExtensionOrder").is_none());
    }

    #[test]
    fn request_keys_match_engine_contract() {
        let value = serde_json::to_value(payload(FingerprintPayload::Identifier {
            tls_client_identifier: ClientIdentifier::Firefox120,
            with_random_tls_extension_order: false,
        }))
        .unwrap();

        for key in [
            "sessionId",
            "followRedirects",
            "forceHttp1",
            "withDebug",
            "catchPanics",
            "headers",
            "headerOrder",
            "insecureSkipVerify",
            "isByteRequest",
            "isByteResponse",
            "additionalDecode",
            "proxyUrl",
            "requestUrl",
            "requestMethod",
            "requestBody",
            "requestCookies",
            "timeoutSeconds",
            "transportOptions",
            "connectHeaders",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["proxyUrl"], json!(""));
        assert_eq!(
            value["requestCookies"],
            json!([{"domain": "example.com", "expires": null, "name": "a", "path": "/", "value": "1"}])
        );
    }

    #[test]
    fn headers_serialize_in_insertion_order() {
        let text = serde_json::to_string(&payload(FingerprintPayload::Identifier {
            tls_client_identifier: ClientIdentifier::Chrome120,
            with_random_tls_extension_order: false,
        }))
        .unwrap();

        let ua = text.find("\"User-Agent\"").unwrap();
        let accept = text.find("\"Accept\"").unwrap();
        assert!(ua < accept);
    }

    #[test]
    fn response_tolerates_null_maps() {
        let parsed: ResponsePayload = serde_json::from_value(json!({
            "id": "r1",
            "status": 200,
            "body": "OK",
            "headers": null,
            "cookies": null
        }))
        .unwrap();

        assert_eq!(parsed.id, "r1");
        assert!(parsed.headers.is_empty());
        assert!(parsed.cookies.is_empty());
        assert!(!parsed.is_transport_failure());
    }

    #[test]
    fn response_headers_keep_engine_order() {
        let parsed: ResponsePayload = serde_json::from_str(
            r#"{"id":"r1","status":200,"headers":{"Server":["x"],"Date":["d"],"Content-Type":["text/html"],"Age":null}}"#,
        )
        .unwrap();

        let names: Vec<_> = parsed.headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["Server", "Date", "Content-Type", "Age"]);
        assert!(parsed.headers[3].1.is_empty());
    }

    #[test]
    fn response_without_id_is_rejected() {
        let parsed = serde_json::from_value::<ResponsePayload>(json!({"status": 200}));
        assert!(parsed.is_err());
    }
}
