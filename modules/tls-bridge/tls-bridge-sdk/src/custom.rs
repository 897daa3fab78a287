use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Custom fingerprint bundle
// ---------------------------------------------------------------------------

/// A fully custom TLS/HTTP2 fingerprint, sent as `customTlsClient`.
///
/// Every field is optional on the engine side; `None` lets the engine pick
/// its own default. The two list fields that the engine always expects are
/// carried as plain vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTlsClient {
    /// JA3 fingerprint: version, ciphers, extensions, curves, point formats.
    pub ja3_string: Option<String>,
    /// HTTP/2 `SETTINGS` frame values keyed by setting name
    /// (`HEADER_TABLE_SIZE`, `INITIAL_WINDOW_SIZE`, ...).
    pub h2_settings: Option<BTreeMap<String, u32>>,
    /// Order in which `h2_settings` are written to the `SETTINGS` frame.
    pub h2_settings_order: Option<Vec<String>>,
    /// Pseudo header order, e.g. `:method`, `:authority`, `:scheme`, `:path`.
    pub pseudo_header_order: Option<Vec<String>>,
    /// Connection-level `WINDOW_UPDATE` increment.
    pub connection_flow: Option<u32>,
    pub priority_frames: Option<Vec<PriorityFrame>>,
    pub header_priority: Option<PriorityParam>,
    /// Certificate compression algorithms (`zlib`, `brotli`, `zstd`).
    pub cert_compression_algos: Vec<String>,
    /// ALPN protocols offered in the client hello.
    pub alpn_protocols: Vec<String>,
    /// Offered TLS versions (`GREASE`, `1.3`, `1.2`, ...).
    pub supported_versions: Option<Vec<String>>,
    pub supported_signature_algorithms: Option<Vec<String>>,
    pub supported_delegated_credentials_algorithms: Option<Vec<String>>,
    /// Key share curves (`GREASE`, `X25519`, `P256`, ...).
    pub key_share_curves: Option<Vec<String>>,
}

impl Default for CustomTlsClient {
    fn default() -> Self {
        Self {
            ja3_string: None,
            h2_settings: None,
            h2_settings_order: None,
            pseudo_header_order: None,
            connection_flow: None,
            priority_frames: None,
            header_priority: None,
            cert_compression_algos: Vec::new(),
            alpn_protocols: vec!["h2".to_owned(), "http/1.1".to_owned()],
            supported_versions: None,
            supported_signature_algorithms: None,
            supported_delegated_credentials_algorithms: None,
            key_share_curves: None,
        }
    }
}

impl CustomTlsClient {
    /// Start from engine defaults with the given JA3 string.
    #[must_use]
    pub fn from_ja3(ja3: impl Into<String>) -> Self {
        Self {
            ja3_string: Some(ja3.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cert_compression_algo(mut self, algo: impl Into<String>) -> Self {
        self.cert_compression_algos.push(algo.into());
        self
    }
}

/// An HTTP/2 PRIORITY frame sent right after the connection preface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityFrame {
    #[serde(rename = "streamID")]
    pub stream_id: u32,
    #[serde(rename = "priorityParam")]
    pub priority_param: PriorityParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityParam {
    pub weight: u16,
    pub stream_dep: u32,
    pub exclusive: bool,
}

// ---------------------------------------------------------------------------
// Transport options
// ---------------------------------------------------------------------------

/// Connection pool and buffer tuning forwarded to the engine's transport.
///
/// Unset fields are omitted from the wire document and keep the engine's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_keep_alives: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_compression: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_conns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_conns_per_host: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_conns_per_host: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_header_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_buffer_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_buffer_size: Option<u32>,
    /// Idle connection timeout in nanoseconds, as the engine reads it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_conn_timeout: Option<u64>,
}
