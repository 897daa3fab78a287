use std::io;

use thiserror::Error;
use tls_bridge_sdk::GatewayError;

/// Errors surfaced by sessions and by the asset lifecycle manager.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No engine artifact is published for the current platform.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The engine reported status 0. The message is the engine's body,
    /// verbatim.
    #[error("{0}")]
    Transport(String),

    /// The release endpoint or asset host was unreachable or answered with
    /// a non-success status.
    #[error("network failure: {0}")]
    Network(String),

    /// An artifact or version record expected on disk is missing.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// The engine returned a document that is not a valid response.
    #[error("decode failure: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Request build error: {0}")]
    BuildError(String),

    #[error("response content was already consumed")]
    ContentConsumed,

    /// A byte response whose body is not a valid base64 data URL.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    #[error("exceeded {0} redirects")]
    TooManyRedirects(usize),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<figment::Error> for ClientError {
    fn from(err: figment::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_engine_body_verbatim() {
        let err = ClientError::Transport("failed to do request: dial tcp: i/o timeout".to_owned());
        assert_eq!(err.to_string(), "failed to do request: dial tcp: i/o timeout");
    }

    #[test]
    fn decode_error_wraps_parse_failure() {
        let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ClientError::from(parse);
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(err.to_string().starts_with("decode failure:"));
    }
}
