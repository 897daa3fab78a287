/// Errors raised at the foreign-call boundary itself, before any payload
/// is interpreted.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to load native library: {0}")]
    Load(String),
    #[error("native library does not export `{0}`")]
    SymbolMissing(&'static str),
    #[error("native call `{0}` returned a null pointer")]
    NullResponse(&'static str),
    #[error("argument contains an interior NUL byte")]
    InteriorNul,
}

/// The native transport engine, seen as an opaque capability.
///
/// Every method blocks until the engine returns. Callers on an async
/// runtime must invoke them from a blocking worker.
///
/// Each successful [`request`](TransportGateway::request) leaves the
/// response document allocated on the engine side; it stays there until
/// [`free_memory`](TransportGateway::free_memory) is called with the
/// document's `id`.
pub trait TransportGateway: Send + Sync {
    /// Execute one request document and return the response document.
    ///
    /// # Errors
    /// Returns `GatewayError` if the call cannot be made or returns nothing.
    fn request(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError>;

    /// Release the engine-side memory of the response with the given id.
    ///
    /// # Errors
    /// Returns `GatewayError` if the call cannot be made.
    fn free_memory(&self, response_id: &str) -> Result<(), GatewayError>;

    /// Tear down one engine-side session.
    ///
    /// # Errors
    /// Returns `GatewayError` if the call cannot be made or returns nothing.
    fn destroy_session(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError>;

    /// Tear down every engine-side session.
    ///
    /// # Errors
    /// Returns `GatewayError` if the call cannot be made or returns nothing.
    fn destroy_all(&self) -> Result<Vec<u8>, GatewayError>;
}
