use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tls_bridge_sdk::{DestroyOutcome, ResponsePayload, TransportGateway};
use tracing::{debug, warn};

use crate::error::ClientError;

static SHARED: OnceCell<Arc<dyn TransportGateway>> = OnceCell::const_new();

/// The process-wide engine handle, initialized on first use.
///
/// With the `native` feature the first call installs the engine binary if
/// needed and loads it; later calls return the same handle. A gateway
/// registered through [`install_shared_gateway`] beforehand is used instead.
///
/// # Errors
/// Propagates installation and load failures. Without the `native`
/// feature and no installed gateway this is [`ClientError::Configuration`].
pub async fn shared_gateway() -> Result<Arc<dyn TransportGateway>, ClientError> {
    SHARED.get_or_try_init(load_default).await.cloned()
}

/// Register `gateway` as the process-wide handle.
///
/// Returns `false` if a handle was already initialized.
#[must_use]
pub fn install_shared_gateway(gateway: Arc<dyn TransportGateway>) -> bool {
    SHARED.set(gateway).is_ok()
}

#[cfg(feature = "native")]
async fn load_default() -> Result<Arc<dyn TransportGateway>, ClientError> {
    let gateway = crate::native::DynamicLibraryGateway::bootstrap().await?;
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "native"))]
fn load_default() -> std::future::Ready<Result<Arc<dyn TransportGateway>, ClientError>> {
    std::future::ready(Err(ClientError::Configuration(
        "no transport gateway installed and the `native` feature is disabled".to_owned(),
    )))
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

/// Frees one engine response when dropped.
struct ResponseLease<'a> {
    gateway: &'a dyn TransportGateway,
    id: String,
}

impl Drop for ResponseLease<'_> {
    fn drop(&mut self) {
        match self.gateway.free_memory(&self.id) {
            Ok(()) => debug!(response_id = %self.id, "released engine response"),
            Err(err) => warn!(response_id = %self.id, error = %err, "failed to release engine response"),
        }
    }
}

#[derive(Deserialize)]
struct ResponseId {
    id: String,
}

/// Leases the response id out of `raw` before the full parse, so the
/// engine memory is released even when the rest of the document is bad.
fn lease<'a>(gateway: &'a dyn TransportGateway, raw: &[u8]) -> Result<ResponseLease<'a>, ClientError> {
    let ResponseId { id } = serde_json::from_slice(raw)?;
    Ok(ResponseLease { gateway, id })
}

/// Run one request on a blocking thread: call the engine, parse its
/// document and release it. The three steps run on the same thread, so a
/// dropped caller future cannot skip the release.
pub(crate) async fn exchange(
    gateway: Arc<dyn TransportGateway>,
    payload: Vec<u8>,
) -> Result<ResponsePayload, ClientError> {
    tokio::task::spawn_blocking(move || -> Result<ResponsePayload, ClientError> {
        let raw = gateway.request(&payload)?;
        let _lease = lease(gateway.as_ref(), &raw)?;
        let response: ResponsePayload = serde_json::from_slice(&raw)?;
        if response.is_transport_failure() {
            return Err(ClientError::Transport(response.body));
        }
        Ok(response)
    })
    .await?
}

pub(crate) async fn destroy_session(
    gateway: Arc<dyn TransportGateway>,
    payload: Vec<u8>,
) -> Result<DestroyOutcome, ClientError> {
    tokio::task::spawn_blocking(move || -> Result<DestroyOutcome, ClientError> {
        let raw = gateway.destroy_session(&payload)?;
        let _lease = lease(gateway.as_ref(), &raw)?;
        Ok(serde_json::from_slice(&raw)?)
    })
    .await?
}

/// Close every engine session in the process.
///
/// # Errors
/// Propagates gateway and decode failures.
pub async fn destroy_all(gateway: Arc<dyn TransportGateway>) -> Result<DestroyOutcome, ClientError> {
    tokio::task::spawn_blocking(move || -> Result<DestroyOutcome, ClientError> {
        let raw = gateway.destroy_all()?;
        let _lease = lease(gateway.as_ref(), &raw)?;
        Ok(serde_json::from_slice(&raw)?)
    })
    .await?
}
