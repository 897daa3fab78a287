//! Scripted engine for tests.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tls_bridge_sdk::{GatewayError, TransportGateway};

/// A [`TransportGateway`] that replays queued response documents and
/// records what it was sent.
///
/// When the queue runs dry it answers with a status-0 failure.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Vec<u8>>>,
    requests: Mutex<Vec<Value>>,
    freed: Mutex<Vec<String>>,
    destroyed: Mutex<Vec<Value>>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response document.
    pub fn push(&self, response: &Value) {
        self.push_raw(response.to_string().into_bytes());
    }

    /// Queue raw bytes, e.g. a malformed document.
    pub fn push_raw(&self, bytes: Vec<u8>) {
        self.responses.lock().push_back(bytes);
    }

    /// Request documents received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    /// Response ids passed to `free_memory`, in order.
    #[must_use]
    pub fn freed(&self) -> Vec<String> {
        self.freed.lock().clone()
    }

    #[must_use]
    pub fn destroyed(&self) -> Vec<Value> {
        self.destroyed.lock().clone()
    }
}

/// A minimal engine response document.
#[must_use]
pub fn reply(id: &str, status: u16, body: &str) -> Value {
    json!({
        "id": id,
        "sessionId": "",
        "status": status,
        "target": "",
        "body": body,
        "headers": {},
        "cookies": {},
        "usedProtocol": "HTTP/1.1"
    })
}

impl TransportGateway for ScriptedGateway {
    fn request(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        self.requests
            .lock()
            .push(serde_json::from_slice(payload).unwrap_or(Value::Null));
        let next = self.responses.lock().pop_front();
        Ok(next.unwrap_or_else(|| {
            reply("exhausted", 0, "no scripted response left")
                .to_string()
                .into_bytes()
        }))
    }

    fn free_memory(&self, response_id: &str) -> Result<(), GatewayError> {
        self.freed.lock().push(response_id.to_owned());
        Ok(())
    }

    fn destroy_session(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        self.destroyed
            .lock()
            .push(serde_json::from_slice(payload).unwrap_or(Value::Null));
        Ok(json!({"id": "destroy", "success": true}).to_string().into_bytes())
    }

    fn destroy_all(&self) -> Result<Vec<u8>, GatewayError> {
        Ok(json!({"id": "destroy-all", "success": true}).to_string().into_bytes())
    }
}
