//! Wire contract between `tls-bridge` sessions and the native TLS engine.
//!
//! The engine is an opaque shared library that accepts a JSON request
//! document and hands back a JSON response document. This crate owns:
//!
//! - [`RequestPayload`] / [`ResponsePayload`]: the documents exchanged
//!   across the foreign-call boundary, with the exact keys the engine reads.
//! - [`ClientIdentifier`]: the catalogue of named fingerprint profiles.
//! - [`CustomTlsClient`]: the fully custom fingerprint bundle.
//! - [`TransportGateway`]: the capability a session dispatches through.
//!
//! Nothing here performs I/O.

pub mod custom;
pub mod fingerprint;
pub mod gateway;
pub mod payload;

pub use custom::{CustomTlsClient, PriorityFrame, PriorityParam, TransportOptions};
pub use fingerprint::{ClientIdentifier, UnknownClientIdentifier};
pub use gateway::{GatewayError, TransportGateway};
pub use payload::{
    DestroyOutcome, DestroySessionPayload, FingerprintPayload, RequestPayload, ResponsePayload,
    WireCookie,
};
