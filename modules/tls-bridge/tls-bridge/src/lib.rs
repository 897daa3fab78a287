//! Session-oriented HTTP client on top of a native TLS fingerprinting engine.
//!
//! The engine does TLS, HTTP/2 and the wire exchange. This crate owns
//! everything around it:
//!
//! - [`Session`]: default headers, a cookie jar, proxies and a fixed
//!   fingerprint, with a redirect loop that updates cookies on every hop.
//! - [`RequestOptions`]: per-call headers, cookies, query, body and timeouts.
//! - [`Response`]: status, collapsed headers, cookies and redirect history.
//! - [`AssetManager`]: downloads and records the engine binary for this
//!   platform.
//!
//! # Examples
//!
//! ```no_run
//! use tls_bridge::{ClientIdentifier, RequestOptions, Session};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), tls_bridge::ClientError> {
//! let mut session = Session::builder()
//!     .client(ClientIdentifier::Chrome120)
//!     .random_tls_extension_order(true)
//!     .build();
//!
//! let response = session
//!     .post(
//!         "https://httpbin.org/post",
//!         RequestOptions::new().json(&json!({"name": "value"}))?,
//!     )
//!     .await?;
//! println!("{response}: {}", response.text());
//! # Ok(())
//! # }
//! ```
//!
//! Installing the engine ahead of time:
//!
//! ```no_run
//! use tls_bridge::{AssetConfig, AssetManager};
//!
//! # async fn example() -> Result<(), tls_bridge::ClientError> {
//! let manager = AssetManager::new(AssetConfig::load()?)?;
//! let record = manager.download_if_necessary().await?;
//! println!("installed {} {}", record.filename, record.version);
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod config;
pub mod cookies;
pub mod error;
pub mod gateway;
pub mod headers;
#[cfg(feature = "native")]
pub mod native;
pub mod request;
pub mod response;
pub mod session;
#[cfg(feature = "test-utils")]
pub mod test_support;

pub use asset::{AssetManager, AssetRecord, Platform, Release, ReleaseAsset, UpdateOutcome};
pub use config::AssetConfig;
pub use cookies::{Cookie, CookieJar};
pub use error::ClientError;
pub use gateway::{destroy_all, install_shared_gateway, shared_gateway};
pub use headers::HeaderMap;
pub use request::{Proxy, RequestBody, RequestOptions};
pub use response::{HeaderField, Response};
pub use session::{Fingerprint, Session, SessionBuilder, TransportSettings};

pub use tls_bridge_sdk::{
    ClientIdentifier, CustomTlsClient, DestroyOutcome, PriorityFrame, PriorityParam,
    TransportGateway, TransportOptions,
};
