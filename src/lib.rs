//! kitapi - Resilient OAuth 2.0 client core for a marketing-automation API
//!
//! Every remote call a plugin makes (forms, subscribers, tags, sequences,
//! products, gated content) goes through [`client::ApiClient`], which keeps
//! the OAuth credential healthy on the caller's behalf.
//!
//! # Features
//!
//! - Bearer authentication with one transparent refresh-and-retry on expiry
//! - Credential wipe when the access token or refresh grant is unusable
//! - Proactive renewal scheduled at the exact token expiry
//! - Pluggable credential storage (memory, file, OS keyring)
//! - Pluggable transport and scheduler
//!
//! # Example
//!
//! ```
//! use kitapi::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryCredentialStore::new());
//! let scheduler = Arc::new(MemoryScheduler::new());
//! let config = ClientConfig::new("your-client-id", "MyPlugin", "1.0.0");
//!
//! let client = ApiClient::new(config, store, scheduler).unwrap();
//!
//! // Nothing is stored yet, so no request is sent
//! let err = client.get("account").unwrap_err();
//! assert_eq!(err.kind, ErrorKind::TokenInvalid);
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod refresh;
pub mod renewal;
pub mod request;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classify::Classifier;
    pub use crate::client::ApiClient;
    pub use crate::config::ClientConfig;
    pub use crate::credential::{
        Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore,
        SecureCredentialStore, TokenResponse,
    };
    pub use crate::error::{ApiError, ErrorKind, Outcome};
    pub use crate::events::{ClearReason, CredentialEvent};
    pub use crate::request::OutgoingRequest;
    pub use crate::scheduler::{MemoryScheduler, Scheduler, TimerScheduler};
    pub use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
}
