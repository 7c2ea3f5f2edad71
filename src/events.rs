/// Credential lifecycle notifications
use crate::error::ErrorKind;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEvent {
    /// A bootstrap credential was adopted
    Stored,
    Refreshed,
    /// Credentials were removed; the client is now unauthenticated
    Cleared { reason: ClearReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The remote rejected the credential with this kind
    Rejected(ErrorKind),
    /// The caller asked for the credential to be forgotten
    Manual,
}

pub type Listener = Arc<dyn Fn(&CredentialEvent) + Send + Sync>;

/// Synchronous fan-out of credential events
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    inner: Arc<RwLock<Vec<Listener>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) {
        self.inner.write().push(listener);
    }

    pub(crate) fn emit(&self, event: &CredentialEvent) {
        // Listeners may register further listeners
        let listeners: Vec<Listener> = self.inner.read().clone();
        for listener in listeners {
            listener(event);
        }
    }
}
