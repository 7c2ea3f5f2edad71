/// Credential model and pluggable credential storage
use crate::error::StoreError;
use keyring::Entry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const CREDENTIALS_FILE: &str = "credentials.json";
const KEYRING_ACCOUNT: &str = "credentials";

/// Current time as epoch seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Stored OAuth credential
///
/// Always persisted and deleted as one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "token_expires")]
    pub expires_at: Option<u64>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<u64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Build a credential from a token endpoint response
    ///
    /// The expiry is the issuance instant plus the declared lifetime. `now` is
    /// used as the issuance instant when the server omits `created_at`.
    pub fn from_response(response: &TokenResponse, now: u64) -> Self {
        let issued_at = response.created_at.unwrap_or(now);
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: response
                .expires_in
                .map(|lifetime| issued_at.saturating_add(lifetime)),
        }
    }

    /// Check if the access token is past its expiry
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs() >= expires_at,
            None => false,
        }
    }
}

/// Success body of the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// A response that would persist an unusable credential
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

/// Durable storage for the client's credential
///
/// Implementations must replace all fields in one write and clear all of them
/// in one delete.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<Credential>, StoreError>;

    fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Delete the credential; deleting an absent credential is not an error
    fn delete(&self) -> Result<(), StoreError>;

    fn get_access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get()?.map(|c| c.access_token))
    }

    fn get_refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get()?.map(|c| c.refresh_token))
    }

    fn get_token_expiry(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.get()?.and_then(|c| c.expires_at))
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        (**self).get()
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        (**self).save(credential)
    }

    fn delete(&self) -> Result<(), StoreError> {
        (**self).delete()
    }
}

/// In-memory credential store
///
/// Suitable for testing and short-lived processes. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    credential: Arc<RwLock<Option<Credential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Arc::new(RwLock::new(Some(credential))),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.credential.read().clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.credential.write() = Some(credential.clone());
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        self.credential.write().take();
        Ok(())
    }
}

/// File-based credential store using XDG conventions
///
/// The credential lives in a single JSON file that is replaced through a
/// rename, so readers never observe a partially written record.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store credentials under `<data_dir>/<app_name>/credentials.json`
    ///
    /// `$XDG_DATA_HOME` takes precedence over the platform data directory.
    pub fn new(app_name: &str) -> Result<Self, StoreError> {
        let base_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(xdg_data) => PathBuf::from(xdg_data),
            Err(_) => dirs::data_dir().ok_or(StoreError::NoDataDir)?,
        };

        Self::with_dir(base_dir.join(app_name))
    }

    pub fn with_dir(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(CREDENTIALS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(credential)?;
        let temp = self.temp_path();

        fs::write(&temp, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Credential store backed by the OS credential manager
///
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service API (libsecret)
///
/// The whole credential is one keyring secret, so updates are atomic.
#[derive(Debug, Clone)]
pub struct SecureCredentialStore {
    service: String,
}

impl SecureCredentialStore {
    pub fn new(app_name: &str) -> Self {
        Self {
            service: format!("kitapi-{}", app_name),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, KEYRING_ACCOUNT)?)
    }
}

impl CredentialStore for SecureCredentialStore {
    fn get(&self) -> Result<Option<Credential>, StoreError> {
        match self.entry()?.get_password() {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let json = serde_json::to_string(credential)?;
        self.entry()?.set_password(&json)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
