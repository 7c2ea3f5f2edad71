//! Shared fixtures for unit tests
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::credential::{Credential, MemoryCredentialStore};
use crate::error::TransportError;
use crate::scheduler::MemoryScheduler;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) const BASE_URL: &str = "https://api.example.test";
pub(crate) const TOKEN_PATH: &str = "/oauth/token";
pub(crate) const T0: u64 = 1_700_000_000;

pub(crate) const EXPIRED_BODY: &str = r#"{"errors":["The access token expired"]}"#;
pub(crate) const INVALID_BODY: &str = r#"{"errors":["The access token is invalid"]}"#;
pub(crate) const GRANT_MESSAGE: &str = "The provided authorization grant is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client.";

pub(crate) fn grant_body() -> String {
    json!({"error": "invalid_grant", "error_description": GRANT_MESSAGE}).to_string()
}

pub(crate) fn token_body(access: &str, refresh: &str, created_at: u64, expires_in: u64) -> String {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "created_at": created_at,
        "expires_in": expires_in,
        "scope": "public",
    })
    .to_string()
}

type Scripted = Result<HttpResponse, TransportError>;

/// Transport answering from per-path response queues
///
/// The last response queued for a path is repeated once the queue drains.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, path: &str, status: u16, body: impl Into<String>) -> Self {
        self.push(path, Ok(HttpResponse::new(status, body)))
    }

    pub(crate) fn fail(self, path: &str, error: TransportError) -> Self {
        self.push(path, Err(error))
    }

    fn push(self, path: &str, response: Scripted) -> Self {
        {
            let mut routes = self.routes.lock();
            match routes.iter_mut().find(|(route, _)| route == path) {
                Some((_, queue)) => queue.push_back(response),
                None => routes.push((path.to_string(), VecDeque::from([response]))),
            }
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| request_path(&r.url).ends_with(path))
            .count()
    }
}

fn request_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let path = request_path(&request.url);
        let mut routes = self.routes.lock();
        let queue = routes
            .iter_mut()
            .find(|(route, _)| path.ends_with(route.as_str()))
            .map(|(_, queue)| queue)
            .ok_or_else(|| TransportError::new(format!("no scripted response for {}", path)))?;

        if queue.len() > 1 {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("empty script")))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::new("empty script")))
        }
    }
}

pub(crate) struct Harness {
    pub client: Arc<ApiClient<MemoryCredentialStore>>,
    pub store: MemoryCredentialStore,
    pub scheduler: MemoryScheduler,
    pub transport: Arc<ScriptedTransport>,
}

pub(crate) fn harness(credential: Option<Credential>, transport: ScriptedTransport) -> Harness {
    let store = match credential {
        Some(credential) => MemoryCredentialStore::with_credential(credential),
        None => MemoryCredentialStore::new(),
    };
    let scheduler = MemoryScheduler::new();
    let transport = Arc::new(transport);
    let config = ClientConfig::new("test-client", "TestPlugin", "1.2.3").with_base_url(BASE_URL);

    let client = ApiClient::with_transport(
        config,
        Arc::new(store.clone()),
        transport.clone(),
        Arc::new(scheduler.clone()),
    )
    .unwrap();

    Harness {
        client: Arc::new(client),
        store,
        scheduler,
        transport,
    }
}

pub(crate) fn stored() -> Credential {
    Credential::new("OLD_A", "OLD_R", Some(T0 + 3600))
}
