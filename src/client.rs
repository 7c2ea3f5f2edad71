//! # Resilient API client
//!
//! [`ApiClient`] is the single path every feature takes to the remote API.
//! It attaches the stored bearer credential, recognises an expired access
//! token and recovers from it with exactly one refresh and one retry, and
//! clears credentials when the remote reports them unusable.
//!
//! ```no_run
//! use kitapi::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileCredentialStore::new("my-plugin").unwrap());
//! let scheduler = Arc::new(TimerScheduler::for_app("my-plugin").unwrap());
//! let config = ClientConfig::new("client-id", "MyPlugin", "1.0.0");
//!
//! let client = Arc::new(ApiClient::new(config, store, scheduler.clone()).unwrap());
//! scheduler.set_handler(ApiClient::renewal_handler(&client));
//!
//! match client.get("account") {
//!     Ok(account) => println!("{}", account),
//!     Err(e) => eprintln!("{}", e.user_message(false)),
//! }
//! ```

use crate::classify::Classifier;
use crate::config::ClientConfig;
use crate::credential::{now_secs, Credential, CredentialStore, TokenResponse};
use crate::error::{ApiError, ConfigError, ErrorKind, Outcome};
use crate::events::{ClearReason, CredentialEvent, Listener, Listeners};
use crate::refresh::TokenRefresher;
use crate::renewal::Renewal;
use crate::request::OutgoingRequest;
use crate::scheduler::{JobHandler, Scheduler};
use crate::transport::{redacted_headers, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Delay before a renewal job that failed for a transient reason runs again
const RENEWAL_RETRY: Duration = Duration::from_secs(60);

pub struct ApiClient<S: CredentialStore> {
    config: Arc<ClientConfig>,
    api_root: Url,
    store: Arc<S>,
    transport: Arc<dyn HttpTransport>,
    classifier: Arc<Classifier>,
    refresher: TokenRefresher<S>,
    renewal: Renewal,
    listeners: Listeners,
}

impl<S: CredentialStore + 'static> ApiClient<S> {
    /// Create a client using the blocking `reqwest` transport
    pub fn new(
        config: ClientConfig,
        store: Arc<S>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Self::with_transport(config, store, transport, scheduler)
    }

    /// Create a client with a caller-supplied transport
    pub fn with_transport(
        config: ClientConfig,
        store: Arc<S>,
        transport: Arc<dyn HttpTransport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let base = config.base()?;
        let invalid = |reason: url::ParseError| ConfigError::InvalidUrl {
            url: config.base_url.clone(),
            reason: reason.to_string(),
        };
        let token_url = base.join(&config.token_path).map_err(invalid)?;
        let api_root = base
            .join(&format!("{}/", config.api_prefix.trim_matches('/')))
            .map_err(invalid)?;

        let config = Arc::new(config);
        let classifier = Arc::new(Classifier::default());
        let listeners = Listeners::default();
        let renewal = Renewal::new(
            scheduler,
            config.renewal_job_id.clone(),
            config.renewal_margin,
        );
        let refresher = TokenRefresher::new(
            config.clone(),
            token_url.to_string(),
            store.clone(),
            transport.clone(),
            renewal.clone(),
            classifier.clone(),
            listeners.clone(),
        );

        Ok(Self {
            config,
            api_root,
            store,
            transport,
            classifier,
            refresher,
            renewal,
            listeners,
        })
    }

    /// Replace the expired/invalid message markers
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        let classifier = Arc::new(classifier);
        self.refresher.classifier = classifier.clone();
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn refresher(&self) -> &TokenRefresher<S> {
        &self.refresher
    }

    pub fn renewal(&self) -> &Renewal {
        &self.renewal
    }

    /// Execute a request, recovering once from an expired access token
    ///
    /// Performs at most two API round-trips and one token exchange, and
    /// mutates the stored credential at most once.
    pub fn execute(&self, request: &OutgoingRequest) -> Outcome<Value> {
        let credential = if request.requires_auth {
            match self.store.get()? {
                Some(credential) => Some(credential),
                None => {
                    debug!(path = %request.path, "no stored credential");
                    return Err(ApiError::token_invalid(
                        "No access token is stored; authorization is required",
                    ));
                }
            }
        } else {
            None
        };

        let response = self.send(request, credential.as_ref())?;
        if response.is_success() {
            return decode(&response);
        }

        let err = self
            .classifier
            .classify_api(response.status, &response.body, request.requires_auth);

        match (err.kind, credential) {
            (ErrorKind::TokenExpired, Some(credential)) => {
                info!(path = %request.path, "access token expired, refreshing");
                let refreshed = self.refresher.refresh(&credential)?;
                let retry = self.send(request, Some(&refreshed))?;
                self.finish(request, retry)
            }
            (ErrorKind::TokenInvalid, Some(_)) => {
                warn!(path = %request.path, error = %err.message, "access token invalid, clearing credentials");
                self.refresher
                    .wipe(ClearReason::Rejected(ErrorKind::TokenInvalid));
                Err(err)
            }
            _ => {
                debug!(path = %request.path, kind = %err.kind, error = %err.message, "request failed");
                Err(err)
            }
        }
    }

    pub fn get(&self, path: &str) -> Outcome<Value> {
        self.execute(&OutgoingRequest::get(path))
    }

    pub fn post(&self, path: &str, body: Value) -> Outcome<Value> {
        self.execute(&OutgoingRequest::post(path, body))
    }

    pub fn put(&self, path: &str, body: Value) -> Outcome<Value> {
        self.execute(&OutgoingRequest::put(path, body))
    }

    pub fn delete(&self, path: &str) -> Outcome<Value> {
        self.execute(&OutgoingRequest::delete(path))
    }

    /// Force a refresh using whatever credential is currently stored
    ///
    /// With no stored credential, renewal is cancelled and `TokenInvalid` is
    /// returned without a network call.
    pub fn refresh(&self) -> Outcome<Credential> {
        match self.store.get()? {
            Some(current) => self.refresher.refresh(&current),
            None => {
                self.renewal.disarm();
                Err(ApiError::token_invalid(
                    "No refresh token is stored; authorization is required",
                ))
            }
        }
    }

    /// Body of the scheduled renewal job
    ///
    /// Hosts that drive their own cron call this when the renewal job fires.
    /// A transient failure schedules another attempt shortly after.
    pub fn run_renewal(&self) -> Outcome<Credential> {
        debug!(job = %self.renewal.job_id(), "running scheduled renewal");

        let result = self.refresh();
        if let Err(e) = &result {
            warn!(kind = %e.kind, error = %e.message, "scheduled renewal failed");
            if matches!(
                e.kind,
                ErrorKind::TransportError { .. } | ErrorKind::RemoteError { .. } | ErrorKind::Storage
            ) {
                self.renewal
                    .arm_at(now_secs().saturating_add(RENEWAL_RETRY.as_secs()));
            }
        }
        result
    }

    /// Job handler to register with a scheduler
    ///
    /// Holds only a weak reference, so the scheduler never keeps the client
    /// alive. Jobs with other ids are ignored.
    pub fn renewal_handler(client: &Arc<Self>) -> JobHandler {
        let weak = Arc::downgrade(client);
        let job_id = client.renewal.job_id().to_string();

        Arc::new(move |fired: &str| {
            if fired != job_id {
                return;
            }
            if let Some(client) = weak.upgrade() {
                let _ = client.run_renewal();
            }
        })
    }

    /// Adopt the credential produced by the initial authorization exchange
    pub fn adopt(&self, response: TokenResponse) -> Outcome<Credential> {
        if !response.is_complete() {
            return Err(ApiError::token_invalid(
                "Token response is missing access_token or refresh_token",
            ));
        }

        let credential = self.refresher.persist(&response)?;
        self.listeners.emit(&CredentialEvent::Stored);
        info!(expires_at = ?credential.expires_at, "credentials stored");
        if credential.is_expired() {
            warn!("adopted credential is already expired, renewal runs immediately");
        }

        Ok(credential)
    }

    /// Delete the stored credential and cancel renewal
    pub fn forget_credentials(&self) {
        info!("forgetting credentials");
        self.refresher.wipe(ClearReason::Manual);
    }

    /// Cancel renewal without touching credentials
    pub fn deprovision(&self) {
        info!("deprovisioning renewal");
        self.renewal.disarm();
    }

    pub fn credential(&self) -> Outcome<Option<Credential>> {
        Ok(self.store.get()?)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.get(), Ok(Some(_)))
    }

    /// Register a callback for credential lifecycle events
    pub fn on_credentials_changed(&self, listener: Listener) {
        self.listeners.add(listener);
    }

    fn finish(&self, request: &OutgoingRequest, response: HttpResponse) -> Outcome<Value> {
        if response.is_success() {
            return decode(&response);
        }

        let err = self
            .classifier
            .classify_api(response.status, &response.body, request.requires_auth);
        debug!(path = %request.path, kind = %err.kind, error = %err.message, "retry failed");
        Err(err)
    }

    fn send(
        &self,
        request: &OutgoingRequest,
        credential: Option<&Credential>,
    ) -> Outcome<HttpResponse> {
        let http = self.build(request, credential)?;

        debug!(method = http.method.as_str(), url = %http.url, "sending request");
        if self.config.debug {
            debug!(headers = ?redacted_headers(&http.headers), body = ?http.body, "request detail");
        }

        let response = self.transport.send(&http).map_err(|e| {
            warn!(url = %http.url, error = %e, timed_out = e.timed_out, "request failed");
            ApiError::from(e)
        })?;

        debug!(status = response.status, url = %http.url, "received response");
        if self.config.debug {
            debug!(body = %response.body, "response detail");
        }

        Ok(response)
    }

    fn build(
        &self,
        request: &OutgoingRequest,
        credential: Option<&Credential>,
    ) -> Outcome<HttpRequest> {
        let invalid_path = |reason: String| {
            ApiError::new(
                ErrorKind::TransportError { timed_out: false },
                format!("Invalid request path {}: {}", request.path, reason),
            )
        };
        let mut url = self
            .api_root
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| invalid_path(e.to_string()))?;
        // The bearer token only ever goes to the configured API host
        if url.origin() != self.api_root.origin() {
            warn!(path = %request.path, "refusing request outside the API origin");
            return Err(invalid_path("must stay on the API host".to_string()));
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.config.user_agent()),
        ];
        if request.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(credential) = credential {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", credential.access_token),
            ));
        }

        Ok(HttpRequest {
            method: request.method,
            url: url.to_string(),
            headers,
            body: request.body.as_ref().map(Value::to_string),
        })
    }
}

fn decode(response: &HttpResponse) -> Outcome<Value> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&response.body).map_err(|e| {
        ApiError::remote(response.status, format!("Invalid JSON response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::events::CredentialEvent;
    use crate::testing::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_success_attaches_bearer_and_user_agent() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond("/v4/account", 200, r#"{"account":{"id":1}}"#),
        );

        let value = h.client.get("account").unwrap();
        assert_eq!(value, json!({"account": {"id": 1}}));

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://api.example.test/v4/account");
        assert_eq!(requests[0].header("authorization"), Some("Bearer OLD_A"));
        assert_eq!(requests[0].header("user-agent"), Some("TestPlugin/1.2.3"));
    }

    #[test]
    fn test_query_and_body_encoding() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/forms", 200, "{}")
                .respond("/v4/subscribers", 201, ""),
        );

        let request = OutgoingRequest::get("/forms").with_query("status", "active archived");
        h.client.execute(&request).unwrap();

        let created = h
            .client
            .post("subscribers", json!({"email_address": "a@example.com"}))
            .unwrap();
        assert_eq!(created, Value::Null);

        let requests = h.transport.requests();
        assert_eq!(
            requests[0].url,
            "https://api.example.test/v4/forms?status=active+archived"
        );
        assert_eq!(requests[1].header("content-type"), Some("application/json"));
        assert_eq!(
            requests[1].body.as_deref(),
            Some(r#"{"email_address":"a@example.com"}"#)
        );
    }

    #[test]
    fn test_missing_credential_fails_without_network() {
        let h = harness(None, ScriptedTransport::new().respond("/v4/account", 200, "{}"));

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
        assert!(h.transport.requests().is_empty());
    }

    #[test]
    fn test_public_request_has_no_bearer() {
        let h = harness(None, ScriptedTransport::new().respond("/v4/forms", 200, "[]"));

        let value = h
            .client
            .execute(&OutgoingRequest::get("forms").public())
            .unwrap();
        assert_eq!(value, json!([]));
        assert_eq!(h.transport.requests()[0].header("authorization"), None);
    }

    #[test]
    fn test_expired_token_is_refreshed_and_retried() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, EXPIRED_BODY)
                .respond("/v4/account", 200, r#"{"ok":true}"#)
                .respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );

        let value = h.client.get("account").unwrap();
        assert_eq!(value, json!({"ok": true}));

        let credential = h.store.get().unwrap().unwrap();
        assert_eq!(credential.access_token, "NEW_A");
        assert_eq!(credential.refresh_token, "NEW_R");
        assert_eq!(credential.expires_at, Some(T0 + 10_000));

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].header("authorization"), Some("Bearer NEW_A"));

        let token_request: Value =
            serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(token_request["grant_type"], "refresh_token");
        assert_eq!(token_request["refresh_token"], "OLD_R");
        assert_eq!(token_request["client_id"], "test-client");

        assert_eq!(h.scheduler.next_run(h.client.renewal().job_id()), Some(T0 + 10_000));
    }

    #[test]
    fn test_retry_happens_at_most_once() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, EXPIRED_BODY)
                .respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpired);
        assert_eq!(err.message, "The access token expired");

        assert_eq!(h.transport.calls_to("/v4/account"), 2);
        assert_eq!(h.transport.calls_to(TOKEN_PATH), 1);
        assert_eq!(h.store.get_access_token().unwrap().as_deref(), Some("NEW_A"));
    }

    #[test]
    fn test_invalid_retry_response_is_returned_as_is() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, EXPIRED_BODY)
                .respond("/v4/account", 401, INVALID_BODY)
                .respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);

        // The refresh was the single credential mutation for this call
        assert_eq!(h.store.get_access_token().unwrap().as_deref(), Some("NEW_A"));
        assert!(h.client.renewal().is_armed());
    }

    #[test]
    fn test_invalid_token_clears_credentials_without_refresh() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, INVALID_BODY)
                .respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );
        h.client.renewal().arm(&stored());

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
        assert_eq!(err.message, "The access token is invalid");

        assert_eq!(h.transport.calls_to(TOKEN_PATH), 0);
        assert!(h.store.get_access_token().unwrap().is_none());
        assert!(h.store.get_refresh_token().unwrap().is_none());
        assert!(h.store.get_token_expiry().unwrap().is_none());
        assert!(!h.client.renewal().is_armed());
    }

    #[test]
    fn test_refresh_rejection_during_execute() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, EXPIRED_BODY)
                .respond(TOKEN_PATH, 400, grant_body()),
        );

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RefreshGrantInvalid);
        assert_eq!(err.message, GRANT_MESSAGE);
        assert_eq!(h.transport.calls_to("/v4/account"), 1);
        assert!(h.store.get().unwrap().is_none());
    }

    #[test]
    fn test_rate_limited_refresh_during_execute_keeps_credentials() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, EXPIRED_BODY)
                .respond(TOKEN_PATH, 429, r#"{"errors":["Too many requests"]}"#),
        );
        h.client.renewal().arm(&stored());

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteError { status: 429 });
        assert_eq!(err.message, "Too many requests");
        assert_eq!(h.store.get().unwrap(), Some(stored()));
        assert_eq!(h.client.renewal().next_run(), Some(T0 + 3600));
    }

    #[test]
    fn test_paths_cannot_leave_the_api_host() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond("/steal", 200, "{}"),
        );

        for path in ["https://attacker.example/steal", "http://api.example.test/v4/steal"] {
            let err = h.client.get(path).unwrap_err();
            assert_eq!(err.kind, ErrorKind::TransportError { timed_out: false }, "{}", path);
        }
        assert!(h.transport.requests().is_empty());
        assert_eq!(h.store.get().unwrap(), Some(stored()));

        // Leading slashes are stripped, so this resolves under the API root
        h.client.get("//attacker.example/steal").unwrap();
        let requests = h.transport.requests();
        assert_eq!(requests[0].url, "https://api.example.test/v4/attacker.example/steal");
    }

    #[test]
    fn test_remote_and_transport_errors_leave_credentials() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/subscribers", 422, r#"{"errors":["Email address is invalid"]}"#)
                .respond("/v4/tags", 503, "")
                .fail("/v4/forms", TransportError::timeout("operation timed out")),
        );

        let err = h.client.post("subscribers", json!({})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteError { status: 422 });
        assert_eq!(err.message, "Email address is invalid");

        let err = h.client.get("tags").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteError { status: 503 });

        let err = h.client.get("forms").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransportError { timed_out: true });

        assert_eq!(h.store.get().unwrap(), Some(stored()));
        assert_eq!(h.transport.calls_to(TOKEN_PATH), 0);
    }

    #[test]
    fn test_non_json_success_body() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond("/v4/account", 200, "<html>"),
        );

        let err = h.client.get("account").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteError { status: 200 });
    }

    #[test]
    fn test_custom_classifier() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new()
                .respond("/v4/account", 401, r#"{"errors":["Token lapsed"]}"#)
                .respond("/v4/account", 200, "{}")
                .respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );
        let client = Arc::try_unwrap(h.client)
            .ok()
            .unwrap()
            .with_classifier(Classifier::with_markers(["lapsed"], ["revoked"]));

        assert!(client.get("account").is_ok());
        assert_eq!(h.transport.calls_to(TOKEN_PATH), 1);
    }

    #[test]
    fn test_forced_refresh_and_renewal_job() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );

        let credential = h.client.refresh().unwrap();
        assert_eq!(credential.access_token, "NEW_A");

        // The job reads the store at fire time rather than a captured credential
        h.store
            .save(&Credential::new("MANUAL_A", "MANUAL_R", Some(T0 + 500)))
            .unwrap();
        h.client.run_renewal().unwrap();

        let requests = h.transport.requests();
        let body: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["refresh_token"], "MANUAL_R");
    }

    #[test]
    fn test_renewal_without_credential_disarms() {
        let h = harness(None, ScriptedTransport::new());
        h.scheduler
            .schedule_once(h.client.renewal().job_id(), T0)
            .unwrap();

        let err = h.client.run_renewal().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
        assert!(h.transport.requests().is_empty());
        assert!(!h.client.renewal().is_armed());
    }

    #[test]
    fn test_transient_renewal_failure_schedules_retry() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond(TOKEN_PATH, 500, "oops"),
        );

        let before = now_secs();
        let err = h.client.run_renewal().unwrap_err();
        assert_eq!(err.kind, ErrorKind::RemoteError { status: 500 });

        let next = h.client.renewal().next_run().unwrap();
        assert!(next >= before + RENEWAL_RETRY.as_secs());
        assert_eq!(h.store.get().unwrap(), Some(stored()));
    }

    #[test]
    fn test_renewal_handler_ignores_other_jobs() {
        let h = harness(
            Some(stored()),
            ScriptedTransport::new().respond(TOKEN_PATH, 200, token_body("NEW_A", "NEW_R", T0, 10_000)),
        );
        let handler = ApiClient::renewal_handler(&h.client);

        handler("some_other_job");
        assert!(h.transport.requests().is_empty());

        handler(h.client.renewal().job_id());
        assert_eq!(h.transport.calls_to(TOKEN_PATH), 1);
    }

    #[test]
    fn test_adopt_forget_and_deprovision() {
        let h = harness(None, ScriptedTransport::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        h.client
            .on_credentials_changed(Arc::new(move |event: &CredentialEvent| {
                seen.lock().push(event.clone());
            }));

        let response: TokenResponse =
            serde_json::from_str(&token_body("A", "R", T0, 10_000)).unwrap();
        h.client.adopt(response).unwrap();
        assert!(h.client.is_authenticated());
        assert_eq!(h.client.renewal().next_run(), Some(T0 + 10_000));

        h.client.deprovision();
        assert!(!h.client.renewal().is_armed());
        assert!(h.client.is_authenticated());
        h.client.deprovision();

        h.client.forget_credentials();
        assert!(!h.client.is_authenticated());

        assert_eq!(
            *events.lock(),
            vec![
                CredentialEvent::Stored,
                CredentialEvent::Cleared {
                    reason: ClearReason::Manual
                },
            ]
        );
    }

    #[test]
    fn test_adopt_rejects_partial_response() {
        let h = harness(None, ScriptedTransport::new());
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","refresh_token":" "}"#).unwrap();

        let err = h.client.adopt(response).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);
        assert!(h.store.get().unwrap().is_none());
        assert_eq!(h.scheduler.job_count(), 0);
    }

    #[test]
    fn test_construction_rejects_bad_config() {
        let store = Arc::new(crate::credential::MemoryCredentialStore::new());
        let scheduler = Arc::new(crate::scheduler::MemoryScheduler::new());
        let config = ClientConfig::new("", "Plugin", "1.0");

        assert!(ApiClient::with_transport(
            config,
            store,
            Arc::new(ScriptedTransport::new()),
            scheduler
        )
        .is_err());
    }
}
