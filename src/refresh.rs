/// Refresh-token exchange
use crate::classify::Classifier;
use crate::config::ClientConfig;
use crate::credential::{now_secs, Credential, CredentialStore, TokenResponse};
use crate::error::{ApiError, Outcome};
use crate::events::{ClearReason, CredentialEvent, Listeners};
use crate::renewal::Renewal;
use crate::transport::{redacted_headers, HttpRequest, HttpTransport, Method};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Exchanges refresh tokens and owns every credential mutation
///
/// Persisting a credential always precedes re-arming renewal, and clearing a
/// credential always cancels renewal.
pub struct TokenRefresher<S: CredentialStore> {
    config: Arc<ClientConfig>,
    token_url: String,
    store: Arc<S>,
    transport: Arc<dyn HttpTransport>,
    renewal: Renewal,
    pub(crate) classifier: Arc<Classifier>,
    listeners: Listeners,
}

impl<S: CredentialStore> TokenRefresher<S> {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        token_url: String,
        store: Arc<S>,
        transport: Arc<dyn HttpTransport>,
        renewal: Renewal,
        classifier: Arc<Classifier>,
        listeners: Listeners,
    ) -> Self {
        Self {
            config,
            token_url,
            store,
            transport,
            renewal,
            classifier,
            listeners,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange `current`'s refresh token for a new credential
    ///
    /// A rejected grant clears the stored credential and cancels renewal.
    /// Transport failures and server errors leave everything untouched.
    pub fn refresh(&self, current: &Credential) -> Outcome<Credential> {
        let request = self.token_request(&current.refresh_token);

        debug!(url = %self.token_url, "refreshing access token");
        if self.config.debug {
            debug!(headers = ?redacted_headers(&request.headers), "token request");
        }

        let response = self.transport.send(&request).map_err(|e| {
            warn!(error = %e, timed_out = e.timed_out, "token request failed");
            ApiError::from(e)
        })?;

        if !response.is_success() {
            let err = self.classifier.classify_token(response.status, &response.body);
            if err.kind.clears_credentials() {
                warn!(
                    status = response.status,
                    error = %err.message,
                    "refresh token rejected, clearing credentials"
                );
                self.wipe(ClearReason::Rejected(err.kind));
            } else {
                warn!(status = response.status, error = %err.message, "token endpoint error");
            }
            return Err(err);
        }

        let token: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            ApiError::remote(response.status, format!("Invalid token response: {}", e))
        })?;

        if !token.is_complete() {
            return Err(ApiError::remote(
                response.status,
                "Token response is missing access_token or refresh_token",
            ));
        }

        let credential = self.persist(&token)?;
        self.listeners.emit(&CredentialEvent::Refreshed);
        info!(expires_at = ?credential.expires_at, "access token refreshed");

        Ok(credential)
    }

    /// Store a complete token response and arm renewal for it
    pub(crate) fn persist(&self, token: &TokenResponse) -> Outcome<Credential> {
        let credential = Credential::from_response(token, now_secs());

        self.store.save(&credential).map_err(|e| {
            error!(error = %e, "failed to persist credential");
            ApiError::from(e)
        })?;
        self.renewal.arm(&credential);

        Ok(credential)
    }

    /// Delete the stored credential and cancel renewal
    pub(crate) fn wipe(&self, reason: ClearReason) {
        if let Err(e) = self.store.delete() {
            error!(error = %e, "failed to delete credential");
        }
        self.renewal.disarm();
        self.listeners.emit(&CredentialEvent::Cleared { reason });
    }

    fn token_request(&self, refresh_token: &str) -> HttpRequest {
        let mut body = json!({
            "client_id": self.config.client_id,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        if let Some(secret) = &self.config.client_secret {
            body["client_secret"] = json!(secret);
        }

        HttpRequest {
            method: Method::Post,
            url: self.token_url.clone(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("User-Agent".to_string(), self.config.user_agent()),
            ],
            body: Some(body.to_string()),
        }
    }
}
