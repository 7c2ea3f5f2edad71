/// Client configuration
use crate::error::ConfigError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.kit.com";
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";
pub const DEFAULT_API_PREFIX: &str = "v4";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RENEWAL_JOB_ID: &str = "kitapi_refresh_token";

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub base_url: String,
    pub token_path: String,
    pub api_prefix: String,
    /// Name sent in the `User-Agent` header
    pub product_name: String,
    pub product_version: String,
    /// Upper bound for every network call
    pub timeout: Duration,
    /// How long before expiry the renewal job runs
    pub renewal_margin: Duration,
    pub renewal_job_id: String,
    /// Log request and response bodies (tokens redacted)
    pub debug: bool,
}

impl ClientConfig {
    pub fn new(
        client_id: impl Into<String>,
        product_name: impl Into<String>,
        product_version: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            product_name: product_name.into(),
            product_version: product_version.into(),
            timeout: DEFAULT_TIMEOUT,
            renewal_margin: Duration::ZERO,
            renewal_job_id: DEFAULT_RENEWAL_JOB_ID.to_string(),
            debug: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_renewal_margin(mut self, margin: Duration) -> Self {
        self.renewal_margin = margin;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check the configuration for programmer errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.product_name.trim().is_empty() {
            return Err(ConfigError::MissingField("product_name"));
        }
        if self.product_version.trim().is_empty() {
            return Err(ConfigError::MissingField("product_version"));
        }
        if self.renewal_job_id.trim().is_empty() {
            return Err(ConfigError::MissingField("renewal_job_id"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.base()?;
        Ok(())
    }

    /// `<ProductName>/<Version>`
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.product_name, self.product_version)
    }

    pub(crate) fn base(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: self.base_url.clone(),
                reason: "not a base URL".to_string(),
            });
        }

        Ok(url)
    }
}
