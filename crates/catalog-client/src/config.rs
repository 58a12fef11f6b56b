//! Client configuration and builder pattern.

use crate::error::{ClientError, Result};
use std::fmt;
use std::time::Duration;

/// Configuration for the catalog client.
///
/// # Security
///
/// The `Debug` implementation masks the session token so it never shows up
/// in logs. The token is shown as `"***REDACTED***"` in debug output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Catalog service endpoint (e.g., "https://glue.eu-west-1.amazonaws.com")
    pub endpoint: String,
    /// Endpoint for permission grants; falls back to `endpoint` when unset
    pub permissions_endpoint: Option<String>,
    /// Region the endpoints belong to
    pub region: String,
    /// Optional bearer token, usually injected by a signing proxy
    pub session_token: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Maximum number of retries for transient failures (default: 3)
    pub max_retries: u32,
    /// Initial retry delay for exponential backoff (default: 100ms)
    pub retry_initial_delay: Duration,
    /// Maximum retry delay (default: 10 seconds)
    pub retry_max_delay: Duration,
    /// Delay between statement status polls (default: 1 second)
    pub statement_poll_interval: Duration,
    /// Upper bound on how long a single statement may run (default: 1 hour)
    pub statement_timeout: Duration,
    /// Whether to verify TLS certificates (default: true)
    pub tls_verify: bool,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://glue.us-east-1.amazonaws.com".to_string(),
            permissions_endpoint: None,
            region: "us-east-1".to_string(),
            session_token: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
            statement_poll_interval: Duration::from_secs(1),
            statement_timeout: Duration::from_secs(3600),
            tls_verify: true,
            user_agent: format!("lakebridge-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("permissions_endpoint", &self.permissions_endpoint)
            .field("region", &self.region)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "***REDACTED***"),
            )
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_initial_delay", &self.retry_initial_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("statement_poll_interval", &self.statement_poll_interval)
            .field("statement_timeout", &self.statement_timeout)
            .field("tls_verify", &self.tls_verify)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder(endpoint: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(endpoint)
    }

    /// Minimum allowed timeout value.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

    /// Endpoint used for permission grants.
    pub fn permissions_endpoint(&self) -> &str {
        self.permissions_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Config("endpoint cannot be empty".to_string()));
        }

        url::Url::parse(&self.endpoint)
            .map_err(|e| ClientError::Config(format!("Invalid endpoint: {}", e)))?;

        if let Some(ref permissions) = self.permissions_endpoint {
            url::Url::parse(permissions).map_err(|e| {
                ClientError::Config(format!("Invalid permissions_endpoint: {}", e))
            })?;
        }

        if self.region.is_empty() {
            return Err(ClientError::Config("region cannot be empty".to_string()));
        }

        if self.retry_initial_delay > self.retry_max_delay {
            return Err(ClientError::Config(format!(
                "retry_initial_delay ({:?}) must be <= retry_max_delay ({:?})",
                self.retry_initial_delay, self.retry_max_delay
            )));
        }

        if self.timeout < Self::MIN_TIMEOUT {
            return Err(ClientError::Config(format!(
                "timeout ({:?}) must be >= {:?}",
                self.timeout,
                Self::MIN_TIMEOUT
            )));
        }

        if self.statement_poll_interval.is_zero() {
            return Err(ClientError::Config(
                "statement_poll_interval must be > 0".to_string(),
            ));
        }

        if self.statement_timeout < self.statement_poll_interval {
            return Err(ClientError::Config(format!(
                "statement_timeout ({:?}) must be >= statement_poll_interval ({:?})",
                self.statement_timeout, self.statement_poll_interval
            )));
        }

        Ok(())
    }
}

/// Builder for client configuration.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                endpoint: endpoint.into(),
                ..Default::default()
            },
        }
    }

    /// Set a separate endpoint for permission grants.
    pub fn permissions_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.permissions_endpoint = Some(endpoint.into());
        self
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Set the bearer token sent with every request.
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config.session_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay for exponential backoff.
    pub fn retry_initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry_initial_delay = delay;
        self
    }

    /// Set the maximum retry delay.
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.retry_max_delay = delay;
        self
    }

    /// Set the delay between statement status polls.
    pub fn statement_poll_interval(mut self, interval: Duration) -> Self {
        self.config.statement_poll_interval = interval;
        self
    }

    /// Set the upper bound on statement run time.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.config.statement_timeout = timeout;
        self
    }

    /// Set whether to verify TLS certificates.
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.config.tls_verify = verify;
        self
    }

    /// Set a custom User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
