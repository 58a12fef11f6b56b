//! Adapter configuration and builder.

use crate::error::{AdapterError, Result};
use std::time::Duration;

/// Settings the adapter needs beyond the client transport.
///
/// Passed explicitly to every component; nothing reads ambient state.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Storage root under which `<schema>/<identifier>/` locations are derived
    pub location: String,
    /// Principal granted access to schemas created by the adapter
    pub role_arn: String,
    /// Catalog (account) id used for table wildcard grants
    pub catalog_id: Option<String>,
    /// Interactive session statements are submitted to
    pub session_id: String,
    /// Lock table for transactional copy-on-write commits
    pub commit_lock_table: String,
    /// Prefix of the derived manifest tables of the legacy format; no
    /// manifest sync happens when unset
    pub manifest_table_prefix: Option<String>,
    /// Description attached to created databases
    pub database_description: String,
    /// Idle sessions kept for reuse
    pub max_idle_sessions: usize,
    /// Sessions checked out at once; further acquisitions wait
    pub max_sessions: usize,
    /// How long an acquisition waits for a free session
    pub session_acquire_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            role_arn: String::new(),
            catalog_id: None,
            session_id: String::new(),
            commit_lock_table: "myGlueLockTable".to_string(),
            manifest_table_prefix: None,
            database_description: "dbt database".to_string(),
            max_idle_sessions: 4,
            max_sessions: 8,
            session_acquire_timeout: Duration::from_secs(300),
        }
    }
}

impl AdapterConfig {
    /// Create a new configuration builder.
    pub fn builder(location: impl Into<String>) -> AdapterConfigBuilder {
        AdapterConfigBuilder::new(location)
    }

    /// Storage root without trailing slash.
    pub fn root(&self) -> &str {
        self.location.trim_end_matches('/')
    }

    /// Default location of a schema: `<root>/<schema>/`.
    pub fn schema_location(&self, schema: &str) -> String {
        format!("{}/{}/", self.root(), schema)
    }

    /// Default location of a table: `<root>/<schema>/<identifier>/`.
    pub fn table_location(&self, schema: &str, identifier: &str) -> String {
        format!("{}/{}/{}/", self.root(), schema, identifier)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.location.is_empty() {
            return Err(AdapterError::Config("location cannot be empty".to_string()));
        }

        url::Url::parse(&self.location)
            .map_err(|e| AdapterError::Config(format!("Invalid location: {}", e)))?;

        if self.session_id.is_empty() {
            return Err(AdapterError::Config("session_id cannot be empty".to_string()));
        }

        if self.max_sessions == 0 {
            return Err(AdapterError::Config("max_sessions must be at least 1".to_string()));
        }

        if self.session_acquire_timeout.is_zero() {
            return Err(AdapterError::Config(
                "session_acquire_timeout must be positive".to_string(),
            ));
        }

        if let Some(ref prefix) = self.manifest_table_prefix {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(AdapterError::Config(format!(
                    "manifest_table_prefix must be a non-empty identifier, got '{}'",
                    prefix
                )));
            }
        }

        Ok(())
    }
}

/// Builder for adapter configuration.
#[derive(Debug)]
pub struct AdapterConfigBuilder {
    config: AdapterConfig,
}

impl AdapterConfigBuilder {
    /// Create a new builder with the given storage root.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            config: AdapterConfig {
                location: location.into(),
                ..Default::default()
            },
        }
    }

    /// Set the principal granted access to created schemas.
    pub fn role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.config.role_arn = role_arn.into();
        self
    }

    /// Set the catalog (account) id.
    pub fn catalog_id(mut self, catalog_id: impl Into<String>) -> Self {
        self.config.catalog_id = Some(catalog_id.into());
        self
    }

    /// Set the interactive session id.
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.session_id = session_id.into();
        self
    }

    /// Set the commit lock table.
    pub fn commit_lock_table(mut self, table: impl Into<String>) -> Self {
        self.config.commit_lock_table = table.into();
        self
    }

    /// Enable manifest sync for the legacy format with the given table prefix.
    pub fn manifest_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.manifest_table_prefix = Some(prefix.into());
        self
    }

    /// Set the description attached to created databases.
    pub fn database_description(mut self, description: impl Into<String>) -> Self {
        self.config.database_description = description.into();
        self
    }

    /// Set the number of idle sessions kept for reuse.
    pub fn max_idle_sessions(mut self, max: usize) -> Self {
        self.config.max_idle_sessions = max;
        self
    }

    /// Set the number of sessions that may be checked out at once.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Set how long an acquisition waits for a free session.
    pub fn session_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_acquire_timeout = timeout;
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<AdapterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
