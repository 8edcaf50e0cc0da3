//! Test configuration builder for creating test setups quickly.

use uuid::Uuid;

use crate::config::{Configuration, DatabaseConfig, StaticTokenConfig, StorageConfig};

/// Builder for creating test configurations.
///
/// Provides a fluent API for configurations suitable for testing, with
/// sensible defaults that can be customized as needed.
///
/// # Example
///
/// ```rust,ignore
/// use common::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .in_memory()
///     .with_static_token("test-token", account_id, "person@example.com")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    /// Create a new test configuration builder starting from the crate
    /// defaults.
    pub fn new() -> Self {
        Self {
            config: Configuration::default(),
        }
    }

    /// Configure for fully in-memory operation (fastest for tests).
    ///
    /// This sets:
    /// - Database DSN to `sqlite::memory:`
    /// - Storage DSN to `memory://`
    pub fn in_memory(mut self) -> Self {
        self.config.database = DatabaseConfig::in_memory();
        self.config.storage = StorageConfig::in_memory();
        self
    }

    /// Add a static bearer token resolving to the given account.
    pub fn with_static_token(mut self, token: &str, account_id: Uuid, email: &str) -> Self {
        self.config.auth.static_tokens.push(StaticTokenConfig {
            token: token.to_string(),
            account_id,
            email: email.to_string(),
        });
        self
    }

    /// Set the database DSN.
    pub fn with_database_dsn(mut self, dsn: &str) -> Self {
        self.config.database.dsn = dsn.to_string();
        self
    }

    /// Set the storage DSN.
    pub fn with_storage_dsn(mut self, dsn: &str) -> Self {
        self.config.storage.dsn = dsn.to_string();
        self
    }

    /// Point the identity provider at a local base URL (no calls are made
    /// by tests that use the static provider, but the config stays valid).
    pub fn with_identity_base_url(mut self, base_url: &str) -> Self {
        self.config.identity.base_url = base_url.to_string();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Configuration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_builder() {
        let config = TestConfigBuilder::new().in_memory().build();
        assert_eq!(config.database.dsn, "sqlite::memory:");
        assert_eq!(config.storage.dsn, "memory://");
    }

    #[test]
    fn test_static_token_builder() {
        let account_id = Uuid::new_v4();
        let config = TestConfigBuilder::new()
            .in_memory()
            .with_static_token("tok", account_id, "p@example.com")
            .build();

        assert_eq!(config.auth.static_tokens.len(), 1);
        assert_eq!(config.auth.static_tokens[0].account_id, account_id);
    }

    #[test]
    fn test_dsn_overrides() {
        let config = TestConfigBuilder::new()
            .with_database_dsn("sqlite://./custom.db")
            .with_storage_dsn("file:///tmp/media")
            .build();

        assert_eq!(config.database.dsn, "sqlite://./custom.db");
        assert_eq!(config.storage.dsn, "file:///tmp/media");
    }
}
