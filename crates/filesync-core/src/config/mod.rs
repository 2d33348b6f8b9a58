//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod bus;
pub mod database;
pub mod logging;
pub mod storage;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::auth::AuthConfig;
pub use self::bus::{BusConfig, BusProvider};
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::{StorageConfig, StorageProviderKind};
pub use self::sync::SyncConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store connection settings.
    pub database: DatabaseConfig,
    /// Blob store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Change bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Synchronization engine settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Token verification settings.
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `FILESYNC__`, then validates
    /// the result.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILESYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let app: Self = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Check cross-field requirements that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::configuration("auth.jwt_secret is required"));
        }
        if self.database.url.trim().is_empty() {
            return Err(AppError::configuration("database.url is required"));
        }
        self.storage.validate()?;
        self.bus.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const MINIMAL: &str = r#"
        [database]
        url = "memory://"

        [auth]
        jwt_secret = "test-secret"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_toml(MINIMAL).expect("valid config");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sync.download_chunk_size_bytes, 1024 * 1024);
        assert_eq!(config.sync.hidden_file_prefix, ".");
        assert_eq!(config.bus.provider, BusProvider::Memory);
        assert_eq!(config.bus.stream_max_len, 100_000);
        assert_eq!(config.storage.provider, StorageProviderKind::Local);
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let source = r#"
            [database]
            url = "memory://"

            [auth]
            jwt_secret = ""
        "#;
        let err = AppConfig::from_toml(source).expect_err("secret required");
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_s3_requires_bucket() {
        let source = r#"
            [database]
            url = "memory://"

            [auth]
            jwt_secret = "s"

            [storage]
            provider = "s3"
        "#;
        let err = AppConfig::from_toml(source).expect_err("bucket required");
        assert!(err.message.contains("bucket"));
    }

    #[test]
    fn test_redis_bus_requires_url() {
        let source = r#"
            [database]
            url = "memory://"

            [auth]
            jwt_secret = "s"

            [bus]
            provider = "redis"
        "#;
        let err = AppConfig::from_toml(source).expect_err("redis url required");
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_unbounded_stream_is_rejected() {
        let source = r#"
            [database]
            url = "memory://"

            [auth]
            jwt_secret = "s"

            [bus]
            stream_max_len = 0
        "#;
        let err = AppConfig::from_toml(source).expect_err("stream bound required");
        assert!(err.message.contains("stream_max_len"));
    }
}
