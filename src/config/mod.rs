//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `LINKGATE` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use linkgate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod broker;
mod database;
mod error;
mod providers;
mod server;
mod session;

pub use broker::BrokerConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use providers::ProvidersConfig;
pub use server::{Environment, ServerConfig};
pub use session::SessionConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Identity broker configuration
    pub broker: BrokerConfig,

    /// Login provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Session token configuration
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `LINKGATE__SECTION__FIELD`
    /// variables:
    ///
    /// - `LINKGATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `LINKGATE__BROKER__SECRET=...` -> `broker.secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LINKGATE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.broker.validate(&self.server.environment)?;
        self.providers.validate()?;
        self.session.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "LINKGATE__DATABASE__URL",
        "LINKGATE__BROKER__INTERNAL_URL",
        "LINKGATE__BROKER__EXTERNAL_URL",
        "LINKGATE__BROKER__SECRET",
        "LINKGATE__SERVER__PORT",
        "LINKGATE__SERVER__ENVIRONMENT",
        "LINKGATE__PROVIDERS__ENABLED",
        "LINKGATE__SESSION__TOKEN_TTL_SECS",
    ];

    fn set_minimal_env() {
        env::set_var("LINKGATE__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("LINKGATE__BROKER__INTERNAL_URL", "http://auth-broker:8080");
        env::set_var("LINKGATE__BROKER__EXTERNAL_URL", "https://auth.example.com");
        env::set_var("LINKGATE__BROKER__SECRET", "broker-secret");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.broker.internal_url, "http://auth-broker:8080");
        assert_eq!(config.broker.secret.expose_secret(), "broker-secret");
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.broker.exchange_timeout_secs, 2);
        assert_eq!(config.providers.enabled, "discord");
        assert!(config.session.token_ttl_secs.is_none());
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("LINKGATE__SERVER__PORT", "3000");
        env::set_var("LINKGATE__SERVER__ENVIRONMENT", "production");
        env::set_var("LINKGATE__PROVIDERS__ENABLED", "discord,frontier");
        env::set_var("LINKGATE__SESSION__TOKEN_TTL_SECS", "86400");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.providers.enabled_kinds().unwrap().len(), 2);
        assert_eq!(config.session.token_ttl_secs, Some(86400));
    }

    #[test]
    fn test_missing_broker_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LINKGATE__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
