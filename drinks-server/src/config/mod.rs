pub(crate) use crate::config::auth::AuthConfig;
pub(crate) use crate::config::database::DatabaseConfig;
use confique::Config;

pub mod auth;
pub mod database;

/// Main configuration structure for the drinks server
#[derive(Debug, Config, Clone)]
pub struct Settings {
    /// The port the server will listen to (default: 5000)
    #[config(env = "DRINKS_PORT", default = 5000)]
    pub port: u16,

    /// Database configuration
    #[config(nested)]
    pub database: DatabaseConfig,

    /// Token verification configuration
    #[config(nested)]
    pub auth: AuthConfig,
}

impl Settings {
    /// Creates a new Settings instance from environment variables
    pub fn new() -> Result<Self, String> {
        let settings = Self::builder()
            .env()
            .load()
            .map_err(|e| e.to_string())?;

        // Reject unusable issuer / key-set URLs before anything starts listening
        settings
            .auth
            .jwks_url()
            .map_err(|e| format!("Invalid key set URL: {e}"))?;

        Ok(settings)
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(jwks_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                reset: false,
            },
            auth: AuthConfig {
                issuer: "https://coffee-test.example.com/".to_string(),
                audience: "drinks".to_string(),
                jwks_url: Some(format!("{}/.well-known/jwks.json", jwks_mock.uri())),
                jwks_timeout: 5,
                jwks_cache_ttl: 60,
                jwks_refresh_interval: 30,
            },
        }
    }
}
