use crate::auth::{JwksClient, TokenVerifier};
use crate::config::Settings;
use crate::store::{DrinkStore, SqlDrinkStore};
use log::info;
use std::sync::Arc;

/// Application context shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DrinkStore>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Opens the database (resetting it if configured) and prepares token verification
    pub async fn new(settings: &Settings) -> Result<Self, std::io::Error> {
        let store = SqlDrinkStore::connect(&settings.database)
            .await
            .map_err(|e| std::io::Error::other(format!("Failed to open database: {e}")))?;

        if settings.database.reset {
            store
                .reset()
                .await
                .map_err(|e| std::io::Error::other(format!("Failed to reset database: {e}")))?;
        }

        store
            .health_check()
            .await
            .map_err(|e| std::io::Error::other(format!("Database is not reachable: {e}")))?;
        info!("Database at '{}' is ready", settings.database.url);

        Self::with_store(settings, Arc::new(store))
    }

    /// Builds the state around an already opened store
    pub fn with_store(settings: &Settings, store: Arc<dyn DrinkStore>) -> Result<Self, std::io::Error> {
        let jwks = JwksClient::new(&settings.auth).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Failed to create key set client: {e}"),
            )
        })?;
        let verifier = TokenVerifier::new(&settings.auth, jwks);

        Ok(Self {
            store,
            verifier: Arc::new(verifier),
        })
    }
}
