use confique::Config;

/// Configuration for the drinks database
#[derive(Debug, Config, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL (default: sqlite://database.db)
    #[config(env = "DRINKS_DATABASE_URL", default = "sqlite://database.db")]
    pub url: String,

    /// Maximum number of pooled connections (default: 5)
    #[config(env = "DRINKS_DATABASE_MAX_CONNECTIONS", default = 5)]
    pub max_connections: u32,

    /// Drop all drinks and recreate the table with a seed drink on startup (default: false)
    #[config(env = "DRINKS_DATABASE_RESET", default = false)]
    pub reset: bool,
}

impl DatabaseConfig {
    /// In-memory databases live and die with a single connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}
