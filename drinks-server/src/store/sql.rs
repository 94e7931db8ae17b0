use super::{DrinkStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::{decode_recipe, Drink, DrinkUpdate, NewDrink};
use async_trait::async_trait;
use log::{error, info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS drink (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT UNIQUE,
    recipe TEXT NOT NULL
)";

/// How long a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SEED_TITLE: &str = "water";
const SEED_RECIPE: &str = r#"[{"name": "water", "color": "blue", "parts": 1}]"#;

#[derive(Debug, sqlx::FromRow)]
struct DrinkRow {
    id: i64,
    title: Option<String>,
    recipe: String,
}

impl TryFrom<DrinkRow> for Drink {
    type Error = StoreError;

    fn try_from(row: DrinkRow) -> Result<Self, Self::Error> {
        let recipe = decode_recipe(&row.recipe).map_err(|source| StoreError::CorruptRecipe {
            id: row.id,
            source,
        })?;
        Ok(Drink {
            id: row.id,
            title: row.title,
            recipe,
        })
    }
}

/// Drinks stored in a SQLite table
#[derive(Clone)]
pub struct SqlDrinkStore {
    pool: SqlitePool,
}

impl SqlDrinkStore {
    /// Opens the database and creates the drink table if it does not exist
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !config.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if config.is_in_memory() {
            // One connection kept forever, otherwise the database vanishes with it
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.setup().await?;
        Ok(store)
    }

    async fn setup(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Drops all drinks and recreates the table holding a single seed drink.
    ///
    /// Destroys every stored record.
    pub async fn reset(&self) -> Result<(), StoreError> {
        warn!("Resetting drink table, all records will be dropped");

        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS drink")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO drink (title, recipe) VALUES (?, ?)")
            .bind(SEED_TITLE)
            .bind(SEED_RECIPE)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Drink table reset with seed drink '{SEED_TITLE}'");
        Ok(())
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_in_tx(&self, drink: NewDrink) -> Result<Drink, StoreError> {
        let recipe = drink.recipe.encode()?;

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DrinkRow>(
            "INSERT INTO drink (title, recipe) VALUES (?, ?) RETURNING id, title, recipe",
        )
        .bind(&drink.title)
        .bind(&recipe)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        row.try_into()
    }

    /// A single statement, so concurrent writers queue on the write lock
    /// instead of failing to upgrade a read lock.
    async fn update_row(&self, id: i64, update: DrinkUpdate) -> Result<Option<Drink>, StoreError> {
        let recipe = update.recipe.as_ref().map(|r| r.encode()).transpose()?;

        let row = sqlx::query_as::<_, DrinkRow>(
            "UPDATE drink SET title = COALESCE(?, title), recipe = COALESCE(?, recipe) \
             WHERE id = ? RETURNING id, title, recipe",
        )
        .bind(update.title)
        .bind(recipe)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Drink::try_from).transpose()
    }

    async fn delete_in_tx(&self, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM drink WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Logs a failed operation before the error is handed back to the caller
fn log_failure(operation: &str, err: &StoreError) {
    match err {
        StoreError::InvalidRecipe(_) => warn!("Rejected drink {operation}: {err}"),
        _ => error!("Drink {operation} failed: {err}"),
    }
}

#[async_trait]
impl DrinkStore for SqlDrinkStore {
    async fn list_all(&self) -> Result<Vec<Drink>, StoreError> {
        let rows = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drink ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)
            .inspect_err(|e| log_failure("listing", e))?;

        rows.into_iter()
            .map(Drink::try_from)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| log_failure("listing", e))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Drink>, StoreError> {
        let row = sqlx::query_as::<_, DrinkRow>("SELECT id, title, recipe FROM drink WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
            .inspect_err(|e| log_failure("lookup", e))?;

        row.map(Drink::try_from)
            .transpose()
            .inspect_err(|e| log_failure("lookup", e))
    }

    async fn insert(&self, drink: NewDrink) -> Result<Drink, StoreError> {
        self.insert_in_tx(drink)
            .await
            .inspect_err(|e| log_failure("insert", e))
    }

    async fn update(&self, id: i64, update: DrinkUpdate) -> Result<Option<Drink>, StoreError> {
        self.update_row(id, update)
            .await
            .inspect_err(|e| log_failure("update", e))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.delete_in_tx(id)
            .await
            .inspect_err(|e| log_failure("delete", e))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
            .inspect_err(|e| log_failure("health check", e))?;
        Ok(())
    }
}
