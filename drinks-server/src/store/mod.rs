use crate::models::{Drink, DrinkUpdate, NewDrink, RecipeError};
use thiserror::Error;

pub mod sql;

pub use sql::SqlDrinkStore;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(#[from] RecipeError),
    #[error("Stored recipe of drink {id} cannot be decoded: {source}")]
    CorruptRecipe {
        id: i64,
        #[source]
        source: RecipeError,
    },
}

/// Persistence operations for drinks.
///
/// Every write runs in its own transaction: it either fully applies or
/// leaves the table untouched.
#[async_trait::async_trait]
pub trait DrinkStore: Send + Sync {
    /// All drinks, ordered by id
    async fn list_all(&self) -> Result<Vec<Drink>, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Drink>, StoreError>;

    /// Stores a new drink and returns it with its assigned id
    async fn insert(&self, drink: NewDrink) -> Result<Drink, StoreError>;

    /// Replaces the supplied fields. Returns `None` if no drink has this id.
    async fn update(&self, id: i64, update: DrinkUpdate) -> Result<Option<Drink>, StoreError>;

    /// Removes the drink. Returns `false` if no drink has this id.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Verifies the database answers queries
    async fn health_check(&self) -> Result<(), StoreError>;
}
