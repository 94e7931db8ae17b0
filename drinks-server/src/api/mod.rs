pub(crate) mod drinks;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new().merge(drinks::router(state))
}
