use crate::auth::{requires_auth, Claims};
use crate::errors::{ApiError, ErrorBody};
use crate::models::{Drink, DrinkPayload, DrinkUpdate, LongDrink, NewDrink, ShortDrink};
use crate::openapi::DRINKS_TAG;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Extension, Json, Path, State,
    },
    routing::{delete, get, patch, post},
    Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Drink routes, each write guarded by its own permission
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/drinks",
            get(list_drinks).merge(requires_auth(state, "post:drinks", post(create_drink))),
        )
        .route(
            "/drinks-detail",
            requires_auth(state, "get:drinks-detail", get(list_drinks_detail)),
        )
        .route(
            "/drinks/{drink_id}",
            requires_auth(state, "patch:drinks", patch(update_drink))
                .merge(requires_auth(state, "delete:drinks", delete(delete_drink))),
        )
}

/// Public menu listing
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct ShortDrinksResponse {
    pub success: bool,
    pub drinks: Vec<ShortDrink>,
}

/// Detailed listing, also returned by updates
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct LongDrinksResponse {
    pub success: bool,
    pub drinks: Vec<LongDrink>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct CreatedDrinkResponse {
    pub success: bool,
    pub drink: LongDrink,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct DeletedDrinkResponse {
    pub success: bool,
    /// Id of the removed drink
    pub delete: String,
}

#[utoipa::path(
    get,
    path = "/drinks",
    tag = DRINKS_TAG,
    responses(
        (status = 200, description = "Menu listing", body = ShortDrinksResponse),
        (status = 404, description = "The menu is empty", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub(crate) async fn list_drinks(
    State(state): State<AppState>,
) -> Result<Json<ShortDrinksResponse>, ApiError> {
    let drinks = state.store.list_all().await?;

    // An empty menu is reported as not found
    if drinks.is_empty() {
        return Err(ApiError::NotFound);
    }

    Ok(Json(ShortDrinksResponse {
        success: true,
        drinks: drinks.iter().map(Drink::short).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/drinks-detail",
    tag = DRINKS_TAG,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Detailed menu listing", body = LongDrinksResponse),
        (status = 400, description = "The menu is empty", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Token lacks get:drinks-detail", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub(crate) async fn list_drinks_detail(
    State(state): State<AppState>,
) -> Result<Json<LongDrinksResponse>, ApiError> {
    let drinks = state.store.list_all().await?;

    if drinks.is_empty() {
        return Err(ApiError::bad_request("no drinks on the menu"));
    }

    Ok(Json(LongDrinksResponse {
        success: true,
        drinks: drinks.iter().map(Drink::long).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/drinks",
    tag = DRINKS_TAG,
    security(("bearer" = [])),
    request_body = DrinkPayload,
    responses(
        (status = 200, description = "Drink created", body = CreatedDrinkResponse),
        (status = 400, description = "Missing title or recipe", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Token lacks post:drinks", body = ErrorBody),
        (status = 404, description = "Missing request body", body = ErrorBody),
        (status = 413, description = "Request body too large", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub(crate) async fn create_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<CreatedDrinkResponse>, ApiError> {
    let payload = parse_payload(&body?, ApiError::NotFound)?;

    let title = payload
        .title
        .ok_or_else(|| ApiError::bad_request("title is required"))?;
    let recipe = payload
        .recipe
        .ok_or_else(|| ApiError::bad_request("recipe is required"))?;

    let drink = state.store.insert(NewDrink { title, recipe }).await?;
    info!(
        "Drink {} ({:?}) created by '{}'",
        drink.id,
        drink.title,
        claims.subject()
    );

    Ok(Json(CreatedDrinkResponse {
        success: true,
        drink: drink.long(),
    }))
}

#[utoipa::path(
    patch,
    path = "/drinks/{drink_id}",
    tag = DRINKS_TAG,
    security(("bearer" = [])),
    params(("drink_id" = i64, Path, description = "Drink id")),
    request_body = DrinkPayload,
    responses(
        (status = 200, description = "Drink updated", body = LongDrinksResponse),
        (status = 400, description = "Missing or invalid body", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Token lacks patch:drinks", body = ErrorBody),
        (status = 404, description = "No drink with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub(crate) async fn update_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    drink_id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<LongDrinksResponse>, ApiError> {
    let Path(drink_id) = drink_id?;
    let id = parse_id(&drink_id)?;
    if state.store.get_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let payload = parse_payload(&body?, ApiError::bad_request("request body is required"))?;
    let update = DrinkUpdate {
        title: payload.title,
        recipe: payload.recipe,
    };

    // The drink may have been deleted since the lookup
    let drink = state
        .store
        .update(id, update)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!("Drink {} updated by '{}'", drink.id, claims.subject());

    Ok(Json(LongDrinksResponse {
        success: true,
        drinks: vec![drink.long()],
    }))
}

#[utoipa::path(
    delete,
    path = "/drinks/{drink_id}",
    tag = DRINKS_TAG,
    security(("bearer" = [])),
    params(("drink_id" = i64, Path, description = "Drink id")),
    responses(
        (status = 200, description = "Drink deleted", body = DeletedDrinkResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Token lacks delete:drinks", body = ErrorBody),
        (status = 404, description = "No drink with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub(crate) async fn delete_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    drink_id: Result<Path<String>, PathRejection>,
) -> Result<Json<DeletedDrinkResponse>, ApiError> {
    let Path(drink_id) = drink_id?;
    let id = parse_id(&drink_id)?;
    if !state.store.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    info!("Drink {id} deleted by '{}'", claims.subject());

    Ok(Json(DeletedDrinkResponse {
        success: true,
        delete: id.to_string(),
    }))
}

/// Ids that are not integers cannot name a drink
fn parse_id(drink_id: &str) -> Result<i64, ApiError> {
    drink_id.parse().map_err(|_| ApiError::NotFound)
}

/// Parses a drink body. Absent or empty JSON bodies (`null`, `{}`, `""`, ...)
/// fail with `missing`, anything else unreadable is a bad request.
fn parse_payload(body: &[u8], missing: ApiError) -> Result<DrinkPayload, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(missing);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    if is_empty_json(&value) {
        return Err(missing);
    }

    serde_json::from_value(value).map_err(|e| ApiError::bad_request(format!("invalid drink: {e}")))
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
