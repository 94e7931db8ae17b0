use crate::api::drinks;
use crate::state::AppState;
use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable};

pub(crate) const DRINKS_TAG: &str = "Drinks API";

#[derive(OpenApi)]
#[openapi(
    paths(
        drinks::list_drinks,
        drinks::list_drinks_detail,
        drinks::create_drink,
        drinks::update_drink,
        drinks::delete_drink,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = DRINKS_TAG, description = "Coffee shop menu endpoints"),
    ),
    info(
        title = "Coffee Shop Drinks API",
        description = "Drinks menu with permission checked writes",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;

/// Registers the bearer token scheme referenced by the protected operations
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Creates a router serving the OpenAPI document and the Scalar viewer
pub(crate) fn router(api_doc: utoipa::openapi::OpenApi) -> Router<AppState> {
    let document = api_doc.clone();
    Router::new()
        .route("/openapi.json", get(|| async move { Json(document) }))
        .merge(Scalar::with_url("/scalar", api_doc))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestFixture;
    use http::StatusCode;

    #[tokio::test]
    async fn test_openapi_document_lists_drink_routes() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/openapi.json", None).await;

        response.assert_ok();
        let paths = &response.json["paths"];
        assert!(paths["/drinks"]["get"].is_object());
        assert!(paths["/drinks"]["post"].is_object());
        assert!(paths["/drinks-detail"]["get"].is_object());
        assert!(paths["/drinks/{drink_id}"]["patch"].is_object());
        assert!(paths["/drinks/{drink_id}"]["delete"].is_object());
        assert_eq!(
            response.json["components"]["securitySchemes"]["bearer"]["scheme"],
            "bearer"
        );
    }

    #[tokio::test]
    async fn test_scalar_page_is_served() {
        let fixture = TestFixture::new().await;
        let (status, body) = fixture.send_raw(&fixture.app, "/scalar", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<html"));
    }

    #[tokio::test]
    async fn test_unknown_route_returns_not_found_envelope() {
        let fixture = TestFixture::new().await;
        let response = fixture.get("/coffee-beans", None).await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json["success"], false);
        assert_eq!(response.json["error"], 404);
        assert_eq!(response.json["message"], "resource not found");
    }
}
