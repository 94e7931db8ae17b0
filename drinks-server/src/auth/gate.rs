use super::header::bearer_token;
use super::{AuthError, Claims};
use crate::errors::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use log::warn;

/// State handed to the middleware of one guarded route
#[derive(Clone)]
pub(crate) struct PermissionGate {
    state: AppState,
    permission: &'static str,
}

/// Guards `route` so that it only runs for callers whose verified token
/// grants `permission`. An empty permission only requires a valid token.
///
/// The verified [`Claims`] are available to the handler as a request extension.
pub fn requires_auth(
    state: &AppState,
    permission: &'static str,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let gate = PermissionGate {
        state: state.clone(),
        permission,
    };
    route.route_layer(middleware::from_fn_with_state(gate, permission_middleware))
}

pub(crate) async fn permission_middleware(
    State(gate): State<PermissionGate>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => {
            warn!(
                "Rejected request to {} {}: {}",
                request.method(),
                request.uri().path(),
                e
            );
            return Err(e.into());
        }
    };

    let claims = gate.state.verifier.verify(&token).await?;
    check_permission(&claims, gate.permission)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Fails with `unauthorized` unless `permission` is empty or granted
pub fn check_permission(claims: &Claims, permission: &str) -> Result<(), AuthError> {
    if permission.is_empty() || claims.has_permission(permission) {
        return Ok(());
    }

    warn!(
        "Caller '{}' lacks permission '{}'",
        claims.subject(),
        permission
    );
    Err(AuthError::PermissionNotFound)
}
