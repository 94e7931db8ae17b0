use super::AuthError;
use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Extracts the bearer token from the `Authorization` header.
///
/// The header must read `Bearer <token>`: the keyword is matched
/// case-insensitively and exactly one space-separated token must follow it.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::Malformed)?,
        None => return Err(AuthError::HeaderMissing),
    };

    if value.is_empty() {
        return Err(AuthError::HeaderMissing);
    }

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::NotBearer),
        [_] => Err(AuthError::TokenNotFound),
        [_, token] if token.is_empty() => Err(AuthError::TokenNotFound),
        [_, token] => Ok(token),
        _ => Err(AuthError::NotSingleToken),
    }
}
