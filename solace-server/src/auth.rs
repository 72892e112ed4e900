// File: solace-server/src/auth.rs

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use solace_common::models::identity::{Identity, Role};
use solace_core::Error;

use crate::api::ApiError;

/// Set by the upstream gateway after it has authenticated the caller.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The verified caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Identity);

pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, Error> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth("Authentication required".into()))?
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Auth("Invalid user id header".into()))?;

    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Auth("Authentication required".into()))?
        .parse::<Role>()
        .map_err(Error::Auth)?;

    Ok(Identity::new(id, role))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AuthenticatedUser(identity_from_headers(&parts.headers)?))
    }
}
