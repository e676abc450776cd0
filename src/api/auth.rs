use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::model::{Actor, Role, UserId};

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::Unauthenticated(format!("{name} is not valid text")))
        })
        .transpose()
}

/// Identity set by the upstream authentication layer. A missing role means `player`.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthenticated(format!("{USER_ID_HEADER} header is required")))?
            .trim()
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthenticated(format!("{USER_ID_HEADER} is not a ULID")))?;
        let role = match header(parts, USER_ROLE_HEADER)? {
            Some(raw) => raw.parse::<Role>().map_err(ApiError::Unauthenticated)?,
            None => Role::Player,
        };
        debug!(%user_id, ?role, "request identity");
        Ok(Actor::new(user_id, role))
    }
}
