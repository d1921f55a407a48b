//! Current user service
//!
//! Get the current user from the request based on the Authorization header

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use uuid::Uuid;

use crate::api::Error;
use crate::tokens::Tokens;

/// The authenticated user of a request
///
/// Access tokens are verified without a storage lookup, only the ID is known
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser {
    /// The user ID, the `sub` of the access token
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the token from the authorization header
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("Missing access token"))?;

        let Extension(tokens) = parts
            .extract::<Extension<Tokens>>()
            .await
            .map_err(|_| Error::internal_server_error("Could not get the token service"))?;

        let id = tokens.verify_access_token(bearer.token())?;

        Ok(Self { id })
    }
}
