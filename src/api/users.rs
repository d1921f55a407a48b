//! User directory API
//!
//! Lets users find each other to share notes with

use axum::Extension;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::Storage;
use crate::users::User;

use super::CurrentUser;
use super::Error;
use super::PathParameters;
use super::QueryParameters;
use super::Success;

/// Shortest search query that returns anything
const SEARCH_MIN_LENGTH: usize = 2;

/// Most users returned by a search
const SEARCH_LIMIT: usize = 10;

/// The user response information
///
/// A subset of all the information, ready to be serialized for the outside world
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// The user ID
    pub id: Uuid,

    /// The display name
    pub name: String,

    /// The email address
    pub email: String,
}

impl UserResponse {
    /// Create a user response from a [`User`](User)
    pub fn from_user(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// Search query
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    q: String,
}

/// Find users by the start of their email address
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:5050/api/users/search?q=al'
/// ```
pub async fn search<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser,
    QueryParameters(query): QueryParameters<SearchQuery>,
) -> Result<Success<Vec<UserResponse>>, Error> {
    let prefix = query.q.trim().to_lowercase();

    if prefix.chars().count() < SEARCH_MIN_LENGTH {
        return Ok(Success::ok(Vec::new()));
    }

    let users = storage
        .find_users_by_email_prefix(&prefix, SEARCH_LIMIT)
        .await?;

    Ok(Success::ok(
        users.into_iter().map(UserResponse::from_user).collect(),
    ))
}

/// Get a single user
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser,
    PathParameters(user_id): PathParameters<Uuid>,
) -> Result<Success<UserResponse>, Error> {
    let user = storage
        .find_single_user_by_id(&user_id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;

    Ok(Success::ok(UserResponse::from_user(user)))
}
