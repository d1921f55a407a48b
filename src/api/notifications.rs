//! Notification feed API

use axum::Extension;
use uuid::Uuid;

use crate::notifications;
use crate::notifications::FeedEntry;
use crate::storage::Storage;

use super::CurrentUser;
use super::Deleted;
use super::Error;
use super::PathParameters;
use super::Success;

/// The latest notifications of the current user, newest first
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<Vec<FeedEntry>>, Error> {
    let entries = notifications::list(&storage, &current_user.id).await?;

    Ok(Success::ok(entries))
}

/// Delete a single notification of the current user
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(notification_id): PathParameters<Uuid>,
) -> Result<Success<Deleted>, Error> {
    notifications::delete(&storage, &current_user.id, &notification_id).await?;

    Ok(Success::ok(Deleted::one()))
}

/// Delete all notifications of the current user
pub async fn clear<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<Deleted>, Error> {
    let deleted = notifications::clear(&storage, &current_user.id).await?;

    Ok(Success::ok(Deleted::many(deleted)))
}
