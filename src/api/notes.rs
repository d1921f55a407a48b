use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Role;
use crate::error::Error as DomainError;
use crate::error::FieldErrors;
use crate::notes::BODY_MAX_LENGTH;
use crate::notes::Permission;
use crate::notes::TITLE_MAX_LENGTH;
use crate::sharing::ContentChanges;
use crate::sharing::NoteView;
use crate::sharing::Sharing;
use crate::storage::NoteFilter;
use crate::storage::Storage;
use crate::validation::normalize_email;

use super::CurrentUser;
use super::Deleted;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;

/// Parse a lenient boolean flag from the query string
fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    })
}

/// Check the lengths of (trimmed) title and body
fn validate_content(title: Option<&str>, body: Option<&str>) -> Result<(), Error> {
    let mut errors = FieldErrors::new();

    if title.is_some_and(|title| title.trim().chars().count() > TITLE_MAX_LENGTH) {
        errors.insert(
            "title",
            format!("Title must be at most {TITLE_MAX_LENGTH} characters"),
        );
    }

    if body.is_some_and(|body| body.trim().chars().count() > BODY_MAX_LENGTH) {
        errors.insert(
            "body",
            format!("Body must be at most {BODY_MAX_LENGTH} characters"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(errors))
    }
}

/// Filter of the note listing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    archived: Option<String>,
    trashed: Option<String>,
}

/// List the notes of the current user
///
/// By default only notes that are neither archived nor trashed
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    QueryParameters(query): QueryParameters<ListQuery>,
) -> Result<Success<Vec<NoteView>>, Error> {
    let filter = NoteFilter {
        archived: parse_flag(query.archived.as_deref()),
        trashed: parse_flag(query.trashed.as_deref()),
    };

    let notes = storage
        .find_notes_by_owner(&current_user.id, &filter)
        .await?;

    Ok(Success::ok(
        notes
            .into_iter()
            .map(|note| NoteView::new(note, Role::Owner))
            .collect(),
    ))
}

/// Notes other users shared with the current user
pub async fn shared_with_me<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
) -> Result<Success<Vec<NoteView>>, Error> {
    let notes = Sharing::new(&storage)
        .list_shared_with(&current_user.id)
        .await?;

    Ok(Success::ok(notes))
}

/// Get a single note, as seen by the current user
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<NoteView>, Error> {
    let note = Sharing::new(&storage)
        .fetch(&note_id, &current_user.id)
        .await?;

    Ok(Success::ok(NoteView::for_user(note, &current_user.id)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateNoteForm {
    title: String,
    body: String,
    category: Option<String>,
}

/// Create a note
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Groceries", "body": "Milk", "category": "personal" }' \
///     http://localhost:5050/api/notes
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    Form(form): Form<CreateNoteForm>,
) -> Result<Success<NoteView>, Error> {
    validate_content(Some(&form.title), Some(&form.body))?;

    let owner = storage
        .find_single_user_by_id(&current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User not found"))?;

    let note = Sharing::new(&storage)
        .create(&owner, &form.title, &form.body, form.category.as_deref())
        .await?;

    Ok(Success::created(NoteView::new(note, Role::Owner)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateNoteForm {
    title: Option<String>,
    body: Option<String>,
    category: Option<String>,
}

/// Change title, body and/or category
///
/// Editors can change title and body, only the owner can change the category
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
    Form(form): Form<UpdateNoteForm>,
) -> Result<Success<NoteView>, Error> {
    validate_content(form.title.as_deref(), form.body.as_deref())?;

    let changes = ContentChanges {
        title: form.title.as_deref(),
        body: form.body.as_deref(),
        category: form.category.as_deref(),
    };

    let note = Sharing::new(&storage)
        .edit_content(&note_id, &current_user.id, changes)
        .await?;

    Ok(Success::ok(NoteView::for_user(note, &current_user.id)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveForm {
    archived: Option<bool>,
}

/// Archive or unarchive a note
pub async fn archive<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
    Form(form): Form<ArchiveForm>,
) -> Result<Success<NoteView>, Error> {
    let archived = form
        .archived
        .ok_or_else(|| DomainError::field("archived", "archived is required"))?;

    let note = Sharing::new(&storage)
        .set_archived(&note_id, &current_user.id, archived)
        .await?;

    Ok(Success::ok(NoteView::new(note, Role::Owner)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrashForm {
    trashed: Option<bool>,
}

/// Trash or restore a note
pub async fn trash<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
    Form(form): Form<TrashForm>,
) -> Result<Success<NoteView>, Error> {
    let trashed = form
        .trashed
        .ok_or_else(|| DomainError::field("trashed", "trashed is required"))?;

    let note = Sharing::new(&storage)
        .set_trashed(&note_id, &current_user.id, trashed)
        .await?;

    Ok(Success::ok(NoteView::new(note, Role::Owner)))
}

/// Delete a trashed note for good
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<Deleted>, Error> {
    Sharing::new(&storage)
        .delete(&note_id, &current_user.id)
        .await?;

    Ok(Success::ok(Deleted::one()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareForm {
    user_id: Option<Uuid>,
    email: Option<String>,
    permission: Option<Permission>,
}

/// Share a note with a user, by ID or by email address
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "email": "bob@example.com", "permission": "viewer" }' \
///     http://localhost:5050/api/notes/<uuid>/share
/// ```
pub async fn share<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters(note_id): PathParameters<Uuid>,
    Form(form): Form<ShareForm>,
) -> Result<Success<NoteView>, Error> {
    let permission = form.permission.ok_or_else(|| {
        DomainError::field("permission", "permission must be viewer or editor")
    })?;

    let sharing = Sharing::new(&storage);
    sharing.fetch_managed(&note_id, &current_user.id).await?;

    let target_id = match (form.user_id, form.email.as_deref()) {
        (Some(user_id), _) => user_id,
        (None, Some(email)) => {
            storage
                .find_single_user_by_email(&normalize_email(email))
                .await?
                .ok_or_else(|| Error::not_found("User not found"))?
                .id
        }
        (None, None) => {
            return Err(DomainError::field("userId", "userId or email is required").into());
        }
    };

    let note = sharing
        .share(&note_id, &current_user.id, &target_id, permission)
        .await?;

    Ok(Success::ok(NoteView::new(note, Role::Owner)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateShareForm {
    permission: Option<Permission>,
}

/// Change the permission of a collaborator
pub async fn update_share<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters((note_id, user_id)): PathParameters<(Uuid, Uuid)>,
    Form(form): Form<UpdateShareForm>,
) -> Result<Success<NoteView>, Error> {
    let permission = form.permission.ok_or_else(|| {
        DomainError::field("permission", "permission must be viewer or editor")
    })?;

    let note = Sharing::new(&storage)
        .update_permission(&note_id, &current_user.id, &user_id, permission)
        .await?;

    Ok(Success::ok(NoteView::new(note, Role::Owner)))
}

/// Remove a collaborator
pub async fn revoke_share<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser,
    PathParameters((note_id, user_id)): PathParameters<(Uuid, Uuid)>,
) -> Result<Success<NoteView>, Error> {
    let note = Sharing::new(&storage)
        .revoke(&note_id, &current_user.id, &user_id)
        .await?;

    Ok(Success::ok(NoteView::new(note, Role::Owner)))
}
