//! Note mutations and sharing
//!
//! Every mutation is a pure transform of a loaded note into its next state plus a list of
//! effects. [`Sharing::commit`] writes the next state conditionally on the loaded version and
//! only then dispatches the effects. Effects are best-effort: a failing notification is logged
//! and never undoes or fails the mutation.

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::access;
use crate::access::Role;
use crate::error::Error;
use crate::error::Result;
use crate::notes::Action;
use crate::notes::Activity;
use crate::notes::DEFAULT_CATEGORY;
use crate::notes::Note;
use crate::notes::Permission;
use crate::notes::Share;
use crate::notifications::NotificationSink;
use crate::notifications::NotificationType;
use crate::storage::CreateNotificationValues;
use crate::storage::CreateNoteValues;
use crate::storage::Storage;
use crate::users::User;

/// Attempts to write a note before giving up on concurrent changes
const MAX_ATTEMPTS: usize = 3;

/// Side effect of a mutation, executed after the note is written
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    /// Append a notification to a feed
    Notify(CreateNotificationValues),
}

/// Result of a transform
#[derive(Debug)]
pub struct Outcome {
    /// Next state of the note
    pub note: Note,

    /// Is there anything to write?
    pub changed: bool,

    /// Effects to dispatch once written
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn unchanged(note: &Note) -> Self {
        Self {
            note: note.clone(),
            changed: false,
            effects: Vec::new(),
        }
    }

    fn changed(note: Note, effects: Vec<Effect>) -> Self {
        Self {
            note,
            changed: true,
            effects,
        }
    }
}

/// Changes to the content of a note, `None` means "leave as is"
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentChanges<'a> {
    pub title: Option<&'a str>,
    pub body: Option<&'a str>,
    pub category: Option<&'a str>,
}

fn notify(
    note: &Note,
    actor_id: &Uuid,
    recipient_id: &Uuid,
    notification_type: NotificationType,
    permission: Option<Permission>,
) -> Effect {
    Effect::Notify(CreateNotificationValues {
        recipient_id: *recipient_id,
        actor_id: *actor_id,
        note_id: note.id,
        notification_type,
        permission,
    })
}

/// Change the permission of an existing collaborator
fn change_permission(
    note: &Note,
    actor_id: &Uuid,
    target_id: &Uuid,
    permission: Permission,
    now: DateTime<Utc>,
) -> Outcome {
    let Some(previous) = note.share_of(target_id).map(|share| share.permission) else {
        return Outcome::unchanged(note);
    };

    if previous == permission {
        return Outcome::unchanged(note);
    }

    let mut next = note.clone();
    for share in &mut next.shared_with {
        if &share.user_id == target_id {
            share.permission = permission;
        }
    }

    next.log(
        Action::PermissionChanged,
        *actor_id,
        now,
        json!({ "userId": target_id, "from": previous, "to": permission }),
    );
    next.updated_at = now;

    let effects = vec![notify(
        note,
        actor_id,
        target_id,
        NotificationType::PermissionChanged,
        Some(permission),
    )];

    Outcome::changed(next, effects)
}

/// Share a note with a user, or change the permission when already shared
///
/// Sharing again with the same permission changes nothing
pub fn share(
    note: &Note,
    actor_id: &Uuid,
    target_id: &Uuid,
    permission: Permission,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_manage(note, actor_id)?;

    if target_id == &note.owner_id {
        return Err(Error::field(
            "userId",
            "A note can not be shared with its owner",
        ));
    }

    if note.share_of(target_id).is_some() {
        return Ok(change_permission(
            note, actor_id, target_id, permission, now,
        ));
    }

    let mut next = note.clone();
    next.shared_with.push(Share {
        user_id: *target_id,
        permission,
    });
    next.log(
        Action::Shared,
        *actor_id,
        now,
        json!({ "userId": target_id, "permission": permission }),
    );
    next.updated_at = now;

    let effects = vec![notify(
        note,
        actor_id,
        target_id,
        NotificationType::Shared,
        Some(permission),
    )];

    Ok(Outcome::changed(next, effects))
}

/// Change the permission of an existing collaborator
pub fn update_permission(
    note: &Note,
    actor_id: &Uuid,
    target_id: &Uuid,
    permission: Permission,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_manage(note, actor_id)?;

    if note.share_of(target_id).is_none() {
        return Err(Error::NotFound("Share not found"));
    }

    Ok(change_permission(
        note, actor_id, target_id, permission, now,
    ))
}

/// Remove a collaborator
pub fn revoke(
    note: &Note,
    actor_id: &Uuid,
    target_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_manage(note, actor_id)?;

    if note.share_of(target_id).is_none() {
        return Err(Error::NotFound("Share not found"));
    }

    let mut next = note.clone();
    next.shared_with.retain(|share| &share.user_id != target_id);
    next.log(
        Action::Unshared,
        *actor_id,
        now,
        json!({ "userId": target_id }),
    );
    next.updated_at = now;

    let effects = vec![notify(
        note,
        actor_id,
        target_id,
        NotificationType::Unshared,
        None,
    )];

    Ok(Outcome::changed(next, effects))
}

/// Edit title, body and/or category
///
/// Title and body need edit access, the category needs manage access. Only values that differ
/// from the stored ones count as a change, resubmitting the same value logs nothing.
pub fn edit_content(
    note: &Note,
    actor_id: &Uuid,
    changes: ContentChanges<'_>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_view(note, actor_id)?;

    if changes.title.is_some() || changes.body.is_some() {
        access::require_edit(note, actor_id)?;
    }

    if changes.category.is_some() {
        access::require_manage(note, actor_id)?;
    }

    let mut next = note.clone();
    let mut fields = Vec::new();

    if let Some(title) = changes.title.map(str::trim) {
        if title != note.title {
            next.title = title.to_string();
            fields.push("title");
        }
    }

    if let Some(body) = changes.body.map(str::trim) {
        if body != note.body {
            next.body = body.to_string();
            fields.push("body");
        }
    }

    if let Some(category) = changes.category.map(normalize_category) {
        if category != note.category {
            next.category = category;
            fields.push("category");
        }
    }

    if fields.is_empty() {
        return Ok(Outcome::unchanged(note));
    }

    next.log(Action::Edited, *actor_id, now, json!({ "fields": fields }));
    next.last_edited_by = Some(*actor_id);
    next.last_edited_at = Some(now);
    next.updated_at = now;

    Ok(Outcome::changed(next, Vec::new()))
}

/// Archive or unarchive, archiving takes a note out of the trash
pub fn set_archived(
    note: &Note,
    actor_id: &Uuid,
    archived: bool,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_manage(note, actor_id)?;

    if note.is_archived == archived {
        return Ok(Outcome::unchanged(note));
    }

    let mut next = note.clone();
    next.is_archived = archived;

    let action = if archived {
        next.is_trashed = false;
        Action::Archived
    } else {
        Action::Unarchived
    };

    next.log(action, *actor_id, now, json!({}));
    next.updated_at = now;

    Ok(Outcome::changed(next, Vec::new()))
}

/// Trash or restore, trashing takes a note out of the archive
pub fn set_trashed(
    note: &Note,
    actor_id: &Uuid,
    trashed: bool,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    access::require_manage(note, actor_id)?;

    if note.is_trashed == trashed {
        return Ok(Outcome::unchanged(note));
    }

    let mut next = note.clone();
    next.is_trashed = trashed;

    let action = if trashed {
        next.is_archived = false;
        Action::Trashed
    } else {
        Action::Restored
    };

    next.log(action, *actor_id, now, json!({}));
    next.updated_at = now;

    Ok(Outcome::changed(next, Vec::new()))
}

/// Normalize a category key: trimmed and lowercased, empty means the default
pub fn normalize_category(category: &str) -> String {
    let category = category.trim().to_lowercase();

    if category.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        category
    }
}

/// Execute effects, failures are logged and swallowed
pub async fn dispatch<N>(sink: &N, effects: Vec<Effect>)
where
    N: NotificationSink + ?Sized,
{
    for effect in effects {
        match effect {
            Effect::Notify(values) => {
                if let Err(err) = sink.append(&values).await {
                    tracing::warn!(
                        "Could not notify {} about note {}: {err}",
                        values.recipient_id,
                        values.note_id
                    );
                }
            }
        }
    }
}

/// A note as seen by a user
///
/// Only the owner sees the collaborators and the activity log
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: Role,
    pub title: String,
    pub body: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<Vec<Share>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<Vec<Activity>>,
    pub last_edited_by: Option<Uuid>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub is_trashed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteView {
    /// Create the view of a note for a role
    pub fn new(note: Note, role: Role) -> Self {
        let is_owner = role == Role::Owner;

        Self {
            id: note.id,
            owner_id: note.owner_id,
            role,
            title: note.title,
            body: note.body,
            category: note.category,
            shared_with: is_owner.then_some(note.shared_with),
            activity_log: is_owner.then_some(note.activity_log),
            last_edited_by: note.last_edited_by,
            last_edited_at: note.last_edited_at,
            is_archived: note.is_archived,
            is_trashed: note.is_trashed,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    /// Create the view of a note for a user, not found when the user has no access
    pub fn for_user(note: Note, user_id: &Uuid) -> Result<Self> {
        let role = access::require_view(&note, user_id)?;

        Ok(Self::new(note, role))
    }
}

/// The sharing workflow: loads, transforms, writes and notifies
pub struct Sharing<'a, S, N: ?Sized = S> {
    /// Where notes live
    storage: &'a S,

    /// Where notifications go
    sink: &'a N,
}

impl<'a, S: Storage> Sharing<'a, S> {
    /// Workflow that notifies through the storage itself
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            sink: storage,
        }
    }
}

impl<'a, S, N> Sharing<'a, S, N>
where
    S: Storage,
    N: NotificationSink + ?Sized,
{
    /// Workflow with a separate notification sink
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_sink(storage: &'a S, sink: &'a N) -> Self {
        Self { storage, sink }
    }

    /// Fetch a note the user can see
    pub async fn fetch(&self, note_id: &Uuid, user_id: &Uuid) -> Result<Note> {
        let note = self
            .storage
            .find_single_note_by_id(note_id)
            .await?
            .ok_or(Error::NotFound("Note not found"))?;

        access::require_view(&note, user_id)?;

        Ok(note)
    }

    /// Fetch a note the user can manage
    pub async fn fetch_managed(&self, note_id: &Uuid, user_id: &Uuid) -> Result<Note> {
        let note = self.fetch(note_id, user_id).await?;

        access::require_manage(&note, user_id)?;

        Ok(note)
    }

    /// Load, transform and conditionally write a note, then dispatch the effects
    ///
    /// A concurrent write makes the write fail, the note is then reloaded and transformed again
    pub async fn commit<F>(&self, note_id: &Uuid, actor_id: &Uuid, transform: F) -> Result<Note>
    where
        F: Fn(&Note, DateTime<Utc>) -> Result<Outcome> + Send + Sync,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let note = self.fetch(note_id, actor_id).await?;

            let Outcome {
                note: mut next,
                changed,
                effects,
            } = transform(&note, Utc::now())?;

            if !changed {
                return Ok(note);
            }

            next.version = note.version + 1;

            if self.storage.update_note(note.version, &next).await? {
                dispatch(self.sink, effects).await;

                return Ok(next);
            }

            tracing::debug!("Note {note_id} changed concurrently (attempt {attempt})");
        }

        Err(Error::Conflict("Note was changed concurrently, please try again"))
    }

    /// Create a note, owned by the creator
    pub async fn create(
        &self,
        owner: &User,
        title: &str,
        body: &str,
        category: Option<&str>,
    ) -> Result<Note> {
        let category = category.map_or_else(|| DEFAULT_CATEGORY.to_string(), normalize_category);

        let values = CreateNoteValues {
            owner,
            title: title.trim(),
            body: body.trim(),
            category: &category,
            activity: Activity {
                action: Action::Created,
                actor_id: owner.id,
                timestamp: Utc::now(),
                meta: json!({}),
            },
        };

        Ok(self.storage.create_note(&values).await?)
    }

    /// Share a note with a user
    pub async fn share(
        &self,
        note_id: &Uuid,
        actor_id: &Uuid,
        target_id: &Uuid,
        permission: Permission,
    ) -> Result<Note> {
        // manage rights come before resolving the target
        self.fetch_managed(note_id, actor_id).await?;

        if self
            .storage
            .find_single_user_by_id(target_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound("User not found"));
        }

        self.commit(note_id, actor_id, |note, now| {
            share(note, actor_id, target_id, permission, now)
        })
        .await
    }

    /// Change the permission of a collaborator
    pub async fn update_permission(
        &self,
        note_id: &Uuid,
        actor_id: &Uuid,
        target_id: &Uuid,
        permission: Permission,
    ) -> Result<Note> {
        self.commit(note_id, actor_id, |note, now| {
            update_permission(note, actor_id, target_id, permission, now)
        })
        .await
    }

    /// Remove a collaborator
    pub async fn revoke(&self, note_id: &Uuid, actor_id: &Uuid, target_id: &Uuid) -> Result<Note> {
        self.commit(note_id, actor_id, |note, now| {
            revoke(note, actor_id, target_id, now)
        })
        .await
    }

    /// Edit the content of a note
    pub async fn edit_content(
        &self,
        note_id: &Uuid,
        actor_id: &Uuid,
        changes: ContentChanges<'_>,
    ) -> Result<Note> {
        self.commit(note_id, actor_id, |note, now| {
            edit_content(note, actor_id, changes, now)
        })
        .await
    }

    /// Archive or unarchive a note
    pub async fn set_archived(
        &self,
        note_id: &Uuid,
        actor_id: &Uuid,
        archived: bool,
    ) -> Result<Note> {
        self.commit(note_id, actor_id, |note, now| {
            set_archived(note, actor_id, archived, now)
        })
        .await
    }

    /// Trash or restore a note
    pub async fn set_trashed(&self, note_id: &Uuid, actor_id: &Uuid, trashed: bool) -> Result<Note> {
        self.commit(note_id, actor_id, |note, now| {
            set_trashed(note, actor_id, trashed, now)
        })
        .await
    }

    /// Delete a trashed note for good
    pub async fn delete(&self, note_id: &Uuid, actor_id: &Uuid) -> Result<()> {
        let note = self.fetch_managed(note_id, actor_id).await?;

        if !note.is_trashed {
            return Err(Error::BadRequest("Only trashed notes can be deleted"));
        }

        if self.storage.delete_trashed_note(actor_id, note_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("Note not found"))
        }
    }

    /// Notes shared with a user, as seen by that user
    pub async fn list_shared_with(&self, user_id: &Uuid) -> Result<Vec<NoteView>> {
        let notes = self.storage.find_notes_shared_with(user_id).await?;

        Ok(notes
            .into_iter()
            .filter_map(|note| NoteView::for_user(note, user_id).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::access::tests::note_owned_by;
    use crate::notifications::Notification;
    use crate::storage;
    use crate::storage::CreateUserValues;
    use crate::storage::Memory;

    fn shared_note(owner: Uuid, user: Uuid, permission: Permission) -> Note {
        let mut note = note_owned_by(owner);
        note.shared_with.push(Share {
            user_id: user,
            permission,
        });
        note
    }

    fn count(note: &Note, action: Action) -> usize {
        note.activity_log
            .iter()
            .filter(|activity| activity.action == action)
            .count()
    }

    #[test]
    fn test_share_inserts_and_notifies() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let note = note_owned_by(owner);

        let outcome = share(&note, &owner, &user, Permission::Viewer, Utc::now()).unwrap();

        assert!(outcome.changed);
        assert_eq!(
            outcome.note.share_of(&user).map(|share| share.permission),
            Some(Permission::Viewer)
        );
        assert_eq!(count(&outcome.note, Action::Shared), 1);
        assert_eq!(
            outcome.effects,
            vec![Effect::Notify(CreateNotificationValues {
                recipient_id: user,
                actor_id: owner,
                note_id: note.id,
                notification_type: NotificationType::Shared,
                permission: Some(Permission::Viewer),
            })]
        );
    }

    #[test]
    fn test_share_is_idempotent() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let note = note_owned_by(owner);

        let first = share(&note, &owner, &user, Permission::Viewer, Utc::now()).unwrap();
        let second = share(&first.note, &owner, &user, Permission::Viewer, Utc::now()).unwrap();

        assert!(!second.changed);
        assert!(second.effects.is_empty());
        assert_eq!(second.note.shared_with.len(), 1);
        assert_eq!(count(&second.note, Action::Shared), 1);
    }

    #[test]
    fn test_share_with_other_permission_changes_it() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let note = shared_note(owner, user, Permission::Viewer);

        let outcome = share(&note, &owner, &user, Permission::Editor, Utc::now()).unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.note.shared_with.len(), 1);
        assert_eq!(count(&outcome.note, Action::PermissionChanged), 1);
        assert_eq!(count(&outcome.note, Action::Shared), 0);
        assert!(matches!(
            &outcome.effects[..],
            [Effect::Notify(CreateNotificationValues {
                notification_type: NotificationType::PermissionChanged,
                permission: Some(Permission::Editor),
                ..
            })]
        ));
    }

    #[test]
    fn test_share_with_owner_is_rejected() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        let result = share(&note, &owner, &owner, Permission::Editor, Utc::now());

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_share_by_non_owner() {
        let owner = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let note = shared_note(owner, editor, Permission::Editor);

        let result = share(&note, &editor, &stranger, Permission::Viewer, Utc::now());
        assert!(matches!(result, Err(Error::Forbidden(_))));

        let result = share(&note, &stranger, &editor, Permission::Viewer, Utc::now());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_permission_requires_share() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        let result = update_permission(
            &note,
            &owner,
            &Uuid::new_v4(),
            Permission::Editor,
            Utc::now(),
        );

        assert!(matches!(result, Err(Error::NotFound("Share not found"))));
    }

    #[test]
    fn test_update_permission_unchanged() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let note = shared_note(owner, user, Permission::Editor);

        let outcome =
            update_permission(&note, &owner, &user, Permission::Editor, Utc::now()).unwrap();

        assert!(!outcome.changed);
        assert!(outcome.note.activity_log.is_empty());
    }

    #[test]
    fn test_revoke() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let note = shared_note(owner, user, Permission::Viewer);

        let outcome = revoke(&note, &owner, &user, Utc::now()).unwrap();

        assert!(outcome.note.shared_with.is_empty());
        assert_eq!(count(&outcome.note, Action::Unshared), 1);
        assert!(matches!(
            &outcome.effects[..],
            [Effect::Notify(CreateNotificationValues {
                notification_type: NotificationType::Unshared,
                permission: None,
                ..
            })]
        ));

        let result = revoke(&outcome.note, &owner, &user, Utc::now());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_edit_content_only_logs_real_changes() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        let changes = ContentChanges {
            title: Some("Groceries"),
            body: Some("Milk "),
            ..ContentChanges::default()
        };
        let outcome = edit_content(&note, &owner, changes, Utc::now()).unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.note.last_edited_at, None);
        assert!(outcome.note.activity_log.is_empty());

        let changes = ContentChanges {
            title: Some("Groceries"),
            body: Some("Milk and eggs"),
            ..ContentChanges::default()
        };
        let outcome = edit_content(&note, &owner, changes, Utc::now()).unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.note.last_edited_by, Some(owner));
        assert_eq!(outcome.note.activity_log.len(), 1);
        assert_eq!(outcome.note.activity_log[0].action, Action::Edited);
        assert_eq!(outcome.note.activity_log[0].meta, json!({ "fields": ["body"] }));
    }

    #[test]
    fn test_edit_content_roles() {
        let owner = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let editor = Uuid::new_v4();
        let mut note = shared_note(owner, viewer, Permission::Viewer);
        note.shared_with.push(Share {
            user_id: editor,
            permission: Permission::Editor,
        });

        let title = ContentChanges {
            title: Some("New title"),
            ..ContentChanges::default()
        };
        let category = ContentChanges {
            category: Some("business"),
            ..ContentChanges::default()
        };

        assert!(matches!(
            edit_content(&note, &viewer, title, Utc::now()),
            Err(Error::Forbidden(_))
        ));
        assert!(edit_content(&note, &editor, title, Utc::now()).is_ok());
        assert!(matches!(
            edit_content(&note, &editor, category, Utc::now()),
            Err(Error::Forbidden(_))
        ));
        assert!(edit_content(&note, &owner, category, Utc::now()).is_ok());
    }

    #[test]
    fn test_archive_and_trash_are_exclusive() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        let archived = set_archived(&note, &owner, true, Utc::now()).unwrap().note;
        assert!(archived.is_archived);
        assert!(!archived.is_trashed);

        let trashed = set_trashed(&archived, &owner, true, Utc::now()).unwrap().note;
        assert!(trashed.is_trashed);
        assert!(!trashed.is_archived);

        let again = set_trashed(&trashed, &owner, true, Utc::now()).unwrap();
        assert!(!again.changed);

        let actions = trashed
            .activity_log
            .iter()
            .map(|activity| activity.action)
            .collect::<Vec<Action>>();
        assert_eq!(actions, vec![Action::Archived, Action::Trashed]);
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(" Business "), "business");
        assert_eq!(normalize_category("  "), "personal");
    }

    #[test]
    fn test_view_redacts_collaborators() {
        let owner = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let note = shared_note(owner, viewer, Permission::Viewer);

        let owner_view = NoteView::for_user(note.clone(), &owner).unwrap();
        assert_eq!(owner_view.shared_with.map(|shares| shares.len()), Some(1));

        let viewer_view = NoteView::for_user(note.clone(), &viewer).unwrap();
        assert_eq!(viewer_view.role, Role::Viewer);
        assert!(viewer_view.shared_with.is_none());
        assert!(viewer_view.activity_log.is_none());

        assert!(NoteView::for_user(note, &Uuid::new_v4()).is_err());
    }

    /// Sink that never accepts anything
    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn append(
            &self,
            _values: &CreateNotificationValues,
        ) -> storage::Result<Notification> {
            Err(storage::Error::Connection("feed unavailable".to_string()))
        }
    }

    async fn create_user(storage: &Memory, email: &str) -> User {
        storage
            .create_user(&CreateUserValues {
                name: "Someone",
                email,
                hashed_password: "not-a-hash",
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_failing_notification_does_not_fail_share() {
        let storage = Memory::new();
        let owner = create_user(&storage, "owner@example.com").await;
        let user = create_user(&storage, "user@example.com").await;

        let sharing = Sharing::with_sink(&storage, &FailingSink);
        let note = sharing
            .create(&owner, "Plans", "", None)
            .await
            .unwrap();

        let shared = sharing
            .share(&note.id, &owner.id, &user.id, Permission::Editor)
            .await
            .unwrap();
        assert_eq!(shared.shared_with.len(), 1);

        let stored = sharing.fetch(&note.id, &user.id).await.unwrap();
        assert_eq!(stored.version, 2);

        let notifications = storage
            .find_notifications_by_recipient(&user.id, 50)
            .await
            .unwrap();
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn test_commit_detects_stale_versions() {
        let storage = Memory::new();
        let owner = create_user(&storage, "owner@example.com").await;

        let sharing = Sharing::new(&storage);
        let note = sharing.create(&owner, "Plans", "", None).await.unwrap();

        let mut stale = note.clone();
        stale.title = "Stale".to_string();
        stale.version = 2;

        let edited = sharing
            .edit_content(
                &note.id,
                &owner.id,
                ContentChanges {
                    title: Some("Fresh"),
                    ..ContentChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.version, 2);

        // the stale writer still expects version 1
        assert!(!storage.update_note(1, &stale).await.unwrap());

        let stored = sharing.fetch(&note.id, &owner.id).await.unwrap();
        assert_eq!(stored.title, "Fresh");
    }
}
