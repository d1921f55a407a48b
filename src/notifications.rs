//! Notification feed
//!
//! Per-recipient, append-only. Entries are never updated, only deleted by their recipient.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::error::Result;
use crate::notes::Note;
use crate::notes::Permission;
use crate::storage;
use crate::storage::CreateNotificationValues;
use crate::storage::Storage;
use crate::users::User;

/// Size of the read window of the feed
pub const FEED_LIMIT: usize = 50;

/// Shown when the actor of a notification no longer exists
const UNKNOWN_ACTOR: &str = "Someone";

/// Shown when the note of a notification no longer exists or has no title
const UNKNOWN_NOTE: &str = "Untitled note";

/// Type of notification
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Shared,
    Unshared,
    PermissionChanged,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub note_id: Uuid,
    pub notification_type: NotificationType,
    /// Only set for `shared` and `permission_changed`
    pub permission: Option<Permission>,
    /// Part of the model, no operation sets it yet
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Something that accepts new notifications
///
/// Storage is the real sink, tests swap in failing ones
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Append a notification to the feed of its recipient
    async fn append(&self, values: &CreateNotificationValues) -> storage::Result<Notification>;
}

#[async_trait]
impl<S: Storage> NotificationSink for S {
    async fn append(&self, values: &CreateNotificationValues) -> storage::Result<Notification> {
        self.create_notification(values).await
    }
}

/// Actor information shown with a notification
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// A notification enriched with its actor and note, as read by the recipient
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub note_id: Uuid,
    pub note_title: String,
    pub actor: ActorSummary,
    pub permission: Option<Permission>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

impl FeedEntry {
    /// Enrich a notification, degrading to placeholders for deleted actors/notes
    fn new(notification: Notification, actor: Option<&User>, note: Option<&Note>) -> Self {
        let who = actor.map_or(UNKNOWN_ACTOR, User::display_name);

        let note_title = note
            .map(|note| note.title.as_str())
            .filter(|title| !title.is_empty())
            .unwrap_or(UNKNOWN_NOTE)
            .to_string();

        let message = match notification.notification_type {
            NotificationType::Shared => format!("{who} shared a note with you • {note_title}"),
            NotificationType::Unshared => format!("{who} unshared a note with you • {note_title}"),
            NotificationType::PermissionChanged => format!(
                "{who} changed your permission to {} • {note_title}",
                notification.permission.map_or("", permission_label)
            ),
        };

        Self {
            id: notification.id,
            notification_type: notification.notification_type,
            note_id: notification.note_id,
            note_title,
            actor: ActorSummary {
                id: notification.actor_id,
                name: actor.map(|actor| actor.name.clone()),
                email: actor.map(|actor| actor.email.clone()),
            },
            permission: notification.permission,
            read_at: notification.read_at,
            created_at: notification.created_at,
            message,
        }
    }
}

fn permission_label(permission: Permission) -> &'static str {
    match permission {
        Permission::Viewer => "viewer",
        Permission::Editor => "editor",
    }
}

/// List the most recent notifications of a recipient, newest first
///
/// Actors and notes are joined at read time, missing ones never fail the listing
pub async fn list<S: Storage>(storage: &S, recipient_id: &Uuid) -> Result<Vec<FeedEntry>> {
    let notifications = storage
        .find_notifications_by_recipient(recipient_id, FEED_LIMIT)
        .await?;

    let mut actor_ids = notifications
        .iter()
        .map(|notification| notification.actor_id)
        .collect::<Vec<Uuid>>();
    actor_ids.sort_unstable();
    actor_ids.dedup();

    let mut note_ids = notifications
        .iter()
        .map(|notification| notification.note_id)
        .collect::<Vec<Uuid>>();
    note_ids.sort_unstable();
    note_ids.dedup();

    let actors = storage
        .find_users_by_ids(&actor_ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect::<HashMap<Uuid, User>>();

    let notes = storage
        .find_notes_by_ids(&note_ids)
        .await?
        .into_iter()
        .map(|note| (note.id, note))
        .collect::<HashMap<Uuid, Note>>();

    Ok(notifications
        .into_iter()
        .map(|notification| {
            let actor = actors.get(&notification.actor_id);
            let note = notes.get(&notification.note_id);

            FeedEntry::new(notification, actor, note)
        })
        .collect())
}

/// Delete a single notification of a recipient
///
/// Notifications of other recipients are reported as not found
pub async fn delete<S: Storage>(storage: &S, recipient_id: &Uuid, id: &Uuid) -> Result<()> {
    if storage.delete_notification(recipient_id, id).await? {
        Ok(())
    } else {
        Err(Error::NotFound("Notification not found"))
    }
}

/// Delete all notifications of a recipient
pub async fn clear<S: Storage>(storage: &S, recipient_id: &Uuid) -> Result<u64> {
    let deleted = storage
        .delete_notifications_by_recipient(recipient_id)
        .await?;

    Ok(deleted)
}
