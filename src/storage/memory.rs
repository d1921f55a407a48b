//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notes::Note;
use crate::notifications::Notification;
use crate::users::User;

use super::CreateNotificationValues;
use super::CreateNoteValues;
use super::CreateUserValues;
use super::Error;
use super::NoteFilter;
use super::Result;
use super::Storage;
use super::TokenHashValues;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<Uuid, User>>>,

    /// All notes in storage
    notes: Arc<Mutex<HashMap<Uuid, Note>>>,

    /// All notifications in storage, in order of creation
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = self.users.lock().await;

        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn find_users_by_email_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        let prefix = prefix.to_lowercase();

        let mut users = self
            .users
            .lock()
            .await
            .values()
            .filter(|user| user.email.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect::<Vec<User>>();

        users.sort_by(|a, b| a.email.cmp(&b.email));
        users.truncate(limit);

        Ok(users)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|user| user.email == values.email) {
            return Err(Error::UniqueViolation("email"));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: values.name.to_string(),
            email: values.email.to_string(),
            hashed_password: values.hashed_password.to_string(),
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            password_reset_token_hash: None,
            password_reset_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn set_refresh_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()> {
        if let Some(user) = self.users.lock().await.get_mut(user_id) {
            user.refresh_token_hash = values.map(|values| values.hash.to_string());
            user.refresh_token_expires_at = values.map(|values| values.expires_at);
            user.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        user_id: &Uuid,
        current_hash: &str,
        values: &TokenHashValues,
    ) -> Result<bool> {
        let mut users = self.users.lock().await;

        let Some(user) = users.get_mut(user_id) else {
            return Ok(false);
        };

        if user.refresh_token_hash.as_deref() != Some(current_hash) {
            return Ok(false);
        }

        user.refresh_token_hash = Some(values.hash.to_string());
        user.refresh_token_expires_at = Some(values.expires_at);
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn clear_refresh_token_if(&self, user_id: &Uuid, current_hash: &str) -> Result<bool> {
        let mut users = self.users.lock().await;

        match users.get_mut(user_id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(current_hash) => {
                user.refresh_token_hash = None;
                user.refresh_token_expires_at = None;
                user.updated_at = Utc::now();

                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_password_reset_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()> {
        if let Some(user) = self.users.lock().await.get_mut(user_id) {
            user.password_reset_token_hash = values.map(|values| values.hash.to_string());
            user.password_reset_expires_at = values.map(|values| values.expires_at);
            user.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: &Uuid,
        reset_hash: &str,
        hashed_password: &str,
    ) -> Result<bool> {
        let mut users = self.users.lock().await;

        match users.get_mut(user_id) {
            Some(user) if user.password_reset_token_hash.as_deref() == Some(reset_hash) => {
                user.hashed_password = hashed_password.to_string();
                user.password_reset_token_hash = None;
                user.password_reset_expires_at = None;
                user.refresh_token_hash = None;
                user.refresh_token_expires_at = None;
                user.updated_at = Utc::now();

                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_single_note_by_id(&self, id: &Uuid) -> Result<Option<Note>> {
        Ok(self.notes.lock().await.get(id).cloned())
    }

    async fn find_notes_by_owner(
        &self,
        owner_id: &Uuid,
        filter: &NoteFilter,
    ) -> Result<Vec<Note>> {
        let mut notes = self
            .notes
            .lock()
            .await
            .values()
            .filter(|note| {
                &note.owner_id == owner_id
                    && note.is_archived == filter.archived
                    && note.is_trashed == filter.trashed
            })
            .cloned()
            .collect::<Vec<Note>>();

        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(notes)
    }

    async fn find_notes_shared_with(&self, user_id: &Uuid) -> Result<Vec<Note>> {
        let mut notes = self
            .notes
            .lock()
            .await
            .values()
            .filter(|note| {
                &note.owner_id != user_id
                    && !note.is_archived
                    && !note.is_trashed
                    && note.share_of(user_id).is_some()
            })
            .cloned()
            .collect::<Vec<Note>>();

        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(notes)
    }

    async fn find_notes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Note>> {
        let notes = self.notes.lock().await;

        Ok(ids.iter().filter_map(|id| notes.get(id).cloned()).collect())
    }

    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note> {
        let now = Utc::now();

        let note = Note {
            id: Uuid::new_v4(),
            owner_id: values.owner.id,
            title: values.title.to_string(),
            body: values.body.to_string(),
            category: values.category.to_string(),
            shared_with: Vec::new(),
            activity_log: vec![values.activity.clone()],
            last_edited_by: None,
            last_edited_at: None,
            is_archived: false,
            is_trashed: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.notes.lock().await.insert(note.id, note.clone());

        Ok(note)
    }

    async fn update_note(&self, expected_version: i64, note: &Note) -> Result<bool> {
        let mut notes = self.notes.lock().await;

        match notes.get_mut(&note.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = note.clone();

                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_trashed_note(&self, owner_id: &Uuid, note_id: &Uuid) -> Result<bool> {
        let mut notes = self.notes.lock().await;

        let is_match = notes
            .get(note_id)
            .is_some_and(|note| &note.owner_id == owner_id && note.is_trashed);

        if is_match {
            notes.remove(note_id);
        }

        Ok(is_match)
    }

    async fn create_notification(
        &self,
        values: &CreateNotificationValues,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: values.recipient_id,
            actor_id: values.actor_id,
            note_id: values.note_id,
            notification_type: values.notification_type,
            permission: values.permission,
            read_at: None,
            created_at: Utc::now(),
        };

        self.notifications.lock().await.push(notification.clone());

        Ok(notification)
    }

    async fn find_notifications_by_recipient(
        &self,
        recipient_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .lock()
            .await
            .iter()
            .rev()
            .filter(|notification| &notification.recipient_id == recipient_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_notification(&self, recipient_id: &Uuid, id: &Uuid) -> Result<bool> {
        let mut notifications = self.notifications.lock().await;

        let before = notifications.len();
        notifications.retain(|notification| {
            !(&notification.id == id && &notification.recipient_id == recipient_id)
        });

        Ok(notifications.len() != before)
    }

    async fn delete_notifications_by_recipient(&self, recipient_id: &Uuid) -> Result<u64> {
        let mut notifications = self.notifications.lock().await;

        let before = notifications.len();
        notifications.retain(|notification| &notification.recipient_id != recipient_id);

        Ok((before - notifications.len()) as u64)
    }
}
