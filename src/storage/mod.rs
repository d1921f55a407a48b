//! All things related to the storage of users, notes and notifications

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::notes::Activity;
use crate::notes::Note;
use crate::notes::Permission;
use crate::notifications::Notification;
use crate::notifications::NotificationType;
use crate::users::User;

pub use memory::Memory;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> anyhow::Result<Memory> {
    tracing::info!("Using in-memory storage, all data is lost on shutdown");

    Ok(Memory::new())
}

/// Setup the storage
///
/// Uses the `DATABASE_URL` environment variable
#[cfg(feature = "postgres")]
pub async fn setup() -> anyhow::Result<Postgres> {
    Postgres::new().await
}

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// A unique key already exists
    #[error("Unique violation: {0}")]
    UniqueViolation(&'static str),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// Display name
    pub name: &'a str,

    /// Normalized email address, unique
    pub email: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,
}

/// A hashed token with its expiry
pub struct TokenHashValues<'a> {
    /// Hex encoded SHA-256 of the token
    pub hash: &'a str,

    /// Moment the token stops being valid
    pub expires_at: DateTime<Utc>,
}

/// Values to create a Note
pub struct CreateNoteValues<'a> {
    /// User creating (and owning) the note
    pub owner: &'a User,

    /// Trimmed title
    pub title: &'a str,

    /// Trimmed body
    pub body: &'a str,

    /// Category key
    pub category: &'a str,

    /// Initial activity log, the `created` entry
    pub activity: Activity,
}

/// Filter to list the notes of an owner
#[derive(Clone, Copy, Debug, Default)]
pub struct NoteFilter {
    /// Only archived, or only not archived
    pub archived: bool,

    /// Only trashed, or only not trashed
    pub trashed: bool,
}

/// Values to create a Notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateNotificationValues {
    /// Who receives the notification
    pub recipient_id: Uuid,

    /// Who caused it
    pub actor_id: Uuid,

    /// About which note
    pub note_id: Uuid,

    /// What happened
    pub notification_type: NotificationType,

    /// The new permission, if any
    pub permission: Option<Permission>,
}

/// Storage with all supported operations
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Finds a single user by its (normalized) email address
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds all users with one of the IDs
    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// Finds users with an email address starting with the prefix, case-insensitive
    async fn find_users_by_email_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<User>>;

    /// Create a single user
    ///
    /// Fails with [`Error::UniqueViolation`] when the email address is taken
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Overwrite (or clear) the refresh token of a user
    async fn set_refresh_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()>;

    /// Replace the refresh token of a user, only when the stored hash is still `current_hash`
    ///
    /// Returns `false` when another writer replaced or cleared the token first
    async fn replace_refresh_token(
        &self,
        user_id: &Uuid,
        current_hash: &str,
        values: &TokenHashValues,
    ) -> Result<bool>;

    /// Clear the refresh token of a user, only when the stored hash is `current_hash`
    async fn clear_refresh_token_if(&self, user_id: &Uuid, current_hash: &str) -> Result<bool>;

    /// Overwrite (or clear) the password reset token of a user
    async fn set_password_reset_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()>;

    /// Set a new password when the stored reset hash is still `reset_hash`
    ///
    /// Clears the password reset token and the refresh token in the same write
    async fn reset_password(
        &self,
        user_id: &Uuid,
        reset_hash: &str,
        hashed_password: &str,
    ) -> Result<bool>;

    /// Find a single note by ID
    async fn find_single_note_by_id(&self, id: &Uuid) -> Result<Option<Note>>;

    /// Find all notes of an owner, most recently updated first
    async fn find_notes_by_owner(&self, owner_id: &Uuid, filter: &NoteFilter)
    -> Result<Vec<Note>>;

    /// Find notes shared with a user, skipping archived/trashed notes and notes owned by the user
    async fn find_notes_shared_with(&self, user_id: &Uuid) -> Result<Vec<Note>>;

    /// Find all notes with one of the IDs
    async fn find_notes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Note>>;

    /// Create a note
    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note>;

    /// Write a note, only when the stored version is still `expected_version`
    ///
    /// Returns `false` on a version conflict
    async fn update_note(&self, expected_version: i64, note: &Note) -> Result<bool>;

    /// Delete a trashed note of an owner
    ///
    /// Returns `false` when nothing matched
    async fn delete_trashed_note(&self, owner_id: &Uuid, note_id: &Uuid) -> Result<bool>;

    /// Create a notification
    async fn create_notification(&self, values: &CreateNotificationValues)
    -> Result<Notification>;

    /// Find the latest notifications of a recipient, newest first
    async fn find_notifications_by_recipient(
        &self,
        recipient_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>>;

    /// Delete a notification of a recipient
    ///
    /// Returns `false` when the recipient has no such notification
    async fn delete_notification(&self, recipient_id: &Uuid, id: &Uuid) -> Result<bool>;

    /// Delete all notifications of a recipient, returns the number deleted
    async fn delete_notifications_by_recipient(&self, recipient_id: &Uuid) -> Result<u64>;
}
