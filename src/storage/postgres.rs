//! Postgres storage

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::json;
use sqlx::FromRow;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use crate::notes::Activity;
use crate::notes::Note;
use crate::notes::Permission;
use crate::notes::Share;
use crate::notifications::Notification;
use crate::notifications::NotificationType;
use crate::users::User;

use super::CreateNoteValues;
use super::CreateNotificationValues;
use super::CreateUserValues;
use super::Error;
use super::NoteFilter;
use super::Result;
use super::Storage;
use super::TokenHashValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

const USER_COLUMNS: &str = r"
    id,
    name,
    email,
    hashed_password,
    refresh_token_hash,
    refresh_token_expires_at,
    password_reset_token_hash,
    password_reset_expires_at,
    created_at,
    updated_at
";

const NOTE_COLUMNS: &str = r"
    id,
    owner_id,
    title,
    body,
    category,
    shared_with,
    activity_log,
    last_edited_by,
    last_edited_at,
    is_archived,
    is_trashed,
    version,
    created_at,
    updated_at
";

const NOTIFICATION_COLUMNS: &str = r"
    id,
    recipient_id,
    actor_id,
    note_id,
    type,
    permission,
    read_at,
    created_at
";

/// Postgres type for notification type
#[derive(Clone, Copy, PartialEq, Debug, sqlx::Type)]
#[sqlx(type_name = "notification_type")]
#[sqlx(rename_all = "snake_case")]
enum NotificationTypeColumn {
    Shared,
    Unshared,
    PermissionChanged,
}

impl From<NotificationType> for NotificationTypeColumn {
    fn from(notification_type: NotificationType) -> Self {
        match notification_type {
            NotificationType::Shared => Self::Shared,
            NotificationType::Unshared => Self::Unshared,
            NotificationType::PermissionChanged => Self::PermissionChanged,
        }
    }
}

impl From<NotificationTypeColumn> for NotificationType {
    fn from(column: NotificationTypeColumn) -> Self {
        match column {
            NotificationTypeColumn::Shared => Self::Shared,
            NotificationTypeColumn::Unshared => Self::Unshared,
            NotificationTypeColumn::PermissionChanged => Self::PermissionChanged,
        }
    }
}

/// Postgres type for permission
#[derive(Clone, Copy, PartialEq, Debug, sqlx::Type)]
#[sqlx(type_name = "permission_type")]
#[sqlx(rename_all = "snake_case")]
enum PermissionColumn {
    Viewer,
    Editor,
}

impl From<Permission> for PermissionColumn {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Viewer => Self::Viewer,
            Permission::Editor => Self::Editor,
        }
    }
}

impl From<PermissionColumn> for Permission {
    fn from(column: PermissionColumn) -> Self {
        match column {
            PermissionColumn::Viewer => Self::Viewer,
            PermissionColumn::Editor => Self::Editor,
        }
    }
}

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Use the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    pub async fn new() -> anyhow::Result<Self> {
        let database_connection_string =
            std::env::var("DATABASE_URL").context("Missing DATABASE_URL")?;

        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_connection_string)
            .await
            .context("Could not connect to the database")?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> anyhow::Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .context("Migrations could not run")?;

        Ok(Self { connection_pool })
    }
}

/// Postgres version of user
#[derive(FromRow)]
struct PostgresUser {
    id: Uuid,
    name: String,
    email: String,
    hashed_password: String,
    refresh_token_hash: Option<String>,
    refresh_token_expires_at: Option<DateTime<Utc>>,
    password_reset_token_hash: Option<String>,
    password_reset_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostgresUser> for User {
    fn from(user: PostgresUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            hashed_password: user.hashed_password,
            refresh_token_hash: user.refresh_token_hash,
            refresh_token_expires_at: user.refresh_token_expires_at,
            password_reset_token_hash: user.password_reset_token_hash,
            password_reset_expires_at: user.password_reset_expires_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Postgres version of note
///
/// Collaborators and the activity log live in JSONB columns of the note itself, so a single
/// conditional `UPDATE` writes the whole note
#[derive(FromRow)]
struct PostgresNote {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    body: String,
    category: String,
    shared_with: Json<Vec<Share>>,
    activity_log: Json<Vec<Activity>>,
    last_edited_by: Option<Uuid>,
    last_edited_at: Option<DateTime<Utc>>,
    is_archived: bool,
    is_trashed: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostgresNote> for Note {
    fn from(note: PostgresNote) -> Self {
        Self {
            id: note.id,
            owner_id: note.owner_id,
            title: note.title,
            body: note.body,
            category: note.category,
            shared_with: note.shared_with.0,
            activity_log: note.activity_log.0,
            last_edited_by: note.last_edited_by,
            last_edited_at: note.last_edited_at,
            is_archived: note.is_archived,
            is_trashed: note.is_trashed,
            version: note.version,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Postgres version of notification
#[derive(FromRow)]
struct PostgresNotification {
    id: Uuid,
    recipient_id: Uuid,
    actor_id: Uuid,
    note_id: Uuid,
    #[sqlx(rename = "type")]
    notification_type: NotificationTypeColumn,
    permission: Option<PermissionColumn>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<PostgresNotification> for Notification {
    fn from(notification: PostgresNotification) -> Self {
        Self {
            id: notification.id,
            recipient_id: notification.recipient_id,
            actor_id: notification.actor_id,
            note_id: notification.note_id,
            notification_type: notification.notification_type.into(),
            permission: notification.permission.map(Permission::from),
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }
}

/// Escape the wildcards of a `LIKE` pattern
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl Storage for Postgres {
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(user.map(User::from))
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(user.map(User::from))
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(users.into_iter().map(User::from).collect())
    }

    async fn find_users_by_email_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<User>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));

        let users = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email LIKE $1 ESCAPE '\'
            ORDER BY email
            LIMIT $2
            "
        ))
        .bind(pattern)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(users.into_iter().map(User::from).collect())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            INSERT INTO users (id, name, email, hashed_password)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.name)
        .bind(values.email)
        .bind(values.hashed_password)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                Error::UniqueViolation("email")
            }
            err => connection_error(err),
        })?;

        Ok(user.into())
    }

    async fn set_refresh_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE users
            SET refresh_token_hash = $1,
                refresh_token_expires_at = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            ",
        )
        .bind(values.map(|values| values.hash))
        .bind(values.map(|values| values.expires_at))
        .bind(user_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        user_id: &Uuid,
        current_hash: &str,
        values: &TokenHashValues,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET refresh_token_hash = $1,
                refresh_token_expires_at = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND refresh_token_hash = $4
            ",
        )
        .bind(values.hash)
        .bind(values.expires_at)
        .bind(user_id)
        .bind(current_hash)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token_if(&self, user_id: &Uuid, current_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET refresh_token_hash = NULL,
                refresh_token_expires_at = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND refresh_token_hash = $2
            ",
        )
        .bind(user_id)
        .bind(current_hash)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_password_reset_token(
        &self,
        user_id: &Uuid,
        values: Option<&TokenHashValues>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE users
            SET password_reset_token_hash = $1,
                password_reset_expires_at = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            ",
        )
        .bind(values.map(|values| values.hash))
        .bind(values.map(|values| values.expires_at))
        .bind(user_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: &Uuid,
        reset_hash: &str,
        hashed_password: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET hashed_password = $1,
                password_reset_token_hash = NULL,
                password_reset_expires_at = NULL,
                refresh_token_hash = NULL,
                refresh_token_expires_at = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND password_reset_token_hash = $3
            ",
        )
        .bind(hashed_password)
        .bind(user_id)
        .bind(reset_hash)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_single_note_by_id(&self, id: &Uuid) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(note.map(Note::from))
    }

    async fn find_notes_by_owner(
        &self,
        owner_id: &Uuid,
        filter: &NoteFilter,
    ) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE owner_id = $1 AND is_archived = $2 AND is_trashed = $3
            ORDER BY updated_at DESC
            "
        ))
        .bind(owner_id)
        .bind(filter.archived)
        .bind(filter.trashed)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notes.into_iter().map(Note::from).collect())
    }

    async fn find_notes_shared_with(&self, user_id: &Uuid) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE shared_with @> $1
                AND owner_id <> $2
                AND NOT is_archived
                AND NOT is_trashed
            ORDER BY updated_at DESC
            "
        ))
        .bind(Json(json!([{ "userId": user_id }])))
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notes.into_iter().map(Note::from).collect())
    }

    async fn find_notes_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, PostgresNote>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notes.into_iter().map(Note::from).collect())
    }

    async fn create_note(&self, values: &CreateNoteValues) -> Result<Note> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            r"
            INSERT INTO notes (id, owner_id, title, body, category, activity_log)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.owner.id)
        .bind(values.title)
        .bind(values.body)
        .bind(values.category)
        .bind(Json(vec![values.activity.clone()]))
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(note.into())
    }

    async fn update_note(&self, expected_version: i64, note: &Note) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE notes
            SET title = $1,
                body = $2,
                category = $3,
                shared_with = $4,
                activity_log = $5,
                last_edited_by = $6,
                last_edited_at = $7,
                is_archived = $8,
                is_trashed = $9,
                version = $10,
                updated_at = $11
            WHERE id = $12 AND version = $13
            ",
        )
        .bind(&note.title)
        .bind(&note.body)
        .bind(&note.category)
        .bind(Json(&note.shared_with))
        .bind(Json(&note.activity_log))
        .bind(note.last_edited_by)
        .bind(note.last_edited_at)
        .bind(note.is_archived)
        .bind(note.is_trashed)
        .bind(note.version)
        .bind(note.updated_at)
        .bind(note.id)
        .bind(expected_version)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_trashed_note(&self, owner_id: &Uuid, note_id: &Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM notes
            WHERE id = $1 AND owner_id = $2 AND is_trashed
            ",
        )
        .bind(note_id)
        .bind(owner_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_notification(
        &self,
        values: &CreateNotificationValues,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, PostgresNotification>(&format!(
            r"
            INSERT INTO notifications (id, recipient_id, actor_id, note_id, type, permission)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.recipient_id)
        .bind(values.actor_id)
        .bind(values.note_id)
        .bind(NotificationTypeColumn::from(values.notification_type))
        .bind(values.permission.map(PermissionColumn::from))
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notification.into())
    }

    async fn find_notifications_by_recipient(
        &self,
        recipient_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, PostgresNotification>(&format!(
            r"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "
        ))
        .bind(recipient_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notifications.into_iter().map(Notification::from).collect())
    }

    async fn delete_notification(&self, recipient_id: &Uuid, id: &Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM notifications
            WHERE id = $1 AND recipient_id = $2
            ",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_notifications_by_recipient(&self, recipient_id: &Uuid) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM notifications
            WHERE recipient_id = $1
            ",
        )
        .bind(recipient_id)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected())
    }
}

/// Convert `SQLx` to storage connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}
