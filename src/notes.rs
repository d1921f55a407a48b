use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Maximum length of a note title
pub const TITLE_MAX_LENGTH: usize = 200;

/// Maximum length of a note body
pub const BODY_MAX_LENGTH: usize = 10_000;

/// Category of a note when none is given
pub const DEFAULT_CATEGORY: &str = "personal";

/// Permission granted to a collaborator
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read only
    Viewer,
    /// Read and change title/body
    Editor,
}

/// A single collaborator of a note
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub user_id: Uuid,
    pub permission: Permission,
}

/// Kind of entry in the activity log
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Edited,
    Shared,
    PermissionChanged,
    Unshared,
    Archived,
    Unarchived,
    Trashed,
    Restored,
}

/// Entry in the append-only activity log of a note
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub action: Action,
    pub actor_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub meta: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
    pub shared_with: Vec<Share>,
    pub activity_log: Vec<Activity>,
    pub last_edited_by: Option<Uuid>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub is_trashed: bool,
    /// Write counter, every stored change increments it
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Find the share entry of a user
    pub fn share_of(&self, user_id: &Uuid) -> Option<&Share> {
        self.shared_with.iter().find(|share| &share.user_id == user_id)
    }

    /// Append an entry to the activity log
    pub fn log(
        &mut self,
        action: Action,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
        meta: serde_json::Value,
    ) {
        self.activity_log.push(Activity {
            action,
            actor_id,
            timestamp,
            meta,
        });
    }
}
