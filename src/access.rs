//! Role resolution for notes
//!
//! Pure functions of a note and a user, no storage involved

use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::error::Result;
use crate::notes::Note;
use crate::notes::Permission;

/// Role of a user on a note
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the note, can do everything
    Owner,
    /// Can read and change title/body
    Editor,
    /// Can read
    Viewer,
}

impl Role {
    /// Read the note
    #[allow(clippy::unused_self)] // every role can read
    pub fn can_view(self) -> bool {
        true
    }

    /// Change title and body
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    /// Archive, trash, delete, share and change the category
    pub fn can_manage(self) -> bool {
        self == Role::Owner
    }
}

impl From<Permission> for Role {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Viewer => Role::Viewer,
            Permission::Editor => Role::Editor,
        }
    }
}

/// Resolve the role of a user on a note, `None` when the user has no access at all
pub fn role(note: &Note, user_id: &Uuid) -> Option<Role> {
    if &note.owner_id == user_id {
        Some(Role::Owner)
    } else {
        note.share_of(user_id).map(|share| Role::from(share.permission))
    }
}

/// Require read access
///
/// No access is reported as not found, so the existence of the note never leaks
pub fn require_view(note: &Note, user_id: &Uuid) -> Result<Role> {
    role(note, user_id)
        .filter(|role| role.can_view())
        .ok_or(Error::NotFound("Note not found"))
}

/// Require edit access
pub fn require_edit(note: &Note, user_id: &Uuid) -> Result<Role> {
    let role = require_view(note, user_id)?;

    if role.can_edit() {
        Ok(role)
    } else {
        Err(Error::Forbidden("Not allowed to edit this note"))
    }
}

/// Require manage access, only the owner has it
pub fn require_manage(note: &Note, user_id: &Uuid) -> Result<Role> {
    let role = require_view(note, user_id)?;

    if role.can_manage() {
        Ok(role)
    } else {
        Err(Error::Forbidden("Only the owner can do this"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Utc;

    use super::*;
    use crate::notes::Share;

    pub fn note_owned_by(owner_id: Uuid) -> Note {
        Note {
            id: Uuid::new_v4(),
            owner_id,
            title: "Groceries".to_string(),
            body: "Milk".to_string(),
            category: "personal".to_string(),
            shared_with: Vec::new(),
            activity_log: Vec::new(),
            last_edited_by: None,
            last_edited_at: None,
            is_archived: false,
            is_trashed: false,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_role() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        assert_eq!(role(&note, &owner), Some(Role::Owner));
        assert!(require_manage(&note, &owner).is_ok());
    }

    #[test]
    fn test_stranger_has_no_role() {
        let note = note_owned_by(Uuid::new_v4());
        let stranger = Uuid::new_v4();

        assert_eq!(role(&note, &stranger), None);
        assert!(matches!(
            require_view(&note, &stranger),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            require_manage(&note, &stranger),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_editor_capabilities() {
        let editor = Uuid::new_v4();
        let mut note = note_owned_by(Uuid::new_v4());
        note.shared_with.push(Share {
            user_id: editor,
            permission: Permission::Editor,
        });

        let editor_role = role(&note, &editor).unwrap();
        assert_eq!(editor_role, Role::Editor);
        assert!(editor_role.can_view());
        assert!(editor_role.can_edit());
        assert!(!editor_role.can_manage());
        assert!(matches!(
            require_manage(&note, &editor),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_viewer_capabilities() {
        let viewer = Uuid::new_v4();
        let mut note = note_owned_by(Uuid::new_v4());
        note.shared_with.push(Share {
            user_id: viewer,
            permission: Permission::Viewer,
        });

        assert_eq!(role(&note, &viewer), Some(Role::Viewer));
        assert!(require_view(&note, &viewer).is_ok());
        assert!(matches!(
            require_edit(&note, &viewer),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_role_is_deterministic() {
        let owner = Uuid::new_v4();
        let note = note_owned_by(owner);

        for _ in 0..3 {
            assert_eq!(role(&note, &owner), Some(Role::Owner));
        }
    }
}
