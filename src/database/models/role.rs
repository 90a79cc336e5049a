use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Action;

/// Write-action flags on one grant. Read is implied by the grant existing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFlags {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

impl ActionFlags {
    pub fn all() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
        }
    }

    /// Whether this grant permits `action`. Possessing any grant implies
    /// read visibility, regardless of the write flags.
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => true,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

/// A role's permission record for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePermission {
    pub page_id: Uuid,
    pub actions: ActionFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub page_permissions: Vec<PagePermission>,
}

impl Role {
    pub fn permission_for(&self, page_id: Uuid) -> Option<&PagePermission> {
        self.page_permissions.iter().find(|p| p.page_id == page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_implied_by_any_grant() {
        let none = ActionFlags::default();
        assert!(none.allows(Action::Read));
        assert!(!none.allows(Action::Create));
        assert!(!none.allows(Action::Update));
        assert!(!none.allows(Action::Delete));
    }

    #[test]
    fn write_actions_follow_flags() {
        let flags = ActionFlags {
            create: true,
            update: false,
            delete: true,
        };
        assert!(flags.allows(Action::Create));
        assert!(!flags.allows(Action::Update));
        assert!(flags.allows(Action::Delete));
    }
}
