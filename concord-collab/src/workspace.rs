//! Workspaces: the top-level container owning rooms and documents, and the
//! membership policy deciding who may enter them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{CollabError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Private,
    /// Anyone may join rooms; joining makes them a member
    Public,
}

/// Who may add members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvitePolicy {
    OwnerOnly,
    #[default]
    Members,
    Anyone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub members: BTreeSet<Uuid>,
    pub rooms: Vec<Uuid>,
    pub documents: Vec<Uuid>,
    pub visibility: Visibility,
    pub invite_policy: InvitePolicy,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// Workspace whose only member is `owner`.
    pub fn new(name: impl Into<String>, owner: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner,
            members: BTreeSet::from([owner]),
            rooms: Vec::new(),
            documents: Vec::new(),
            visibility: Visibility::default(),
            invite_policy: InvitePolicy::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_policy(mut self, visibility: Visibility, invite_policy: InvitePolicy) -> Self {
        self.visibility = visibility;
        self.invite_policy = invite_policy;
        self
    }

    pub fn is_member(&self, user_id: &Uuid) -> bool {
        self.members.contains(user_id)
    }

    pub fn can_invite(&self, inviter: &Uuid) -> bool {
        match self.invite_policy {
            InvitePolicy::OwnerOnly => *inviter == self.owner,
            InvitePolicy::Members => self.is_member(inviter),
            InvitePolicy::Anyone => true,
        }
    }

    /// Add `user_id` on behalf of `inviter`. Returns `false` if already a member.
    pub fn add_member(&mut self, inviter: &Uuid, user_id: Uuid) -> Result<bool> {
        if !self.can_invite(inviter) {
            return Err(CollabError::NotMember { workspace: self.id, user: *inviter });
        }
        Ok(self.members.insert(user_id))
    }

    /// Check that `user_id` may enter this workspace's rooms and documents
    /// without changing membership.
    pub fn check_access(&self, user_id: &Uuid) -> Result<()> {
        if self.is_member(user_id) || self.visibility == Visibility::Public {
            Ok(())
        } else {
            Err(CollabError::NotMember { workspace: self.id, user: *user_id })
        }
    }

    /// Like [`check_access`](Self::check_access), but public workspaces
    /// record the user as a member. Returns `true` if membership was added.
    pub fn admit(&mut self, user_id: Uuid) -> Result<bool> {
        self.check_access(&user_id)?;
        Ok(self.members.insert(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_member() {
        let owner = Uuid::new_v4();
        let ws = Workspace::new("design", owner);
        assert!(ws.is_member(&owner));
        assert_eq!(ws.visibility, Visibility::Private);
    }

    #[test]
    fn test_private_admits_members_only() {
        let owner = Uuid::new_v4();
        let mut ws = Workspace::new("design", owner);
        let stranger = Uuid::new_v4();

        assert!(matches!(ws.admit(stranger), Err(CollabError::NotMember { .. })));
        assert!(ws.check_access(&stranger).is_err());
        ws.add_member(&owner, stranger).unwrap();
        assert!(!ws.admit(stranger).unwrap());
    }

    #[test]
    fn test_public_admits_and_records() {
        let mut ws = Workspace::new("open", Uuid::new_v4())
            .with_policy(Visibility::Public, InvitePolicy::Anyone);
        let visitor = Uuid::new_v4();

        assert!(ws.check_access(&visitor).is_ok());
        assert!(!ws.is_member(&visitor));
        assert!(ws.admit(visitor).unwrap());
        assert!(ws.is_member(&visitor));
    }

    #[test]
    fn test_invite_policies() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();

        let mut ws = Workspace::new("w", owner).with_policy(Visibility::Private, InvitePolicy::OwnerOnly);
        ws.members.insert(member);
        assert!(ws.can_invite(&owner));
        assert!(!ws.can_invite(&member));

        ws.invite_policy = InvitePolicy::Members;
        assert!(ws.can_invite(&member));
        assert!(!ws.can_invite(&outsider));

        ws.invite_policy = InvitePolicy::Anyone;
        assert!(ws.can_invite(&outsider));
    }

    #[test]
    fn test_add_member_reports_duplicates() {
        let owner = Uuid::new_v4();
        let mut ws = Workspace::new("w", owner);
        let user = Uuid::new_v4();
        assert!(ws.add_member(&owner, user).unwrap());
        assert!(!ws.add_member(&owner, user).unwrap());
    }
}
