// DMS2
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Identity, group and resource storage layer

use crate::models::{DocumentId, DocumentRecord, Group, GroupId, GroupStatus, GroupUpdate, Membership, NewGroup, ResourceScope, User, UserId, UserStatus};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

/// Read access to user records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Get an active user by ID. Missing and deactivated users are `NotFound`.
    async fn get_user(&self, user_id: UserId) -> Result<User, StoreError>;
}

/// Read access to groups and memberships
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Get a group by ID, whatever its status
    async fn get_group(&self, group_id: GroupId) -> Result<Group, StoreError>;

    /// Active groups the user is a member of, ordered by ID
    async fn active_groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, StoreError>;
}

/// Resolves scope attributes of composite resources
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Company, department and document type of a document
    async fn document_scope(&self, document_id: DocumentId) -> Result<ResourceScope, StoreError>;
}

/// Write access to groups and memberships. Every method touches a single
/// aggregate and needs no cross-row transaction.
#[async_trait]
pub trait GroupRepository: GroupStore {
    /// All groups, ordered by ID
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Insert a new group, assigning its ID. Names are unique ignoring case.
    async fn insert_group(&self, new_group: NewGroup) -> Result<Group, StoreError>;

    /// Apply a partial update (last write wins)
    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<Group, StoreError>;

    async fn set_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<Group, StoreError>;

    /// Remove a group and its memberships
    async fn remove_group(&self, group_id: GroupId) -> Result<Group, StoreError>;

    async fn add_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Membership, StoreError>;

    async fn remove_membership(&self, group_id: GroupId, user_id: UserId) -> Result<(), StoreError>;

    /// Members of a group, ordered by user ID
    async fn group_members(&self, group_id: GroupId) -> Result<Vec<UserId>, StoreError>;
}

/// Seed data for an in-memory store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    memberships: BTreeMap<(GroupId, UserId), Membership>,
    documents: HashMap<DocumentId, ResourceScope>,
    next_group_id: GroupId,
}

impl MemoryState {
    fn group_mut(&mut self, group_id: GroupId) -> Result<&mut Group, StoreError> {
        self.groups.get_mut(&group_id).ok_or(StoreError::NotFound { entity: "group", id: group_id })
    }

    fn ensure_unique_name(&self, name: &str, except: Option<GroupId>) -> Result<(), StoreError> {
        let taken = self.groups.values().any(|group| Some(group.id) != except && group.name.eq_ignore_ascii_case(name));

        if taken {
            return Err(StoreError::Conflict {
                message: format!("Group named '{}' already exists", name),
            });
        }

        Ok(())
    }
}

/// In-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded from a fixture
    pub fn from_fixture(fixture: Fixture) -> Result<Self, StoreError> {
        let mut state = MemoryState::default();

        for user in fixture.users {
            if state.users.insert(user.id, user.clone()).is_some() {
                return Err(StoreError::Conflict {
                    message: format!("Duplicate user id {}", user.id),
                });
            }
        }

        for mut group in fixture.groups {
            state.ensure_unique_name(&group.name, None)?;
            if state.groups.contains_key(&group.id) {
                return Err(StoreError::Conflict {
                    message: format!("Duplicate group id {}", group.id),
                });
            }
            group.scope = group.scope.normalized();
            state.next_group_id = state.next_group_id.max(group.id);
            state.groups.insert(group.id, group);
        }

        for membership in fixture.memberships {
            if !state.groups.contains_key(&membership.group_id) {
                return Err(StoreError::NotFound {
                    entity: "group",
                    id: membership.group_id,
                });
            }
            if !state.users.contains_key(&membership.user_id) {
                return Err(StoreError::NotFound {
                    entity: "user",
                    id: membership.user_id,
                });
            }
            state.memberships.insert((membership.group_id, membership.user_id), membership);
        }

        for document in fixture.documents {
            state.documents.insert(document.id, document.scope);
        }

        debug!(
            users = state.users.len(),
            groups = state.groups.len(),
            memberships = state.memberships.len(),
            documents = state.documents.len(),
            "Memory store seeded"
        );

        Ok(Self { state: RwLock::new(state) })
    }

    /// Load a JSON fixture file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| StoreError::Unavailable {
            message: format!("Failed to read fixture {}: {}", path.display(), e),
        })?;
        let fixture: Fixture = serde_json::from_str(&raw).map_err(|e| StoreError::Unavailable {
            message: format!("Failed to parse fixture {}: {}", path.display(), e),
        })?;

        Self::from_fixture(fixture)
    }

    /// Insert a user. IDs are unique.
    pub async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.state.write().await;

        if state.users.contains_key(&user.id) {
            return Err(StoreError::Conflict {
                message: format!("User with ID {} already exists", user.id),
            });
        }

        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Replace a user's role and placement, keeping its status
    pub async fn update_user(&self, user: User) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        let existing = state.users.get_mut(&user.id).ok_or(StoreError::NotFound { entity: "user", id: user.id })?;

        let status = existing.status;
        *existing = User { status, ..user };
        Ok(existing.clone())
    }

    /// Flip a user's status. This is the only way a user is "deleted".
    pub async fn set_user_status(&self, user_id: UserId, status: UserStatus) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound { entity: "user", id: user_id })?;

        user.status = status;
        Ok(user.clone())
    }

    /// Look up a user regardless of status
    pub async fn find_user(&self, user_id: UserId) -> Option<User> {
        self.state.read().await.users.get(&user_id).cloned()
    }

    /// Register a document's scope attributes
    pub async fn insert_document(&self, document: DocumentRecord) {
        self.state.write().await.documents.insert(document.id, document.scope);
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get_user(&self, user_id: UserId) -> Result<User, StoreError> {
        let state = self.state.read().await;

        state
            .users
            .get(&user_id)
            .filter(|user| user.is_active())
            .cloned()
            .ok_or(StoreError::NotFound { entity: "user", id: user_id })
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn get_group(&self, group_id: GroupId) -> Result<Group, StoreError> {
        let state = self.state.read().await;
        state.groups.get(&group_id).cloned().ok_or(StoreError::NotFound { entity: "group", id: group_id })
    }

    async fn active_groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, StoreError> {
        let state = self.state.read().await;

        Ok(state
            .memberships
            .keys()
            .filter(|(_, member)| *member == user_id)
            .filter_map(|(group_id, _)| state.groups.get(group_id))
            .filter(|group| group.is_active())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResourceDirectory for MemoryStore {
    async fn document_scope(&self, document_id: DocumentId) -> Result<ResourceScope, StoreError> {
        let state = self.state.read().await;
        state.documents.get(&document_id).copied().ok_or(StoreError::NotFound {
            entity: "document",
            id: document_id,
        })
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self.state.read().await.groups.values().cloned().collect())
    }

    async fn insert_group(&self, new_group: NewGroup) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        state.ensure_unique_name(&new_group.name, None)?;

        let group_id = state.next_group_id.checked_add(1).ok_or_else(|| StoreError::Conflict {
            message: "Group ID space exhausted".to_string(),
        })?;
        state.next_group_id = group_id;
        let mut group = Group::new(group_id, new_group.name).with_permissions(new_group.permissions).with_scope(new_group.scope);
        group.description = new_group.description;
        group.is_system_group = new_group.is_system_group;

        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;

        if let Some(name) = &update.name {
            state.ensure_unique_name(name, Some(group_id))?;
        }

        let group = state.group_mut(group_id)?;
        if let Some(name) = update.name {
            group.name = name;
        }
        if let Some(description) = update.description {
            group.description = Some(description);
        }
        if let Some(permissions) = update.permissions {
            group.permissions = permissions;
        }
        if let Some(scope) = update.scope {
            group.scope = scope.normalized();
        }
        group.updated_at = Utc::now();

        Ok(group.clone())
    }

    async fn set_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        let group = state.group_mut(group_id)?;

        group.status = status;
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn remove_group(&self, group_id: GroupId) -> Result<Group, StoreError> {
        let mut state = self.state.write().await;
        let group = state.groups.remove(&group_id).ok_or(StoreError::NotFound { entity: "group", id: group_id })?;

        state.memberships.retain(|(member_of, _), _| *member_of != group_id);
        Ok(group)
    }

    async fn add_membership(&self, group_id: GroupId, user_id: UserId) -> Result<Membership, StoreError> {
        let mut state = self.state.write().await;

        if !state.groups.contains_key(&group_id) {
            return Err(StoreError::NotFound { entity: "group", id: group_id });
        }
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound { entity: "user", id: user_id });
        }
        if state.memberships.contains_key(&(group_id, user_id)) {
            return Err(StoreError::Conflict {
                message: format!("User {} is already a member of group {}", user_id, group_id),
            });
        }

        let membership = Membership::new(group_id, user_id);
        state.memberships.insert((group_id, user_id), membership.clone());
        Ok(membership)
    }

    async fn remove_membership(&self, group_id: GroupId, user_id: UserId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        state
            .memberships
            .remove(&(group_id, user_id))
            .map(|_| ())
            .ok_or(StoreError::NotFound { entity: "membership", id: user_id })
    }

    async fn group_members(&self, group_id: GroupId) -> Result<Vec<UserId>, StoreError> {
        let state = self.state.read().await;

        if !state.groups.contains_key(&group_id) {
            return Err(StoreError::NotFound { entity: "group", id: group_id });
        }

        Ok(state.memberships.keys().filter(|(member_of, _)| *member_of == group_id).map(|(_, user_id)| *user_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::models::{Role, ScopeRestrictions};
    use std::io::Write;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_user(User::new(1, "alice", Role::User, 10)).await.unwrap();
        store.insert_user(User::new(2, "bob", Role::Manager, 10)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_inactive_user_is_not_found() {
        let store = seeded_store().await;
        assert!(store.get_user(1).await.is_ok());

        store.set_user_status(1, UserStatus::Inactive).await.unwrap();
        assert_eq!(store.get_user(1).await, Err(StoreError::NotFound { entity: "user", id: 1 }));

        // Soft delete keeps the record
        assert!(store.find_user(1).await.is_some());
    }

    #[tokio::test]
    async fn test_group_names_are_unique() {
        let store = seeded_store().await;
        store.insert_group(NewGroup::named("Editors")).await.unwrap();

        let result = store.insert_group(NewGroup::named("editors")).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_active_groups_for_user() {
        let store = seeded_store().await;
        let editors = store.insert_group(NewGroup::named("Editors").with_permissions([Capability::DownloadFiles])).await.unwrap();
        let interns = store.insert_group(NewGroup::named("Interns")).await.unwrap();
        store.insert_group(NewGroup::named("Unrelated")).await.unwrap();

        store.add_membership(editors.id, 1).await.unwrap();
        store.add_membership(interns.id, 1).await.unwrap();
        store.set_group_status(interns.id, GroupStatus::Inactive).await.unwrap();

        let groups = store.active_groups_for_user(1).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Editors");

        assert!(store.active_groups_for_user(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_lifecycle() {
        let store = seeded_store().await;
        let group = store.insert_group(NewGroup::named("Editors")).await.unwrap();

        store.add_membership(group.id, 1).await.unwrap();
        assert!(matches!(store.add_membership(group.id, 1).await, Err(StoreError::Conflict { .. })));
        assert!(matches!(store.add_membership(group.id, 99).await, Err(StoreError::NotFound { entity: "user", .. })));
        assert_eq!(store.group_members(group.id).await.unwrap(), vec![1]);

        store.remove_membership(group.id, 1).await.unwrap();
        assert!(store.remove_membership(group.id, 1).await.is_err());
        assert!(store.group_members(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_group_drops_memberships() {
        let store = seeded_store().await;
        let group = store.insert_group(NewGroup::named("Editors")).await.unwrap();
        store.add_membership(group.id, 1).await.unwrap();

        store.remove_group(group.id).await.unwrap();

        assert!(store.active_groups_for_user(1).await.unwrap().is_empty());
        assert!(store.get_group(group.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_group_normalizes_scope() {
        let store = seeded_store().await;
        let group = store.insert_group(NewGroup::named("Editors")).await.unwrap();

        let update = GroupUpdate {
            scope: Some(ScopeRestrictions {
                companies: Some(Default::default()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = store.update_group(group.id, update).await.unwrap();

        assert!(updated.scope.is_unrestricted());
    }

    #[tokio::test]
    async fn test_fixture_file_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "users": [{{"id": 1, "username": "alice", "role": "user", "company_id": 5}}],
                "groups": [{{"id": 7, "name": "Editors", "permissions": ["download_files"]}}],
                "memberships": [{{"group_id": 7, "user_id": 1}}],
                "documents": [{{"id": 100, "company_id": 5, "document_type_id": 2}}]
            }}"#
        )
        .unwrap();

        let store = MemoryStore::from_json_file(file.path()).unwrap();

        assert_eq!(store.active_groups_for_user(1).await.unwrap()[0].id, 7);
        assert_eq!(store.document_scope(100).await.unwrap().document_type_id, Some(2));

        // New groups continue after the highest seeded ID
        let next = store.insert_group(NewGroup::named("Interns")).await.unwrap();
        assert_eq!(next.id, 8);
    }

    #[test]
    fn test_fixture_rejects_dangling_membership() {
        let fixture = Fixture {
            users: vec![User::new(1, "alice", Role::User, 5)],
            memberships: vec![Membership::new(3, 1)],
            ..Default::default()
        };

        assert!(matches!(MemoryStore::from_fixture(fixture), Err(StoreError::NotFound { entity: "group", id: 3 })));
    }

    #[tokio::test]
    async fn test_group_id_space_exhausted() {
        let fixture = Fixture {
            groups: vec![Group::new(u64::MAX, "Top")],
            ..Default::default()
        };
        let store = MemoryStore::from_fixture(fixture).unwrap();

        let result = store.insert_group(NewGroup::named("Next")).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        // The seeded group is untouched
        assert_eq!(store.list_groups().await.unwrap().len(), 1);
        assert_eq!(store.get_group(u64::MAX).await.unwrap().name, "Top");
    }

    #[tokio::test]
    async fn test_update_user_keeps_status() {
        let store = seeded_store().await;
        store.set_user_status(1, UserStatus::Inactive).await.unwrap();

        let updated = store.update_user(User::new(1, "alice", Role::Manager, 20).with_department(7)).await.unwrap();
        assert_eq!(updated.role, Role::Manager);
        assert_eq!(updated.company_id, 20);
        assert_eq!(updated.department_id, Some(7));
        assert_eq!(updated.status, UserStatus::Inactive);

        let missing = store.update_user(User::new(99, "nobody", Role::User, 1)).await;
        assert_eq!(missing, Err(StoreError::NotFound { entity: "user", id: 99 }));
    }
}
