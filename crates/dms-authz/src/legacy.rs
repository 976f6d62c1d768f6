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

//! Role-default permission model kept for deployments that predate groups

use crate::capability::{Capability, CapabilityRegistry};
use crate::error::AuthzResult;
use crate::models::{ResourceType, Role, ScopeRestrictions, User, UserId};
use crate::resolver::{Authorizer, PermissionGrants, load_active_user, resolve_scope};
use crate::store::{IdentityStore, ResourceDirectory};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const MANAGER_CAPABILITIES: &[Capability] = &[
    Capability::ViewFiles,
    Capability::UploadFiles,
    Capability::DownloadFiles,
    Capability::CreateFolders,
    Capability::ViewReports,
    Capability::ManageUsers,
];

const USER_CAPABILITIES: &[Capability] = &[Capability::ViewFiles, Capability::DownloadFiles];

/// Capabilities a role holds by default
pub fn role_defaults(role: Role) -> &'static [Capability] {
    match role {
        Role::Admin => &Capability::ALL,
        Role::Manager => MANAGER_CAPABILITIES,
        Role::User => USER_CAPABILITIES,
    }
}

/// Scope a role's defaults apply to: managers see their company, users their
/// company and department
fn role_scope(user: &User) -> ScopeRestrictions {
    match user.role {
        Role::Admin => ScopeRestrictions::unrestricted(),
        Role::Manager => ScopeRestrictions::unrestricted().with_companies([user.company_id]),
        Role::User => {
            let scope = ScopeRestrictions::unrestricted().with_companies([user.company_id]);
            match user.department_id {
                Some(department_id) => scope.with_departments([department_id]),
                None => scope,
            }
        }
    }
}

/// Adapter exposing the role-default model through `Authorizer`
#[derive(Clone)]
pub struct LegacyRoleAdapter {
    identities: Arc<dyn IdentityStore>,
    directory: Arc<dyn ResourceDirectory>,
    registry: CapabilityRegistry,
}

impl LegacyRoleAdapter {
    pub fn new(identities: Arc<dyn IdentityStore>, directory: Arc<dyn ResourceDirectory>) -> Self {
        Self {
            identities,
            directory,
            registry: CapabilityRegistry::all(),
        }
    }

    pub fn with_registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    async fn holder(&self, user_id: UserId, capability: Capability) -> AuthzResult<Option<User>> {
        if !self.registry.is_enabled(capability) {
            return Ok(None);
        }

        Ok(load_active_user(self.identities.as_ref(), user_id).await?.filter(|user| role_defaults(user.role).contains(&capability)))
    }
}

#[async_trait]
impl Authorizer for LegacyRoleAdapter {
    async fn has_permission(&self, user_id: UserId, capability: Capability) -> AuthzResult<bool> {
        let allowed = self.holder(user_id, capability).await?.is_some();
        debug!(user_id = %user_id, capability = %capability, allowed = %allowed, "Legacy permission check completed");
        Ok(allowed)
    }

    async fn can_access_resource(&self, user_id: UserId, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<bool> {
        let Some(user) = self.holder(user_id, capability).await? else {
            return Ok(false);
        };

        if user.is_admin() {
            return Ok(true);
        }

        let allowed = match resolve_scope(self.directory.as_ref(), resource_type, resource_id).await? {
            Some(scope) => role_scope(&user).covers(&scope),
            None => false,
        };

        debug!(
            user_id = %user_id,
            capability = %capability,
            resource_type = %resource_type,
            resource_id = %resource_id,
            allowed = %allowed,
            "Legacy scope check completed"
        );
        Ok(allowed)
    }

    async fn effective_grants(&self, user_id: UserId) -> AuthzResult<PermissionGrants> {
        let Some(user) = load_active_user(self.identities.as_ref(), user_id).await? else {
            return Ok(PermissionGrants {
                user_id,
                ..Default::default()
            });
        };

        let scope = role_scope(&user);
        let grants = role_defaults(user.role)
            .iter()
            .copied()
            .filter(|capability| self.registry.is_enabled(*capability))
            .map(|capability| (capability, vec![scope.clone()]))
            .collect();

        Ok(PermissionGrants {
            user_id,
            is_admin: user.is_admin(),
            grants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRecord, ResourceScope, UserStatus};
    use crate::store::MemoryStore;

    async fn adapter() -> (Arc<MemoryStore>, LegacyRoleAdapter) {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(User::new(1, "root", Role::Admin, 1)).await.unwrap();
        store.insert_user(User::new(2, "boss", Role::Manager, 10)).await.unwrap();
        store.insert_user(User::new(3, "clerk", Role::User, 10).with_department(4)).await.unwrap();
        store
            .insert_document(DocumentRecord {
                id: 500,
                scope: ResourceScope {
                    company_id: Some(10),
                    department_id: Some(4),
                    document_type_id: Some(1),
                },
            })
            .await;

        let adapter = LegacyRoleAdapter::new(store.clone(), store.clone());
        (store, adapter)
    }

    #[tokio::test]
    async fn test_role_defaults() {
        let (_, adapter) = adapter().await;

        assert!(adapter.has_permission(1, Capability::SystemAdmin).await.unwrap());
        assert!(adapter.has_permission(2, Capability::UploadFiles).await.unwrap());
        assert!(!adapter.has_permission(2, Capability::DeleteFiles).await.unwrap());
        assert!(adapter.has_permission(3, Capability::DownloadFiles).await.unwrap());
        assert!(!adapter.has_permission(3, Capability::UploadFiles).await.unwrap());
    }

    #[tokio::test]
    async fn test_manager_limited_to_own_company() {
        let (_, adapter) = adapter().await;

        assert!(adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Company, 10).await.unwrap());
        assert!(!adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Company, 11).await.unwrap());
        assert!(adapter.can_access_resource(2, Capability::ViewFiles, ResourceType::Document, 500).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_limited_to_own_department() {
        let (_, adapter) = adapter().await;

        assert!(adapter.can_access_resource(3, Capability::ViewFiles, ResourceType::Department, 4).await.unwrap());
        assert!(!adapter.can_access_resource(3, Capability::ViewFiles, ResourceType::Department, 5).await.unwrap());
        assert!(adapter.can_access_resource(3, Capability::DownloadFiles, ResourceType::Document, 500).await.unwrap());
        assert!(!adapter.can_access_resource(3, Capability::DownloadFiles, ResourceType::Document, 501).await.unwrap());
    }

    #[tokio::test]
    async fn test_effective_grants_carry_role_scope() {
        let (_, adapter) = adapter().await;

        let grants = adapter.effective_grants(3).await.unwrap();
        assert!(!grants.is_admin);
        assert_eq!(grants.grants.len(), 2);
        assert!(grants.allows(Capability::ViewFiles, &ResourceScope::of(ResourceType::Department, 4)));
        assert!(!grants.is_unrestricted(Capability::ViewFiles));
    }

    #[tokio::test]
    async fn test_inactive_user_denied() {
        let (store, adapter) = adapter().await;
        store.set_user_status(1, UserStatus::Inactive).await.unwrap();

        assert!(!adapter.has_permission(1, Capability::ViewFiles).await.unwrap());
    }
}
