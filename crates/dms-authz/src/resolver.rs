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

//! Permission resolution from group memberships and scope restrictions

use crate::capability::{Capability, CapabilityRegistry};
use crate::error::{AuthzError, AuthzResult};
use crate::models::{Group, ResourceScope, ResourceType, ScopeRestrictions, User, UserId};
use crate::store::{GroupStore, IdentityStore, ResourceDirectory, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Allow/deny evaluation of capabilities.
///
/// Ordinary denials are `Ok(false)`. The only error an implementation returns
/// is `AuthzError::ResolverUnavailable`, which callers must treat as deny.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether the user holds `capability` anywhere
    async fn has_permission(&self, user_id: UserId, capability: Capability) -> AuthzResult<bool>;

    /// Whether the user holds `capability` on a specific resource instance
    async fn can_access_resource(&self, user_id: UserId, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<bool>;

    /// Derived grants of the user, for display in administration screens
    async fn effective_grants(&self, user_id: UserId) -> AuthzResult<PermissionGrants>;

    /// String-keyed check for callers holding a raw capability name.
    /// Unknown names deny.
    async fn has_permission_named(&self, user_id: UserId, capability: &str) -> AuthzResult<bool> {
        match capability.parse::<Capability>() {
            Ok(capability) => self.has_permission(user_id, capability).await,
            Err(_) => {
                warn!(user_id = %user_id, capability = %capability, "Unknown capability requested, denying");
                Ok(false)
            }
        }
    }
}

/// Convert a store fault into the fail-closed resolver error
pub(crate) fn unavailable(err: StoreError) -> AuthzError {
    error!(error = %err, "Permission store failure");
    AuthzError::ResolverUnavailable { message: err.to_string() }
}

/// Load an active user, mapping absence to `None`
pub(crate) async fn load_active_user(identities: &dyn IdentityStore, user_id: UserId) -> AuthzResult<Option<User>> {
    match identities.get_user(user_id).await {
        Ok(user) if user.is_active() => Ok(Some(user)),
        Ok(_) => {
            debug!(user_id = %user_id, "User inactive");
            Ok(None)
        }
        Err(StoreError::NotFound { .. }) => {
            debug!(user_id = %user_id, "User not found");
            Ok(None)
        }
        Err(err) => Err(unavailable(err)),
    }
}

/// Scope attributes of a resource. `None` when the resource does not exist.
pub(crate) async fn resolve_scope(directory: &dyn ResourceDirectory, resource_type: ResourceType, resource_id: u64) -> AuthzResult<Option<ResourceScope>> {
    match resource_type {
        ResourceType::Document => match directory.document_scope(resource_id).await {
            Ok(scope) => Ok(Some(scope)),
            Err(StoreError::NotFound { .. }) => {
                debug!(document_id = %resource_id, "Document not found");
                Ok(None)
            }
            Err(err) => Err(unavailable(err)),
        },
        other => Ok(Some(ResourceScope::of(other, resource_id))),
    }
}

/// Effective capabilities of a user, with the scope restrictions of every
/// group that contributes each one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionGrants {
    pub user_id: UserId,

    /// Admins bypass group evaluation entirely
    pub is_admin: bool,

    pub grants: BTreeMap<Capability, Vec<ScopeRestrictions>>,
}

impl PermissionGrants {
    /// Whether the user holds `capability` on a resource with `scope`
    pub fn allows(&self, capability: Capability, scope: &ResourceScope) -> bool {
        self.grants.get(&capability).map(|scopes| scopes.iter().any(|restriction| restriction.covers(scope))).unwrap_or(false)
    }

    /// Whether some contributing group leaves `capability` unrestricted
    pub fn is_unrestricted(&self, capability: Capability) -> bool {
        self.grants.get(&capability).map(|scopes| scopes.iter().any(ScopeRestrictions::is_unrestricted)).unwrap_or(false)
    }
}

/// Resolver over group memberships.
///
/// Capabilities are the OR of every active group's permission set. Scope is
/// checked per granting group: a resource passes when at least one granting
/// group covers it, so a group without restriction on a dimension dominates
/// restricted ones.
#[derive(Clone)]
pub struct GroupPermissionResolver {
    identities: Arc<dyn IdentityStore>,
    groups: Arc<dyn GroupStore>,
    directory: Arc<dyn ResourceDirectory>,
    registry: CapabilityRegistry,
    slow_check_threshold: Duration,
}

impl GroupPermissionResolver {
    /// Create a new resolver with the full capability registry
    pub fn new(identities: Arc<dyn IdentityStore>, groups: Arc<dyn GroupStore>, directory: Arc<dyn ResourceDirectory>) -> Self {
        Self {
            identities,
            groups,
            directory,
            registry: CapabilityRegistry::all(),
            slow_check_threshold: Duration::from_millis(5),
        }
    }

    pub fn with_registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_slow_check_threshold(mut self, threshold: Duration) -> Self {
        self.slow_check_threshold = threshold;
        self
    }

    /// Active groups of the user that grant `capability`
    async fn granting_groups(&self, user_id: UserId, capability: Capability) -> AuthzResult<Vec<Group>> {
        let groups = self.groups.active_groups_for_user(user_id).await.map_err(unavailable)?;

        // Stores are expected to filter, but an inactive group never grants
        Ok(groups.into_iter().filter(|group| group.is_active() && group.grants(capability)).collect())
    }

    fn record_duration(&self, started: Instant, user_id: UserId, capability: Capability, allowed: bool) {
        let duration = started.elapsed();

        if duration > self.slow_check_threshold {
            warn!(
                user_id = %user_id,
                capability = %capability,
                duration_ms = %duration.as_millis(),
                "Slow permission check detected"
            );
        }

        debug!(
            user_id = %user_id,
            capability = %capability,
            allowed = %allowed,
            duration_ms = %duration.as_millis(),
            "Permission check completed"
        );
    }
}

#[async_trait]
impl Authorizer for GroupPermissionResolver {
    async fn has_permission(&self, user_id: UserId, capability: Capability) -> AuthzResult<bool> {
        let started = Instant::now();

        if !self.registry.is_enabled(capability) {
            debug!(capability = %capability, "Capability disabled in registry");
            return Ok(false);
        }

        let allowed = match load_active_user(self.identities.as_ref(), user_id).await? {
            None => false,
            Some(user) if user.is_admin() => true,
            Some(_) => !self.granting_groups(user_id, capability).await?.is_empty(),
        };

        self.record_duration(started, user_id, capability, allowed);
        Ok(allowed)
    }

    async fn can_access_resource(&self, user_id: UserId, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<bool> {
        let started = Instant::now();

        if !self.registry.is_enabled(capability) {
            debug!(capability = %capability, "Capability disabled in registry");
            return Ok(false);
        }

        let user = match load_active_user(self.identities.as_ref(), user_id).await? {
            None => return Ok(false),
            Some(user) => user,
        };

        if user.is_admin() {
            self.record_duration(started, user_id, capability, true);
            return Ok(true);
        }

        let granting = self.granting_groups(user_id, capability).await?;
        if granting.is_empty() {
            self.record_duration(started, user_id, capability, false);
            return Ok(false);
        }

        let allowed = match resolve_scope(self.directory.as_ref(), resource_type, resource_id).await? {
            Some(scope) => granting.iter().any(|group| group.scope.covers(&scope)),
            None => false,
        };

        debug!(
            user_id = %user_id,
            capability = %capability,
            resource_type = %resource_type,
            resource_id = %resource_id,
            granting_groups = granting.len(),
            allowed = %allowed,
            "Scope check completed"
        );

        self.record_duration(started, user_id, capability, allowed);
        Ok(allowed)
    }

    async fn effective_grants(&self, user_id: UserId) -> AuthzResult<PermissionGrants> {
        let Some(user) = load_active_user(self.identities.as_ref(), user_id).await? else {
            return Ok(PermissionGrants {
                user_id,
                ..Default::default()
            });
        };

        let mut grants: BTreeMap<Capability, Vec<ScopeRestrictions>> = BTreeMap::new();

        if user.is_admin() {
            for capability in self.registry.iter() {
                grants.insert(capability, vec![ScopeRestrictions::unrestricted()]);
            }
            return Ok(PermissionGrants { user_id, is_admin: true, grants });
        }

        let groups = self.groups.active_groups_for_user(user_id).await.map_err(unavailable)?;
        for group in groups.iter().filter(|group| group.is_active()) {
            for capability in group.permissions.iter().copied().filter(|c| self.registry.is_enabled(*c)) {
                grants.entry(capability).or_default().push(group.scope.clone());
            }
        }

        Ok(PermissionGrants {
            user_id,
            is_admin: false,
            grants,
        })
    }
}
