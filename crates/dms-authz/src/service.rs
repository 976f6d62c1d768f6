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

//! Authorization service wiring the resolver, guard and group manager

use crate::audit::AuditLogger;
use crate::capability::Capability;
use crate::config::{AuthzConfig, PermissionModel};
use crate::error::AuthzResult;
use crate::guard::ResourceGuard;
use crate::legacy::LegacyRoleAdapter;
use crate::manager::GroupManager;
use crate::models::{ResourceType, User, UserId};
use crate::resolver::{Authorizer, GroupPermissionResolver, PermissionGrants};
use crate::session::SessionContext;
use crate::store::{GroupRepository, IdentityStore, ResourceDirectory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Constructed once at startup and injected into request handlers
#[derive(Clone)]
pub struct AuthorizationService {
    config: AuthzConfig,
    authorizer: Arc<dyn Authorizer>,
    guard: ResourceGuard,
    groups: GroupManager,
    audit_logger: Arc<AuditLogger>,
}

impl AuthorizationService {
    /// Build the service over a store implementing every storage trait,
    /// choosing the permission model from configuration
    pub fn new<S>(config: AuthzConfig, store: Arc<S>) -> Self
    where
        S: IdentityStore + GroupRepository + ResourceDirectory + 'static,
    {
        let authorizer: Arc<dyn Authorizer> = match config.permission_model {
            PermissionModel::Groups => Arc::new(
                GroupPermissionResolver::new(store.clone(), store.clone(), store.clone())
                    .with_registry(config.capabilities.clone())
                    .with_slow_check_threshold(config.slow_check_threshold),
            ),
            PermissionModel::Legacy => Arc::new(LegacyRoleAdapter::new(store.clone(), store.clone()).with_registry(config.capabilities.clone())),
        };

        let audit_logger = Arc::new(AuditLogger::with_max_events(config.audit_max_events));
        let guard = ResourceGuard::new(authorizer.clone(), audit_logger.clone(), config.deny_redirect.clone());
        let groups = GroupManager::new(store, authorizer.clone(), audit_logger.clone());

        info!(
            permission_model = %config.permission_model,
            capabilities = config.capabilities.len(),
            "Authorization service initialized"
        );

        Self {
            config,
            authorizer,
            guard,
            groups,
            audit_logger,
        }
    }

    pub async fn has_permission(&self, user_id: UserId, capability: Capability) -> AuthzResult<bool> {
        self.authorizer.has_permission(user_id, capability).await
    }

    pub async fn can_access_resource(&self, user_id: UserId, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<bool> {
        self.authorizer.can_access_resource(user_id, capability, resource_type, resource_id).await
    }

    pub async fn effective_grants(&self, user_id: UserId) -> AuthzResult<PermissionGrants> {
        self.authorizer.effective_grants(user_id).await
    }

    /// See [`ResourceGuard::require_permission`]
    pub async fn require_permission(&self, session: &dyn SessionContext, capability: Capability) -> AuthzResult<User> {
        self.guard.require_permission(session, capability).await
    }

    /// See [`ResourceGuard::require_access`]
    pub async fn require_access(&self, session: &dyn SessionContext, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<User> {
        self.guard.require_access(session, capability, resource_type, resource_id).await
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn guard(&self) -> &ResourceGuard {
        &self.guard
    }

    pub fn groups(&self) -> &GroupManager {
        &self.groups
    }

    pub fn audit_logger(&self) -> &Arc<AuditLogger> {
        &self.audit_logger
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Get service health status
    pub async fn get_health_status(&self) -> AuthzHealthStatus {
        let audit_stats = self.audit_logger.get_statistics().await;

        AuthzHealthStatus {
            permission_model: self.config.permission_model.to_string(),
            enabled_capabilities: self.config.capabilities.iter().collect(),
            total_audit_events: audit_stats.total_events,
            denied_audit_events: audit_stats.denied_events,
            last_check: Utc::now(),
        }
    }
}

/// Authorization service health status
#[derive(Debug, Clone, Serialize)]
pub struct AuthzHealthStatus {
    pub permission_model: String,
    pub enabled_capabilities: Vec<Capability>,
    pub total_audit_events: usize,
    pub denied_audit_events: usize,
    pub last_check: DateTime<Utc>,
}
