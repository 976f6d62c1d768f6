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

//! Group and membership administration

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditResult};
use crate::capability::Capability;
use crate::error::{AuthzError, AuthzResult};
use crate::models::{Group, GroupId, GroupStatus, GroupUpdate, Membership, NewGroup, UserId};
use crate::resolver::Authorizer;
use crate::store::GroupRepository;
use std::sync::Arc;
use tracing::info;

/// Admin-facing operations on groups. Every call is made on behalf of an
/// actor who must hold `manage_groups` (admins always do).
#[derive(Clone)]
pub struct GroupManager {
    repository: Arc<dyn GroupRepository>,
    authorizer: Arc<dyn Authorizer>,
    audit_logger: Arc<AuditLogger>,
}

impl GroupManager {
    /// Create a new group manager
    pub fn new(repository: Arc<dyn GroupRepository>, authorizer: Arc<dyn Authorizer>, audit_logger: Arc<AuditLogger>) -> Self {
        Self {
            repository,
            authorizer,
            audit_logger,
        }
    }

    async fn authorize(&self, actor: UserId) -> AuthzResult<()> {
        if self.authorizer.has_permission(actor, Capability::ManageGroups).await? {
            Ok(())
        } else {
            self.audit_logger.log_access_decision(Some(actor), Capability::ManageGroups, None, Some(false)).await;
            Err(AuthzError::access_denied())
        }
    }

    fn validate_name(name: &str) -> AuthzResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthzError::BadRequest {
                message: "Group name is required".to_string(),
            });
        }
        Ok(name.to_string())
    }

    /// List all groups
    pub async fn list_groups(&self, actor: UserId) -> AuthzResult<Vec<Group>> {
        self.authorize(actor).await?;
        Ok(self.repository.list_groups().await?)
    }

    /// Get a group by ID
    pub async fn get_group(&self, group_id: GroupId, actor: UserId) -> AuthzResult<Group> {
        self.authorize(actor).await?;
        Ok(self.repository.get_group(group_id).await?)
    }

    /// Create a new group
    pub async fn create_group(&self, mut new_group: NewGroup, actor: UserId) -> AuthzResult<Group> {
        self.authorize(actor).await?;
        new_group.name = Self::validate_name(&new_group.name)?;

        let group = self.repository.insert_group(new_group).await?;
        self.audit_logger.log_group_change(AuditEventType::GroupCreated, group.id, actor).await;

        info!(
            group_id = %group.id,
            group_name = %group.name,
            created_by = %actor,
            "Group created successfully"
        );

        Ok(group)
    }

    /// Update a group's name, description, permissions or scope
    pub async fn update_group(&self, group_id: GroupId, mut update: GroupUpdate, actor: UserId) -> AuthzResult<Group> {
        self.authorize(actor).await?;
        if let Some(name) = update.name.take() {
            update.name = Some(Self::validate_name(&name)?);
        }

        let group = self.repository.update_group(group_id, update).await?;
        self.audit_logger.log_group_change(AuditEventType::GroupUpdated, group_id, actor).await;

        info!(group_id = %group_id, updated_by = %actor, "Group updated successfully");
        Ok(group)
    }

    /// Activate or deactivate a group. System groups stay active.
    pub async fn set_group_status(&self, group_id: GroupId, status: GroupStatus, actor: UserId) -> AuthzResult<Group> {
        self.authorize(actor).await?;

        let existing = self.repository.get_group(group_id).await?;
        if existing.is_system_group && status == GroupStatus::Inactive {
            return Err(AuthzError::Forbidden {
                message: "Cannot deactivate system groups".to_string(),
            });
        }

        let group = self.repository.set_group_status(group_id, status).await?;
        self.audit_logger
            .log_event(
                AuditEvent::new(AuditEventType::GroupStatusChanged, Some(actor), AuditResult::Success)
                    .with_group(group_id)
                    .with_detail("status", format!("{:?}", status)),
            )
            .await;

        info!(group_id = %group_id, status = ?status, changed_by = %actor, "Group status changed");
        Ok(group)
    }

    /// Delete a group and its memberships. System groups cannot be deleted.
    pub async fn delete_group(&self, group_id: GroupId, actor: UserId) -> AuthzResult<()> {
        self.authorize(actor).await?;

        let existing = self.repository.get_group(group_id).await?;
        if existing.is_system_group {
            return Err(AuthzError::Forbidden {
                message: "Cannot delete system groups".to_string(),
            });
        }

        self.repository.remove_group(group_id).await?;
        self.audit_logger.log_group_change(AuditEventType::GroupDeleted, group_id, actor).await;

        info!(group_id = %group_id, deleted_by = %actor, "Group deleted successfully");
        Ok(())
    }

    /// Add a user to a group
    pub async fn add_member(&self, group_id: GroupId, user_id: UserId, actor: UserId) -> AuthzResult<Membership> {
        self.authorize(actor).await?;

        let membership = self.repository.add_membership(group_id, user_id).await?;
        self.audit_logger.log_membership_change(AuditEventType::MemberAdded, group_id, user_id, actor).await;

        info!(group_id = %group_id, user_id = %user_id, added_by = %actor, "Member added to group");
        Ok(membership)
    }

    /// Remove a user from a group
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId, actor: UserId) -> AuthzResult<()> {
        self.authorize(actor).await?;

        self.repository.remove_membership(group_id, user_id).await?;
        self.audit_logger.log_membership_change(AuditEventType::MemberRemoved, group_id, user_id, actor).await;

        info!(group_id = %group_id, user_id = %user_id, removed_by = %actor, "Member removed from group");
        Ok(())
    }

    /// Members of a group
    pub async fn group_members(&self, group_id: GroupId, actor: UserId) -> AuthzResult<Vec<UserId>> {
        self.authorize(actor).await?;
        Ok(self.repository.group_members(group_id).await?)
    }
}
