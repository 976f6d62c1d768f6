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

//! Audit logging for access decisions and group administration

use crate::capability::Capability;
use crate::models::{GroupId, ResourceRef, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Capability check without a resource
    PermissionCheck,
    /// Capability check against a resource instance
    ResourceAccessCheck,
    GroupCreated,
    GroupUpdated,
    GroupStatusChanged,
    GroupDeleted,
    MemberAdded,
    MemberRemoved,
}

/// Audit event result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
    Denied,
}

/// Audit event entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    pub event_type: AuditEventType,

    pub timestamp: DateTime<Utc>,

    /// User who performed the action; `None` for anonymous requests
    pub actor: Option<UserId>,

    /// User affected by the action (membership changes)
    pub target_user: Option<UserId>,

    /// Group affected by the action
    pub group_id: Option<GroupId>,

    /// Capability being checked
    pub capability: Option<Capability>,

    /// Resource being accessed
    pub resource: Option<ResourceRef>,

    pub result: AuditResult,

    /// Additional event details
    pub details: HashMap<String, String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType, actor: Option<UserId>, result: AuditResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            actor,
            target_user: None,
            group_id: None,
            capability: None,
            resource: None,
            result,
            details: HashMap::new(),
        }
    }

    pub fn with_target_user(mut self, target_user: UserId) -> Self {
        self.target_user = Some(target_user);
        self
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Bounded in-memory audit log, mirrored to structured logs
#[derive(Debug)]
pub struct AuditLogger {
    events: RwLock<VecDeque<AuditEvent>>,

    /// Maximum number of events to keep in memory
    max_events: usize,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new() -> Self {
        Self::with_max_events(10_000)
    }

    /// Create audit logger with custom max events
    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events,
        }
    }

    /// Log an audit event
    pub async fn log_event(&self, event: AuditEvent) {
        match event.result {
            AuditResult::Success => {
                info!(
                    event_type = ?event.event_type,
                    actor = ?event.actor,
                    target_user = ?event.target_user,
                    group_id = ?event.group_id,
                    capability = ?event.capability,
                    resource = ?event.resource,
                    "Audit event: {:?}", event.event_type
                );
            }
            AuditResult::Failure | AuditResult::Denied => {
                warn!(
                    event_type = ?event.event_type,
                    actor = ?event.actor,
                    target_user = ?event.target_user,
                    group_id = ?event.group_id,
                    capability = ?event.capability,
                    resource = ?event.resource,
                    result = ?event.result,
                    "Audit event: {:?} - {:?}", event.event_type, event.result
                );
            }
        }

        if self.max_events == 0 {
            return;
        }

        let mut events = self.events.write().await;
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Log the outcome of an access check. `None` outcome means the
    /// resolver could not be reached.
    pub async fn log_access_decision(&self, actor: Option<UserId>, capability: Capability, resource: Option<ResourceRef>, outcome: Option<bool>) {
        let result = match outcome {
            Some(true) => AuditResult::Success,
            Some(false) => AuditResult::Denied,
            None => AuditResult::Failure,
        };

        let event = match resource {
            Some(resource) => AuditEvent::new(AuditEventType::ResourceAccessCheck, actor, result).with_resource(resource),
            None => AuditEvent::new(AuditEventType::PermissionCheck, actor, result),
        };

        self.log_event(event.with_capability(capability)).await;
    }

    /// Log a group mutation performed by `actor`
    pub async fn log_group_change(&self, event_type: AuditEventType, group_id: GroupId, actor: UserId) {
        self.log_event(AuditEvent::new(event_type, Some(actor), AuditResult::Success).with_group(group_id)).await;
    }

    /// Log a membership change performed by `actor`
    pub async fn log_membership_change(&self, event_type: AuditEventType, group_id: GroupId, user_id: UserId, actor: UserId) {
        let event = AuditEvent::new(event_type, Some(actor), AuditResult::Success).with_group(group_id).with_target_user(user_id);
        self.log_event(event).await;
    }

    /// Get audit events, newest first
    pub async fn get_events(&self, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events.iter().rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    /// Get events where the user is actor or target, newest first
    pub async fn get_user_events(&self, user_id: UserId, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;

        events
            .iter()
            .rev()
            .filter(|event| event.actor == Some(user_id) || event.target_user == Some(user_id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Get events by type, newest first
    pub async fn get_events_by_type(&self, event_type: AuditEventType, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;

        events
            .iter()
            .rev()
            .filter(|event| event.event_type == event_type)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Get audit statistics
    pub async fn get_statistics(&self) -> AuditStatistics {
        let events = self.events.read().await;

        let mut stats = AuditStatistics {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.result {
                AuditResult::Success => stats.successful_events += 1,
                AuditResult::Failure => stats.failed_events += 1,
                AuditResult::Denied => stats.denied_events += 1,
            }

            *stats.events_by_type.entry(event.event_type).or_insert(0) += 1;
        }

        stats
    }
}

/// Audit statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub denied_events: usize,
    pub events_by_type: HashMap<AuditEventType, usize>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
