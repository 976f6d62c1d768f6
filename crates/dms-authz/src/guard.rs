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

//! Enforcement point used by request handlers

use crate::audit::AuditLogger;
use crate::capability::Capability;
use crate::error::{AuthzError, AuthzResult};
use crate::models::{ResourceRef, ResourceType, User};
use crate::resolver::Authorizer;
use crate::session::SessionContext;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Translates allow/deny into request outcomes.
///
/// Handlers call `require_permission` or `require_access` and propagate the
/// error with `?`; an `AuthzError` converts into the redirect or 403 response.
#[derive(Clone)]
pub struct ResourceGuard {
    authorizer: Arc<dyn Authorizer>,
    audit_logger: Arc<AuditLogger>,
    deny_redirect: String,
}

impl ResourceGuard {
    /// Create a new guard
    pub fn new(authorizer: Arc<dyn Authorizer>, audit_logger: Arc<AuditLogger>, deny_redirect: impl Into<String>) -> Self {
        Self {
            authorizer,
            audit_logger,
            deny_redirect: deny_redirect.into(),
        }
    }

    /// Require `capability` anywhere. Returns the session user on success.
    pub async fn require_permission(&self, session: &dyn SessionContext, capability: Capability) -> AuthzResult<User> {
        self.enforce(session, capability, None).await
    }

    /// Require `capability` on a resource instance. Returns the session user
    /// on success.
    pub async fn require_access(&self, session: &dyn SessionContext, capability: Capability, resource_type: ResourceType, resource_id: u64) -> AuthzResult<User> {
        self.enforce(session, capability, Some(ResourceRef::new(resource_type, resource_id))).await
    }

    async fn enforce(&self, session: &dyn SessionContext, capability: Capability, resource: Option<ResourceRef>) -> AuthzResult<User> {
        let Some(user) = session.current_user() else {
            debug!(capability = %capability, resource = ?resource, "Anonymous request denied");
            self.audit_logger.log_access_decision(None, capability, resource, Some(false)).await;
            return Err(AuthzError::login_required(self.deny_redirect.clone()));
        };

        let outcome = match resource {
            Some(resource) => self.authorizer.can_access_resource(user.id, capability, resource.resource_type, resource.id).await,
            None => self.authorizer.has_permission(user.id, capability).await,
        };

        match outcome {
            Ok(true) => {
                self.audit_logger.log_access_decision(Some(user.id), capability, resource, Some(true)).await;
                Ok(user)
            }
            Ok(false) => {
                warn!(
                    user_id = %user.id,
                    capability = %capability,
                    resource = ?resource,
                    "Access denied"
                );
                self.audit_logger.log_access_decision(Some(user.id), capability, resource, Some(false)).await;
                Err(AuthzError::access_denied())
            }
            Err(err) => {
                error!(
                    user_id = %user.id,
                    capability = %capability,
                    resource = ?resource,
                    error = %err,
                    "Access check failed, denying"
                );
                self.audit_logger.log_access_decision(Some(user.id), capability, resource, None).await;
                Err(match err {
                    AuthzError::ResolverUnavailable { .. } => err,
                    other => AuthzError::ResolverUnavailable { message: other.to_string() },
                })
            }
        }
    }
}
