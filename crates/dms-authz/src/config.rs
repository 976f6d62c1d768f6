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

//! Configuration management for the authorization service

use crate::capability::CapabilityRegistry;
use crate::error::{AuthzError, AuthzResult};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which permission model backs the `Authorizer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionModel {
    /// Capabilities come from group memberships with scope restrictions
    #[default]
    Groups,
    /// Capabilities come from fixed role defaults
    Legacy,
}

impl fmt::Display for PermissionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionModel::Groups => f.write_str("groups"),
            PermissionModel::Legacy => f.write_str("legacy"),
        }
    }
}

impl FromStr for PermissionModel {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groups" | "unified" => Ok(PermissionModel::Groups),
            "legacy" | "roles" => Ok(PermissionModel::Legacy),
            other => Err(AuthzError::Config {
                message: format!("unknown permission model '{}'", other),
            }),
        }
    }
}

/// Configuration for the authorization service
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Permission model chosen at startup
    pub permission_model: PermissionModel,

    /// Capabilities enabled for this deployment
    pub capabilities: CapabilityRegistry,

    /// Where anonymous requests are redirected on denial
    pub deny_redirect: String,

    /// Number of audit events kept in memory
    pub audit_max_events: usize,

    /// Checks slower than this are logged as warnings
    pub slow_check_threshold: Duration,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            permission_model: PermissionModel::Groups,
            capabilities: CapabilityRegistry::all(),
            deny_redirect: "/login".to_string(),
            audit_max_events: 10_000,
            slow_check_threshold: Duration::from_millis(5),
        }
    }
}

impl AuthzConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AuthzResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unknown capability
    /// names and malformed numbers are rejected here, not at check time.
    pub fn from_lookup<F>(lookup: F) -> AuthzResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let permission_model = match lookup("DMS_PERMISSION_MODEL") {
            Some(raw) => raw.parse()?,
            None => defaults.permission_model,
        };

        let capabilities = match lookup("DMS_CAPABILITIES") {
            Some(raw) => CapabilityRegistry::from_names(raw.split(','))?,
            None => defaults.capabilities,
        };

        let deny_redirect = lookup("DMS_DENY_REDIRECT").unwrap_or(defaults.deny_redirect);
        if !is_local_path(&deny_redirect) {
            return Err(AuthzError::Config {
                message: format!("DMS_DENY_REDIRECT must be a local path, got '{}'", deny_redirect),
            });
        }

        let audit_max_events = match parse_number(&lookup, "DMS_AUDIT_MAX_EVENTS")? {
            Some(n) => usize::try_from(n).map_err(|e| AuthzError::Config {
                message: format!("DMS_AUDIT_MAX_EVENTS is out of range: {}", e),
            })?,
            None => defaults.audit_max_events,
        };

        let slow_check_threshold = parse_number(&lookup, "DMS_SLOW_CHECK_MS")?.map(Duration::from_millis).unwrap_or(defaults.slow_check_threshold);

        Ok(Self {
            permission_model,
            capabilities,
            deny_redirect,
            audit_max_events,
            slow_check_threshold,
        })
    }
}

/// A path on this host. `//host` and `/\host` are treated as network paths
/// by browsers and rejected.
fn is_local_path(location: &str) -> bool {
    location.starts_with('/') && !location.starts_with("//") && !location.starts_with("/\\")
}

fn parse_number<F>(lookup: &F, key: &str) -> AuthzResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| AuthzError::Config {
                message: format!("{} must be a non-negative integer: {}", key, e),
            })
        })
        .transpose()
}
