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

//! Capability vocabulary and the registry of enabled capabilities

use crate::error::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A named permission granting one class of action.
///
/// The vocabulary is closed: adding a capability means adding a variant here
/// and wiring it into the group editor, never a change to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewFiles,
    UploadFiles,
    DownloadFiles,
    DeleteFiles,
    CreateFolders,
    ViewReports,
    ManageUsers,
    ManageCompanies,
    ManageGroups,
    SystemAdmin,
}

impl Capability {
    /// Every capability known to the system
    pub const ALL: [Capability; 10] = [
        Capability::ViewFiles,
        Capability::UploadFiles,
        Capability::DownloadFiles,
        Capability::DeleteFiles,
        Capability::CreateFolders,
        Capability::ViewReports,
        Capability::ManageUsers,
        Capability::ManageCompanies,
        Capability::ManageGroups,
        Capability::SystemAdmin,
    ];

    /// Wire name of the capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewFiles => "view_files",
            Capability::UploadFiles => "upload_files",
            Capability::DownloadFiles => "download_files",
            Capability::DeleteFiles => "delete_files",
            Capability::CreateFolders => "create_folders",
            Capability::ViewReports => "view_reports",
            Capability::ManageUsers => "manage_users",
            Capability::ManageCompanies => "manage_companies",
            Capability::ManageGroups => "manage_groups",
            Capability::SystemAdmin => "system_admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Capability::ALL
            .iter()
            .copied()
            .find(|capability| capability.as_str() == name)
            .ok_or_else(|| AuthzError::UnknownCapability { name: name.to_string() })
    }
}

/// Set of capabilities enabled for this deployment.
///
/// Built once at startup. A capability missing from the registry always
/// denies, whatever the groups say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRegistry {
    enabled: BTreeSet<Capability>,
}

impl CapabilityRegistry {
    /// Registry with the full vocabulary enabled
    pub fn all() -> Self {
        Self {
            enabled: Capability::ALL.into_iter().collect(),
        }
    }

    /// Build a registry from configured names, rejecting unknown ones
    pub fn from_names<I, S>(names: I) -> AuthzResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut enabled = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let capability = name.parse::<Capability>().map_err(|_| AuthzError::Config {
                message: format!("unknown capability '{}' in registry", name),
            })?;
            enabled.insert(capability);
        }

        if enabled.is_empty() {
            return Err(AuthzError::Config {
                message: "capability registry is empty".to_string(),
            });
        }

        Ok(Self { enabled })
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.enabled.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::all()
    }
}
