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

//! Identity, group and resource data models

use crate::capability::Capability;
use crate::error::AuthzError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub type UserId = u64;
pub type GroupId = u64;
pub type CompanyId = u64;
pub type DepartmentId = u64;
pub type DocumentTypeId = u64;
pub type DocumentId = u64;

/// Application role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    User,
}

/// User account status. Users are never hard-deleted; deactivation is the
/// soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

/// User record as seen by the permission resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: UserId,

    /// Login name
    pub username: String,

    /// Application role
    pub role: Role,

    /// Company the user belongs to
    pub company_id: CompanyId,

    /// Department within the company, if any
    #[serde(default)]
    pub department_id: Option<DepartmentId>,

    /// Account status
    #[serde(default)]
    pub status: UserStatus,
}

impl User {
    /// Create a new active user
    pub fn new(id: UserId, username: impl Into<String>, role: Role, company_id: CompanyId) -> Self {
        Self {
            id,
            username: username.into(),
            role,
            company_id,
            department_id: None,
            status: UserStatus::Active,
        }
    }

    /// Place the user in a department
    pub fn with_department(mut self, department_id: DepartmentId) -> Self {
        self.department_id = Some(department_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Group status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    #[default]
    Active,
    Inactive,
}

/// Dimension along which a capability can be restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDimension {
    Company,
    Department,
    DocumentType,
}

/// Scope restrictions carried by a group.
///
/// `None` on a dimension means unrestricted. An empty set is normalized to
/// `None` on construction so that "restricted to nothing" cannot be stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRestrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies: Option<BTreeSet<CompanyId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<BTreeSet<DepartmentId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_types: Option<BTreeSet<DocumentTypeId>>,
}

impl ScopeRestrictions {
    /// No restriction on any dimension
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_companies(mut self, ids: impl IntoIterator<Item = CompanyId>) -> Self {
        self.companies = non_empty(ids.into_iter().collect());
        self
    }

    pub fn with_departments(mut self, ids: impl IntoIterator<Item = DepartmentId>) -> Self {
        self.departments = non_empty(ids.into_iter().collect());
        self
    }

    pub fn with_document_types(mut self, ids: impl IntoIterator<Item = DocumentTypeId>) -> Self {
        self.document_types = non_empty(ids.into_iter().collect());
        self
    }

    /// Replace explicitly empty sets with `None`
    pub fn normalized(self) -> Self {
        Self {
            companies: self.companies.and_then(non_empty),
            departments: self.departments.and_then(non_empty),
            document_types: self.document_types.and_then(non_empty),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.companies.is_none() && self.departments.is_none() && self.document_types.is_none()
    }

    fn restriction(&self, dimension: ScopeDimension) -> Option<&BTreeSet<u64>> {
        match dimension {
            ScopeDimension::Company => self.companies.as_ref(),
            ScopeDimension::Department => self.departments.as_ref(),
            ScopeDimension::DocumentType => self.document_types.as_ref(),
        }
    }

    /// Whether a resource value on `dimension` passes this restriction.
    /// A resource with no value on the dimension has nothing to restrict.
    pub fn allows(&self, dimension: ScopeDimension, value: Option<u64>) -> bool {
        match (self.restriction(dimension), value) {
            (None, _) | (_, None) => true,
            (Some(allowed), Some(value)) => allowed.contains(&value),
        }
    }

    /// Whether every dimension of `scope` passes this restriction
    pub fn covers(&self, scope: &ResourceScope) -> bool {
        self.allows(ScopeDimension::Company, scope.company_id)
            && self.allows(ScopeDimension::Department, scope.department_id)
            && self.allows(ScopeDimension::DocumentType, scope.document_type_id)
    }
}

fn non_empty(set: BTreeSet<u64>) -> Option<BTreeSet<u64>> {
    if set.is_empty() { None } else { Some(set) }
}

/// Named bundle of capabilities with optional scope restrictions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier
    pub id: GroupId,

    /// Unique group name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: GroupStatus,

    /// System groups cannot be deleted or deactivated
    #[serde(default)]
    pub is_system_group: bool,

    /// Capabilities granted to members
    #[serde(default)]
    pub permissions: BTreeSet<Capability>,

    /// Where the capabilities apply
    #[serde(default)]
    pub scope: ScopeRestrictions,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Create a new active, unrestricted group with no capabilities
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            name: name.into(),
            description: None,
            status: GroupStatus::Active,
            is_system_group: false,
            permissions: BTreeSet::new(),
            scope: ScopeRestrictions::unrestricted(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Capability>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn with_scope(mut self, scope: ScopeRestrictions) -> Self {
        self.scope = scope.normalized();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == GroupStatus::Active
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.permissions.contains(&capability)
    }
}

/// Input for creating a group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<Capability>,
    #[serde(default)]
    pub scope: ScopeRestrictions,
    #[serde(default)]
    pub is_system_group: bool,
}

impl NewGroup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Capability>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    pub fn with_scope(mut self, scope: ScopeRestrictions) -> Self {
        self.scope = scope;
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_group = true;
        self
    }
}

/// Partial update of a group. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Option<BTreeSet<Capability>>,
    #[serde(default)]
    pub scope: Option<ScopeRestrictions>,
}

/// Group membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub user_id: UserId,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(group_id: GroupId, user_id: UserId) -> Self {
        Self {
            group_id,
            user_id,
            added_at: Utc::now(),
        }
    }
}

/// Kind of resource an access check targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Company,
    Department,
    DocumentType,
    /// Uploaded document, scoped by its company, department and type
    Document,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Company => "company",
            ResourceType::Department => "department",
            ResourceType::DocumentType => "document_type",
            ResourceType::Document => "document",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "company" => Ok(ResourceType::Company),
            "department" => Ok(ResourceType::Department),
            "document_type" => Ok(ResourceType::DocumentType),
            "document" => Ok(ResourceType::Document),
            other => Err(AuthzError::BadRequest {
                message: format!("unknown resource type '{}'", other),
            }),
        }
    }
}

/// Reference to a resource instance, written `type:id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub id: u64,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, id: u64) -> Self {
        Self { resource_type, id }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

impl FromStr for ResourceRef {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| AuthzError::BadRequest {
            message: format!("resource '{}' must be written as type:id", s),
        })?;
        let id = id.trim().parse::<u64>().map_err(|e| AuthzError::BadRequest {
            message: format!("invalid resource id '{}': {}", id, e),
        })?;

        Ok(Self::new(kind.parse()?, id))
    }
}

/// Scope attributes of a resource instance. `None` means the resource is not
/// scoped on that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceScope {
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub document_type_id: Option<DocumentTypeId>,
}

impl ResourceScope {
    /// Scope of a single-dimension resource
    pub fn of(resource_type: ResourceType, id: u64) -> Self {
        match resource_type {
            ResourceType::Company => Self {
                company_id: Some(id),
                ..Default::default()
            },
            ResourceType::Department => Self {
                department_id: Some(id),
                ..Default::default()
            },
            ResourceType::DocumentType => Self {
                document_type_id: Some(id),
                ..Default::default()
            },
            ResourceType::Document => Self::default(),
        }
    }
}

/// Document record kept by the resource directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    #[serde(flatten)]
    pub scope: ResourceScope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_allows_unrestricted_dimension() {
        let scope = ScopeRestrictions::unrestricted().with_companies([5]);

        assert!(scope.allows(ScopeDimension::Company, Some(5)));
        assert!(!scope.allows(ScopeDimension::Company, Some(7)));
        assert!(scope.allows(ScopeDimension::Department, Some(42)));
    }

    #[test]
    fn test_unscoped_resource_passes() {
        let scope = ScopeRestrictions::unrestricted().with_departments([3]);
        assert!(scope.allows(ScopeDimension::Department, None));
        assert!(scope.covers(&ResourceScope::default()));
    }

    #[test]
    fn test_empty_restriction_is_normalized() {
        let scope = ScopeRestrictions {
            companies: Some(BTreeSet::new()),
            ..Default::default()
        }
        .normalized();

        assert!(scope.is_unrestricted());
        assert!(ScopeRestrictions::unrestricted().with_document_types(Vec::new()).is_unrestricted());
    }

    #[test]
    fn test_covers_requires_every_dimension() {
        let scope = ScopeRestrictions::unrestricted().with_companies([1]).with_document_types([8]);
        let document = ResourceScope {
            company_id: Some(1),
            department_id: Some(4),
            document_type_id: Some(9),
        };

        assert!(!scope.covers(&document));
        assert!(scope.covers(&ResourceScope {
            document_type_id: Some(8),
            ..document
        }));
    }

    #[test]
    fn test_resource_ref_parsing() {
        let resource: ResourceRef = "department:3".parse().unwrap();
        assert_eq!(resource, ResourceRef::new(ResourceType::Department, 3));
        assert_eq!(resource.to_string(), "department:3");

        assert!("folder:1".parse::<ResourceRef>().is_err());
        assert!("company".parse::<ResourceRef>().is_err());
        assert!("company:abc".parse::<ResourceRef>().is_err());
    }

    #[test]
    fn test_group_deserializes_with_defaults() {
        let group: Group = serde_json::from_str(r#"{"id": 1, "name": "Editors", "permissions": ["download_files"]}"#).unwrap();

        assert!(group.is_active());
        assert!(!group.is_system_group);
        assert!(group.grants(Capability::DownloadFiles));
        assert!(group.scope.is_unrestricted());
    }
}
