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

//! DMS2 authorization
//!
//! This crate resolves what a document-management user may do:
//! - Closed capability vocabulary validated at configuration load
//! - Group memberships with company, department and document-type scope
//! - Admin short-circuit and fail-closed evaluation
//! - A resource guard turning denials into redirect or 403 responses
//! - Group administration with audit logging

pub mod audit;
pub mod capability;
pub mod config;
pub mod error;
pub mod guard;
pub mod legacy;
pub mod manager;
pub mod models;
pub mod resolver;
pub mod service;
pub mod session;
pub mod store;

pub use capability::{Capability, CapabilityRegistry};
pub use config::{AuthzConfig, PermissionModel};
pub use error::{AuthzError, AuthzResult};
pub use guard::ResourceGuard;
pub use resolver::{Authorizer, GroupPermissionResolver, PermissionGrants};
pub use service::AuthorizationService;
pub use session::{RequestSession, SessionContext};
