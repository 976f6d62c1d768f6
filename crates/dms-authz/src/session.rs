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

//! Authenticated identity carried for the duration of a request

use crate::models::User;

/// Source of the current request's user
pub trait SessionContext: Send + Sync {
    /// The authenticated user, or `None` for anonymous requests
    fn current_user(&self) -> Option<User>;
}

/// Session resolved once at the start of a request
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    user: Option<User>,
}

impl RequestSession {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }
}

impl SessionContext for RequestSession {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}

impl From<Option<User>> for RequestSession {
    fn from(user: Option<User>) -> Self {
        Self { user }
    }
}
