//! Session context and the header-injection policy applied to every request.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ExplorerConfig;
use crate::error::ExplorerError;
use crate::types::{AuthType, KeyValuePair};

/// Roles known to the backend, lowest privilege first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "member" | "user" => Some(Role::Member),
            "admin" => Some(Role::Admin),
            "superadmin" | "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Bypass mode is an administrator override.
    pub fn can_bypass_team_scope(&self) -> bool {
        *self >= Role::Admin
    }

    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and tenant scoping for outgoing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub auth_type: AuthType,
    pub api_key: Option<String>,
    pub session_cookie: Option<String>,
    pub team_id: Option<String>,
    pub bypass_team_scope: bool,
    pub role: Role,
}

impl SessionContext {
    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self {
            auth_type: if config.api_key.is_some() {
                AuthType::ApiKey
            } else {
                AuthType::Session
            },
            api_key: config.api_key.clone(),
            session_cookie: config.session_cookie.clone(),
            team_id: None,
            bypass_team_scope: false,
            role: config.role,
        }
    }
}

/// Header names used for tenant scoping. Defined by the hosting application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPolicy {
    pub bypass_header: String,
    pub team_header: String,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            bypass_header: "x-admin-bypass".to_string(),
            team_header: "x-team-id".to_string(),
        }
    }
}

impl HeaderPolicy {
    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self {
            bypass_header: config.bypass_header.clone(),
            team_header: config.team_header.clone(),
        }
    }

    /// Headers injected by policy for `session`.
    ///
    /// In bypass mode only the bypass marker is sent; otherwise the team
    /// header is sent when a team is known.
    pub fn scoping_headers(&self, session: &SessionContext) -> Result<Vec<(String, String)>, ExplorerError> {
        if session.bypass_team_scope {
            if !session.role.can_bypass_team_scope() {
                return Err(ExplorerError::Forbidden(format!(
                    "bypass mode requires the admin role, current role is {}",
                    session.role
                )));
            }
            return Ok(vec![(self.bypass_header.clone(), "true".to_string())]);
        }

        Ok(session
            .team_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| vec![(self.team_header.clone(), id.clone())])
            .unwrap_or_default())
    }

    /// Final header list: policy headers first, then the active user rows.
    /// A user row replaces a policy header with the same name.
    pub fn merge_headers(
        &self,
        session: &SessionContext,
        rows: &[KeyValuePair],
    ) -> Result<Vec<(String, String)>, ExplorerError> {
        let user: Vec<(String, String)> = rows
            .iter()
            .filter(|r| r.is_active())
            .map(|r| (r.key.clone(), r.value.clone()))
            .collect();

        let mut headers: Vec<(String, String)> = self
            .scoping_headers(session)?
            .into_iter()
            .filter(|(k, _)| !user.iter().any(|(u, _)| u.eq_ignore_ascii_case(k)))
            .collect();
        headers.extend(user);
        Ok(headers)
    }
}
