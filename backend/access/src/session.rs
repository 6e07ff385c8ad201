//! Session to principal resolution.
//!
//! The auth provider owns sessions. All we read from one is the user id and
//! the role string on the user record. An authenticated user with a missing or
//! unknown role is treated as `user`; no session at all grants nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CapabilityMatrix, CapabilityStatement, Role};

/// Session payload as returned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            user: SessionUser {
                id: id.into(),
                role: role.map(str::to_string),
            },
        }
    }
}

/// Authenticated actor for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn statement(&self) -> &'static CapabilityStatement {
        CapabilityMatrix::global().statement_for(self.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no valid session")]
pub struct NoSession;

pub fn resolve_principal(session: Option<&Session>) -> Result<Principal, NoSession> {
    let session = session.ok_or(NoSession)?;

    if session.user.id.trim().is_empty() {
        return Err(NoSession);
    }

    let role = session
        .user
        .role
        .as_deref()
        .and_then(Role::from_name)
        .unwrap_or(Role::User);

    Ok(Principal {
        id: session.user.id.clone(),
        role,
    })
}

/// Statement to gate UI with. Empty, not `user`, when there is no session.
pub fn statement_for_session(session: Option<&Session>) -> CapabilityStatement {
    match resolve_principal(session) {
        Ok(principal) => principal.statement().clone(),
        Err(NoSession) => CapabilityStatement::empty(),
    }
}
