//! Session-scoped access guard
//!
//! One guard for all three roles. Routes resolve the caller once, then ask
//! for a role (`require_role`) or an operation (`require_operation`). The
//! workflow asks again per grievance: `authorize_read` for viewing and
//! `authorize_update` for officer writes, which adds the assignment predicate.

use std::sync::Arc;
use tracing::warn;

use crate::auth::permissions::{
    is_operation_allowed, operation_description, required_role, Operation,
};
use crate::auth::session::{Session, SessionService};
use crate::auth::Role;
use crate::db::schemas::GrievanceDoc;
use crate::types::{PortalError, Result};

/// Who is calling
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub account_id: String,
    pub name: String,
    pub role: Role,
}

impl From<&Session> for Identity {
    fn from(session: &Session) -> Self {
        Self {
            account_id: session.account_id.clone(),
            name: session.name.clone(),
            role: session.role,
        }
    }
}

/// Caller resolved from the request's session cookie
#[derive(Debug, Clone, PartialEq)]
pub enum Caller {
    Anonymous,
    Authenticated {
        identity: Identity,
        /// Token to re-issue so the cookie's Max-Age slides with the session
        token: String,
    },
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated { identity, .. } => Some(identity),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated { token, .. } => Some(token),
        }
    }
}

/// Resolves callers and applies the authorization policy
#[derive(Clone)]
pub struct AccessGuard {
    sessions: Arc<SessionService>,
}

impl AccessGuard {
    pub fn new(sessions: Arc<SessionService>) -> Self {
        Self { sessions }
    }

    /// Resolve the `Cookie` header; missing, forged or expired sessions are anonymous
    pub async fn resolve(&self, cookie_header: Option<&str>) -> Result<Caller> {
        let Some(token) = self.sessions.token_from_cookie_header(cookie_header) else {
            return Ok(Caller::Anonymous);
        };

        match self.sessions.resolve(&token).await {
            Ok(session) => Ok(Caller::Authenticated {
                identity: Identity::from(&session),
                token,
            }),
            Err(PortalError::SessionExpired) => Ok(Caller::Anonymous),
            Err(e) => Err(e),
        }
    }

    /// Demand an authenticated caller with `role`
    ///
    /// No session is `SessionExpired`; a session for another role is `Forbidden`.
    pub fn require_role<'a>(caller: &'a Caller, role: Role) -> Result<&'a Identity> {
        let identity = caller.identity().ok_or(PortalError::SessionExpired)?;
        if identity.role != role {
            warn!(
                account = %identity.account_id,
                role = %identity.role,
                required = %role,
                "Role check failed"
            );
            return Err(PortalError::Forbidden(format!("{} access required", role)));
        }
        Ok(identity)
    }

    /// Demand the role an operation needs
    pub fn require_operation<'a>(caller: &'a Caller, operation: Operation) -> Result<&'a Identity> {
        Self::require_role(caller, required_role(operation)).map_err(|e| match e {
            PortalError::Forbidden(_) => operation_denied(operation),
            other => other,
        })
    }

    /// Operation check for an identity already resolved
    pub fn authorize_operation(identity: &Identity, operation: Operation) -> Result<()> {
        if is_operation_allowed(operation, identity.role) {
            Ok(())
        } else {
            warn!(
                account = %identity.account_id,
                role = %identity.role,
                operation = operation_description(operation),
                "Operation refused"
            );
            Err(operation_denied(operation))
        }
    }

    /// Write policy: the role `operation` requires, and assignment to `grievance`
    pub fn authorize_update<'a>(
        identity: Option<&'a Identity>,
        grievance: &GrievanceDoc,
        operation: Operation,
    ) -> Result<&'a Identity> {
        let denied = || {
            PortalError::Forbidden("Only the assigned officer can update this grievance".into())
        };
        let identity = identity.ok_or_else(denied)?;

        if is_operation_allowed(operation, identity.role)
            && grievance.is_assigned_to(&identity.account_id)
        {
            return Ok(identity);
        }

        warn!(
            grievance_id = %grievance.id,
            account = %identity.account_id,
            role = %identity.role,
            operation = operation_description(operation),
            "Update refused: not the assigned officer"
        );
        Err(denied())
    }

    /// Read policy: assigned officer, owning citizen, or any admin
    pub fn authorize_read(identity: &Identity, grievance: &GrievanceDoc) -> Result<()> {
        let allowed = match identity.role {
            Role::Admin => true,
            Role::Officer => grievance.is_assigned_to(&identity.account_id),
            Role::Citizen => grievance.citizen == identity.account_id,
        };

        if allowed {
            Ok(())
        } else {
            Err(PortalError::Forbidden(
                "You do not have access to this grievance".into(),
            ))
        }
    }
}

fn operation_denied(operation: Operation) -> PortalError {
    PortalError::Forbidden(format!(
        "Not allowed to {}",
        operation_description(operation).to_lowercase()
    ))
}
