//! Roles and the operations each role may invoke
//!
//! Roles are not ordered: an admin is not an officer and cannot submit
//! status updates. Each operation names the single role it requires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role bound to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Officer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Officer => "officer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" | "user" => Ok(Role::Citizen),
            "officer" => Ok(Role::Officer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Operations exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FileGrievance,
    ListOwnGrievances,
    ListAssignedGrievances,
    SubmitUpdate,
    AttachEvidence,
    ManageOfficers,
    AssignGrievance,
    RejectGrievance,
    ListAllGrievances,
}

/// The role an operation requires
pub fn required_role(operation: Operation) -> Role {
    match operation {
        Operation::FileGrievance | Operation::ListOwnGrievances => Role::Citizen,

        Operation::ListAssignedGrievances
        | Operation::SubmitUpdate
        | Operation::AttachEvidence => Role::Officer,

        Operation::ManageOfficers
        | Operation::AssignGrievance
        | Operation::RejectGrievance
        | Operation::ListAllGrievances => Role::Admin,
    }
}

/// Check if a role may invoke an operation
pub fn is_operation_allowed(operation: Operation, role: Role) -> bool {
    required_role(operation) == role
}

/// Human-readable description of an operation for logging
pub fn operation_description(operation: Operation) -> &'static str {
    match operation {
        Operation::FileGrievance => "File grievance",
        Operation::ListOwnGrievances => "List own grievances",
        Operation::ListAssignedGrievances => "List assigned grievances",
        Operation::SubmitUpdate => "Submit status update",
        Operation::AttachEvidence => "Attach evidence",
        Operation::ManageOfficers => "Manage officers",
        Operation::AssignGrievance => "Assign grievance",
        Operation::RejectGrievance => "Reject grievance",
        Operation::ListAllGrievances => "List all grievances",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_updates_are_officer_only() {
        assert!(is_operation_allowed(Operation::SubmitUpdate, Role::Officer));
        assert!(!is_operation_allowed(Operation::SubmitUpdate, Role::Admin));
        assert!(!is_operation_allowed(Operation::SubmitUpdate, Role::Citizen));
    }

    #[test]
    fn test_oversight_is_admin_only() {
        for op in [
            Operation::ManageOfficers,
            Operation::AssignGrievance,
            Operation::RejectGrievance,
            Operation::ListAllGrievances,
        ] {
            assert!(is_operation_allowed(op, Role::Admin));
            assert!(!is_operation_allowed(op, Role::Officer));
        }
    }

    #[test]
    fn test_filing_is_citizen_only() {
        assert!(is_operation_allowed(Operation::FileGrievance, Role::Citizen));
        assert!(!is_operation_allowed(Operation::FileGrievance, Role::Officer));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("officer".parse::<Role>().unwrap(), Role::Officer);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Citizen);
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
