//! Account document schema
//!
//! Citizens, officers and admins share one collection, keyed by email.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for accounts
pub const ACCOUNT_COLLECTION: &str = "accounts";

/// Account document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AccountDoc {
    #[serde(rename = "_id")]
    pub id: String,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Login identifier, stored lowercased
    pub email: String,

    /// Display name shown in grievance logs
    pub name: String,

    /// Argon2 password hash
    pub password_hash: String,

    pub role: Role,

    /// Officer department (officers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl AccountDoc {
    pub fn new(email: &str, name: String, password_hash: String, role: Role) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            metadata: Metadata::new(),
            email: normalize_email(email),
            name,
            password_hash,
            role,
            department: None,
            is_active: true,
        }
    }

    /// Public view without the password hash
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            department: self.department.clone(),
        }
    }
}

/// Emails compare case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Account as returned to clients
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl IntoIndexes for AccountDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "role": 1 },
                Some(IndexOptions::builder().name("role_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for AccountDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        let account = AccountDoc::new(" Officer@City.GOV ", "Asha".into(), "hash".into(), Role::Officer);
        assert_eq!(account.email, "officer@city.gov");
        assert!(account.is_active);
    }

    #[test]
    fn test_summary_hides_password_hash() {
        let account = AccountDoc::new("a@b.c", "A".into(), "$argon2id$secret".into(), Role::Citizen);
        let json = serde_json::to_string(&account.summary()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"citizen\""));
    }
}
