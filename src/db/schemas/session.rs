//! Session document schema
//!
//! Server-side session records. MongoDB's TTL monitor removes a document once
//! `expires_at` passes; lookups check expiry themselves as well, since the
//! monitor only runs about once a minute.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for sessions
pub const SESSION_COLLECTION: &str = "sessions";

/// Session document stored in MongoDB
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionDoc {
    /// Session id (the unsigned part of the cookie)
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub account_id: String,
    pub name: String,
    pub role: Role,

    /// Stored as a BSON date so the TTL index applies
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub last_access: DateTime<Utc>,
}

impl IntoIndexes for SessionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .name("expires_at_ttl".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "account_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("account_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SessionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
