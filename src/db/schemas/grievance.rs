//! Grievance document schema
//!
//! A grievance carries its own history: the `evidence` and `logs` arrays only
//! ever grow, and `citizen` is fixed when the document is created.
//!
//! ```text
//! pending ──► in_progress ──► resolved
//!    │             │  ▲
//!    │             └──┘ (progress note)
//!    └──────┬──────┘
//!           ▼
//!        rejected
//! ```

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for grievances
pub const GRIEVANCE_COLLECTION: &str = "grievances";

/// Grievance priority, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("Unknown priority '{}'", other)),
        }
    }
}

/// Grievance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrievanceStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl GrievanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrievanceStatus::Pending => "pending",
            GrievanceStatus::InProgress => "in_progress",
            GrievanceStatus::Resolved => "resolved",
            GrievanceStatus::Rejected => "rejected",
        }
    }

    /// Resolved and rejected grievances accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, GrievanceStatus::Resolved | GrievanceStatus::Rejected)
    }

    /// Whether `next` is reachable from this status in one step
    pub fn can_transition_to(&self, next: GrievanceStatus) -> bool {
        use GrievanceStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Resolved)
                | (Pending, Rejected)
                | (InProgress, Rejected)
        )
    }
}

impl fmt::Display for GrievanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "pending" => Ok(GrievanceStatus::Pending),
            "in_progress" => Ok(GrievanceStatus::InProgress),
            "resolved" => Ok(GrievanceStatus::Resolved),
            "rejected" => Ok(GrievanceStatus::Rejected),
            other => Err(format!("Unknown status '{}'", other)),
        }
    }
}

/// Geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Where the grievance happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

/// Stored file attached to a grievance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub url: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub description: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Evidence reference carried by a log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_url: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub description: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&Evidence> for Attachment {
    fn from(evidence: &Evidence) -> Self {
        Self {
            file_url: evidence.url.clone(),
            file_type: evidence.file_type.clone(),
            description: evidence.description.clone(),
            uploaded_by: evidence.uploaded_by.clone(),
            uploaded_at: evidence.uploaded_at,
        }
    }
}

/// One entry in a grievance's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Account id of the officer (or admin) who wrote the entry
    pub officer_id: String,
    pub officer_name: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the entry records a transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GrievanceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Grievance document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrievanceDoc {
    /// ObjectId-style hex identifier
    #[serde(rename = "_id")]
    pub id: String,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,
    pub category: String,
    pub description: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: GrievanceStatus,

    pub submitted_date: DateTime<Utc>,

    #[serde(default)]
    pub assigned_date: Option<DateTime<Utc>>,

    /// Account id of the assigned officer
    #[serde(default)]
    pub assigned_officer: Option<String>,

    /// Account id of the filing citizen
    pub citizen: String,

    #[serde(default)]
    pub location: Location,

    #[serde(default)]
    pub evidence: Vec<Evidence>,

    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Fields a citizen supplies when filing
#[derive(Debug, Clone, Default)]
pub struct NewGrievance {
    pub title: String,
    pub category: String,
    pub description: String,
    pub priority: Priority,
    pub location: Location,
}

impl GrievanceDoc {
    /// Create a pending grievance owned by `citizen`
    pub fn new(citizen: String, fields: NewGrievance) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            metadata: Metadata::new(),
            title: fields.title,
            category: fields.category,
            description: fields.description,
            priority: fields.priority,
            status: GrievanceStatus::Pending,
            submitted_date: Utc::now(),
            assigned_date: None,
            assigned_officer: None,
            citizen,
            location: fields.location,
            evidence: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Whether `account_id` is the officer currently assigned
    pub fn is_assigned_to(&self, account_id: &str) -> bool {
        self.assigned_officer.as_deref() == Some(account_id)
    }

    /// Whether `account_id` uploaded any of the grievance's evidence
    pub fn has_evidence_from(&self, account_id: &str) -> bool {
        self.evidence.iter().any(|e| e.uploaded_by == account_id)
    }
}

impl IntoIndexes for GrievanceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "citizen": 1, "submittedDate": -1 },
                Some(
                    IndexOptions::builder()
                        .name("citizen_submitted_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "assignedOfficer": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("officer_status_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(IndexOptions::builder().name("status_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for GrievanceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
