//! Grievance record store
//!
//! The `GrievanceStore` trait keeps the workflow independent of the backend:
//! `MongoGrievanceStore` in production, `MemoryGrievanceStore` in dev mode and
//! tests. Every mutation after creation goes through `apply_update` or `assign`,
//! each a single-document write.

use async_trait::async_trait;
use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::db::schemas::{Evidence, GrievanceDoc, GrievanceStatus, LogEntry, GRIEVANCE_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{PortalError, Result};

/// One append to a grievance's history
///
/// `status` is set for transitions and left empty for standalone evidence.
/// The evidence and log entry land in the same write.
#[derive(Debug, Clone)]
pub struct GrievanceUpdate {
    pub status: Option<GrievanceStatus>,
    pub evidence: Vec<Evidence>,
    pub log: LogEntry,
}

/// Persistence for grievance documents
#[async_trait]
pub trait GrievanceStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<GrievanceDoc>>;

    async fn insert(&self, grievance: GrievanceDoc) -> Result<GrievanceDoc>;

    /// Grievances filed by a citizen, newest first
    async fn list_by_citizen(&self, citizen_id: &str) -> Result<Vec<GrievanceDoc>>;

    /// Grievances assigned to an officer, newest first
    async fn list_by_officer(&self, officer_id: &str) -> Result<Vec<GrievanceDoc>>;

    /// All grievances, newest first, optionally filtered by status
    async fn list_all(&self, status: Option<GrievanceStatus>) -> Result<Vec<GrievanceDoc>>;

    /// Set the status (if any), append evidence and one log entry.
    /// Returns the document as written, or `None` if it vanished.
    async fn apply_update(&self, id: &str, update: GrievanceUpdate) -> Result<Option<GrievanceDoc>>;

    /// Point the grievance at an officer and stamp the assignment date
    async fn assign(
        &self,
        id: &str,
        officer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<GrievanceDoc>>;
}

// =============================================================================
// MongoDB backend
// =============================================================================

pub struct MongoGrievanceStore {
    collection: MongoCollection<GrievanceDoc>,
}

impl MongoGrievanceStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            collection: mongo.collection(GRIEVANCE_COLLECTION).await?,
        })
    }

    fn newest_first() -> Option<bson::Document> {
        Some(doc! { "submittedDate": -1 })
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| PortalError::Internal(format!("BSON encoding failed: {}", e)))
}

#[async_trait]
impl GrievanceStore for MongoGrievanceStore {
    async fn get(&self, id: &str) -> Result<Option<GrievanceDoc>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn insert(&self, grievance: GrievanceDoc) -> Result<GrievanceDoc> {
        self.collection.insert_one(grievance.clone()).await?;
        Ok(grievance)
    }

    async fn list_by_citizen(&self, citizen_id: &str) -> Result<Vec<GrievanceDoc>> {
        self.collection
            .find_many(doc! { "citizen": citizen_id }, Self::newest_first())
            .await
    }

    async fn list_by_officer(&self, officer_id: &str) -> Result<Vec<GrievanceDoc>> {
        self.collection
            .find_many(doc! { "assignedOfficer": officer_id }, Self::newest_first())
            .await
    }

    async fn list_all(&self, status: Option<GrievanceStatus>) -> Result<Vec<GrievanceDoc>> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };
        self.collection.find_many(filter, Self::newest_first()).await
    }

    async fn apply_update(&self, id: &str, update: GrievanceUpdate) -> Result<Option<GrievanceDoc>> {
        let mut set = doc! { "metadata.updated_at": encode(&Utc::now())? };
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }

        let mut push = doc! { "logs": encode(&update.log)? };
        if !update.evidence.is_empty() {
            push.insert("evidence", doc! { "$each": encode(&update.evidence)? });
        }

        self.collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set, "$push": push })
            .await
    }

    async fn assign(
        &self,
        id: &str,
        officer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<GrievanceDoc>> {
        let at = encode(&at)?;
        let update = doc! {
            "$set": {
                "assignedOfficer": officer_id,
                "assignedDate": at.clone(),
                "metadata.updated_at": at,
            }
        };
        self.collection
            .find_one_and_update(doc! { "_id": id }, update)
            .await
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// DashMap-backed store for dev mode and tests
#[derive(Default)]
pub struct MemoryGrievanceStore {
    grievances: DashMap<String, GrievanceDoc>,
}

impl MemoryGrievanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, keep: impl Fn(&GrievanceDoc) -> bool) -> Vec<GrievanceDoc> {
        let mut out: Vec<GrievanceDoc> = self
            .grievances
            .iter()
            .filter(|entry| !entry.metadata.is_deleted && keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| b.submitted_date.cmp(&a.submitted_date));
        out
    }
}

#[async_trait]
impl GrievanceStore for MemoryGrievanceStore {
    async fn get(&self, id: &str) -> Result<Option<GrievanceDoc>> {
        Ok(self
            .grievances
            .get(id)
            .filter(|g| !g.metadata.is_deleted)
            .map(|g| g.value().clone()))
    }

    async fn insert(&self, mut grievance: GrievanceDoc) -> Result<GrievanceDoc> {
        if self.grievances.contains_key(&grievance.id) {
            return Err(PortalError::Conflict("A record with this key already exists".into()));
        }
        grievance.metadata.touch();
        self.grievances.insert(grievance.id.clone(), grievance.clone());
        Ok(grievance)
    }

    async fn list_by_citizen(&self, citizen_id: &str) -> Result<Vec<GrievanceDoc>> {
        Ok(self.collect(|g| g.citizen == citizen_id))
    }

    async fn list_by_officer(&self, officer_id: &str) -> Result<Vec<GrievanceDoc>> {
        Ok(self.collect(|g| g.is_assigned_to(officer_id)))
    }

    async fn list_all(&self, status: Option<GrievanceStatus>) -> Result<Vec<GrievanceDoc>> {
        Ok(self.collect(|g| status.map_or(true, |s| g.status == s)))
    }

    async fn apply_update(&self, id: &str, update: GrievanceUpdate) -> Result<Option<GrievanceDoc>> {
        let Some(mut grievance) = self.grievances.get_mut(id) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            grievance.status = status;
        }
        grievance.evidence.extend(update.evidence);
        grievance.logs.push(update.log);
        grievance.metadata.touch();
        Ok(Some(grievance.value().clone()))
    }

    async fn assign(
        &self,
        id: &str,
        officer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<GrievanceDoc>> {
        let Some(mut grievance) = self.grievances.get_mut(id) else {
            return Ok(None);
        };
        grievance.assigned_officer = Some(officer_id.to_string());
        grievance.assigned_date = Some(at);
        grievance.metadata.touch();
        Ok(Some(grievance.value().clone()))
    }
}
