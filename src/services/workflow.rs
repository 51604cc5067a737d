//! Status-update workflow
//!
//! Every change to a grievance after filing passes through here. Checks run in
//! a fixed order, after the request itself has been validated:
//!
//! 1. the grievance exists (`NotFound`)
//! 2. the caller may act on it (`Forbidden`)
//! 3. the transition is allowed (`InvalidTransition`)
//! 4. a resolve carries evidence (`MissingEvidence`)
//!
//! Only then is a file stored and the grievance written. The file is stored
//! first; the status, evidence and log entry follow in one document write. If
//! that write fails the file is left orphaned and logged.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{AccessGuard, Identity, Operation};
use crate::db::schemas::{
    Attachment, Evidence, GrievanceDoc, GrievanceStatus, LogEntry, NewGrievance,
};
use crate::services::accounts::AccountService;
use crate::services::evidence::{EvidenceHandler, UploadedFile};
use crate::services::store::{GrievanceStore, GrievanceUpdate};
use crate::types::{PortalError, Result};

/// An officer's status update as submitted
#[derive(Debug, Clone)]
pub struct StatusUpdateRequest {
    pub status: GrievanceStatus,
    pub notes: String,
    pub file: Option<UploadedFile>,
}

/// Applies lifecycle changes to grievances
#[derive(Clone)]
pub struct StatusWorkflow {
    grievances: Arc<dyn GrievanceStore>,
    evidence: EvidenceHandler,
    accounts: AccountService,
}

impl StatusWorkflow {
    pub fn new(
        grievances: Arc<dyn GrievanceStore>,
        evidence: EvidenceHandler,
        accounts: AccountService,
    ) -> Self {
        Self {
            grievances,
            evidence,
            accounts,
        }
    }

    pub fn grievances(&self) -> &Arc<dyn GrievanceStore> {
        &self.grievances
    }

    pub fn evidence(&self) -> &EvidenceHandler {
        &self.evidence
    }

    async fn load(&self, grievance_id: &str) -> Result<GrievanceDoc> {
        self.grievances
            .get(grievance_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Grievance not found".into()))
    }

    /// Read one grievance as `identity`
    pub async fn read(&self, grievance_id: &str, identity: &Identity) -> Result<GrievanceDoc> {
        let grievance = self.load(grievance_id).await?;
        AccessGuard::authorize_read(identity, &grievance)?;
        Ok(grievance)
    }

    /// Move a grievance to `in_progress` or `resolved` on behalf of its officer
    pub async fn submit_update(
        &self,
        grievance_id: &str,
        request: StatusUpdateRequest,
        caller: Option<&Identity>,
    ) -> Result<GrievanceDoc> {
        let notes = request.notes.trim();
        if notes.is_empty() {
            return Err(PortalError::Validation("Notes are required".into()));
        }
        if !matches!(
            request.status,
            GrievanceStatus::InProgress | GrievanceStatus::Resolved
        ) {
            return Err(PortalError::Validation(
                "Status must be in_progress or resolved".into(),
            ));
        }

        let grievance = self.load(grievance_id).await?;
        let officer = AccessGuard::authorize_update(caller, &grievance, Operation::SubmitUpdate)?;
        check_transition(&grievance, request.status)?;

        if request.status == GrievanceStatus::Resolved
            && request.file.is_none()
            && !grievance.has_evidence_from(&officer.account_id)
        {
            warn!(
                grievance_id = %grievance.id,
                officer = %officer.account_id,
                "Resolve refused without evidence"
            );
            return Err(PortalError::MissingEvidence(
                "Evidence file is required to resolve a grievance".into(),
            ));
        }

        let evidence = match &request.file {
            Some(file) => vec![self.evidence.store(file, notes, &officer.account_id).await?],
            None => Vec::new(),
        };

        let update = GrievanceUpdate {
            status: Some(request.status),
            log: log_entry(officer, Some(request.status), Some(notes.to_string()), &evidence),
            evidence,
        };
        let updated = self.write(&grievance.id, update).await?;

        info!(
            grievance_id = %updated.id,
            officer = %officer.account_id,
            from = %grievance.status,
            to = %updated.status,
            "Grievance status updated"
        );
        Ok(updated)
    }

    /// Attach a file without changing status
    pub async fn attach_evidence(
        &self,
        grievance_id: &str,
        file: UploadedFile,
        description: &str,
        caller: Option<&Identity>,
    ) -> Result<GrievanceDoc> {
        let grievance = self.load(grievance_id).await?;
        let officer = AccessGuard::authorize_update(caller, &grievance, Operation::AttachEvidence)?;
        if grievance.status.is_terminal() {
            return Err(PortalError::InvalidTransition(format!(
                "Grievance is already {}",
                grievance.status
            )));
        }

        let evidence = vec![self.evidence.store(&file, description, &officer.account_id).await?];
        let description = description.trim();
        let message = (!description.is_empty()).then(|| description.to_string());

        let update = GrievanceUpdate {
            status: None,
            log: log_entry(officer, None, message, &evidence),
            evidence,
        };
        let updated = self.write(&grievance.id, update).await?;

        info!(grievance_id = %updated.id, officer = %officer.account_id, "Evidence attached");
        Ok(updated)
    }

    /// Assign (or reassign) an open grievance to an active officer
    pub async fn assign(
        &self,
        grievance_id: &str,
        officer_id: &str,
        admin: &Identity,
    ) -> Result<GrievanceDoc> {
        AccessGuard::authorize_operation(admin, Operation::AssignGrievance)?;
        let grievance = self.load(grievance_id).await?;
        if grievance.status.is_terminal() {
            return Err(PortalError::InvalidTransition(format!(
                "Grievance is already {}",
                grievance.status
            )));
        }
        let officer = self.accounts.active_officer(officer_id).await?;

        let updated = self
            .grievances
            .assign(&grievance.id, &officer.id, Utc::now())
            .await?
            .ok_or_else(|| PortalError::NotFound("Grievance not found".into()))?;

        info!(
            grievance_id = %updated.id,
            officer = %officer.id,
            admin = %admin.account_id,
            previous = ?grievance.assigned_officer,
            "Grievance assigned"
        );
        Ok(updated)
    }

    /// Close an open grievance as rejected, signed by the admin
    pub async fn reject(&self, grievance_id: &str, reason: &str, admin: &Identity) -> Result<GrievanceDoc> {
        AccessGuard::authorize_operation(admin, Operation::RejectGrievance)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PortalError::Validation("A rejection reason is required".into()));
        }

        let grievance = self.load(grievance_id).await?;
        check_transition(&grievance, GrievanceStatus::Rejected)?;

        let update = GrievanceUpdate {
            status: Some(GrievanceStatus::Rejected),
            log: log_entry(admin, Some(GrievanceStatus::Rejected), Some(reason.to_string()), &[]),
            evidence: Vec::new(),
        };
        let updated = self.write(&grievance.id, update).await?;

        info!(
            grievance_id = %updated.id,
            admin = %admin.account_id,
            from = %grievance.status,
            to = %updated.status,
            "Grievance rejected"
        );
        Ok(updated)
    }

    /// File a new pending grievance for a citizen
    pub async fn file_grievance(
        &self,
        citizen: &Identity,
        fields: NewGrievance,
        file: Option<UploadedFile>,
    ) -> Result<GrievanceDoc> {
        AccessGuard::authorize_operation(citizen, Operation::FileGrievance)?;
        let fields = validate_new_grievance(fields)?;

        let mut grievance = GrievanceDoc::new(citizen.account_id.clone(), fields);
        if let Some(file) = &file {
            let evidence = self.evidence.store(file, "", &citizen.account_id).await?;
            grievance.evidence.push(evidence);
        }

        let grievance = match self.grievances.insert(grievance.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                log_orphans(&grievance.id, &grievance.evidence, &e);
                return Err(e);
            }
        };

        info!(
            grievance_id = %grievance.id,
            citizen = %citizen.account_id,
            category = %grievance.category,
            priority = %grievance.priority,
            "Grievance filed"
        );
        Ok(grievance)
    }

    async fn write(&self, grievance_id: &str, update: GrievanceUpdate) -> Result<GrievanceDoc> {
        let stored = update.evidence.clone();
        match self.grievances.apply_update(grievance_id, update).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => {
                let e = PortalError::NotFound("Grievance not found".into());
                log_orphans(grievance_id, &stored, &e);
                Err(e)
            }
            Err(e) => {
                log_orphans(grievance_id, &stored, &e);
                Err(e)
            }
        }
    }
}

fn check_transition(grievance: &GrievanceDoc, next: GrievanceStatus) -> Result<()> {
    if grievance.status.is_terminal() {
        return Err(PortalError::InvalidTransition(format!(
            "Grievance is already {}",
            grievance.status
        )));
    }
    if !grievance.status.can_transition_to(next) {
        return Err(PortalError::InvalidTransition(format!(
            "Cannot move a grievance from {} to {}",
            grievance.status, next
        )));
    }
    Ok(())
}

fn log_entry(
    author: &Identity,
    status: Option<GrievanceStatus>,
    message: Option<String>,
    evidence: &[Evidence],
) -> LogEntry {
    LogEntry {
        officer_id: author.account_id.clone(),
        officer_name: author.name.clone(),
        timestamp: Utc::now(),
        status,
        message,
        attachments: evidence.iter().map(Attachment::from).collect(),
    }
}

fn log_orphans(grievance_id: &str, evidence: &[Evidence], cause: &PortalError) {
    for orphan in evidence {
        warn!(
            grievance_id = %grievance_id,
            url = %orphan.url,
            error = %cause,
            "Grievance write failed; stored evidence file is orphaned"
        );
    }
}

fn validate_new_grievance(mut fields: NewGrievance) -> Result<NewGrievance> {
    for (name, value) in [
        ("title", &mut fields.title),
        ("category", &mut fields.category),
        ("description", &mut fields.description),
    ] {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(PortalError::Validation(format!("Field '{}' is required", name)));
        }
    }
    fields.location.address = fields.location.address.trim().to_string();
    if let Some(c) = fields.location.coordinates {
        if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng) {
            return Err(PortalError::Validation("Coordinates out of range".into()));
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::{Coordinates, Location};
    use crate::services::accounts::{MemoryAccountStore, NewAccount};
    use crate::services::evidence::{EvidenceStorage, MemoryEvidenceStorage};
    use crate::services::store::MemoryGrievanceStore;
    use bytes::Bytes;

    struct Fixture {
        workflow: StatusWorkflow,
        files: Arc<MemoryEvidenceStorage>,
        officer: Identity,
        grievance_id: String,
    }

    fn identity(id: &str, name: &str, role: Role) -> Identity {
        Identity {
            account_id: id.into(),
            name: name.into(),
            role,
        }
    }

    fn photo() -> UploadedFile {
        UploadedFile {
            file_name: Some("fixed.jpg".into()),
            content_type: Some("image/jpeg".into()),
            bytes: Bytes::from_static(b"\xff\xd8\xff after"),
        }
    }

    fn request(status: GrievanceStatus, notes: &str, file: Option<UploadedFile>) -> StatusUpdateRequest {
        StatusUpdateRequest {
            status,
            notes: notes.into(),
            file,
        }
    }

    async fn fixture() -> Fixture {
        let files = Arc::new(MemoryEvidenceStorage::new());
        let store = Arc::new(MemoryGrievanceStore::new());
        let workflow = StatusWorkflow::new(
            store.clone(),
            EvidenceHandler::new(files.clone(), 1024),
            AccountService::new(Arc::new(MemoryAccountStore::new())),
        );

        let officer = identity("officer-1", "Ravi Kumar", Role::Officer);
        let mut g = GrievanceDoc::new(
            "citizen-1".into(),
            NewGrievance {
                title: "Overflowing drain".into(),
                category: "sanitation".into(),
                description: "Ward 7".into(),
                ..Default::default()
            },
        );
        g.assigned_officer = Some(officer.account_id.clone());
        let grievance_id = store.insert(g).await.unwrap().id;

        Fixture {
            workflow,
            files,
            officer,
            grievance_id,
        }
    }

    async fn status_of(f: &Fixture) -> GrievanceStatus {
        f.workflow.grievances().get(&f.grievance_id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_pending_to_in_progress_appends_one_log() {
        let f = fixture().await;
        let g = f
            .workflow
            .submit_update(
                &f.grievance_id,
                request(GrievanceStatus::InProgress, "reviewing", None),
                Some(&f.officer),
            )
            .await
            .unwrap();

        assert_eq!(g.status, GrievanceStatus::InProgress);
        assert_eq!(g.logs.len(), 1);
        assert_eq!(g.logs[0].status, Some(GrievanceStatus::InProgress));
        assert_eq!(g.logs[0].message.as_deref(), Some("reviewing"));
        assert_eq!(g.logs[0].officer_name, "Ravi Kumar");
        assert!(g.logs[0].attachments.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_without_evidence_is_refused() {
        let f = fixture().await;
        f.workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::InProgress, "reviewing", None), Some(&f.officer))
            .await
            .unwrap();

        let err = f
            .workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::Resolved, "fixed", None), Some(&f.officer))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::MissingEvidence(_)));
        assert_eq!(status_of(&f).await, GrievanceStatus::InProgress);
    }

    #[tokio::test]
    async fn test_resolve_with_file_then_terminal() {
        let f = fixture().await;
        f.workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::InProgress, "reviewing", None), Some(&f.officer))
            .await
            .unwrap();

        let g = f
            .workflow
            .submit_update(
                &f.grievance_id,
                request(GrievanceStatus::Resolved, "fixed", Some(photo())),
                Some(&f.officer),
            )
            .await
            .unwrap();
        assert_eq!(g.status, GrievanceStatus::Resolved);
        assert_eq!(g.evidence.len(), 1);
        assert_eq!(g.logs.len(), 2);
        assert_eq!(g.logs[1].attachments.len(), 1);
        assert_eq!(g.logs[1].attachments[0].file_url, g.evidence[0].url);
        assert_eq!(f.files.len(), 1);

        for next in [GrievanceStatus::Resolved, GrievanceStatus::InProgress] {
            let err = f
                .workflow
                .submit_update(&f.grievance_id, request(next, "again", Some(photo())), Some(&f.officer))
                .await
                .unwrap_err();
            assert!(matches!(err, PortalError::InvalidTransition(_)));
        }
    }

    #[tokio::test]
    async fn test_pending_cannot_jump_to_resolved() {
        let f = fixture().await;
        let err = f
            .workflow
            .submit_update(
                &f.grievance_id,
                request(GrievanceStatus::Resolved, "fixed", Some(photo())),
                Some(&f.officer),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition(_)));
        // Validation failed before anything was stored
        assert!(f.files.is_empty());
    }

    #[tokio::test]
    async fn test_prior_evidence_from_same_officer_allows_resolve() {
        let f = fixture().await;
        f.workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::InProgress, "on site", None), Some(&f.officer))
            .await
            .unwrap();
        f.workflow
            .attach_evidence(&f.grievance_id, photo(), "before/after", Some(&f.officer))
            .await
            .unwrap();

        let g = f
            .workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::Resolved, "done", None), Some(&f.officer))
            .await
            .unwrap();
        assert_eq!(g.status, GrievanceStatus::Resolved);
        assert_eq!(g.evidence.len(), 1);
        assert_eq!(g.logs.len(), 3);
        assert_eq!(g.logs[1].status, None);
        assert_eq!(g.logs[1].message.as_deref(), Some("before/after"));
    }

    #[tokio::test]
    async fn test_callers_other_than_assigned_officer_are_forbidden() {
        let f = fixture().await;
        let callers = [
            None,
            Some(identity("officer-2", "Other", Role::Officer)),
            Some(identity("citizen-1", "Owner", Role::Citizen)),
            Some(identity("admin-1", "Admin", Role::Admin)),
        ];
        for caller in callers.iter() {
            let err = f
                .workflow
                .submit_update(
                    &f.grievance_id,
                    request(GrievanceStatus::InProgress, "x", None),
                    caller.as_ref(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, PortalError::Forbidden(_)));
        }
        let g = f.workflow.grievances().get(&f.grievance_id).await.unwrap().unwrap();
        assert_eq!(g.status, GrievanceStatus::Pending);
        assert!(g.logs.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_comes_before_forbidden() {
        let f = fixture().await;
        let err = f
            .workflow
            .submit_update("missing", request(GrievanceStatus::InProgress, "x", None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_request_shape_is_validated() {
        let f = fixture().await;
        let blank = f
            .workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::InProgress, "  ", None), Some(&f.officer))
            .await;
        assert!(matches!(blank, Err(PortalError::Validation(_))));

        let reject = f
            .workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::Rejected, "no", None), Some(&f.officer))
            .await;
        assert!(matches!(reject, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn test_bad_file_leaves_grievance_untouched() {
        let f = fixture().await;
        let exe = UploadedFile {
            file_name: Some("tool.exe".into()),
            content_type: Some("application/x-msdownload".into()),
            bytes: Bytes::from_static(b"MZ"),
        };
        let err = f
            .workflow
            .submit_update(
                &f.grievance_id,
                request(GrievanceStatus::InProgress, "see file", Some(exe)),
                Some(&f.officer),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert_eq!(status_of(&f).await, GrievanceStatus::Pending);
    }

    #[tokio::test]
    async fn test_admin_reject_and_terminal_rules() {
        let f = fixture().await;
        let admin = identity("admin-1", "Admin", Role::Admin);

        let g = f
            .workflow
            .reject(&f.grievance_id, "Duplicate of an earlier complaint", &admin)
            .await
            .unwrap();
        assert_eq!(g.status, GrievanceStatus::Rejected);
        assert_eq!(g.logs[0].officer_id, "admin-1");

        let again = f.workflow.reject(&f.grievance_id, "again", &admin).await;
        assert!(matches!(again, Err(PortalError::InvalidTransition(_))));

        let update = f
            .workflow
            .submit_update(&f.grievance_id, request(GrievanceStatus::InProgress, "x", None), Some(&f.officer))
            .await;
        assert!(matches!(update, Err(PortalError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_assign_requires_active_officer() {
        let f = fixture().await;
        let admin = identity("admin-1", "Admin", Role::Admin);
        let officer = f
            .workflow
            .accounts
            .create_officer(NewAccount {
                name: "Meena".into(),
                email: "meena@city.gov".into(),
                password: "long password".into(),
                department: None,
            })
            .await
            .unwrap();

        let g = f.workflow.assign(&f.grievance_id, &officer.id, &admin).await.unwrap();
        assert!(g.is_assigned_to(&officer.id));
        assert!(g.assigned_date.is_some());
        assert_eq!(g.status, GrievanceStatus::Pending);

        let unknown = f.workflow.assign(&f.grievance_id, "nobody", &admin).await;
        assert!(matches!(unknown, Err(PortalError::NotFound(_))));

        let by_officer = f.workflow.assign(&f.grievance_id, &officer.id, &f.officer).await;
        assert!(matches!(by_officer, Err(PortalError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_file_grievance() {
        let f = fixture().await;
        let citizen = identity("citizen-9", "Lakshmi", Role::Citizen);
        let fields = NewGrievance {
            title: " Pothole ".into(),
            category: "roads".into(),
            description: "Near the school gate".into(),
            location: Location {
                address: "MG Road".into(),
                coordinates: Some(Coordinates { lat: 12.97, lng: 77.59 }),
            },
            ..Default::default()
        };

        let g = f
            .workflow
            .file_grievance(&citizen, fields.clone(), Some(photo()))
            .await
            .unwrap();
        assert_eq!(g.title, "Pothole");
        assert_eq!(g.citizen, "citizen-9");
        assert_eq!(g.status, GrievanceStatus::Pending);
        assert_eq!(g.evidence.len(), 1);
        assert_eq!(g.evidence[0].uploaded_by, "citizen-9");

        let read = f.workflow.read(&g.id, &citizen).await.unwrap();
        assert_eq!(read.id, g.id);
        assert!(f.workflow.read(&g.id, &f.officer).await.is_err());

        let mut missing_title = fields;
        missing_title.title = " ".into();
        assert!(matches!(
            f.workflow.file_grievance(&citizen, missing_title, None).await,
            Err(PortalError::Validation(_))
        ));
    }
    /// Evidence backend whose writes always fail
    struct FullDisk;

    #[async_trait::async_trait]
    impl EvidenceStorage for FullDisk {
        async fn put(&self, _key: &str, _bytes: &[u8]) -> Result<()> {
            Err(PortalError::Storage("No space left on device".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
            Ok(None)
        }
    }

    /// Grievance store that reads fine but refuses every update
    struct FailingWrites(MemoryGrievanceStore);

    #[async_trait::async_trait]
    impl GrievanceStore for FailingWrites {
        async fn get(&self, id: &str) -> Result<Option<GrievanceDoc>> {
            self.0.get(id).await
        }

        async fn insert(&self, grievance: GrievanceDoc) -> Result<GrievanceDoc> {
            self.0.insert(grievance).await
        }

        async fn list_by_citizen(&self, citizen_id: &str) -> Result<Vec<GrievanceDoc>> {
            self.0.list_by_citizen(citizen_id).await
        }

        async fn list_by_officer(&self, officer_id: &str) -> Result<Vec<GrievanceDoc>> {
            self.0.list_by_officer(officer_id).await
        }

        async fn list_all(&self, status: Option<GrievanceStatus>) -> Result<Vec<GrievanceDoc>> {
            self.0.list_all(status).await
        }

        async fn apply_update(&self, _id: &str, _update: GrievanceUpdate) -> Result<Option<GrievanceDoc>> {
            Err(PortalError::Database("connection reset".into()))
        }

        async fn assign(
            &self,
            id: &str,
            officer_id: &str,
            at: chrono::DateTime<Utc>,
        ) -> Result<Option<GrievanceDoc>> {
            self.0.assign(id, officer_id, at).await
        }
    }

    fn assigned_to(officer: &Identity) -> GrievanceDoc {
        let mut g = GrievanceDoc::new(
            "citizen-1".into(),
            NewGrievance {
                title: "Broken streetlight".into(),
                category: "electrical".into(),
                description: "Dark since Monday".into(),
                ..Default::default()
            },
        );
        g.assigned_officer = Some(officer.account_id.clone());
        g
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_update() {
        let store = Arc::new(MemoryGrievanceStore::new());
        let workflow = StatusWorkflow::new(
            store.clone(),
            EvidenceHandler::new(Arc::new(FullDisk), 1024),
            AccountService::new(Arc::new(MemoryAccountStore::new())),
        );
        let officer = identity("officer-1", "Ravi Kumar", Role::Officer);
        let id = store.insert(assigned_to(&officer)).await.unwrap().id;

        workflow
            .submit_update(&id, request(GrievanceStatus::InProgress, "on site", None), Some(&officer))
            .await
            .unwrap();

        let err = workflow
            .submit_update(&id, request(GrievanceStatus::Resolved, "fixed", Some(photo())), Some(&officer))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Storage(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Failed to store evidence file");

        let g = store.get(&id).await.unwrap().unwrap();
        assert_eq!(g.status, GrievanceStatus::InProgress);
        assert_eq!(g.logs.len(), 1);
        assert!(g.evidence.is_empty());

        let attach = workflow
            .attach_evidence(&id, photo(), "night photo", Some(&officer))
            .await;
        assert!(matches!(attach, Err(PortalError::Storage(_))));
        assert_eq!(store.get(&id).await.unwrap().unwrap().logs.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_after_store_orphans_file() {
        let files = Arc::new(MemoryEvidenceStorage::new());
        let store = Arc::new(FailingWrites(MemoryGrievanceStore::new()));
        let workflow = StatusWorkflow::new(
            store.clone(),
            EvidenceHandler::new(files.clone(), 1024),
            AccountService::new(Arc::new(MemoryAccountStore::new())),
        );
        let officer = identity("officer-1", "Ravi Kumar", Role::Officer);
        let id = store.insert(assigned_to(&officer)).await.unwrap().id;

        let err = workflow
            .submit_update(&id, request(GrievanceStatus::InProgress, "see photo", Some(photo())), Some(&officer))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Database(_)));

        // The file was written before the failed update and stays behind
        assert_eq!(files.len(), 1);
        let g = store.get(&id).await.unwrap().unwrap();
        assert_eq!(g.status, GrievanceStatus::Pending);
        assert!(g.logs.is_empty());
        assert!(g.evidence.is_empty());
    }
}
