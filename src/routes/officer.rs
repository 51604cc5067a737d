//! Officer routes
//!
//! - GET  /api/officer/grievances         - Grievances assigned to the caller
//! - GET  /api/officer/grievance/{id}     - One grievance
//! - POST /api/officer/submitUpdate/{id}  - Status update (multipart: nstatus, notes, file)
//! - POST /api/officer/evidence/{id}      - Evidence without a status change (multipart: file, description)

use bytes::Bytes;
use hyper::{Method, Request, Response};
use std::sync::Arc;

use crate::auth::{AccessGuard, Caller, Operation};
use crate::db::schemas::GrievanceStatus;
use crate::routes::multipart::parse_form;
use crate::routes::{
    grievance_list_response, grievance_response, method_not_allowed, path_param, BoxBody,
};
use crate::server::AppState;
use crate::services::StatusUpdateRequest;
use crate::types::{PortalError, Result};

const GRIEVANCE_PREFIX: &str = "/api/officer/grievance/";
const SUBMIT_UPDATE_PREFIX: &str = "/api/officer/submitUpdate/";
const EVIDENCE_PREFIX: &str = "/api/officer/evidence/";

/// Route officer requests; `None` when the path is not ours
pub async fn handle_officer_request(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Option<Result<Response<BoxBody>>> {
    let path = req.uri().path();
    let method = req.method();

    if path == "/api/officer/grievances" {
        return Some(if method == Method::GET {
            list_assigned(state, caller).await
        } else {
            Ok(method_not_allowed())
        });
    }

    if let Some(id) = path_param(path, GRIEVANCE_PREFIX) {
        return Some(if method == Method::GET {
            get_grievance(state, caller, &id).await
        } else {
            Ok(method_not_allowed())
        });
    }

    if let Some(id) = path_param(path, SUBMIT_UPDATE_PREFIX) {
        return Some(if method == Method::POST {
            submit_update(state, req, caller, &id).await
        } else {
            Ok(method_not_allowed())
        });
    }

    if let Some(id) = path_param(path, EVIDENCE_PREFIX) {
        return Some(if method == Method::POST {
            attach_evidence(state, req, caller, &id).await
        } else {
            Ok(method_not_allowed())
        });
    }

    None
}

async fn list_assigned(state: &Arc<AppState>, caller: &Caller) -> Result<Response<BoxBody>> {
    let officer = AccessGuard::require_operation(caller, Operation::ListAssignedGrievances)?;
    let grievances = state
        .workflow
        .grievances()
        .list_by_officer(&officer.account_id)
        .await?;
    Ok(grievance_list_response(grievances))
}

async fn get_grievance(state: &Arc<AppState>, caller: &Caller, id: &str) -> Result<Response<BoxBody>> {
    let identity = caller.identity().ok_or(PortalError::SessionExpired)?;
    let grievance = state.workflow.read(id, identity).await?;
    Ok(grievance_response(grievance))
}

async fn submit_update(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
    id: &str,
) -> Result<Response<BoxBody>> {
    let mut form = parse_form(req).await?;
    let status: GrievanceStatus = form
        .require("nstatus")?
        .parse()
        .map_err(PortalError::Validation)?;
    let notes = form.require("notes")?.to_string();
    let file = form.take_file("file");

    let grievance = state
        .workflow
        .submit_update(id, StatusUpdateRequest { status, notes, file }, caller.identity())
        .await?;
    Ok(grievance_response(grievance))
}

async fn attach_evidence(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
    id: &str,
) -> Result<Response<BoxBody>> {
    let mut form = parse_form(req).await?;
    let description = form.text("description").unwrap_or_default().to_string();
    let file = form
        .take_file("file")
        .ok_or_else(|| PortalError::Validation("Field 'file' is required".into()))?;

    let grievance = state
        .workflow
        .attach_evidence(id, file, &description, caller.identity())
        .await?;
    Ok(grievance_response(grievance))
}
