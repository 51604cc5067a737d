//! Admin oversight routes
//!
//! - POST   /api/admin/officers        - Create an officer account
//! - GET    /api/admin/officers        - List active officers
//! - DELETE /api/admin/officers/{id}   - Deactivate an officer
//! - GET    /api/admin/grievances      - All grievances (optional `?status=`)
//! - POST   /api/admin/assign/{id}     - Assign a grievance to an officer
//! - POST   /api/admin/reject/{id}     - Reject a grievance with a reason

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AccessGuard, Caller, Operation};
use crate::db::schemas::{AccountSummary, GrievanceStatus};
use crate::routes::{
    grievance_list_response, grievance_response, json_response, message_response,
    method_not_allowed, parse_json, parse_query, path_param, BoxBody,
};
use crate::server::AppState;
use crate::services::NewAccount;
use crate::types::{PortalError, Result};

const OFFICER_PREFIX: &str = "/api/admin/officers/";
const ASSIGN_PREFIX: &str = "/api/admin/assign/";
const REJECT_PREFIX: &str = "/api/admin/reject/";

#[derive(Debug, Deserialize)]
pub struct CreateOfficerRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfficerResponse {
    pub message: String,
    pub officer: AccountSummary,
}

#[derive(Debug, Serialize)]
pub struct OfficerListResponse {
    pub officers: Vec<AccountSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub officer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GrievanceQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Route admin requests; `None` when the path is not ours
pub async fn handle_admin_request(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Option<Result<Response<BoxBody>>> {
    let path = req.uri().path();
    let method = req.method();

    let response = match (method, path) {
        (&Method::POST, "/api/admin/officers") => create_officer(state, req, caller).await,
        (&Method::GET, "/api/admin/officers") => list_officers(state, caller).await,
        (&Method::GET, "/api/admin/grievances") => list_grievances(state, req, caller).await,
        (_, "/api/admin/officers") | (_, "/api/admin/grievances") => Ok(method_not_allowed()),
        (m, p) => {
            if let Some(id) = path_param(p, OFFICER_PREFIX) {
                if m == Method::DELETE {
                    deactivate_officer(state, caller, &id).await
                } else {
                    Ok(method_not_allowed())
                }
            } else if let Some(id) = path_param(p, ASSIGN_PREFIX) {
                if m == Method::POST {
                    assign(state, req, caller, &id).await
                } else {
                    Ok(method_not_allowed())
                }
            } else if let Some(id) = path_param(p, REJECT_PREFIX) {
                if m == Method::POST {
                    reject(state, req, caller, &id).await
                } else {
                    Ok(method_not_allowed())
                }
            } else {
                return None;
            }
        }
    };
    Some(response)
}

async fn create_officer(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Result<Response<BoxBody>> {
    AccessGuard::require_operation(caller, Operation::ManageOfficers)?;
    let body: CreateOfficerRequest = parse_json(req)?;
    let officer = state
        .accounts
        .create_officer(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
            department: body.department,
        })
        .await?;

    Ok(json_response(
        StatusCode::CREATED,
        &OfficerResponse {
            message: "Officer created".into(),
            officer: officer.summary(),
        },
    ))
}

async fn list_officers(state: &Arc<AppState>, caller: &Caller) -> Result<Response<BoxBody>> {
    AccessGuard::require_operation(caller, Operation::ManageOfficers)?;
    let officers = state.accounts.list_officers().await?;
    Ok(json_response(StatusCode::OK, &OfficerListResponse { officers }))
}

async fn deactivate_officer(
    state: &Arc<AppState>,
    caller: &Caller,
    id: &str,
) -> Result<Response<BoxBody>> {
    AccessGuard::require_operation(caller, Operation::ManageOfficers)?;
    state.accounts.deactivate_officer(id).await?;
    state.sessions.revoke_account(id).await?;
    Ok(message_response(StatusCode::OK, "Officer deactivated"))
}

async fn list_grievances(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Result<Response<BoxBody>> {
    AccessGuard::require_operation(caller, Operation::ListAllGrievances)?;
    let query: GrievanceQuery = parse_query(req)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<GrievanceStatus>)
        .transpose()
        .map_err(PortalError::Validation)?;

    let grievances = state.workflow.grievances().list_all(status).await?;
    Ok(grievance_list_response(grievances))
}

async fn assign(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
    id: &str,
) -> Result<Response<BoxBody>> {
    let admin = AccessGuard::require_operation(caller, Operation::AssignGrievance)?;
    let body: AssignRequest = parse_json(req)?;
    let grievance = state.workflow.assign(id, body.officer_id.trim(), admin).await?;
    Ok(grievance_response(grievance))
}

async fn reject(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
    id: &str,
) -> Result<Response<BoxBody>> {
    let admin = AccessGuard::require_operation(caller, Operation::RejectGrievance)?;
    let body: RejectRequest = parse_json(req)?;
    let grievance = state.workflow.reject(id, &body.reason, admin).await?;
    Ok(grievance_response(grievance))
}
