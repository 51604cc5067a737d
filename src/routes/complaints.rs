//! Citizen complaint routes
//!
//! - POST /api/complaints       - File a grievance (multipart)
//! - GET  /api/complaints/mine  - The caller's grievances, newest first
//! - GET  /api/complaints/{id}  - One grievance, if the caller may read it

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::auth::{AccessGuard, Caller, Operation};
use crate::db::schemas::{Coordinates, Location, NewGrievance, Priority};
use crate::routes::multipart::{parse_form, FormData};
use crate::routes::{
    grievance_list_response, grievance_response, json_response, method_not_allowed, path_param,
    BoxBody, GrievanceResponse,
};
use crate::server::AppState;
use crate::types::{PortalError, Result};

const COMPLAINT_PREFIX: &str = "/api/complaints/";

/// Route complaint requests; `None` when the path is not ours
pub async fn handle_complaint_request(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Option<Result<Response<BoxBody>>> {
    let path = req.uri().path();
    let method = req.method();

    let response = match (method, path) {
        (&Method::POST, "/api/complaints") => file_complaint(state, req, caller).await,
        (&Method::GET, "/api/complaints/mine") => list_mine(state, caller).await,
        (_, "/api/complaints") | (_, "/api/complaints/mine") => Ok(method_not_allowed()),
        (m, p) => {
            let id = path_param(p, COMPLAINT_PREFIX)?;
            if m == Method::GET {
                get_complaint(state, caller, &id).await
            } else {
                Ok(method_not_allowed())
            }
        }
    };
    Some(response)
}

async fn file_complaint(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Result<Response<BoxBody>> {
    let citizen = AccessGuard::require_operation(caller, Operation::FileGrievance)?;
    let mut form = parse_form(req).await?;
    let fields = new_grievance(&form)?;
    let file = form.take_file("file");

    let grievance = state.workflow.file_grievance(citizen, fields, file).await?;
    Ok(json_response(StatusCode::CREATED, &GrievanceResponse { grievance }))
}

async fn list_mine(state: &Arc<AppState>, caller: &Caller) -> Result<Response<BoxBody>> {
    let citizen = AccessGuard::require_operation(caller, Operation::ListOwnGrievances)?;
    let grievances = state
        .workflow
        .grievances()
        .list_by_citizen(&citizen.account_id)
        .await?;
    Ok(grievance_list_response(grievances))
}

async fn get_complaint(state: &Arc<AppState>, caller: &Caller, id: &str) -> Result<Response<BoxBody>> {
    let identity = caller.identity().ok_or(PortalError::SessionExpired)?;
    Ok(grievance_response(state.workflow.read(id, identity).await?))
}

fn new_grievance(form: &FormData) -> Result<NewGrievance> {
    let priority = match form.text("priority") {
        Some(p) => p.parse::<Priority>().map_err(PortalError::Validation)?,
        None => Priority::default(),
    };

    let coordinates = match (form.text("lat"), form.text("lng")) {
        (Some(lat), Some(lng)) => Some(Coordinates {
            lat: parse_degrees("lat", lat)?,
            lng: parse_degrees("lng", lng)?,
        }),
        (None, None) => None,
        _ => {
            return Err(PortalError::Validation(
                "Both 'lat' and 'lng' are required for coordinates".into(),
            ))
        }
    };

    Ok(NewGrievance {
        title: form.require("title")?.to_string(),
        category: form.require("category")?.to_string(),
        description: form.require("description")?.to_string(),
        priority,
        location: Location {
            address: form.text("address").unwrap_or_default().to_string(),
            coordinates,
        },
    })
}

fn parse_degrees(name: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PortalError::Validation(format!("Field '{}' must be a number", name)))
}
