//! Account session routes
//!
//! - POST /api/auth/register       - Create a citizen account and log in
//! - POST /api/auth/login          - Citizen login
//! - POST /api/officer/login       - Officer login
//! - POST /api/admin/login         - Admin login
//! - POST /api/logout              - End the session
//! - GET  /api/checkUserSession    - 200 when a citizen session is live
//! - GET  /api/checkOfficerSession - 200 when an officer session is live
//! - GET  /api/checkAdminSession   - 200 when an admin session is live

use bytes::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{Caller, Role};
use crate::db::schemas::{AccountDoc, AccountSummary};
use crate::routes::{
    json_response, message_response, method_not_allowed, parse_json, with_cookie, BoxBody,
};
use crate::server::AppState;
use crate::services::NewAccount;
use crate::types::{PortalError, Result};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub role: Role,
    pub name: String,
    pub account: AccountSummary,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub message: String,
    pub role: Role,
    pub name: String,
}

/// Route session requests; `None` when the path is not ours
pub async fn handle_session_request(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Option<Result<Response<BoxBody>>> {
    let path = req.uri().path();
    let method = req.method();

    let login_role = match path {
        "/api/auth/login" => Some(Role::Citizen),
        "/api/officer/login" => Some(Role::Officer),
        "/api/admin/login" => Some(Role::Admin),
        _ => None,
    };
    if let Some(role) = login_role {
        return Some(if method == Method::POST {
            handle_login(state, req, role).await
        } else {
            Ok(method_not_allowed())
        });
    }

    let check_role = match path {
        "/api/checkUserSession" => Some(Role::Citizen),
        "/api/checkOfficerSession" => Some(Role::Officer),
        "/api/checkAdminSession" => Some(Role::Admin),
        _ => None,
    };
    if let Some(role) = check_role {
        return Some(Ok(check_session(caller, role)));
    }

    let response = match (method, path) {
        (&Method::POST, "/api/auth/register") => handle_register(state, req).await,
        (&Method::POST, "/api/logout") => handle_logout(state, caller).await,
        (_, "/api/auth/register") | (_, "/api/logout") => Ok(method_not_allowed()),
        _ => return None,
    };
    Some(response)
}

async fn handle_register(state: &Arc<AppState>, req: &Request<Bytes>) -> Result<Response<BoxBody>> {
    let body: RegisterRequest = parse_json(req)?;
    let account = state
        .accounts
        .register(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
            department: None,
        })
        .await?;

    open_session(state, &account, StatusCode::CREATED, "Registration successful").await
}

async fn handle_login(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    role: Role,
) -> Result<Response<BoxBody>> {
    let body: LoginRequest = parse_json(req)?;
    let account = state.accounts.login(&body.email, &body.password, role).await?;
    open_session(state, &account, StatusCode::OK, "Login successful").await
}

async fn open_session(
    state: &Arc<AppState>,
    account: &AccountDoc,
    status: StatusCode,
    message: &str,
) -> Result<Response<BoxBody>> {
    let (_, token) = state.sessions.login(account).await?;

    let response = json_response(
        status,
        &LoginResponse {
            message: message.to_string(),
            role: account.role,
            name: account.name.clone(),
            account: account.summary(),
        },
    );
    Ok(with_cookie(response, &state.sessions.session_cookie(&token)))
}

async fn handle_logout(state: &Arc<AppState>, caller: &Caller) -> Result<Response<BoxBody>> {
    if let Some(token) = caller.token() {
        state.sessions.logout(token).await?;
    }
    let response = message_response(StatusCode::OK, "Logged out");
    Ok(with_cookie(response, &state.sessions.clear_cookie()))
}

/// 200 with the session's role and name, 401 otherwise
fn check_session(caller: &Caller, role: Role) -> Response<BoxBody> {
    match caller.identity() {
        Some(identity) if identity.role == role => json_response(
            StatusCode::OK,
            &SessionStatusResponse {
                message: "Session valid".into(),
                role: identity.role,
                name: identity.name.clone(),
            },
        ),
        _ => message_response(
            StatusCode::UNAUTHORIZED,
            PortalError::SessionExpired.public_message(),
        ),
    }
}
