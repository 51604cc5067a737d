//! Stored evidence files
//!
//! `GET /evidence/{key}` serves a file to any logged-in session. Keys are
//! content hashes, so responses are immutable and cacheable per user.

use bytes::Bytes;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use hyper::{Method, Request, Response};
use std::sync::Arc;

use crate::auth::Caller;
use crate::routes::{full_body, method_not_allowed, path_param, BoxBody};
use crate::server::AppState;
use crate::services::evidence::EVIDENCE_URL_PREFIX;
use crate::types::{PortalError, Result};

pub async fn handle_evidence_request(
    state: &Arc<AppState>,
    req: &Request<Bytes>,
    caller: &Caller,
) -> Option<Result<Response<BoxBody>>> {
    let key = path_param(req.uri().path(), EVIDENCE_URL_PREFIX)?;
    if req.method() != Method::GET {
        return Some(Ok(method_not_allowed()));
    }
    Some(serve(state, caller, &key).await)
}

async fn serve(state: &Arc<AppState>, caller: &Caller, key: &str) -> Result<Response<BoxBody>> {
    if caller.identity().is_none() {
        return Err(PortalError::SessionExpired);
    }

    let (bytes, content_type) = state.workflow.evidence().open(key).await?;

    let mut response = Response::new(full_body(bytes));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=31536000, immutable"),
    );
    Ok(response)
}
