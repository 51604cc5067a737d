//! HTTP route handlers
//!
//! Handlers take an already-collected `Request<Bytes>` plus the resolved
//! caller and return `Result<Response<BoxBody>>`; the server turns errors into
//! `{ "message": ... }` responses.

pub mod admin;
pub mod complaints;
pub mod evidence;
pub mod health;
pub mod multipart;
pub mod officer;
pub mod session_routes;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::db::schemas::GrievanceDoc;
use crate::types::{PortalError, Result};

pub use admin::handle_admin_request;
pub use complaints::handle_complaint_request;
pub use evidence::handle_evidence_request;
pub use health::{health_check, root_banner, version_info};
pub use officer::handle_officer_request;
pub use session_routes::handle_session_request;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// `{ message }` body used for every non-2xx response and simple acks
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `{ grievance }` body
#[derive(Debug, Serialize)]
pub struct GrievanceResponse {
    pub grievance: GrievanceDoc,
}

/// `{ grievances }` body
#[derive(Debug, Serialize)]
pub struct GrievanceListResponse {
    pub grievances: Vec<GrievanceDoc>,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|e| {
        error!("Failed to serialize response: {}", e);
        br#"{"message":"Internal server error"}"#.to_vec()
    });

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn message_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(
        status,
        &MessageResponse {
            message: message.into(),
        },
    )
}

pub fn grievance_response(grievance: GrievanceDoc) -> Response<BoxBody> {
    json_response(StatusCode::OK, &GrievanceResponse { grievance })
}

pub fn grievance_list_response(grievances: Vec<GrievanceDoc>) -> Response<BoxBody> {
    json_response(StatusCode::OK, &GrievanceListResponse { grievances })
}

/// Render an error as `{ message }`, logging by severity
pub fn error_response(err: &PortalError) -> Response<BoxBody> {
    if err.is_internal() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    message_response(err.status_code(), err.public_message())
}

/// Attach a `Set-Cookie` header
pub fn with_cookie(mut response: Response<BoxBody>, cookie: &str) -> Response<BoxBody> {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Invalid Set-Cookie value: {}", e),
    }
    response
}

/// Deserialize a JSON request body
pub fn parse_json<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    if req.body().is_empty() {
        return Err(PortalError::Validation("Request body is required".into()));
    }
    serde_json::from_slice(req.body())
        .map_err(|e| PortalError::Validation(format!("Invalid JSON: {}", e)))
}

/// Deserialize the query string (missing query = empty)
pub fn parse_query<T: DeserializeOwned>(req: &Request<Bytes>) -> Result<T> {
    serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|e| PortalError::Validation(format!("Invalid query string: {}", e)))
}

/// The single path segment after `prefix`, percent-decoded
///
/// `/api/officer/grievance/abc` with prefix `/api/officer/grievance/` gives `abc`.
pub fn path_param(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    urlencoding::decode(rest).ok().map(|s| s.into_owned())
}

pub fn not_found(path: &str) -> PortalError {
    PortalError::NotFound(format!("No route for {}", path))
}

pub fn method_not_allowed() -> Response<BoxBody> {
    message_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_param() {
        assert_eq!(
            path_param("/api/officer/grievance/65f0c1", "/api/officer/grievance/"),
            Some("65f0c1".to_string())
        );
        assert_eq!(path_param("/api/officer/grievance/", "/api/officer/grievance/"), None);
        assert_eq!(path_param("/api/officer/grievance/a/b", "/api/officer/grievance/"), None);
        assert_eq!(
            path_param("/evidence/a%20b.pdf", "/evidence/"),
            Some("a b.pdf".to_string())
        );
    }

    #[test]
    fn test_error_response_hides_internal_detail() {
        let response = error_response(&PortalError::Database("connection refused at 10.0.0.3".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_json_requires_body() {
        #[derive(serde::Deserialize)]
        struct Body {
            #[allow(dead_code)]
            reason: String,
        }
        let req = Request::new(Bytes::new());
        assert!(matches!(parse_json::<Body>(&req), Err(PortalError::Validation(_))));
        let req = Request::new(Bytes::from_static(br#"{"reason":"dup"}"#));
        assert!(parse_json::<Body>(&req).is_ok());
    }
}
