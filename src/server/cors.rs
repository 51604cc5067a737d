//! Credentialed CORS against an origin allow-list
//!
//! Requests without an `Origin` header (curl, same-origin navigation) pass
//! through untouched. Listed origins are echoed back with credentials allowed;
//! anything else is refused before routing.

use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
};
use hyper::{Response, StatusCode};

use crate::routes::{empty_body, BoxBody};

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Outcome of checking a request's `Origin`
#[derive(Debug, Clone, PartialEq)]
pub enum CorsDecision {
    NoOrigin,
    Allowed(HeaderValue),
    Denied,
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    pub fn check(&self, origin: Option<&str>) -> CorsDecision {
        let Some(origin) = origin else {
            return CorsDecision::NoOrigin;
        };
        let normalized = origin.trim_end_matches('/');
        if !self.allowed.iter().any(|o| o == normalized) {
            return CorsDecision::Denied;
        }
        match HeaderValue::from_str(origin) {
            Ok(value) => CorsDecision::Allowed(value),
            Err(_) => CorsDecision::Denied,
        }
    }

    /// Add the response headers for an allowed origin
    pub fn apply(&self, response: &mut Response<BoxBody>, decision: &CorsDecision) {
        if let CorsDecision::Allowed(origin) = decision {
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
    }

    /// 204 answer to an `OPTIONS` preflight
    pub fn preflight(&self, decision: &CorsDecision) -> Response<BoxBody> {
        let mut response = Response::new(empty_body());
        *response.status_mut() = StatusCode::NO_CONTENT;
        {
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
        }
        self.apply(&mut response, decision);
        response
    }
}
