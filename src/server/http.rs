//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Bodies are collected
//! under a size cap, CORS is checked, the caller's session is resolved once,
//! and the request is handed to the route modules.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{COOKIE, ORIGIN, SET_COOKIE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{
    AccessGuard, Caller, MemorySessionBackend, MongoSessionBackend, SessionBackend, SessionConfig,
    SessionService,
};
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes::{self, error_response, message_response, not_found, with_cookie, BoxBody};
use crate::server::cors::{CorsDecision, CorsPolicy};
use crate::services::{
    AccountService, AccountStore, EvidenceHandler, EvidenceStorage, GrievanceStore,
    LocalEvidenceStorage, MemoryAccountStore, MemoryGrievanceStore, MongoAccountStore,
    MongoGrievanceStore, StatusWorkflow,
};
use crate::types::{PortalError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    pub accounts: AccountService,
    pub sessions: Arc<SessionService>,
    pub guard: AccessGuard,
    pub workflow: StatusWorkflow,
    pub cors: CorsPolicy,
    pub started_at: Instant,
}

impl AppState {
    /// Connect to MongoDB and open the evidence directory
    ///
    /// In dev mode an unreachable MongoDB falls back to in-memory stores.
    pub async fn connect(args: Args) -> Result<Self> {
        let evidence: Arc<dyn EvidenceStorage> =
            Arc::new(LocalEvidenceStorage::new(&args.evidence_dir).await?);

        let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => client,
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                return Self::in_memory(args, evidence);
            }
            Err(e) => return Err(e),
        };

        let grievances: Arc<dyn GrievanceStore> = Arc::new(MongoGrievanceStore::new(&mongo).await?);
        let accounts: Arc<dyn AccountStore> = Arc::new(MongoAccountStore::new(&mongo).await?);
        let sessions: Arc<dyn SessionBackend> = Arc::new(MongoSessionBackend::new(&mongo).await?);

        Self::assemble(args, Some(mongo), grievances, accounts, sessions, evidence)
    }

    /// State backed entirely by in-memory stores
    pub fn in_memory(args: Args, evidence: Arc<dyn EvidenceStorage>) -> Result<Self> {
        Self::assemble(
            args,
            None,
            Arc::new(MemoryGrievanceStore::new()),
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemorySessionBackend::new()),
            evidence,
        )
    }

    fn assemble(
        args: Args,
        mongo: Option<MongoClient>,
        grievances: Arc<dyn GrievanceStore>,
        accounts: Arc<dyn AccountStore>,
        session_backend: Arc<dyn SessionBackend>,
        evidence: Arc<dyn EvidenceStorage>,
    ) -> Result<Self> {
        let secret = args
            .effective_session_secret()
            .ok_or_else(|| PortalError::Internal("SESSION_SECRET is not configured".into()))?;
        let sessions = Arc::new(SessionService::new(
            SessionConfig::new(secret, args.session_ttl(), args.cookie_secure),
            session_backend,
        ));

        let accounts = AccountService::new(accounts);
        let workflow = StatusWorkflow::new(
            grievances,
            EvidenceHandler::new(evidence, args.max_upload_bytes),
            accounts.clone(),
        );

        Ok(Self {
            cors: CorsPolicy::new(args.allowed_origin_list()),
            guard: AccessGuard::new(sessions.clone()),
            args,
            mongo,
            accounts,
            sessions,
            workflow,
            started_at: Instant::now(),
        })
    }

    /// `mongodb` or `memory`
    pub fn storage_backend(&self) -> &'static str {
        if self.mongo.is_some() {
            "mongodb"
        } else {
            "memory"
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Grievance portal listening on {} (storage: {})",
        state.args.listen,
        state.storage_backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect the body under the size cap, then respond
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    info!(peer = %addr, method = %req.method(), path = %req.uri().path(), "Request");

    let (parts, body) = req.into_parts();
    let bytes = match Limited::new(body, state.args.max_body_bytes()).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = if e.downcast_ref::<LengthLimitError>().is_some() {
                PortalError::PayloadTooLarge(format!(
                    "Request body exceeds {} bytes",
                    state.args.max_body_bytes()
                ))
            } else {
                PortalError::Http(format!("Failed to read body: {}", e))
            };
            let origin = header_str(&parts.headers, ORIGIN);
            let decision = state.cors.check(origin);
            let mut response = error_response(&err);
            state.cors.apply(&mut response, &decision);
            return Ok(response);
        }
    };

    Ok(respond(state, Request::from_parts(parts, bytes)).await)
}

/// Answer a collected request: CORS, session resolution, routing
pub async fn respond(state: Arc<AppState>, req: Request<Bytes>) -> Response<BoxBody> {
    let decision = state.cors.check(header_str(req.headers(), ORIGIN));
    if decision == CorsDecision::Denied {
        warn!(origin = ?req.headers().get(ORIGIN), "Origin refused");
        return message_response(StatusCode::FORBIDDEN, "Not allowed by CORS");
    }

    if req.method() == Method::OPTIONS {
        return state.cors.preflight(&decision);
    }

    let caller = match state.guard.resolve(header_str(req.headers(), COOKIE)).await {
        Ok(caller) => caller,
        Err(e) => {
            let mut response = error_response(&e);
            state.cors.apply(&mut response, &decision);
            return response;
        }
    };

    let mut response = match dispatch(&state, &req, &caller).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    };

    // Slide the cookie with the session unless the handler set its own
    if let Some(token) = caller.token() {
        if !response.headers().contains_key(SET_COOKIE) {
            response = with_cookie(response, &state.sessions.session_cookie(token));
        }
    }

    state.cors.apply(&mut response, &decision);
    response
}

async fn dispatch(state: &Arc<AppState>, req: &Request<Bytes>, caller: &Caller) -> Result<Response<BoxBody>> {
    let path = req.uri().path();

    match (req.method(), path) {
        (&Method::GET, "/") => return Ok(routes::root_banner()),
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            return Ok(routes::health_check(Arc::clone(state)))
        }
        (&Method::GET, "/version") => return Ok(routes::version_info()),
        _ => {}
    }

    if let Some(response) = routes::handle_session_request(state, req, caller).await {
        return response;
    }

    let handled = if path.starts_with("/api/officer/") {
        routes::handle_officer_request(state, req, caller).await
    } else if path.starts_with("/api/admin/") {
        routes::handle_admin_request(state, req, caller).await
    } else if path.starts_with("/api/complaints") {
        routes::handle_complaint_request(state, req, caller).await
    } else if path.starts_with("/evidence/") {
        routes::handle_evidence_request(state, req, caller).await
    } else {
        None
    };

    handled.unwrap_or_else(|| Err(not_found(path)))
}

fn header_str(headers: &hyper::HeaderMap, name: hyper::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
