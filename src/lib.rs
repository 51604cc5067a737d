//! Grievance Portal - backend for citizen grievance filing
//!
//! Citizens file grievances, officers work them through a fixed lifecycle with
//! evidence attached, and admins manage officers and oversee every grievance.
//!
//! ## Components
//!
//! - **Store**: grievance documents in MongoDB (or memory for dev and tests)
//! - **Workflow**: validated status transitions with an append-only log
//! - **Evidence**: type/size-checked uploads stored by content hash
//! - **Guard**: cookie sessions for the citizen, officer and admin roles

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{PortalError, Result};
