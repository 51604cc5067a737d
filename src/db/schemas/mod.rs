//! Database schemas
//!
//! MongoDB document structures for grievances, accounts and sessions.

mod account;
mod grievance;
mod metadata;
mod session;

pub use account::{normalize_email, AccountDoc, AccountSummary, ACCOUNT_COLLECTION};
pub use grievance::{
    Attachment, Coordinates, Evidence, GrievanceDoc, GrievanceStatus, Location, LogEntry,
    NewGrievance, Priority, GRIEVANCE_COLLECTION,
};
pub use metadata::Metadata;
pub use session::{SessionDoc, SESSION_COLLECTION};
