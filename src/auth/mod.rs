//! Authentication and authorization
//!
//! Provides:
//! - Password hashing with Argon2
//! - Server-side sessions behind a signed HttpOnly cookie
//! - Role permissions and the access guard shared by all routes

pub mod guard;
pub mod password;
pub mod permissions;
pub mod session;

pub use guard::{AccessGuard, Caller, Identity};
pub use password::{hash_password, validate_new_password, verify_password};
pub use permissions::{is_operation_allowed, required_role, Operation, Role};
pub use session::{
    spawn_cleanup_task, CookiePolicy, MemorySessionBackend, MongoSessionBackend, Session,
    SessionBackend, SessionConfig, SessionService,
};
