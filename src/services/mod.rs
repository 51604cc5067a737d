//! Domain services: grievance storage, evidence, accounts and the status workflow

pub mod accounts;
pub mod evidence;
pub mod store;
pub mod workflow;

pub use accounts::{AccountService, AccountStore, MemoryAccountStore, MongoAccountStore, NewAccount};
pub use evidence::{
    EvidenceHandler, EvidenceStorage, LocalEvidenceStorage, MemoryEvidenceStorage, UploadedFile,
};
pub use store::{GrievanceStore, GrievanceUpdate, MemoryGrievanceStore, MongoGrievanceStore};
pub use workflow::{StatusUpdateRequest, StatusWorkflow};
