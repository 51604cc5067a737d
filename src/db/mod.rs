//! Database layer
//!
//! MongoDB client wrapper plus the document schemas stored in it.

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
