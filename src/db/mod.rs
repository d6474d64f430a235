//! MongoDB persistence
//!
//! A thin typed wrapper over the driver plus one schema per collection.
//! Schemas convert to and from the domain types in `crate::model`.

pub mod mongo;
pub mod schemas;

pub use mongo::{parse_object_id, IntoIndexes, MongoClient, MongoCollection, MutMetadata};
