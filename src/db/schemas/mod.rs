//! Database schemas for Callisto
//!
//! Defines MongoDB document structures for users, categories and learning
//! items.

mod category;
mod learning_item;
mod metadata;
mod user;

pub use category::{CategoryDoc, CATEGORY_COLLECTION};
pub use learning_item::{LearningItemDoc, LEARNING_ITEM_COLLECTION};
pub use metadata::Metadata;
pub use user::{UserDoc, USER_COLLECTION};
