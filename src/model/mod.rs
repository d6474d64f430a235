//! Domain model for Callisto
//!
//! These types are persistence-agnostic: the MongoDB schemas in
//! `crate::db::schemas` convert to and from them, and the in-memory store
//! holds them directly.

mod account;
mod catalog;
mod topic;

pub use account::{NewUser, PublicUser, UseCase, User};
pub use catalog::{
    Category, CategoryPatch, CategorySummary, GoalStatus, ItemPatch, LearningItem, NewCategory,
    NewItem, DEFAULT_CATEGORY_ICON,
};
pub use topic::{SubTopic, Topic};
