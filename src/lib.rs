//! Callisto - learning-goal tracker API
//!
//! Users organize goals ("learning items") into categories. Each goal holds
//! a two-level tree of topics and sub-topics whose completion drives a
//! progress percentage. A generative model can draft the tree from a goal
//! name.
//!
//! ## Layers
//!
//! - **progress**: pure topic-tree edits and progress aggregation
//! - **store**: repository traits (MongoDB and in-memory) and the
//!   user-scoped `ProgressStore`
//! - **services**: account flows, mail delivery, roadmap generation and
//!   read-model queries
//! - **routes** / **server**: hyper HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod model;
pub mod progress;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CallistoError, Result};
