//! Shared types for Callisto

pub mod error;

pub use error::{CallistoError, Result};
