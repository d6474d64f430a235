//! Progress tracking core
//!
//! Pure functions over an item's topic array. Every mutation reads the whole
//! array, computes a new one and hands it back to the store for a single
//! whole-array write; nothing in here touches persistence.
//!
//! Completion propagation is asymmetric:
//! - toggling a topic cascades its value down to every sub-topic;
//! - toggling a sub-topic recomputes the parent as "has sub-topics and all
//!   are complete";
//! - deleting a sub-topic never recomputes the parent.

pub mod aggregate;
pub mod ids;
pub mod tree;

pub use aggregate::{is_overdue, progress_percent, ProgressSummary};
pub use tree::{apply, check_deadline, TopicEdit, TreeError};
