//! Persistence for users, categories and learning items
//!
//! Repositories come in two flavors behind the same traits: MongoDB for
//! deployments and DashMap for dev mode and tests. [`ProgressStore`] layers
//! user scoping and the guarded topic-tree write on top.

pub mod memory;
pub mod mongo;
pub mod progress_store;
pub mod traits;

pub use memory::{MemoryCategoryRepository, MemoryItemRepository, MemoryUserRepository};
pub use mongo::{MongoCategoryRepository, MongoItemRepository, MongoUserRepository};
pub use progress_store::{ProgressStore, MAX_TOPIC_WRITE_ATTEMPTS};
pub use traits::{CategoryRepository, ItemRepository, UserRepository};
