//! Repository traits
//!
//! Every category and item operation takes the owning `user_id`; a record
//! owned by someone else behaves exactly like a missing one.

use async_trait::async_trait;

use crate::model::{
    Category, CategoryPatch, ItemPatch, LearningItem, NewCategory, NewItem, NewUser, Topic, User,
};
use crate::types::Result;

/// Credential store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `email` must already be lowercased
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` if the email is taken
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Overwrite every mutable field of the stored user. Returns `None` if
    /// the user no longer exists.
    async fn update(&self, user: &User) -> Result<Option<User>>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Newest first
    async fn list(&self, user_id: &str) -> Result<Vec<Category>>;

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<Category>>;

    async fn create(&self, user_id: &str, category: NewCategory) -> Result<Category>;

    async fn update(&self, user_id: &str, id: &str, patch: CategoryPatch)
        -> Result<Option<Category>>;

    /// Unconditional: does not check for dependent items
    async fn delete(&self, user_id: &str, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Newest first
    async fn list(&self, user_id: &str) -> Result<Vec<LearningItem>>;

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<LearningItem>>;

    /// `item.category_id` must already be verified as owned by `user_id`
    async fn create(&self, user_id: &str, item: NewItem) -> Result<LearningItem>;

    /// Apply a patch. A `topics` replacement bumps the revision.
    async fn update(&self, user_id: &str, id: &str, patch: ItemPatch)
        -> Result<Option<LearningItem>>;

    /// Replace the topic array only if the stored revision still equals
    /// `expected_revision`. Returns `None` on a lost race or a missing item.
    async fn replace_topics_if_revision(
        &self,
        user_id: &str,
        id: &str,
        expected_revision: i64,
        topics: Vec<Topic>,
    ) -> Result<Option<LearningItem>>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool>;

    async fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<u64>;
}
