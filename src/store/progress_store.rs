//! User-scoped progress store
//!
//! The single entry point for category and item persistence. Every method
//! takes the authenticated `user_id` and resolves ids only inside that scope.
//! Topic-tree edits run as a read-compute-write cycle guarded by the item's
//! revision so a concurrent edit cannot be silently overwritten.

use std::sync::Arc;
use tracing::{debug, warn};

use super::memory::{MemoryCategoryRepository, MemoryItemRepository};
use super::traits::{CategoryRepository, ItemRepository};
use crate::model::{
    Category, CategoryPatch, ItemPatch, LearningItem, NewCategory, NewItem, Topic,
};
use crate::progress::{self, TopicEdit};
use crate::types::{CallistoError, Result};

/// Attempts at a revision-guarded topic write before giving up with `Conflict`
pub const MAX_TOPIC_WRITE_ATTEMPTS: usize = 3;

fn category_not_found() -> CallistoError {
    CallistoError::not_found("Category not found")
}

fn item_not_found() -> CallistoError {
    CallistoError::not_found("Item not found")
}

#[derive(Clone)]
pub struct ProgressStore {
    categories: Arc<dyn CategoryRepository>,
    items: Arc<dyn ItemRepository>,
}

impl ProgressStore {
    pub fn new(categories: Arc<dyn CategoryRepository>, items: Arc<dyn ItemRepository>) -> Self {
        Self { categories, items }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCategoryRepository::new()),
            Arc::new(MemoryItemRepository::new()),
        )
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        self.categories.list(user_id).await
    }

    pub async fn get_category(&self, user_id: &str, id: &str) -> Result<Category> {
        self.categories
            .find(user_id, id)
            .await?
            .ok_or_else(category_not_found)
    }

    pub async fn create_category(&self, user_id: &str, category: NewCategory) -> Result<Category> {
        self.categories.create(user_id, category).await
    }

    pub async fn update_category(
        &self,
        user_id: &str,
        id: &str,
        patch: CategoryPatch,
    ) -> Result<Category> {
        self.categories
            .update(user_id, id, patch)
            .await?
            .ok_or_else(category_not_found)
    }

    /// Delete unconditionally. Callers must check
    /// [`count_items_in_category`](Self::count_items_in_category) first.
    pub async fn delete_category(&self, user_id: &str, id: &str) -> Result<()> {
        if self.categories.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(category_not_found())
        }
    }

    pub async fn count_items_in_category(&self, user_id: &str, category_id: &str) -> Result<u64> {
        self.items.count_in_category(user_id, category_id).await
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub async fn list_items(&self, user_id: &str) -> Result<Vec<LearningItem>> {
        self.items.list(user_id).await
    }

    pub async fn get_item(&self, user_id: &str, id: &str) -> Result<LearningItem> {
        self.items
            .find(user_id, id)
            .await?
            .ok_or_else(item_not_found)
    }

    /// Create an item in one of the user's own categories
    pub async fn create_item(&self, user_id: &str, item: NewItem) -> Result<LearningItem> {
        self.get_category(user_id, &item.category_id).await?;
        self.items.create(user_id, item).await
    }

    /// Apply a field patch. A `category_id` move must target one of the
    /// user's own categories; `topics` replaces the whole array.
    pub async fn update_item(
        &self,
        user_id: &str,
        id: &str,
        patch: ItemPatch,
    ) -> Result<LearningItem> {
        if patch.is_empty() {
            return self.get_item(user_id, id).await;
        }
        if let Some(category_id) = &patch.category_id {
            self.get_category(user_id, category_id).await?;
        }
        self.items
            .update(user_id, id, patch)
            .await?
            .ok_or_else(item_not_found)
    }

    /// Replace the whole topic array (last write wins)
    pub async fn replace_topics(
        &self,
        user_id: &str,
        id: &str,
        topics: Vec<Topic>,
    ) -> Result<LearningItem> {
        self.update_item(
            user_id,
            id,
            ItemPatch {
                topics: Some(topics),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_item(&self, user_id: &str, id: &str) -> Result<()> {
        if self.items.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(item_not_found())
        }
    }

    /// Run one topic-tree edit as a revision-guarded read-compute-write.
    ///
    /// A lost race re-reads the item and re-applies the same edit; the edit
    /// carries pre-minted ids so a retry produces the same tree shape.
    pub async fn edit_topics(
        &self,
        user_id: &str,
        id: &str,
        edit: &TopicEdit,
    ) -> Result<LearningItem> {
        self.edit_topics_batch(user_id, id, std::slice::from_ref(edit))
            .await
    }

    /// Apply several edits in order within one guarded write. Either all of
    /// them land or none do.
    pub async fn edit_topics_batch(
        &self,
        user_id: &str,
        id: &str,
        edits: &[TopicEdit],
    ) -> Result<LearningItem> {
        for attempt in 1..=MAX_TOPIC_WRITE_ATTEMPTS {
            let item = self.get_item(user_id, id).await?;
            if edits.is_empty() {
                return Ok(item);
            }

            let mut topics = item.topics;
            for edit in edits {
                progress::apply(&mut topics, edit)?;
            }

            if let Some(updated) = self
                .items
                .replace_topics_if_revision(user_id, id, item.revision, topics)
                .await?
            {
                return Ok(updated);
            }

            debug!(item_id = %id, attempt, "Concurrent topic write detected, retrying");
        }

        warn!(item_id = %id, "Giving up on topic edit after repeated conflicts");
        Err(CallistoError::Conflict(
            "Item was modified concurrently, please retry".into(),
        ))
    }

    /// Categories and items in one call
    pub async fn load_all(&self, user_id: &str) -> Result<(Vec<Category>, Vec<LearningItem>)> {
        let (categories, items) = tokio::try_join!(
            self.categories.list(user_id),
            self.items.list(user_id)
        )?;
        Ok((categories, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubTopic;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const USER: &str = "65f0c0ffee0000000000aaaa";
    const OTHER: &str = "65f0c0ffee0000000000bbbb";

    fn languages() -> NewCategory {
        NewCategory {
            name: "Languages".into(),
            color: "bg-blue-500".into(),
            icon: "Tag".into(),
        }
    }

    fn learn_rust(category_id: &str) -> NewItem {
        NewItem {
            category_id: category_id.into(),
            name: "Learn Rust".into(),
            description: String::new(),
            topics: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_item_requires_owned_category() {
        let store = ProgressStore::in_memory();
        let cat = store.create_category(USER, languages()).await.unwrap();

        let err = store.create_item(OTHER, learn_rust(&cat.id)).await.unwrap_err();
        assert!(matches!(err, CallistoError::NotFound(_)));

        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();
        assert!(item.topics.is_empty());
        assert_eq!(store.count_items_in_category(USER, &cat.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_move_to_foreign_category_is_rejected() {
        let store = ProgressStore::in_memory();
        let mine = store.create_category(USER, languages()).await.unwrap();
        let theirs = store.create_category(OTHER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&mine.id)).await.unwrap();

        let err = store
            .update_item(
                USER,
                &item.id,
                ItemPatch {
                    category_id: Some(theirs.id.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallistoError::NotFound(_)));
        assert_eq!(
            store.get_item(USER, &item.id).await.unwrap().category_id,
            mine.id
        );
    }

    #[tokio::test]
    async fn test_items_are_invisible_to_other_users() {
        let store = ProgressStore::in_memory();
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();

        assert!(store.get_item(OTHER, &item.id).await.is_err());
        assert!(store.delete_item(OTHER, &item.id).await.is_err());
        assert!(store
            .edit_topics(
                OTHER,
                &item.id,
                &TopicEdit::AddTopic {
                    id: "topic-1".into(),
                    title: "New Module".into(),
                },
            )
            .await
            .is_err());
        assert!(store.get_item(USER, &item.id).await.unwrap().topics.is_empty());
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_item_untouched() {
        let store = ProgressStore::in_memory();
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();

        let err = store
            .edit_topics(
                USER,
                &item.id,
                &TopicEdit::DeleteTopic {
                    topic_id: "missing".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallistoError::NotFound(_)));
        assert_eq!(store.get_item(USER, &item.id).await.unwrap().revision, 0);
    }

    /// Item repository that lets another writer slip in before the first
    /// `racing` guarded writes
    struct RacingItems {
        inner: MemoryItemRepository,
        racing: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ItemRepository for RacingItems {
        async fn list(&self, user_id: &str) -> Result<Vec<LearningItem>> {
            self.inner.list(user_id).await
        }

        async fn find(&self, user_id: &str, id: &str) -> Result<Option<LearningItem>> {
            self.inner.find(user_id, id).await
        }

        async fn create(&self, user_id: &str, item: NewItem) -> Result<LearningItem> {
            self.inner.create(user_id, item).await
        }

        async fn update(
            &self,
            user_id: &str,
            id: &str,
            patch: ItemPatch,
        ) -> Result<Option<LearningItem>> {
            self.inner.update(user_id, id, patch).await
        }

        async fn replace_topics_if_revision(
            &self,
            user_id: &str,
            id: &str,
            expected_revision: i64,
            topics: Vec<Topic>,
        ) -> Result<Option<LearningItem>> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.racing {
                let current = self.inner.find(user_id, id).await?.unwrap_or_else(|| {
                    panic!("item {} vanished", id);
                });
                let mut rival = current.topics.clone();
                rival.push(Topic::new(
                    format!("rival-{}", current.revision),
                    "Written elsewhere",
                ));
                self.inner
                    .replace_topics_if_revision(user_id, id, current.revision, rival)
                    .await?;
            }
            self.inner
                .replace_topics_if_revision(user_id, id, expected_revision, topics)
                .await
        }

        async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
            self.inner.delete(user_id, id).await
        }

        async fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<u64> {
            self.inner.count_in_category(user_id, category_id).await
        }
    }

    fn racing_store(racing: usize) -> ProgressStore {
        ProgressStore::new(
            Arc::new(MemoryCategoryRepository::new()),
            Arc::new(RacingItems {
                inner: MemoryItemRepository::new(),
                racing,
                attempts: AtomicUsize::new(0),
            }),
        )
    }

    #[tokio::test]
    async fn test_lost_race_is_retried_without_losing_rival_write() {
        let store = racing_store(1);
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();

        let updated = store
            .edit_topics(
                USER,
                &item.id,
                &TopicEdit::AddTopic {
                    id: "topic-1".into(),
                    title: "Ownership".into(),
                },
            )
            .await
            .unwrap();

        let ids: Vec<&str> = updated.topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["rival-0", "topic-1"]);
        assert_eq!(updated.revision, 2);
    }

    #[tokio::test]
    async fn test_persistent_contention_yields_conflict() {
        let store = racing_store(MAX_TOPIC_WRITE_ATTEMPTS);
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();

        let err = store
            .edit_topics(
                USER,
                &item.id,
                &TopicEdit::AddTopic {
                    id: "topic-1".into(),
                    title: "Ownership".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallistoError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = ProgressStore::in_memory();
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();
        store
            .edit_topics(
                USER,
                &item.id,
                &TopicEdit::AddTopic {
                    id: "topic-1".into(),
                    title: "Ownership".into(),
                },
            )
            .await
            .unwrap();

        let err = store
            .edit_topics_batch(
                USER,
                &item.id,
                &[
                    TopicEdit::RenameTopic {
                        topic_id: "topic-1".into(),
                        title: "Borrowing".into(),
                    },
                    TopicEdit::SetTopicDeadline {
                        topic_id: "topic-1".into(),
                        deadline: Some("next week".into()),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallistoError::Validation(_)));

        let unchanged = store.get_item(USER, &item.id).await.unwrap();
        assert_eq!(unchanged.topics[0].title, "Ownership");
        assert_eq!(unchanged.revision, 1);
    }

    #[tokio::test]
    async fn test_replace_topics_is_whole_array() {
        let store = ProgressStore::in_memory();
        let cat = store.create_category(USER, languages()).await.unwrap();
        let item = store.create_item(USER, learn_rust(&cat.id)).await.unwrap();

        let topics = vec![Topic::new("topic-1", "Ownership")
            .with_sub_topics(vec![SubTopic::new("subtopic-1", "Moves")])];
        let updated = store
            .replace_topics(USER, &item.id, topics.clone())
            .await
            .unwrap();
        assert_eq!(updated.topics, topics);

        let cleared = store.replace_topics(USER, &item.id, Vec::new()).await.unwrap();
        assert!(cleared.topics.is_empty());
        assert_eq!(cleared.revision, 2);
    }
}
