//! In-memory repositories
//!
//! Used in dev mode without MongoDB and throughout the test suite. Ids are
//! minted as ObjectIds so they look the same as persisted ones.

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;
use dashmap::DashMap;

use super::traits::{CategoryRepository, ItemRepository, UserRepository};
use crate::model::{
    Category, CategoryPatch, ItemPatch, LearningItem, NewCategory, NewItem, NewUser, Topic, User,
};
use crate::types::{CallistoError, Result};

fn mint_id() -> String {
    ObjectId::new().to_hex()
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: DashMap<String, User>,
    /// email -> id
    by_email: DashMap<String, String>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(id) = self.by_email.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        use dashmap::mapref::entry::Entry;

        let id = mint_id();
        match self.by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(CallistoError::Conflict("User already exists".into()));
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let stored = User {
            id: id.clone(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            email_verified: false,
            otp: user.otp,
            otp_expires_at: user.otp_expires_at,
            use_case: None,
            onboarding_completed: false,
            created_at: Utc::now(),
        };
        self.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<Option<User>> {
        let Some(mut stored) = self.users.get_mut(&user.id) else {
            return Ok(None);
        };
        stored.name = user.name.clone();
        stored.password_hash = user.password_hash.clone();
        stored.email_verified = user.email_verified;
        stored.otp = user.otp.clone();
        stored.otp_expires_at = user.otp_expires_at;
        stored.use_case = user.use_case;
        stored.onboarding_completed = user.onboarding_completed;
        Ok(Some(stored.clone()))
    }
}

#[derive(Default)]
pub struct MemoryCategoryRepository {
    categories: DashMap<String, Category>,
}

impl MemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepository for MemoryCategoryRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .categories
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.clone())
            .collect();
        categories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(categories)
    }

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<Category>> {
        Ok(self
            .categories
            .get(id)
            .filter(|c| c.user_id == user_id)
            .map(|c| c.clone()))
    }

    async fn create(&self, user_id: &str, category: NewCategory) -> Result<Category> {
        let now = Utc::now();
        let stored = Category {
            id: mint_id(),
            user_id: user_id.to_string(),
            name: category.name,
            color: category.color,
            icon: category.icon,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: CategoryPatch,
    ) -> Result<Option<Category>> {
        let Some(mut stored) = self.categories.get_mut(id) else {
            return Ok(None);
        };
        if stored.user_id != user_id {
            return Ok(None);
        }
        if let Some(name) = patch.name {
            stored.name = name;
        }
        if let Some(color) = patch.color {
            stored.color = color;
        }
        if let Some(icon) = patch.icon {
            stored.icon = icon;
        }
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        Ok(self
            .categories
            .remove_if(id, |_, c| c.user_id == user_id)
            .is_some())
    }
}

#[derive(Default)]
pub struct MemoryItemRepository {
    items: DashMap<String, LearningItem>,
}

impl MemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemRepository for MemoryItemRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<LearningItem>> {
        let mut items: Vec<LearningItem> = self
            .items
            .iter()
            .filter(|i| i.user_id == user_id)
            .map(|i| i.clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<LearningItem>> {
        Ok(self
            .items
            .get(id)
            .filter(|i| i.user_id == user_id)
            .map(|i| i.clone()))
    }

    async fn create(&self, user_id: &str, item: NewItem) -> Result<LearningItem> {
        let now = Utc::now();
        let stored = LearningItem {
            id: mint_id(),
            user_id: user_id.to_string(),
            category_id: item.category_id,
            name: item.name,
            description: item.description,
            topics: item.topics,
            status: Default::default(),
            comments: String::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        self.items.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: ItemPatch,
    ) -> Result<Option<LearningItem>> {
        let Some(mut stored) = self.items.get_mut(id) else {
            return Ok(None);
        };
        if stored.user_id != user_id {
            return Ok(None);
        }
        if let Some(category_id) = patch.category_id {
            stored.category_id = category_id;
        }
        if let Some(name) = patch.name {
            stored.name = name;
        }
        if let Some(description) = patch.description {
            stored.description = description;
        }
        if let Some(status) = patch.status {
            stored.status = status;
        }
        if let Some(comments) = patch.comments {
            stored.comments = comments;
        }
        if let Some(topics) = patch.topics {
            stored.topics = topics;
            stored.revision += 1;
        }
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn replace_topics_if_revision(
        &self,
        user_id: &str,
        id: &str,
        expected_revision: i64,
        topics: Vec<Topic>,
    ) -> Result<Option<LearningItem>> {
        // The shard lock held by get_mut makes check-and-write atomic
        let Some(mut stored) = self.items.get_mut(id) else {
            return Ok(None);
        };
        if stored.user_id != user_id || stored.revision != expected_revision {
            return Ok(None);
        }
        stored.topics = topics;
        stored.revision += 1;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        Ok(self
            .items
            .remove_if(id, |_, i| i.user_id == user_id)
            .is_some())
    }

    async fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<u64> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.user_id == user_id && i.category_id == category_id)
            .count() as u64)
    }
}
