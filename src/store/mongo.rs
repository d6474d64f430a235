//! MongoDB-backed repositories

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use tracing::debug;

use super::traits::{CategoryRepository, ItemRepository, UserRepository};
use crate::db::schemas::{
    CategoryDoc, LearningItemDoc, UserDoc, CATEGORY_COLLECTION, LEARNING_ITEM_COLLECTION,
    USER_COLLECTION,
};
use crate::db::{parse_object_id, MongoClient, MongoCollection};
use crate::model::{
    Category, CategoryPatch, ItemPatch, LearningItem, NewCategory, NewItem, NewUser, Topic, User,
};
use crate::types::{CallistoError, Result};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Both ids must parse; otherwise nothing can match
fn scoped(user_id: &str, id: &str) -> Option<(ObjectId, ObjectId)> {
    Some((parse_object_id(user_id)?, parse_object_id(id)?))
}

fn owner(user_id: &str) -> Result<ObjectId> {
    parse_object_id(user_id).ok_or_else(|| CallistoError::Unauthorized("Invalid user id".into()))
}

pub struct MongoUserRepository {
    users: MongoCollection<UserDoc>,
}

impl MongoUserRepository {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_one(doc! { "email": email })
            .await?
            .map(UserDoc::into_model))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let Some(oid) = parse_object_id(id) else {
            return Ok(None);
        };
        Ok(self
            .users
            .find_one(doc! { "_id": oid })
            .await?
            .map(UserDoc::into_model))
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        // The unique index is the arbiter between concurrent signups
        let result = self
            .users
            .inner()
            .insert_one(UserDoc::new(user.clone()))
            .await;

        match result {
            Ok(inserted) => {
                let id = inserted
                    .inserted_id
                    .as_object_id()
                    .ok_or_else(|| CallistoError::Database("Failed to get inserted ID".into()))?;
                let mut doc = UserDoc::new(user);
                doc.id = Some(id);
                Ok(doc.into_model())
            }
            Err(e) if is_duplicate_key(&e) => {
                Err(CallistoError::Conflict("User already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, user: &User) -> Result<Option<User>> {
        let Some(oid) = parse_object_id(&user.id) else {
            return Ok(None);
        };
        let set = UserDoc::mutable_fields(user)?;
        Ok(self
            .users
            .update_and_fetch(doc! { "_id": oid }, set)
            .await?
            .map(UserDoc::into_model))
    }
}

pub struct MongoCategoryRepository {
    categories: MongoCollection<CategoryDoc>,
}

impl MongoCategoryRepository {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            categories: client.collection(CATEGORY_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl CategoryRepository for MongoCategoryRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<Category>> {
        let Some(uid) = parse_object_id(user_id) else {
            return Ok(Vec::new());
        };
        let docs = self
            .categories
            .find_many(
                doc! { "user_id": uid },
                Some(doc! { "metadata.created_at": -1 }),
            )
            .await?;
        Ok(docs.into_iter().map(CategoryDoc::into_model).collect())
    }

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<Category>> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(None);
        };
        Ok(self
            .categories
            .find_one(doc! { "_id": oid, "user_id": uid })
            .await?
            .map(CategoryDoc::into_model))
    }

    async fn create(&self, user_id: &str, category: NewCategory) -> Result<Category> {
        let uid = owner(user_id)?;
        let (id, mut stored) = self
            .categories
            .insert_one(CategoryDoc::new(uid, category))
            .await?;
        stored.id = Some(id);
        Ok(stored.into_model())
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: CategoryPatch,
    ) -> Result<Option<Category>> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(None);
        };
        Ok(self
            .categories
            .update_and_fetch(
                doc! { "_id": oid, "user_id": uid },
                CategoryDoc::patch_fields(&patch),
            )
            .await?
            .map(CategoryDoc::into_model))
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(false);
        };
        self.categories
            .delete_one(doc! { "_id": oid, "user_id": uid })
            .await
    }
}

pub struct MongoItemRepository {
    items: MongoCollection<LearningItemDoc>,
}

impl MongoItemRepository {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            items: client.collection(LEARNING_ITEM_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl ItemRepository for MongoItemRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<LearningItem>> {
        let Some(uid) = parse_object_id(user_id) else {
            return Ok(Vec::new());
        };
        let docs = self
            .items
            .find_many(
                doc! { "user_id": uid },
                Some(doc! { "metadata.created_at": -1 }),
            )
            .await?;
        Ok(docs.into_iter().map(LearningItemDoc::into_model).collect())
    }

    async fn find(&self, user_id: &str, id: &str) -> Result<Option<LearningItem>> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(None);
        };
        Ok(self
            .items
            .find_one(doc! { "_id": oid, "user_id": uid })
            .await?
            .map(LearningItemDoc::into_model))
    }

    async fn create(&self, user_id: &str, item: NewItem) -> Result<LearningItem> {
        let uid = owner(user_id)?;
        let category_id = parse_object_id(&item.category_id)
            .ok_or_else(|| CallistoError::not_found("Category not found"))?;
        let (id, mut stored) = self
            .items
            .insert_one(LearningItemDoc::new(uid, category_id, item))
            .await?;
        stored.id = Some(id);
        Ok(stored.into_model())
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: ItemPatch,
    ) -> Result<Option<LearningItem>> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(None);
        };
        let category_id = match &patch.category_id {
            Some(cid) => Some(
                parse_object_id(cid).ok_or_else(|| CallistoError::not_found("Category not found"))?,
            ),
            None => None,
        };

        let filter = doc! { "_id": oid, "user_id": uid };
        let set = LearningItemDoc::patch_fields(&patch, category_id)?;
        let updated = if patch.topics.is_some() {
            self.items
                .update_inc_and_fetch(filter, set, doc! { "revision": 1_i64 })
                .await?
        } else {
            self.items.update_and_fetch(filter, set).await?
        };
        Ok(updated.map(LearningItemDoc::into_model))
    }

    async fn replace_topics_if_revision(
        &self,
        user_id: &str,
        id: &str,
        expected_revision: i64,
        topics: Vec<Topic>,
    ) -> Result<Option<LearningItem>> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(None);
        };
        let updated = self
            .items
            .update_inc_and_fetch(
                doc! { "_id": oid, "user_id": uid, "revision": expected_revision },
                doc! { "topics": bson::to_bson(&topics)? },
                doc! { "revision": 1_i64 },
            )
            .await?;

        if updated.is_none() {
            debug!(item_id = %id, expected_revision, "Topic write lost revision check");
        }
        Ok(updated.map(LearningItemDoc::into_model))
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        let Some((uid, oid)) = scoped(user_id, id) else {
            return Ok(false);
        };
        self.items.delete_one(doc! { "_id": oid, "user_id": uid }).await
    }

    async fn count_in_category(&self, user_id: &str, category_id: &str) -> Result<u64> {
        let Some((uid, cid)) = scoped(user_id, category_id) else {
            return Ok(0);
        };
        self.items
            .count(doc! { "user_id": uid, "category_id": cid })
            .await
    }
}
