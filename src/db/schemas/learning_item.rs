//! Learning item document schema
//!
//! The topic tree is embedded in the item document and always written as a
//! whole array. `revision` is bumped on each topic write so concurrent
//! read-modify-write cycles can detect each other.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::model::{GoalStatus, ItemPatch, LearningItem, NewItem, Topic};

/// Collection name for learning items
pub const LEARNING_ITEM_COLLECTION: &str = "learning_items";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LearningItemDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: ObjectId,

    pub category_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub topics: Vec<Topic>,

    #[serde(default)]
    pub status: GoalStatus,

    #[serde(default)]
    pub comments: String,

    #[serde(default)]
    pub revision: i64,
}

impl LearningItemDoc {
    pub fn new(user_id: ObjectId, category_id: ObjectId, item: NewItem) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id,
            category_id,
            name: item.name,
            description: item.description,
            topics: item.topics,
            status: GoalStatus::default(),
            comments: String::new(),
            revision: 0,
        }
    }

    pub fn into_model(self) -> LearningItem {
        LearningItem {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: self.user_id.to_hex(),
            category_id: self.category_id.to_hex(),
            created_at: self.metadata.created(),
            updated_at: self.metadata.updated(),
            name: self.name,
            description: self.description,
            topics: self.topics,
            status: self.status,
            comments: self.comments,
            revision: self.revision,
        }
    }

    /// `$set` document for a patch. `category_id` must already be parsed.
    pub fn patch_fields(
        patch: &ItemPatch,
        category_id: Option<ObjectId>,
    ) -> Result<Document, bson::ser::Error> {
        let mut set = Document::new();
        if let Some(category_id) = category_id {
            set.insert("category_id", category_id);
        }
        if let Some(name) = &patch.name {
            set.insert("name", name);
        }
        if let Some(description) = &patch.description {
            set.insert("description", description);
        }
        if let Some(status) = patch.status {
            set.insert("status", status.as_str());
        }
        if let Some(comments) = &patch.comments {
            set.insert("comments", comments);
        }
        if let Some(topics) = &patch.topics {
            set.insert("topics", bson::to_bson(topics)?);
        }
        Ok(set)
    }
}

impl IntoIndexes for LearningItemDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "user_id": 1, "category_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_category_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LearningItemDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
