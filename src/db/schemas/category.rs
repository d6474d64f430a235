//! Category document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::model::{Category, CategoryPatch, NewCategory};

/// Collection name for categories
pub const CATEGORY_COLLECTION: &str = "categories";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CategoryDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user
    pub user_id: ObjectId,

    pub name: String,

    /// Color token, e.g. `bg-blue-500`
    pub color: String,

    pub icon: String,
}

impl CategoryDoc {
    pub fn new(user_id: ObjectId, category: NewCategory) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id,
            name: category.name,
            color: category.color,
            icon: category.icon,
        }
    }

    pub fn into_model(self) -> Category {
        Category {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: self.user_id.to_hex(),
            created_at: self.metadata.created(),
            updated_at: self.metadata.updated(),
            name: self.name,
            color: self.color,
            icon: self.icon,
        }
    }

    pub fn patch_fields(patch: &CategoryPatch) -> Document {
        let mut set = Document::new();
        if let Some(name) = &patch.name {
            set.insert("name", name);
        }
        if let Some(color) = &patch.color {
            set.insert("color", color);
        }
        if let Some(icon) = &patch.icon {
            set.insert("icon", icon);
        }
        set
    }
}

impl IntoIndexes for CategoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("user_created_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CategoryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
