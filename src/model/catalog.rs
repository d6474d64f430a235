//! Categories and learning items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Topic;

pub const DEFAULT_CATEGORY_ICON: &str = "Tag";

/// Lifecycle status of a goal. Set by the owner, never derived from progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    #[default]
    #[serde(rename = "Not started")]
    NotStarted,
    #[serde(rename = "In progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Not started" => Some(Self::NotStarted),
            "In progress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A user-owned grouping of learning items
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn summary(&self) -> CategorySummary {
        CategorySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
        }
    }
}

/// The `{id, name, color, icon}` projection embedded in item responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub icon: String,
}

/// Partial category update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A goal: the top-level trackable unit
#[derive(Debug, Clone, PartialEq)]
pub struct LearningItem {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub topics: Vec<Topic>,
    pub status: GoalStatus,
    pub comments: String,
    /// Bumped on every topic-array write; used for compare-and-swap
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub topics: Vec<Topic>,
}

/// Partial item update; `topics` is a whole-array replacement
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<GoalStatus>,
    pub comments: Option<String>,
    pub topics: Option<Vec<Topic>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.comments.is_none()
            && self.topics.is_none()
    }
}
