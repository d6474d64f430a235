//! Topic and sub-topic tree nodes
//!
//! Ids are opaque strings minted by the caller (or by `crate::progress::ids`)
//! and are preserved verbatim by every store.

use serde::{Deserialize, Serialize};

/// A leaf objective inside a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTopic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SubTopic {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_completed: false,
            notes: None,
        }
    }
}

/// A module inside a learning item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub sub_topics: Vec<SubTopic>,
    /// ISO `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Topic {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_completed: false,
            sub_topics: Vec::new(),
            deadline: None,
            notes: None,
        }
    }

    pub fn with_sub_topics(mut self, sub_topics: Vec<SubTopic>) -> Self {
        self.sub_topics = sub_topics;
        self
    }

    pub fn sub_topic(&self, sub_topic_id: &str) -> Option<&SubTopic> {
        self.sub_topics.iter().find(|st| st.id == sub_topic_id)
    }
}
