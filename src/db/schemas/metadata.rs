//! Common metadata for all documents

use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Creation and update timestamps
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            updated_at: Some(DateTime::now()),
            created_at: Some(DateTime::now()),
        }
    }

    pub fn created(&self) -> chrono::DateTime<Utc> {
        self.created_at
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now)
    }

    pub fn updated(&self) -> chrono::DateTime<Utc> {
        self.updated_at
            .or(self.created_at)
            .map(|d| d.to_chrono())
            .unwrap_or_else(Utc::now)
    }
}
