//! Read models and derived views over a user's categories and items
//!
//! Everything here is computed at read time from the stored records:
//! progress percentages, overdue flags, dashboard counters, search results
//! and goal import parsing. Nothing is persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::model::{Category, CategorySummary, GoalStatus, LearningItem, SubTopic, Topic};
use crate::progress::{check_deadline, ids, is_overdue, progress_percent};
use crate::types::CallistoError;

/// Maximum number of search results
pub const SEARCH_LIMIT: usize = 10;

/// Items shown in the dashboard progress chart
pub const DASHBOARD_PROGRESS_ITEMS: usize = 5;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Category> for CategoryView {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            color: c.color.clone(),
            icon: c.icon.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    #[serde(flatten)]
    pub topic: Topic,
    /// Deadline strictly before today
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub category_id: String,
    /// `None` when the category no longer exists
    pub category: Option<CategorySummary>,
    pub name: String,
    pub description: String,
    pub topics: Vec<TopicView>,
    pub status: GoalStatus,
    pub comments: String,
    pub progress: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemView {
    pub fn build(item: LearningItem, category: Option<CategorySummary>, today: NaiveDate) -> Self {
        let progress = progress_percent(&item.topics);
        let topics = item
            .topics
            .into_iter()
            .map(|topic| TopicView {
                overdue: is_overdue(&topic, today),
                topic,
            })
            .collect();

        Self {
            id: item.id,
            category_id: item.category_id,
            category,
            name: item.name,
            description: item.description,
            topics,
            status: item.status,
            comments: item.comments,
            progress,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// Build item views, resolving each item's category summary from `categories`
pub fn item_views(
    items: Vec<LearningItem>,
    categories: &[Category],
    today: NaiveDate,
) -> Vec<ItemView> {
    let summaries: HashMap<&str, CategorySummary> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.summary()))
        .collect();

    items
        .into_iter()
        .map(|item| {
            let category = summaries.get(item.category_id.as_str()).cloned();
            ItemView::build(item, category, today)
        })
        .collect()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemFilter {
    #[default]
    All,
    /// Items with at least one completed topic
    CompletedTopics,
}

impl ItemFilter {
    pub fn parse(value: Option<&str>) -> Result<Self, CallistoError> {
        match value {
            None | Some("") | Some("all") => Ok(Self::All),
            Some("completed-topics") => Ok(Self::CompletedTopics),
            Some(other) => Err(CallistoError::validation(format!(
                "Unknown filter '{}', expected 'all' or 'completed-topics'",
                other
            ))),
        }
    }

    pub fn matches(&self, item: &LearningItem) -> bool {
        match self {
            Self::All => true,
            Self::CompletedTopics => item.topics.iter().any(|t| t.is_completed),
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    pub item_id: String,
    pub name: String,
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category_id: String,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub active_goals: usize,
    pub completed_topics: usize,
    pub total_categories: usize,
    pub progress: Vec<ItemProgress>,
    pub category_counts: Vec<CategoryCount>,
}

/// Summarize a user's data. `items` are expected newest first.
pub fn dashboard(categories: &[Category], items: &[LearningItem]) -> Dashboard {
    let completed_topics = items
        .iter()
        .map(|i| i.topics.iter().filter(|t| t.is_completed).count())
        .sum();

    let progress = items
        .iter()
        .take(DASHBOARD_PROGRESS_ITEMS)
        .map(|i| ItemProgress {
            item_id: i.id.clone(),
            name: i.name.clone(),
            progress: progress_percent(&i.topics),
        })
        .collect();

    let category_counts = categories
        .iter()
        .map(|c| CategoryCount {
            category_id: c.id.clone(),
            name: c.name.clone(),
            count: items.iter().filter(|i| i.category_id == c.id).count(),
        })
        .filter(|c| c.count > 0)
        .collect();

    Dashboard {
        active_goals: items.len(),
        completed_topics,
        total_categories: categories.len(),
        progress,
        category_counts,
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Item,
    Category,
    Topic,
    Subtopic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategorySummary>,
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Case-insensitive substring search over category names, item names and
/// descriptions, topic titles and sub-topic titles.
///
/// An item appears at most once. Exact title matches rank first, then
/// items, categories, topics and sub-topics in that order.
pub fn search(query: &str, categories: &[Category], items: &[LearningItem]) -> Vec<SearchResult> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let hit = |s: &str| s.to_lowercase().contains(&needle);

    let summaries: HashMap<&str, CategorySummary> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.summary()))
        .collect();

    let mut results = Vec::new();

    for category in categories.iter().filter(|c| hit(&c.name)) {
        results.push(SearchResult {
            kind: SearchKind::Category,
            id: category.id.clone(),
            item_id: None,
            topic_id: None,
            title: category.name.clone(),
            subtitle: "Category".into(),
            category: Some(category.summary()),
        });
    }

    for item in items {
        let category = summaries.get(item.category_id.as_str()).cloned();

        if hit(&item.name) || hit(&item.description) {
            let subtitle = if hit(&item.name) {
                category
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Uncategorized".into())
            } else {
                format!("Description: {}...", truncate_chars(&item.description, 50))
            };
            results.push(SearchResult {
                kind: SearchKind::Item,
                id: item.id.clone(),
                item_id: Some(item.id.clone()),
                topic_id: None,
                title: item.name.clone(),
                subtitle,
                category: category.clone(),
            });
        }

        for topic in &item.topics {
            if hit(&topic.title) {
                results.push(SearchResult {
                    kind: SearchKind::Topic,
                    id: format!("{}-{}", item.id, topic.id),
                    item_id: Some(item.id.clone()),
                    topic_id: Some(topic.id.clone()),
                    title: topic.title.clone(),
                    subtitle: format!("Topic in: {}", item.name),
                    category: category.clone(),
                });
            }

            for sub_topic in topic.sub_topics.iter().filter(|st| hit(&st.title)) {
                results.push(SearchResult {
                    kind: SearchKind::Subtopic,
                    id: format!("{}-{}-{}", item.id, topic.id, sub_topic.id),
                    item_id: Some(item.id.clone()),
                    topic_id: Some(topic.id.clone()),
                    title: sub_topic.title.clone(),
                    subtitle: format!("Objective in: {} → {}", item.name, topic.title),
                    category: category.clone(),
                });
            }
        }
    }

    // Stable sort keeps discovery order within a rank
    results.sort_by_key(|r| (r.title.to_lowercase() != needle, r.kind));
    results.truncate(SEARCH_LIMIT);
    results
}

// ============================================================================
// Goal import
// ============================================================================

/// A goal parsed from an import document, ready to become a new item
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedGoal {
    pub name: String,
    pub description: String,
    pub topics: Vec<Topic>,
}

/// Description used when a goal is created without one
pub fn default_description(name: &str) -> String {
    format!("My personal goal: {}", name)
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Parse a goal document `{name, description?, topics?: [{id?, title,
/// isCompleted?, deadline?, notes?, subTopics?: [...]}]}`. Missing ids are
/// minted from `millis`; `isCompleted` is only true when literally `true`.
pub fn parse_goal(goal: &Value, millis: i64) -> Result<ImportedGoal, CallistoError> {
    let name = non_empty_str(goal, "name")
        .ok_or_else(|| CallistoError::validation("Missing or invalid \"name\" field"))?
        .to_string();

    let description = non_empty_str(goal, "description")
        .map(str::to_string)
        .unwrap_or_else(|| default_description(&name));

    let mut topics = Vec::new();
    let mut seen_topics = HashSet::new();

    if let Some(raw_topics) = goal.get("topics").and_then(Value::as_array) {
        for (t_idx, raw) in raw_topics.iter().enumerate() {
            let title = non_empty_str(raw, "title").ok_or_else(|| {
                CallistoError::validation(format!(
                    "Topic {} is missing or has invalid \"title\"",
                    t_idx + 1
                ))
            })?;

            let id = non_empty_str(raw, "id")
                .map(str::to_string)
                .unwrap_or_else(|| ids::batch_topic_id(millis, t_idx));
            if !seen_topics.insert(id.clone()) {
                return Err(CallistoError::validation(format!("Duplicate topic id: {}", id)));
            }

            let mut sub_topics = Vec::new();
            let mut seen_subs = HashSet::new();
            if let Some(raw_subs) = raw.get("subTopics").and_then(Value::as_array) {
                for (s_idx, raw_sub) in raw_subs.iter().enumerate() {
                    let sub_title = non_empty_str(raw_sub, "title").ok_or_else(|| {
                        CallistoError::validation(format!(
                            "SubTopic {} in Topic \"{}\" is missing or has invalid \"title\"",
                            s_idx + 1,
                            title
                        ))
                    })?;
                    let sub_id = non_empty_str(raw_sub, "id")
                        .map(str::to_string)
                        .unwrap_or_else(|| ids::batch_sub_topic_id(millis, t_idx, s_idx));
                    if !seen_subs.insert(sub_id.clone()) {
                        return Err(CallistoError::validation(format!(
                            "Duplicate sub-topic id: {}",
                            sub_id
                        )));
                    }

                    sub_topics.push(SubTopic {
                        id: sub_id,
                        title: sub_title.to_string(),
                        is_completed: raw_sub.get("isCompleted") == Some(&Value::Bool(true)),
                        notes: non_empty_str(raw_sub, "notes").map(str::to_string),
                    });
                }
            }

            let deadline = non_empty_str(raw, "deadline").map(str::to_string);
            if let Some(d) = &deadline {
                check_deadline(d).map_err(|e| {
                    CallistoError::validation(format!("Topic \"{}\": {}", title, e))
                })?;
            }

            topics.push(Topic {
                id,
                title: title.to_string(),
                is_completed: raw.get("isCompleted") == Some(&Value::Bool(true)),
                sub_topics,
                deadline,
                notes: non_empty_str(raw, "notes").map(str::to_string),
            });
        }
    }

    Ok(ImportedGoal {
        name,
        description,
        topics,
    })
}
