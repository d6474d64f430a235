//! Learning item endpoints
//!
//! Every item in a response is the read model from
//! [`ItemView`](crate::services::ItemView): category summary, derived
//! progress and per-topic overdue flags.
//!
//! Topic-tree endpoints each resolve ids and default titles up front and then
//! run a single guarded write through
//! [`ProgressStore::edit_topics_batch`](crate::store::ProgressStore::edit_topics_batch).

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::info;

use super::request::ApiRequest;
use super::response::{json_response, BoxBody};
use crate::model::{GoalStatus, ItemPatch, LearningItem, NewItem, Topic};
use crate::progress::{ids, TopicEdit};
use crate::server::AppState;
use crate::services::catalog::{self, default_description, ItemFilter, ItemView};
use crate::types::{CallistoError, Result};

pub const DEFAULT_TOPIC_TITLE: &str = "New Module";
pub const DEFAULT_SUB_TOPIC_TITLE: &str = "New Objective";

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub topics: Option<Vec<Topic>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub category_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub comments: Option<String>,
    pub topics: Option<Vec<Topic>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportRequest {
    pub category_id: Option<String>,
    pub goal: Option<Value>,
}

/// Body for adding a topic or sub-topic
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddNodeRequest {
    pub id: Option<String>,
    pub title: Option<String>,
}

/// Body for editing a topic or sub-topic. Empty `notes` or `deadline`
/// clears the field.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub deadline: Option<String>,
    pub is_completed: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reject topic arrays with duplicate ids among siblings
fn validate_topic_ids(topics: &[Topic]) -> Result<()> {
    let mut seen = HashSet::new();
    for topic in topics {
        if topic.id.is_empty() {
            return Err(CallistoError::validation("Topic id must not be empty"));
        }
        if !seen.insert(topic.id.as_str()) {
            return Err(CallistoError::validation(format!(
                "Duplicate topic id: {}",
                topic.id
            )));
        }
        let mut seen_subs = HashSet::new();
        for st in &topic.sub_topics {
            if st.id.is_empty() || !seen_subs.insert(st.id.as_str()) {
                return Err(CallistoError::validation(format!(
                    "Duplicate or empty sub-topic id in topic {}",
                    topic.id
                )));
            }
        }
    }
    Ok(())
}

impl UpdateItemRequest {
    fn into_patch(self) -> Result<ItemPatch> {
        let name = match self.name {
            Some(n) if n.trim().is_empty() => {
                return Err(CallistoError::validation("Name cannot be empty"))
            }
            other => other.map(|n| n.trim().to_string()),
        };
        let status = match self.status {
            Some(s) => Some(GoalStatus::parse(&s).ok_or_else(|| {
                CallistoError::validation(format!(
                    "Invalid status '{}', expected one of: Not started, In progress, Completed",
                    s
                ))
            })?),
            None => None,
        };
        if let Some(ref topics) = self.topics {
            validate_topic_ids(topics)?;
        }

        Ok(ItemPatch {
            category_id: non_blank(self.category_id),
            name,
            description: self.description,
            status,
            comments: self.comments,
            topics: self.topics,
        })
    }
}

impl UpdateNodeRequest {
    fn topic_edits(self, topic_id: &str) -> Vec<TopicEdit> {
        let topic_id = topic_id.to_string();
        let mut edits = Vec::new();
        if let Some(title) = non_blank(self.title) {
            edits.push(TopicEdit::RenameTopic {
                topic_id: topic_id.clone(),
                title,
            });
        }
        if let Some(notes) = self.notes {
            edits.push(TopicEdit::SetTopicNotes {
                topic_id: topic_id.clone(),
                notes: non_blank(Some(notes)),
            });
        }
        if let Some(deadline) = self.deadline {
            edits.push(TopicEdit::SetTopicDeadline {
                topic_id: topic_id.clone(),
                deadline: non_blank(Some(deadline)),
            });
        }
        if let Some(completed) = self.is_completed {
            edits.push(TopicEdit::SetTopicCompleted {
                topic_id,
                completed,
            });
        }
        edits
    }

    fn sub_topic_edits(self, topic_id: &str, sub_topic_id: &str) -> Result<Vec<TopicEdit>> {
        if self.deadline.is_some() {
            return Err(CallistoError::validation(
                "Objectives do not have deadlines",
            ));
        }
        let (topic_id, sub_topic_id) = (topic_id.to_string(), sub_topic_id.to_string());
        let mut edits = Vec::new();
        if let Some(title) = non_blank(self.title) {
            edits.push(TopicEdit::RenameSubTopic {
                topic_id: topic_id.clone(),
                sub_topic_id: sub_topic_id.clone(),
                title,
            });
        }
        if let Some(notes) = self.notes {
            edits.push(TopicEdit::SetSubTopicNotes {
                topic_id: topic_id.clone(),
                sub_topic_id: sub_topic_id.clone(),
                notes: non_blank(Some(notes)),
            });
        }
        if let Some(completed) = self.is_completed {
            edits.push(TopicEdit::SetSubTopicCompleted {
                topic_id,
                sub_topic_id,
                completed,
            });
        }
        Ok(edits)
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<ItemView>,
}

#[derive(Serialize)]
struct ItemResponse {
    item: ItemView,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Render one item with its category summary resolved
async fn item_response(
    state: &AppState,
    user_id: &str,
    item: LearningItem,
    status: StatusCode,
) -> Result<Response<BoxBody>> {
    let categories = state.store.list_categories(user_id).await?;
    let item = catalog::item_views(vec![item], &categories, catalog::today())
        .pop()
        .ok_or_else(|| CallistoError::Internal("item view missing".into()))?;
    Ok(json_response(status, &ItemResponse { item }))
}

// ============================================================================
// Item CRUD
// ============================================================================

pub async fn handle_list(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let filter = ItemFilter::parse(req.query_param("filter").as_deref())?;

    let (categories, items) = state.store.load_all(&auth.user_id).await?;
    let items = items.into_iter().filter(|i| filter.matches(i)).collect();

    Ok(json_response(
        StatusCode::OK,
        &ItemsResponse {
            items: catalog::item_views(items, &categories, catalog::today()),
        },
    ))
}

pub async fn handle_get(state: &AppState, req: &ApiRequest, id: &str) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let item = state.store.get_item(&auth.user_id, id).await?;
    item_response(state, &auth.user_id, item, StatusCode::OK).await
}

pub async fn handle_create(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: CreateItemRequest = req.json()?;

    let (category_id, name) = match (non_blank(body.category_id), non_blank(body.name)) {
        (Some(c), Some(n)) => (c, n),
        _ => {
            return Err(CallistoError::validation(
                "Category ID and name are required",
            ))
        }
    };
    let topics = body.topics.unwrap_or_default();
    validate_topic_ids(&topics)?;

    let item = state
        .store
        .create_item(
            &auth.user_id,
            NewItem {
                category_id,
                description: non_blank(body.description)
                    .unwrap_or_else(|| default_description(&name)),
                name,
                topics,
            },
        )
        .await?;

    info!(user_id = %auth.user_id, item_id = %item.id, "Item created");
    item_response(state, &auth.user_id, item, StatusCode::CREATED).await
}

pub async fn handle_update(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: UpdateItemRequest = req.json()?;
    let item = state
        .store
        .update_item(&auth.user_id, id, body.into_patch()?)
        .await?;
    item_response(state, &auth.user_id, item, StatusCode::OK).await
}

pub async fn handle_delete(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    state.store.delete_item(&auth.user_id, id).await?;
    info!(user_id = %auth.user_id, item_id = %id, "Item deleted");
    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            message: "Item deleted successfully",
        },
    ))
}

/// POST /items/import
pub async fn handle_import(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: ImportRequest = req.json()?;

    let category_id = non_blank(body.category_id)
        .ok_or_else(|| CallistoError::validation("Category ID is required"))?;
    let goal = body
        .goal
        .ok_or_else(|| CallistoError::validation("Goal document is required"))?;
    let goal = catalog::parse_goal(&goal, ids::next_millis())?;

    let item = state
        .store
        .create_item(
            &auth.user_id,
            NewItem {
                category_id,
                name: goal.name,
                description: goal.description,
                topics: goal.topics,
            },
        )
        .await?;

    info!(
        user_id = %auth.user_id,
        item_id = %item.id,
        topics = item.topics.len(),
        "Goal imported"
    );
    item_response(state, &auth.user_id, item, StatusCode::CREATED).await
}

/// POST /items/{id}/roadmap: generate and replace the topic tree
pub async fn handle_apply_roadmap(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let item = state.store.get_item(&auth.user_id, id).await?;

    let topics = state.roadmap.generate(&item.name).await?;
    let item = state.store.replace_topics(&auth.user_id, id, topics).await?;

    info!(user_id = %auth.user_id, item_id = %id, topics = item.topics.len(), "Roadmap applied");
    item_response(state, &auth.user_id, item, StatusCode::OK).await
}

// ============================================================================
// Topic tree
// ============================================================================

async fn run_edits(
    state: &AppState,
    user_id: &str,
    item_id: &str,
    edits: &[TopicEdit],
    status: StatusCode,
) -> Result<Response<BoxBody>> {
    let item = state
        .store
        .edit_topics_batch(user_id, item_id, edits)
        .await?;
    item_response(state, user_id, item, status).await
}

/// POST /items/{id}/topics
pub async fn handle_add_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: AddNodeRequest = if req.body.is_empty() {
        AddNodeRequest::default()
    } else {
        req.json()?
    };

    let edit = TopicEdit::AddTopic {
        id: non_blank(body.id).unwrap_or_else(ids::fresh_topic_id),
        title: non_blank(body.title).unwrap_or_else(|| DEFAULT_TOPIC_TITLE.to_string()),
    };
    run_edits(state, &auth.user_id, item_id, &[edit], StatusCode::CREATED).await
}

/// PUT /items/{id}/topics/{topicId}
pub async fn handle_update_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
    topic_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: UpdateNodeRequest = req.json()?;
    let edits = body.topic_edits(topic_id);
    run_edits(state, &auth.user_id, item_id, &edits, StatusCode::OK).await
}

/// DELETE /items/{id}/topics/{topicId}
pub async fn handle_delete_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
    topic_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let edit = TopicEdit::DeleteTopic {
        topic_id: topic_id.to_string(),
    };
    run_edits(state, &auth.user_id, item_id, &[edit], StatusCode::OK).await
}

/// POST /items/{id}/topics/{topicId}/subtopics
pub async fn handle_add_sub_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
    topic_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: AddNodeRequest = if req.body.is_empty() {
        AddNodeRequest::default()
    } else {
        req.json()?
    };

    let edit = TopicEdit::AddSubTopic {
        topic_id: topic_id.to_string(),
        id: non_blank(body.id).unwrap_or_else(ids::fresh_sub_topic_id),
        title: non_blank(body.title).unwrap_or_else(|| DEFAULT_SUB_TOPIC_TITLE.to_string()),
    };
    run_edits(state, &auth.user_id, item_id, &[edit], StatusCode::CREATED).await
}

/// PUT /items/{id}/topics/{topicId}/subtopics/{subTopicId}
pub async fn handle_update_sub_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
    topic_id: &str,
    sub_topic_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: UpdateNodeRequest = req.json()?;
    let edits = body.sub_topic_edits(topic_id, sub_topic_id)?;
    run_edits(state, &auth.user_id, item_id, &edits, StatusCode::OK).await
}

/// DELETE /items/{id}/topics/{topicId}/subtopics/{subTopicId}
pub async fn handle_delete_sub_topic(
    state: &AppState,
    req: &ApiRequest,
    item_id: &str,
    topic_id: &str,
    sub_topic_id: &str,
) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let edit = TopicEdit::DeleteSubTopic {
        topic_id: topic_id.to_string(),
        sub_topic_id: sub_topic_id.to_string(),
    };
    run_edits(state, &auth.user_id, item_id, &[edit], StatusCode::OK).await
}
