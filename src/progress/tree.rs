//! Topic-tree mutation primitives
//!
//! Each primitive edits a topic array in place. [`apply`] dispatches a
//! [`TopicEdit`] command to the matching primitive so the store can run any
//! edit inside one read-modify-write cycle.

use chrono::NaiveDate;

use crate::model::{SubTopic, Topic};
use crate::types::CallistoError;

/// Failure while editing a topic array
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Sub-topic not found: {sub_topic_id} (topic {topic_id})")]
    SubTopicNotFound {
        topic_id: String,
        sub_topic_id: String,
    },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Invalid deadline '{0}', expected YYYY-MM-DD")]
    InvalidDeadline(String),

    #[error("Id must not be empty")]
    EmptyId,
}

impl From<TreeError> for CallistoError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::TopicNotFound(_) | TreeError::SubTopicNotFound { .. } => {
                CallistoError::NotFound(err.to_string())
            }
            TreeError::DuplicateId(_) | TreeError::InvalidDeadline(_) | TreeError::EmptyId => {
                CallistoError::Validation(err.to_string())
            }
        }
    }
}

/// A single edit to an item's topic array.
///
/// Ids and titles are already resolved (minted or defaulted) so that
/// re-applying the same edit after a lost compare-and-swap yields the same
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicEdit {
    AddTopic {
        id: String,
        title: String,
    },
    RenameTopic {
        topic_id: String,
        title: String,
    },
    SetTopicNotes {
        topic_id: String,
        notes: Option<String>,
    },
    SetTopicDeadline {
        topic_id: String,
        deadline: Option<String>,
    },
    SetTopicCompleted {
        topic_id: String,
        completed: bool,
    },
    DeleteTopic {
        topic_id: String,
    },
    AddSubTopic {
        topic_id: String,
        id: String,
        title: String,
    },
    RenameSubTopic {
        topic_id: String,
        sub_topic_id: String,
        title: String,
    },
    SetSubTopicNotes {
        topic_id: String,
        sub_topic_id: String,
        notes: Option<String>,
    },
    SetSubTopicCompleted {
        topic_id: String,
        sub_topic_id: String,
        completed: bool,
    },
    DeleteSubTopic {
        topic_id: String,
        sub_topic_id: String,
    },
}

/// Apply one edit to `topics`. On error `topics` is left unchanged.
pub fn apply(topics: &mut Vec<Topic>, edit: &TopicEdit) -> Result<(), TreeError> {
    match edit {
        TopicEdit::AddTopic { id, title } => add_topic(topics, id, title),
        TopicEdit::RenameTopic { topic_id, title } => rename_topic(topics, topic_id, title),
        TopicEdit::SetTopicNotes { topic_id, notes } => {
            set_topic_notes(topics, topic_id, notes.clone())
        }
        TopicEdit::SetTopicDeadline { topic_id, deadline } => {
            set_topic_deadline(topics, topic_id, deadline.clone())
        }
        TopicEdit::SetTopicCompleted {
            topic_id,
            completed,
        } => set_topic_completed(topics, topic_id, *completed),
        TopicEdit::DeleteTopic { topic_id } => delete_topic(topics, topic_id),
        TopicEdit::AddSubTopic {
            topic_id,
            id,
            title,
        } => add_sub_topic(topics, topic_id, id, title),
        TopicEdit::RenameSubTopic {
            topic_id,
            sub_topic_id,
            title,
        } => rename_sub_topic(topics, topic_id, sub_topic_id, title),
        TopicEdit::SetSubTopicNotes {
            topic_id,
            sub_topic_id,
            notes,
        } => set_sub_topic_notes(topics, topic_id, sub_topic_id, notes.clone()),
        TopicEdit::SetSubTopicCompleted {
            topic_id,
            sub_topic_id,
            completed,
        } => set_sub_topic_completed(topics, topic_id, sub_topic_id, *completed),
        TopicEdit::DeleteSubTopic {
            topic_id,
            sub_topic_id,
        } => delete_sub_topic(topics, topic_id, sub_topic_id),
    }
}

fn find_topic<'a>(topics: &'a mut [Topic], topic_id: &str) -> Result<&'a mut Topic, TreeError> {
    topics
        .iter_mut()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| TreeError::TopicNotFound(topic_id.to_string()))
}

fn find_sub_topic<'a>(
    topic: &'a mut Topic,
    sub_topic_id: &str,
) -> Result<&'a mut SubTopic, TreeError> {
    let topic_id = topic.id.clone();
    topic
        .sub_topics
        .iter_mut()
        .find(|st| st.id == sub_topic_id)
        .ok_or_else(|| TreeError::SubTopicNotFound {
            topic_id,
            sub_topic_id: sub_topic_id.to_string(),
        })
}

/// Append a new, incomplete topic
pub fn add_topic(topics: &mut Vec<Topic>, id: &str, title: &str) -> Result<(), TreeError> {
    if id.is_empty() {
        return Err(TreeError::EmptyId);
    }
    if topics.iter().any(|t| t.id == id) {
        return Err(TreeError::DuplicateId(id.to_string()));
    }
    topics.push(Topic::new(id, title));
    Ok(())
}

pub fn rename_topic(topics: &mut [Topic], topic_id: &str, title: &str) -> Result<(), TreeError> {
    find_topic(topics, topic_id)?.title = title.to_string();
    Ok(())
}

pub fn set_topic_notes(
    topics: &mut [Topic],
    topic_id: &str,
    notes: Option<String>,
) -> Result<(), TreeError> {
    find_topic(topics, topic_id)?.notes = notes;
    Ok(())
}

/// Deadlines are calendar dates in `YYYY-MM-DD` form
pub fn check_deadline(deadline: &str) -> Result<(), TreeError> {
    NaiveDate::parse_from_str(deadline, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| TreeError::InvalidDeadline(deadline.to_string()))
}

/// Set or clear a topic deadline. `Some` values must be `YYYY-MM-DD`.
pub fn set_topic_deadline(
    topics: &mut [Topic],
    topic_id: &str,
    deadline: Option<String>,
) -> Result<(), TreeError> {
    if let Some(ref d) = deadline {
        check_deadline(d)?;
    }
    find_topic(topics, topic_id)?.deadline = deadline;
    Ok(())
}

/// Set a topic's completion and cascade the same value to all its sub-topics
pub fn set_topic_completed(
    topics: &mut [Topic],
    topic_id: &str,
    completed: bool,
) -> Result<(), TreeError> {
    let topic = find_topic(topics, topic_id)?;
    topic.is_completed = completed;
    for st in &mut topic.sub_topics {
        st.is_completed = completed;
    }
    Ok(())
}

/// Remove a topic together with its sub-topics
pub fn delete_topic(topics: &mut Vec<Topic>, topic_id: &str) -> Result<(), TreeError> {
    let before = topics.len();
    topics.retain(|t| t.id != topic_id);
    if topics.len() == before {
        return Err(TreeError::TopicNotFound(topic_id.to_string()));
    }
    Ok(())
}

/// Append a new, incomplete sub-topic. The parent's flag is not touched.
pub fn add_sub_topic(
    topics: &mut [Topic],
    topic_id: &str,
    id: &str,
    title: &str,
) -> Result<(), TreeError> {
    if id.is_empty() {
        return Err(TreeError::EmptyId);
    }
    let topic = find_topic(topics, topic_id)?;
    if topic.sub_topics.iter().any(|st| st.id == id) {
        return Err(TreeError::DuplicateId(id.to_string()));
    }
    topic.sub_topics.push(SubTopic::new(id, title));
    Ok(())
}

pub fn rename_sub_topic(
    topics: &mut [Topic],
    topic_id: &str,
    sub_topic_id: &str,
    title: &str,
) -> Result<(), TreeError> {
    let topic = find_topic(topics, topic_id)?;
    find_sub_topic(topic, sub_topic_id)?.title = title.to_string();
    Ok(())
}

pub fn set_sub_topic_notes(
    topics: &mut [Topic],
    topic_id: &str,
    sub_topic_id: &str,
    notes: Option<String>,
) -> Result<(), TreeError> {
    let topic = find_topic(topics, topic_id)?;
    find_sub_topic(topic, sub_topic_id)?.notes = notes;
    Ok(())
}

/// Set one sub-topic's completion, then recompute the parent topic as
/// "at least one sub-topic and all of them complete".
pub fn set_sub_topic_completed(
    topics: &mut [Topic],
    topic_id: &str,
    sub_topic_id: &str,
    completed: bool,
) -> Result<(), TreeError> {
    let topic = find_topic(topics, topic_id)?;
    find_sub_topic(topic, sub_topic_id)?.is_completed = completed;
    topic.is_completed =
        !topic.sub_topics.is_empty() && topic.sub_topics.iter().all(|st| st.is_completed);
    Ok(())
}

/// Remove a sub-topic. The parent's completion flag is left as it was.
pub fn delete_sub_topic(
    topics: &mut [Topic],
    topic_id: &str,
    sub_topic_id: &str,
) -> Result<(), TreeError> {
    let topic = find_topic(topics, topic_id)?;
    let before = topic.sub_topics.len();
    topic.sub_topics.retain(|st| st.id != sub_topic_id);
    if topic.sub_topics.len() == before {
        return Err(TreeError::SubTopicNotFound {
            topic_id: topic_id.to_string(),
            sub_topic_id: sub_topic_id.to_string(),
        });
    }
    Ok(())
}
