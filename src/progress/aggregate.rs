//! Read-time aggregation over a topic array
//!
//! Progress is derived on every read and never persisted.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::Topic;

/// Counts behind an item's progress percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_topics: usize,
    pub completed_topics: usize,
    pub total_sub_topics: usize,
    pub completed_sub_topics: usize,
    pub percent: u32,
}

impl ProgressSummary {
    pub fn of(topics: &[Topic]) -> Self {
        let total_sub_topics: usize = topics.iter().map(|t| t.sub_topics.len()).sum();
        let completed_sub_topics: usize = topics
            .iter()
            .map(|t| t.sub_topics.iter().filter(|st| st.is_completed).count())
            .sum();

        Self {
            total_topics: topics.len(),
            completed_topics: topics.iter().filter(|t| t.is_completed).count(),
            total_sub_topics,
            completed_sub_topics,
            percent: rounded_percent(completed_sub_topics, total_sub_topics),
        }
    }
}

/// Item progress: completed sub-topics over all sub-topics, rounded half up.
///
/// Topics only count through their sub-topics, so a completed topic with no
/// sub-topics contributes nothing and an item without sub-topics is at 0.
pub fn progress_percent(topics: &[Topic]) -> u32 {
    ProgressSummary::of(topics).percent
}

fn rounded_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // round(100 * c / t) with halves rounded up, in integer arithmetic
    ((200 * completed + total) / (2 * total)) as u32
}

/// An open topic is overdue when its deadline is strictly before `today`.
/// Completed topics, and missing or unparseable deadlines, are never overdue.
pub fn is_overdue(topic: &Topic, today: NaiveDate) -> bool {
    !topic.is_completed
        && topic
            .deadline
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .is_some_and(|deadline| deadline < today)
}
