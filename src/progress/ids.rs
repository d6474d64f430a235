//! Client-style id minting for topics and sub-topics
//!
//! Ids are timestamp derived (`topic-<millis>`), matching what browser
//! clients mint, so server-minted and client-minted ids share one shape.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_MINTED: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current millisecond timestamp, bumped past the last one handed out so
/// two mints in the same millisecond never share a value.
pub fn next_millis() -> i64 {
    let now = now_millis();
    let mut last = LAST_MINTED.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MINTED.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Fresh `topic-<millis>` id
pub fn fresh_topic_id() -> String {
    topic_id(next_millis())
}

/// Fresh `subtopic-<millis>` id
pub fn fresh_sub_topic_id() -> String {
    sub_topic_id(next_millis())
}

pub fn topic_id(millis: i64) -> String {
    format!("topic-{}", millis)
}

pub fn sub_topic_id(millis: i64) -> String {
    format!("subtopic-{}", millis)
}

/// Id for the `index`-th topic of a generated or imported batch
pub fn batch_topic_id(millis: i64, index: usize) -> String {
    format!("topic-{}-{}", millis, index)
}

/// Id for the `sub_index`-th sub-topic of the `topic_index`-th topic of a batch
pub fn batch_sub_topic_id(millis: i64, topic_index: usize, sub_index: usize) -> String {
    format!("subtopic-{}-{}-{}", millis, topic_index, sub_index)
}
