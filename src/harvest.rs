//! Thread harvesting: fan-out collection, merge, and delta.
//!
//! Each channel is fetched as an independent concurrent task; results are
//! merged and globally re-sorted only after every task has completed, so no
//! shared state is mutated concurrently. The delta against the previous
//! harvest is a plain membership test over thread ids.

use std::collections::HashSet;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;
use crate::holoplus::{Channel, DEFAULT_PAGE_LIMIT, HoloplusClient};

/// Engagement counters and timestamps that churn between harvests without
/// indicating a new thread. Stripped before persistence so two harvests of
/// the same thread compare equal.
const VOLATILE_FIELDS: &[&str] = &[
    "updated_at",
    "reaction_total",
    "reply_count",
    "is_favorite",
    "user_reacted_count",
];

/// One harvested thread, tagged with the channel it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEntry {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub thread: Value,
}

/// Shallow copy of a thread with the volatile fields removed.
pub fn sanitize_thread(thread: &Value) -> Value {
    let mut sanitized = thread.clone();
    if let Some(map) = sanitized.as_object_mut() {
        for field in VOLATILE_FIELDS {
            map.remove(*field);
        }
    }
    sanitized
}

/// Harvest every channel concurrently and return the merged, newest-first
/// list. Completions are logged as they arrive; the first failure aborts
/// the whole harvest.
pub async fn collect_all(
    client: &HoloplusClient,
    channels: &[Channel],
    all_threads: bool,
) -> Result<Vec<HarvestEntry>, ApiError> {
    let mut tasks: FuturesUnordered<_> = channels
        .iter()
        .filter(|channel| !channel.id.is_empty())
        .map(|channel| collect_channel(client, channel, all_threads))
        .collect();

    let total = tasks.len();
    info!(total, all_threads, "fetching threads");

    let mut done = 0usize;
    let mut per_channel: Vec<Vec<HarvestEntry>> = Vec::with_capacity(total);
    while let Some(collected) = tasks.next().await {
        let entries = collected?;
        done += 1;
        info!(done, total, threads = entries.len(), "channel harvested");
        per_channel.push(entries);
    }

    let mut merged: Vec<HarvestEntry> = per_channel.into_iter().flatten().collect();
    sort_newest_first(&mut merged);
    Ok(merged)
}

/// Collect one channel's threads: the single newest page, or the full
/// paginated history when `all_threads` is set.
async fn collect_channel(
    client: &HoloplusClient,
    channel: &Channel,
    all_threads: bool,
) -> Result<Vec<HarvestEntry>, ApiError> {
    let threads = if all_threads {
        client
            .fetch_all_threads(&channel.id, DEFAULT_PAGE_LIMIT)
            .await?
    } else {
        client
            .fetch_thread_page(&channel.id, DEFAULT_PAGE_LIMIT, None)
            .await?
            .items
    };

    Ok(entries_from_threads(channel, &threads))
}

/// Tag and sanitize raw thread objects for one channel. Threads with an
/// empty or missing `id` are silently dropped.
fn entries_from_threads(channel: &Channel, threads: &[Value]) -> Vec<HarvestEntry> {
    threads
        .iter()
        .filter_map(|thread| {
            let thread_id = thread.get("id").and_then(Value::as_str).unwrap_or_default();
            if thread_id.is_empty() {
                return None;
            }
            Some(HarvestEntry {
                channel_id: channel.id.clone(),
                channel_name: channel.name.clone(),
                thread_id: thread_id.to_string(),
                thread: sanitize_thread(thread),
            })
        })
        .collect()
}

/// Order entries newest first by `thread.created_at`. A missing timestamp
/// sorts as 0 (last). Ties break by thread id ascending, so the output is
/// deterministic regardless of task completion order.
pub fn sort_newest_first(entries: &mut [HarvestEntry]) {
    entries.sort_by(|a, b| {
        created_at(&b.thread)
            .total_cmp(&created_at(&a.thread))
            .then_with(|| a.thread_id.cmp(&b.thread_id))
    });
}

/// Entries whose thread id is absent from the previous harvest,
/// independently re-sorted newest first.
pub fn new_entries(merged: &[HarvestEntry], known_ids: &HashSet<String>) -> Vec<HarvestEntry> {
    let mut fresh: Vec<HarvestEntry> = merged
        .iter()
        .filter(|entry| !known_ids.contains(&entry.thread_id))
        .cloned()
        .collect();
    sort_newest_first(&mut fresh);
    fresh
}

fn created_at(thread: &Value) -> f64 {
    thread
        .get("created_at")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(thread_id: &str, thread: Value) -> HarvestEntry {
        HarvestEntry {
            channel_id: "ch1".to_string(),
            channel_name: "Channel One".to_string(),
            thread_id: thread_id.to_string(),
            thread,
        }
    }

    #[test]
    fn sanitize_strips_exactly_the_volatile_fields() {
        let thread = json!({
            "id": "t1",
            "title": "hello",
            "created_at": 1700000000,
            "updated_at": 1700000500,
            "reaction_total": 12,
            "reply_count": 3,
            "is_favorite": false,
            "user_reacted_count": 1,
            "translations": {"ja": {"title": "こんにちは"}},
        });

        let sanitized = sanitize_thread(&thread);
        // Value maps iterate in key order, so this is a full key-set check.
        let keys: Vec<&str> = sanitized.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["created_at", "id", "title", "translations"]);
        assert_eq!(sanitized["title"], "hello");
        assert_eq!(sanitized["translations"]["ja"]["title"], "こんにちは");
    }

    #[test]
    fn sanitize_makes_engagement_churn_invisible() {
        let first = json!({"id": "t1", "created_at": 5, "reply_count": 1, "reaction_total": 9});
        let second = json!({"id": "t1", "created_at": 5, "reply_count": 7, "reaction_total": 44});
        assert_eq!(sanitize_thread(&first), sanitize_thread(&second));
    }

    #[test]
    fn sanitize_leaves_non_objects_alone() {
        assert_eq!(sanitize_thread(&json!(null)), json!(null));
        assert_eq!(sanitize_thread(&json!("plain")), json!("plain"));
    }

    #[test]
    fn threads_without_id_are_dropped() {
        let channel = Channel {
            id: "ch1".to_string(),
            name: "Channel One".to_string(),
        };
        let threads = vec![
            json!({"id": "t1", "created_at": 1}),
            json!({"id": "", "created_at": 2}),
            json!({"created_at": 3}),
        ];

        let entries = entries_from_threads(&channel, &threads);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].thread_id, "t1");
        assert_eq!(entries[0].channel_name, "Channel One");
    }

    #[test]
    fn sort_is_newest_first_with_missing_timestamps_last() {
        let mut entries = vec![
            entry("t5", json!({"created_at": 5})),
            entry("t1", json!({"created_at": 1})),
            entry("tx", json!({})),
            entry("t3", json!({"created_at": 3})),
        ];
        sort_newest_first(&mut entries);

        let ids: Vec<&str> = entries.iter().map(|e| e.thread_id.as_str()).collect();
        assert_eq!(ids, ["t5", "t3", "t1", "tx"]);
    }

    #[test]
    fn sort_breaks_created_at_ties_by_thread_id() {
        let mut entries = vec![
            entry("tb", json!({"created_at": 7})),
            entry("ta", json!({"created_at": 7})),
            entry("tc", json!({"created_at": 7})),
        ];
        sort_newest_first(&mut entries);

        let ids: Vec<&str> = entries.iter().map(|e| e.thread_id.as_str()).collect();
        assert_eq!(ids, ["ta", "tb", "tc"]);
    }

    #[test]
    fn delta_keeps_only_unseen_threads() {
        let merged = vec![
            entry("a", json!({"created_at": 3})),
            entry("b", json!({"created_at": 2})),
            entry("c", json!({"created_at": 1})),
        ];
        let known: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();

        let fresh = new_entries(&merged, &known);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].thread_id, "c");
    }

    #[test]
    fn delta_with_empty_known_set_returns_everything() {
        let merged = vec![
            entry("a", json!({"created_at": 1})),
            entry("b", json!({"created_at": 2})),
        ];
        let fresh = new_entries(&merged, &HashSet::new());
        assert_eq!(fresh.len(), 2);
        // Re-sorted newest first even though the input was oldest first.
        assert_eq!(fresh[0].thread_id, "b");
    }

    #[test]
    fn harvest_entry_serializes_in_snapshot_field_order() {
        let json = serde_json::to_string(&entry("t1", json!({"id": "t1"}))).unwrap();
        let positions: Vec<usize> = ["\"channel_id\"", "\"channel_name\"", "\"thread_id\"", "\"thread\""]
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
