//! File-level integration tests for the snapshot pipeline.
//!
//! Each test works in a fresh temp directory and exercises the real
//! save/load/delta path the subcommands share on disk.

use std::collections::HashSet;

use serde_json::{Value, json};
use tempfile::TempDir;

use holowatch::config::StorePaths;
use holowatch::error::StoreError;
use holowatch::harvest::{self, HarvestEntry};
use holowatch::holoplus::Channel;
use holowatch::store;

fn entry(thread_id: &str, created_at: i64) -> HarvestEntry {
    HarvestEntry {
        channel_id: "ch1".to_string(),
        channel_name: "ぺこらチャンネル".to_string(),
        thread_id: thread_id.to_string(),
        thread: json!({"id": thread_id, "created_at": created_at, "title": "更新"}),
    }
}

#[tokio::test]
async fn channel_snapshot_roundtrip() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    let channels = vec![
        Channel {
            id: "c1".to_string(),
            name: "One".to_string(),
        },
        Channel {
            id: "c10".to_string(),
            name: "Ten".to_string(),
        },
    ];
    store::save_json(&paths.channels, &channels).await.unwrap();

    let loaded = store::load_channels(&paths.channels).await.unwrap();
    assert_eq!(loaded, channels);
}

#[tokio::test]
async fn snapshots_preserve_non_ascii_unescaped_and_pretty() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    store::save_json(&paths.harvest, &vec![entry("t1", 5)])
        .await
        .unwrap();

    let raw = tokio::fs::read_to_string(&paths.harvest).await.unwrap();
    assert!(raw.contains("ぺこらチャンネル"), "non-ASCII must stay unescaped");
    assert!(!raw.contains("\\u"), "no unicode escapes expected");
    assert!(raw.contains("\n  "), "output should be pretty-printed");
}

#[tokio::test]
async fn first_run_treats_every_thread_as_new() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    let known = store::load_known_thread_ids(&paths.harvest).await;
    assert!(known.is_empty());

    let merged = vec![entry("a", 2), entry("b", 1)];
    let fresh = harvest::new_entries(&merged, &known);
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn corrupt_previous_harvest_is_treated_as_absent() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    tokio::fs::write(&paths.harvest, "{not json at all")
        .await
        .unwrap();

    let known = store::load_known_thread_ids(&paths.harvest).await;
    assert!(known.is_empty());

    let merged = vec![entry("a", 1)];
    let fresh = harvest::new_entries(&merged, &known);
    assert_eq!(fresh.len(), 1);
}

#[tokio::test]
async fn delta_across_runs_detects_only_unseen_threads() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    // First run persists threads A and B.
    store::save_json(&paths.harvest, &vec![entry("a", 2), entry("b", 1)])
        .await
        .unwrap();

    // Second run sees A, B, and a fresh C.
    let known = store::load_known_thread_ids(&paths.harvest).await;
    assert_eq!(known, HashSet::from(["a".to_string(), "b".to_string()]));

    let merged = vec![entry("a", 2), entry("b", 1), entry("c", 3)];
    let fresh = harvest::new_entries(&merged, &known);

    let ids: Vec<&str> = fresh.iter().map(|e| e.thread_id.as_str()).collect();
    assert_eq!(ids, ["c"]);
}

#[tokio::test]
async fn new_items_file_roundtrips_for_the_notifier() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    store::save_json(&paths.new_items, &vec![entry("t9", 9)])
        .await
        .unwrap();

    let entries = store::load_entries(&paths.new_items).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].thread_id, "t9");
    assert_eq!(entries[0].thread["title"], "更新");
}

#[tokio::test]
async fn non_array_snapshot_is_a_shape_error() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    tokio::fs::write(&paths.channels, "{\"items\": []}")
        .await
        .unwrap();

    let err = store::load_channels(&paths.channels).await.unwrap_err();
    assert!(matches!(err, StoreError::NotAnArray { .. }));
}

#[tokio::test]
async fn missing_new_items_file_is_an_error_for_the_notifier() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    let err = store::load_entries(&paths.new_items).await.unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}

#[tokio::test]
async fn harvest_file_sort_survives_roundtrip() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::rooted(dir.path());

    let mut merged = vec![entry("t1", 1), entry("t5", 5), entry("t3", 3)];
    harvest::sort_newest_first(&mut merged);
    store::save_json(&paths.harvest, &merged).await.unwrap();

    let raw: Value =
        serde_json::from_str(&tokio::fs::read_to_string(&paths.harvest).await.unwrap()).unwrap();
    let ids: Vec<&str> = raw
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["thread_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["t5", "t3", "t1"]);
}
