//! JSON snapshot persistence.
//!
//! All three artifacts (channel snapshot, full harvest, new-items subset)
//! are pretty-printed JSON arrays, UTF-8 with non-ASCII text preserved
//! unescaped, overwritten wholesale on each run.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::warn;

use crate::error::StoreError;
use crate::harvest::HarvestEntry;
use crate::holoplus::Channel;

/// Write a value as pretty-printed JSON, overwriting any previous content.
pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).await.map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load the channel snapshot. The file must exist and hold a JSON array;
/// entries missing `id` or `name` get empty strings.
pub async fn load_channels(path: &Path) -> Result<Vec<Channel>, StoreError> {
    let rows = load_array(path).await?;
    Ok(rows
        .iter()
        .map(|row| Channel {
            id: str_field(row, "id"),
            name: str_field(row, "name"),
        })
        .collect())
}

/// Load the new-items file for the notifier. The file must exist and hold
/// a JSON array of harvest entries.
pub async fn load_entries(path: &Path) -> Result<Vec<HarvestEntry>, StoreError> {
    let rows = load_array(path).await?;
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| StoreError::Parse {
                path: path.display().to_string(),
                source: e,
            })
        })
        .collect()
}

/// Collect the thread ids recorded in the previous harvest file.
///
/// A missing, malformed, or mis-shaped file yields an empty set: the first
/// run (and a corrupted snapshot) treats every thread as new.
pub async fn load_known_thread_ids(path: &Path) -> HashSet<String> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(_) => return HashSet::new(),
    };

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => {
            warn!(
                path = %path.display(),
                "previous harvest is not valid JSON; treating all threads as new"
            );
            return HashSet::new();
        }
    };

    let Some(rows) = value.as_array() else {
        return HashSet::new();
    };

    rows.iter()
        .filter_map(|row| row.get("thread_id").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

async fn load_array(path: &Path) -> Result<Vec<Value>, StoreError> {
    let text = fs::read_to_string(path).await.map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let value: Value = serde_json::from_str(&text).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;

    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(StoreError::NotAnArray {
            path: path.display().to_string(),
        }),
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
