//! HTTP client for the holoplus talent-channel API.
//!
//! Two endpoints are consumed: the unpaginated channel list, and the
//! cursor-paginated per-channel thread listing. Thread objects are kept as
//! opaque `serde_json::Value` so unknown remote fields pass through intact.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::HoloplusConfig;
use crate::error::{ApiError, ConfigError};

/// Default page size for thread listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Per-request timeout for metadata calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A talent channel, as persisted in the channel snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One page of a channel's thread listing.
#[derive(Debug, Default)]
pub struct ThreadPage {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Client for the holoplus REST API.
///
/// Carries the bearer credential and the fixed client-identification
/// headers the mobile app sends on every request.
pub struct HoloplusClient {
    client: reqwest::Client,
    base_url: String,
}

impl HoloplusClient {
    pub fn new(config: &HoloplusConfig) -> crate::error::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("Dart/3.9 (dart:io)"));
        headers.insert("accept-language", HeaderValue::from_static("ja"));
        headers.insert(
            "content-type",
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert("app-version", HeaderValue::from_static("3.1.1 (904)"));

        let mut auth =
            HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret())).map_err(
                |e| ConfigError::InvalidValue {
                    key: "HOLOPLUS_TOKEN".to_string(),
                    message: e.to_string(),
                },
            )?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetch the complete channel list in one request, sorted ascending
    /// by id. Channels missing `id` or `name` get empty strings.
    pub async fn list_channels(&self) -> Result<Vec<Channel>, ApiError> {
        let url = format!("{}/v4/talent-channel/channels", self.base_url);
        let body = self.get_json(&url, &[], "channel list").await?;
        Ok(channels_from_response(&body))
    }

    /// Fetch one page of a channel's newest threads.
    pub async fn fetch_thread_page(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ThreadPage, ApiError> {
        let url = format!("{}/v4/talent-channel/threads/newest", self.base_url);
        let target = format!("threads for channel {channel_id}");

        let mut params = vec![
            ("channel_id", channel_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        let body = self.get_json(&url, &params, &target).await?;
        Ok(ThreadPage {
            items: body
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            next_cursor: body
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Fetch every thread in a channel by walking the pagination cursor.
    pub async fn fetch_all_threads(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<Value>, ApiError> {
        drain_pages(|cursor: Option<String>| async move {
            self.fetch_thread_page(channel_id, limit, cursor.as_deref())
                .await
        })
        .await
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        target: &str,
    ) -> Result<Value, ApiError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                target: target.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                target: target.to_string(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| ApiError::Request {
            target: target.to_string(),
            source: e,
        })
    }
}

/// Extract `{id, name}` pairs from a channels response, sorted ascending
/// by id. A missing `items` array yields an empty list.
fn channels_from_response(body: &Value) -> Vec<Channel> {
    let mut channels: Vec<Channel> = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| Channel {
                    id: str_field(item, "id"),
                    name: str_field(item, "name"),
                })
                .collect()
        })
        .unwrap_or_default();
    channels.sort_by(|a, b| a.id.cmp(&b.id));
    channels
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Drive a paginated fetch to completion.
///
/// Two conditions terminate the walk, and both are valid completions, not
/// errors: an empty `items` page, or a page with no (or an empty)
/// `next_cursor`.
async fn drain_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<Value>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ThreadPage, ApiError>>,
{
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch_page(cursor.take()).await?;
        if page.items.is_empty() {
            break;
        }
        all.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok(all)
}
