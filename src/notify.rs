//! Discord notification: payload construction and sequential delivery.
//!
//! Entries are delivered strictly in order. Each entry is one JSON post,
//! optionally followed by a voice-clip attachment post; the follow-up must
//! finish before the next entry starts, since both posts land in the same
//! destination channel and message order matters there.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::harvest::HarvestEntry;

/// Discord caps embed descriptions at 4096 characters; stay under with
/// margin.
const MAX_DESCRIPTION: usize = 3800;

/// Discord caps top-level message content at 2000 characters.
const MAX_CONTENT: usize = 2000;

/// Thread pages on the holoplus web app.
const THREAD_URL_BASE: &str = "https://www.holoplus.com/app/threads";

/// Timeout for the embed post.
const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for audio download and upload. Clips are much larger than
/// metadata, so they get a longer bound.
const AUDIO_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends new-thread notifications to a Discord webhook, one entry at a
/// time.
pub struct DiscordNotifier {
    client: reqwest::Client,
    config: NotifyConfig,
}

impl DiscordNotifier {
    pub fn new(config: NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    /// Deliver every entry in order and return the number of messages sent.
    /// An empty list performs no webhook calls at all.
    pub async fn send_all(&self, entries: &[HarvestEntry]) -> Result<usize, NotifyError> {
        for entry in entries {
            let (payload, voice_url) = build_payload(entry);
            self.send_entry(&payload, voice_url.as_deref()).await?;
            debug!(thread_id = %entry.thread_id, "notification sent");
        }
        Ok(entries.len())
    }

    async fn send_entry(&self, payload: &Value, voice_url: Option<&str>) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(self.config.webhook_url.expose_secret())
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::WebhookFailed { status, body });
        }

        if let Some(url) = voice_url {
            self.send_voice_clip(url).await?;
        }
        Ok(())
    }

    /// Download the clip and re-post it as a file attachment, so the
    /// destination renders a playback UI instead of a bare link.
    async fn send_voice_clip(&self, voice_url: &str) -> Result<(), NotifyError> {
        let audio = self
            .client
            .get(voice_url)
            .timeout(AUDIO_TIMEOUT)
            .send()
            .await?;

        if !audio.status().is_success() {
            let status = audio.status();
            let body = audio.text().await.unwrap_or_default();
            return Err(NotifyError::VoiceDownloadFailed { status, body });
        }
        let bytes = audio.bytes().await?;
        info!(bytes = bytes.len(), "voice clip downloaded");

        let part = Part::bytes(bytes.to_vec()).file_name(voice_clip_filename(voice_url));
        let form = Form::new().part("file", part);

        let resp = self
            .client
            .post(self.config.webhook_url.expose_secret())
            .multipart(form)
            .timeout(AUDIO_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::VoiceUploadFailed { status, body });
        }
        Ok(())
    }
}

/// Build the webhook payload for one entry, plus the voice-clip URL when
/// the thread carries one. The voice URL is returned alongside the payload
/// and is never embedded in it.
pub fn build_payload(entry: &HarvestEntry) -> (Value, Option<String>) {
    let thread = &entry.thread;
    let channel_name = entry.channel_name.as_str();
    let thread_id = if entry.thread_id.is_empty() {
        thread.get("id").and_then(Value::as_str).unwrap_or_default()
    } else {
        entry.thread_id.as_str()
    };

    let ja = thread.get("translations").and_then(|t| t.get("ja"));
    let title = nonempty(ja.and_then(|j| j.get("title")))
        .or_else(|| nonempty(thread.get("title")))
        .unwrap_or_default();
    let body = nonempty(ja.and_then(|j| j.get("body")))
        .or_else(|| nonempty(thread.get("body")))
        .unwrap_or_default();

    let header = format!("[{channel_name}] {title}").trim().to_string();
    let description = truncate_with_ellipsis(body, MAX_DESCRIPTION);

    let thread_url =
        (!thread_id.is_empty()).then(|| format!("{THREAD_URL_BASE}/{thread_id}"));

    let mut embed = json!({
        "title": if !title.is_empty() {
            title
        } else if !channel_name.is_empty() {
            channel_name
        } else {
            "Holoplus Thread"
        },
        "description": if description.is_empty() {
            Value::Null
        } else {
            Value::String(description)
        },
    });

    if let Some(url) = &thread_url {
        embed["url"] = json!(url);
    }

    let user = thread.get("user");
    let author_name = nonempty(user.and_then(|u| u.get("name"))).unwrap_or(channel_name);
    let author_icon = nonempty(user.and_then(|u| u.get("icon_url")));
    if !author_name.is_empty() || author_icon.is_some() {
        let mut author = json!({ "name": author_name });
        if let Some(icon) = author_icon {
            author["icon_url"] = json!(icon);
        }
        embed["author"] = author;
    }

    if let Some(image) = thread
        .get("image_urls")
        .and_then(Value::as_array)
        .and_then(|urls| urls.first())
        .and_then(Value::as_str)
    {
        embed["image"] = json!({ "url": image });
    }

    let voice_url = nonempty(
        thread
            .get("voice_clip")
            .and_then(|clip| clip.get("url")),
    )
    .map(str::to_string);

    let content = if header.is_empty() {
        thread_url.clone().unwrap_or_default()
    } else {
        header
    };
    let content = truncate_with_ellipsis(&content, MAX_CONTENT);

    let mut payload = json!({ "embeds": [embed] });
    if !content.is_empty() {
        payload["content"] = json!(content);
    }

    (payload, voice_url)
}

/// Attachment name is always `voice-clip` plus the extension taken from
/// the URL's trailing path segment when it contains a dot, else `.m4a`.
fn voice_clip_filename(voice_url: &str) -> String {
    let tail = voice_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    match tail.rsplit_once('.') {
        Some((_, ext)) => format!("voice-clip.{ext}"),
        None => "voice-clip.m4a".to_string(),
    }
}

/// Truncate to `max` characters, replacing the tail with an ellipsis.
/// Counts Unicode scalars, not bytes.
fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max - 1).collect();
    truncated.push('…');
    truncated
}

fn nonempty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
