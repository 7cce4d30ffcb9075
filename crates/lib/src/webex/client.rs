//! Webex REST client (https://webexapis.com/v1 by default): bearer auth, JSON resources,
//! multipart message posts, and streamed attachment downloads.

use crate::webex::event::{Membership, MessageBody, MessageDetail, Person, Room};
use crate::webex::platform::{AttachmentMeta, Download, OutgoingMessage, Platform, WebexError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_LENGTH, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_API_BASE: &str = "https://webexapis.com/v1";

/// Page size for GET /rooms; 100 is the API maximum and no further pages are fetched.
const ROOM_PAGE_LIMIT: &str = "100";

/// Used when a 423 arrives without a parseable retry-after (Webex normally sends 5).
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Downloads of large attachments outlive the regular request timeout.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Client for the Webex REST API, authenticated as the bot.
#[derive(Clone)]
pub struct WebexClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl WebexClient {
    pub fn new(
        api_base: Option<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WebexError> {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base,
            token: token.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WebexError> {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        let res = ensure_success(res).await?;
        Ok(res.json().await?)
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, WebexError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(WebexError::Api { status, body })
}

fn parse_retry_after(headers: &HeaderMap) -> Duration {
    let secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

fn meta_from_headers(headers: &HeaderMap) -> AttachmentMeta {
    AttachmentMeta {
        size_bytes: headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()),
        content_disposition: headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

#[async_trait]
impl Platform for WebexClient {
    async fn person(&self, id: &str) -> Result<Person, WebexError> {
        self.get_json(&format!("people/{}", id), &[]).await
    }

    async fn room(&self, id: &str) -> Result<Room, WebexError> {
        self.get_json(&format!("rooms/{}", id), &[]).await
    }

    async fn group_rooms(&self) -> Result<Vec<Room>, WebexError> {
        let page: Items<Room> = self
            .get_json("rooms", &[("type", "group"), ("max", ROOM_PAGE_LIMIT)])
            .await?;
        Ok(page.items)
    }

    async fn member_emails(&self, room_id: &str) -> Result<Vec<String>, WebexError> {
        let page: Items<Membership> = self
            .get_json("memberships", &[("roomId", room_id)])
            .await?;
        Ok(page.items.into_iter().map(|m| m.person_email).collect())
    }

    async fn message_body(&self, message_id: &str) -> Result<MessageBody, WebexError> {
        let detail: MessageDetail = self
            .get_json(&format!("messages/{}", message_id), &[])
            .await?;
        Ok(detail.into_body())
    }

    async fn send_message(&self, message: OutgoingMessage<'_>) -> Result<(), WebexError> {
        let req = self.client.post(self.url("messages")).bearer_auth(&self.token);
        let req = match message.file {
            Some(path) => {
                let file = tokio::fs::File::open(path).await?;
                let length = file.metadata().await?.len();
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                let mut form = Form::new()
                    .text("roomId", message.room_id.to_string())
                    .text("markdown", message.markdown.to_string());
                if let Some(parent) = message.parent_id {
                    form = form.text("parentId", parent.to_string());
                }
                let part = Part::stream_with_length(reqwest::Body::from(file), length)
                    .file_name(file_name);
                req.multipart(form.part("files", part))
            }
            None => {
                let mut body = serde_json::json!({
                    "roomId": message.room_id,
                    "markdown": message.markdown,
                });
                if let Some(parent) = message.parent_id {
                    body["parentId"] = serde_json::Value::String(parent.to_string());
                }
                req.json(&body)
            }
        };
        ensure_success(req.send().await?).await?;
        Ok(())
    }

    async fn head_attachment(&self, url: &str) -> Result<AttachmentMeta, WebexError> {
        let res = self.client.head(url).bearer_auth(&self.token).send().await?;
        let res = ensure_success(res).await?;
        Ok(meta_from_headers(res.headers()))
    }

    async fn download_attachment(&self, url: &str, dest: &Path) -> Result<Download, WebexError> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await?;
        if res.status() == StatusCode::LOCKED {
            return Ok(Download::Locked {
                retry_after: parse_retry_after(res.headers()),
            });
        }
        let res = ensure_success(res).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = res.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(Download::Saved { bytes: written })
    }
}
