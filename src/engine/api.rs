// ── Kaiwa Engine: Backend Client ───────────────────────────────────────────
// Thin wrapper over one shared `reqwest::Client` for the Dify-proxy
// endpoints. Non-success statuses become `ClientError::Api`, carrying the
// backend's JSON `{error}` body when it sent one.
//
// The client has a connect timeout but no read timeout: the chat stream
// stays open for as long as the server keeps sending.

use crate::atoms::constants::{
    ANALYSIS_PATH, CHAT_STREAM_PATH, CONNECT_TIMEOUT_SECS, CONVERSATIONS_PATH, DIFY_APPS_PATH,
};
use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::{
    truncate_utf8, ChatStreamRequest, Conversation, ConversationSummary, DifyApp,
};
use log::info;
use reqwest::{Client, Response};
use std::time::Duration;

#[derive(Clone)]
pub struct Backend {
    client: Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Backend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The response-analysis page for a finished message. Kaiwa only prints
    /// this URL — the page itself is out of scope.
    pub fn analysis_url(&self, message_id: &str) -> String {
        format!("{}{}/{}", self.base_url, ANALYSIS_PATH, message_id)
    }

    // ── Conversations ──────────────────────────────────────────────────────

    pub async fn conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        let resp = self.client.get(self.url(CONVERSATIONS_PATH)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn conversation(&self, id: &str) -> ClientResult<Conversation> {
        let url = format!("{}/{}", self.url(CONVERSATIONS_PATH), id);
        let resp = self.client.get(url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete_conversation(&self, id: &str) -> ClientResult<()> {
        let url = format!("{}/{}", self.url(CONVERSATIONS_PATH), id);
        let resp = self.client.delete(url).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    // ── Apps ───────────────────────────────────────────────────────────────

    pub async fn dify_apps(&self) -> ClientResult<Vec<DifyApp>> {
        let resp = self.client.get(self.url(DIFY_APPS_PATH)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    // ── Chat stream ────────────────────────────────────────────────────────

    /// Open the streaming chat request. The returned response's byte stream
    /// is consumed by the chat component; a non-success initial status is a
    /// terminal failure here, never a stream.
    pub async fn open_chat_stream(&self, request: &ChatStreamRequest) -> ClientResult<Response> {
        info!(
            "[api] POST {} app={} conversation={:?}",
            CHAT_STREAM_PATH, request.dify_app_id, request.conversation_id
        );
        let resp = self
            .client
            .post(self.url(CHAT_STREAM_PATH))
            .json(request)
            .send()
            .await?;
        Self::check(resp).await
    }

    // ── Status handling ────────────────────────────────────────────────────

    async fn check(resp: Response) -> ClientResult<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::api(status, error_message_from_body(&body)))
    }
}

/// Pull the `{error}` field out of an error body, falling back to the raw
/// (truncated) text.
fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| truncate_utf8(body, 200).to_string())
}

// ── Tests ──────────────────────────────────────────────────────────────────
