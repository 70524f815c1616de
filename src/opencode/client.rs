//! OpenCode HTTP 客户端
//!
//! - `GET  /session/{id}`          存活探测
//! - `POST /session`               创建 session
//! - `POST /session/{id}/message`  提交提示词（阻塞到 Agent 回复完成）
//! - `GET  /event`                 SSE 推送事件

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::json;

use super::backend::{AgentBackend, EventStream};
use super::types::{BackendEvent, SessionInfo};
use crate::{Error, Result};

/// OpenCode 客户端
#[derive(Debug, Clone)]
pub struct OpenCodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenCodeClient {
    /// 创建客户端（不发起任何请求）
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("OpenCode base URL 为空".to_string()));
        }

        // 不设置整体超时：事件流和提示词请求都是长连接
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 非 2xx 转为后端错误
    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(200).collect();
        Err(Error::Backend(format!("{}失败 ({}): {}", action, status, body)))
    }
}

#[async_trait]
impl AgentBackend for OpenCodeClient {
    async fn get_session(&self, id: &str) -> Result<SessionInfo> {
        let response = self
            .http
            .get(self.url(&format!("/session/{}", id)))
            .send()
            .await?;
        let response = Self::check(response, "查询 session ").await?;
        Ok(response.json().await?)
    }

    async fn create_session(&self, title: &str) -> Result<SessionInfo> {
        let response = self
            .http
            .post(self.url("/session"))
            .json(&json!({ "title": title }))
            .send()
            .await?;
        let response = Self::check(response, "创建 session ").await?;
        Ok(response.json().await?)
    }

    async fn send_prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()> {
        let body = json!({
            "agent": agent,
            "parts": [{ "type": "text", "text": text }],
        });
        tracing::debug!("📨 提交提示词: session={}, agent={}", session_id, agent);

        let response = self
            .http
            .post(self.url(&format!("/session/{}/message", session_id)))
            .json(&body)
            .send()
            .await?;
        Self::check(response, "提交提示词").await?;
        Ok(())
    }

    async fn stream_events(&self) -> Result<EventStream> {
        let response = self
            .http
            .get(self.url("/event"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response, "订阅事件").await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => Ok(BackendEvent::parse(&event.data).unwrap_or_else(|e| {
                    tracing::warn!("无法解析后端事件: {}", e);
                    BackendEvent::Unrecognized {
                        event_type: event.event,
                    }
                })),
                Err(e) => Err(Error::Stream(e.to_string())),
            });

        Ok(Box::pin(stream))
    }
}
