use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use std::time::Duration;

use super::{ ChatBackend, ReplyError };

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/chat";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    reply: Option<String>,
}

/// Talks to the chat backend: one `POST {message, model}` per reply.
pub struct HttpChatBackend {
    http: HttpClient,
    url: String,
}

impl HttpChatBackend {
    pub fn new(
        url: Option<String>,
        timeout: Option<Duration>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let url = url.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = HttpClient::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<String, ReplyError> {
        debug!("POST {} (model={})", self.url, request.model);

        let resp = self.http
            .post(&self.url)
            .json(request)
            .send().await
            .map_err(|e| ReplyError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ReplyError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json
                ::from_str::<ErrorReply>(&body)
                .ok()
                .and_then(|r| r.reply);
            return Err(ReplyError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json
            ::from_str::<ChatReply>(&body)
            .map(|r| r.reply)
            .map_err(|e| ReplyError::Parse(e.to_string()))
    }
}
