pub mod backend;

use async_trait::async_trait;
use log::{ error, info };
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::registry;
use self::backend::ChatRequest;

/// What the user sees when the backend could not produce a reply.
pub const BACKEND_ERROR_REPLY: &str = "❌ Backend error";
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("backend request failed: {0}")]
    Network(String),
    #[error("backend returned HTTP {status}: {}", .detail.as_deref().unwrap_or("Backend error"))]
    Http {
        status: u16,
        detail: Option<String>,
    },
    #[error("malformed backend response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, ReplyError>;
}

pub fn mock_reply(model_id: &str) -> String {
    format!("[Mock Response]\nModel \"{}\" is not connected to a real API yet.", model_id)
}

/// Routes a prompt to the backend or the mock generator depending on the
/// model's provider.
#[derive(Clone)]
pub struct ResponseFetcher {
    backend: Arc<dyn ChatBackend>,
    mock_delay: Duration,
}

impl ResponseFetcher {
    pub fn new(backend: Arc<dyn ChatBackend>, mock_delay: Duration) -> Self {
        Self { backend, mock_delay }
    }

    pub async fn try_fetch_reply(&self, content: &str, model_id: &str) -> Result<String, ReplyError> {
        if !registry::is_remote(model_id) {
            tokio::time::sleep(self.mock_delay).await;
            return Ok(mock_reply(model_id));
        }

        let request = ChatRequest {
            message: content.to_string(),
            model: model_id.to_string(),
        };
        let reply = self.backend.send(&request).await?;
        info!("Backend replied for model {} ({} chars)", model_id, reply.len());
        Ok(reply)
    }

    /// Never fails: backend errors are logged and replaced by
    /// [`BACKEND_ERROR_REPLY`].
    pub async fn fetch_reply(&self, content: &str, model_id: &str) -> String {
        match self.try_fetch_reply(content, model_id).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Reply for model {} failed: {}", model_id, e);
                BACKEND_ERROR_REPLY.to_string()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn mock_models_never_touch_the_backend() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let fetcher = ResponseFetcher::new(backend.clone(), Duration::from_millis(20));

        let started = Instant::now();
        let reply = fetcher.fetch_reply("Hello", "claude-3").await;

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(reply.contains("claude-3"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_models_are_mocked() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let fetcher = ResponseFetcher::new(backend.clone(), Duration::ZERO);

        let reply = fetcher.fetch_reply("Hello", "not-a-model").await;

        assert_eq!(reply, mock_reply("not-a-model"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_models_forward_message_and_model() {
        let backend = Arc::new(ScriptedBackend::replying("Hi!"));
        let fetcher = ResponseFetcher::new(backend.clone(), Duration::ZERO);

        let reply = fetcher.fetch_reply("Hello", "gemini-1.5-pro").await;

        assert_eq!(reply, "Hi!");
        assert_eq!(backend.calls(), vec![ChatRequest {
            message: "Hello".to_string(),
            model: "gemini-1.5-pro".to_string(),
        }]);
    }

    #[tokio::test]
    async fn http_failure_becomes_constant_reply() {
        let err = ReplyError::Http { status: 500, detail: Some("model offline".to_string()) };
        let backend = Arc::new(ScriptedBackend::failing(err.clone()));
        let fetcher = ResponseFetcher::new(backend, Duration::ZERO);

        assert_eq!(fetcher.try_fetch_reply("Hello", "grok-3-mini").await, Err(err));
        assert_eq!(fetcher.fetch_reply("Hello", "grok-3-mini").await, BACKEND_ERROR_REPLY);
    }

    #[test]
    fn http_error_display_falls_back_to_generic_detail() {
        let err = ReplyError::Http { status: 502, detail: None };
        assert_eq!(err.to_string(), "backend returned HTTP 502: Backend error");
    }
}
