//! Contract tests for the chat backend: request shape, reply parsing and the
//! way failures reach the conversation.

use ai_arena::controller::{ ChatController, ModelDefaults };
use ai_arena::llm::backend::{ ChatRequest, HttpChatBackend };
use ai_arena::llm::{ mock_reply, ChatBackend, ReplyError, ResponseFetcher, BACKEND_ERROR_REPLY };
use ai_arena::models::chat::{ ChatMode, ConversationEntry };
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{ body_json, header, method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

fn backend_for(server: &MockServer) -> HttpChatBackend {
    HttpChatBackend::new(Some(format!("{}/chat", server.uri())), None).unwrap()
}

fn controller_for(server: &MockServer) -> ChatController {
    let fetcher = ResponseFetcher::new(Arc::new(backend_for(server)), Duration::from_millis(10));
    ChatController::new(fetcher, ModelDefaults::default())
}

#[tokio::test]
async fn direct_send_posts_message_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "message": "Hello", "model": "gemini-1.5-pro" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "Hi from Gemini" })))
        .expect(1)
        .mount(&server).await;

    let controller = controller_for(&server);
    controller.set_selected_model("gemini-1.5-pro").await.unwrap();
    let reply = controller.send_direct("Hello").await.unwrap();

    assert_eq!(reply.content, "Hi from Gemini");
    assert_eq!(reply.model_id.as_deref(), Some("gemini-1.5-pro"));
    let conversation = controller.active_conversation().await.unwrap();
    assert_eq!(conversation.messages.len(), 2);
}

#[tokio::test]
async fn comparison_calls_backend_only_for_remote_side() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({ "message": "Explain Rust", "model": "grok-3-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "Grok says hi" })))
        .expect(1)
        .mount(&server).await;

    let controller = controller_for(&server);
    controller.create_conversation(ChatMode::Comparison).await;
    controller.set_comparison_models(Some("gpt-4"), Some("grok-3-mini")).await.unwrap();

    let message = controller.send_comparison("Explain Rust").await.unwrap();

    assert_eq!(message.left.as_ref().map(|m| m.content.clone()), Some(mock_reply("gpt-4")));
    assert_eq!(message.right.as_ref().map(|m| m.content.as_str()), Some("Grok says hi"));
    let conversation = controller.active_conversation().await.unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert!(matches!(&conversation.messages[0], ConversationEntry::Comparison(c) if c.id == message.id));
}

#[tokio::test]
async fn non_success_status_keeps_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "reply": "model offline" })))
        .mount(&server).await;

    let backend = backend_for(&server);
    let request = ChatRequest {
        message: "Hello".to_string(),
        model: "llama3.1".to_string(),
    };

    assert_eq!(
        backend.send(&request).await,
        Err(ReplyError::Http { status: 500, detail: Some("model offline".to_string()) })
    );
}

#[tokio::test]
async fn non_success_status_becomes_constant_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server).await;

    let fetcher = ResponseFetcher::new(Arc::new(backend_for(&server)), Duration::ZERO);

    assert_eq!(
        fetcher.try_fetch_reply("Hello", "deepseek-r1").await,
        Err(ReplyError::Http { status: 503, detail: None })
    );
    assert_eq!(fetcher.fetch_reply("Hello", "deepseek-r1").await, BACKEND_ERROR_REPLY);
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "wrong field" })))
        .mount(&server).await;

    let fetcher = ResponseFetcher::new(Arc::new(backend_for(&server)), Duration::ZERO);

    let result = fetcher.try_fetch_reply("Hello", "grok-3-mini").await;
    assert!(matches!(result, Err(ReplyError::Parse(_))), "got {:?}", result);
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{}/chat", port);

    let backend = HttpChatBackend::new(Some(url), Some(Duration::from_secs(2))).unwrap();
    let fetcher = ResponseFetcher::new(Arc::new(backend), Duration::ZERO);

    let result = fetcher.try_fetch_reply("Hello", "grok-3-mini").await;
    assert!(matches!(result, Err(ReplyError::Network(_))), "got {:?}", result);
}

#[tokio::test]
async fn mock_models_never_reach_the_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "unexpected" })))
        .expect(0)
        .mount(&server).await;

    let controller = controller_for(&server);
    controller.set_selected_model("claude-3").await.unwrap();
    let reply = controller.send_direct("Hello").await.unwrap();

    assert!(reply.content.contains("claude-3"));
}
