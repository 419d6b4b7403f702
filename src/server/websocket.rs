use crate::controller::{ ChatController, SendOutcome };
use crate::models::registry;
use crate::models::websocket::{ ClientMessage, ServerMessage };

use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use std::net::SocketAddr;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn frame(msg: &ServerMessage) -> Message {
    match serde_json::to_string(msg) {
        Ok(json) => Message::Text(json),
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            Message::Text(r#"{"type":"error","message":"Internal serialization error"}"#.to_string())
        }
    }
}

fn error_message(message: impl ToString) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

async fn conversation_snapshot(controller: &ChatController, id: &str) -> ServerMessage {
    match controller.conversation(id).await {
        Some(conversation) => ServerMessage::Conversation { conversation },
        None => error_message(format!("conversation '{}' not found", id)),
    }
}

async fn conversation_list(controller: &ChatController) -> ServerMessage {
    ServerMessage::Conversations {
        conversations: controller.conversations().await,
        active_id: controller.active_id().await,
    }
}

/// Applies one client request to the session and builds the reply frame.
pub async fn handle_client_message(
    controller: &ChatController,
    request: ClientMessage
) -> ServerMessage {
    match request {
        ClientMessage::Chat { content } => {
            match controller.send(&content).await {
                Ok(outcome) => {
                    if let SendOutcome::Comparison(comparison) = &outcome {
                        if !comparison.is_complete() {
                            warn!("Comparison {} finished with an empty slot", comparison.id);
                        }
                    }
                    info!("Stored reply entry {}", outcome.conversation_entry_id());
                    match controller.active_conversation().await {
                        Some(conversation) => ServerMessage::Conversation { conversation },
                        None => error_message("active conversation was deleted"),
                    }
                }
                Err(e) => error_message(format!("Error processing message: {}", e)),
            }
        }
        ClientMessage::CreateConversation { mode } => {
            let id = controller.create_conversation(mode).await;
            conversation_snapshot(controller, &id).await
        }
        ClientMessage::SelectConversation { id } => {
            match controller.select_conversation(&id).await {
                Ok(()) => conversation_snapshot(controller, &id).await,
                Err(e) => error_message(e),
            }
        }
        ClientMessage::DeleteConversation { id } => {
            match controller.delete_conversation(&id).await {
                Ok(()) => conversation_list(controller).await,
                Err(e) => error_message(e),
            }
        }
        ClientMessage::SetMode { mode } => {
            match controller.set_mode(mode).await {
                Ok(id) => conversation_snapshot(controller, &id).await,
                Err(e) => error_message(e),
            }
        }
        ClientMessage::SetModel { model } => {
            match controller.set_selected_model(&model).await {
                Ok(id) => conversation_snapshot(controller, &id).await,
                Err(e) => error_message(e),
            }
        }
        ClientMessage::SetComparisonModels { left, right } => {
            match controller.set_comparison_models(left.as_deref(), right.as_deref()).await {
                Ok(id) => conversation_snapshot(controller, &id).await,
                Err(e) => error_message(e),
            }
        }
        ClientMessage::ListModels =>
            ServerMessage::Models {
                models: registry::all().to_vec(),
            },
        ClientMessage::ListConversations => conversation_list(controller).await,
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    controller: ChatController
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);
    let (mut tx, mut rx) = websocket.split();

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    if tx.send(frame(&error_message("Message too large"))).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => {
                        let request = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(request) => request,
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let reply = error_message(format!("Failed to parse message: {}", e));
                                if let Err(e) = tx.send(frame(&reply)).await {
                                    error!("Error sending parse error to {}: {}", peer, e);
                                    break;
                                }
                                continue;
                            }
                        };

                        if let ClientMessage::Chat { .. } = request {
                            let processing = ServerMessage::Processing {
                                conversation_id: controller.active_id().await,
                            };
                            if let Err(e) = tx.send(frame(&processing)).await {
                                error!("Error sending processing status to {}: {}", peer, e);
                                break;
                            }
                        }

                        let reply = handle_client_message(&controller, request).await;
                        if let ServerMessage::Error { message } = &reply {
                            warn!("Request from {} failed: {}", peer, message);
                        }
                        if let Err(e) = tx.send(frame(&reply)).await {
                            error!("Error sending message to {}: {}", peer, e);
                            break;
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    tokio_tungstenite::tungstenite::Error::Capacity(ref cap_err) => {
                        error!("WebSocket capacity error for {}: {}", peer, cap_err);
                        let _ = tx.send(frame(&error_message("Server capacity error"))).await;
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!(
        "WebSocket connection closed for {} ({} conversations in session)",
        peer,
        controller.conversations().await.len()
    );
}
