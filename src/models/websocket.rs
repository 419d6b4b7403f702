use serde::{ Serialize, Deserialize };

use super::chat::{ ChatMode, Conversation };
use super::registry::Model;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "create_conversation")] CreateConversation {
        mode: ChatMode,
    },
    #[serde(rename = "select_conversation")] SelectConversation {
        id: String,
    },
    #[serde(rename = "delete_conversation")] DeleteConversation {
        id: String,
    },
    #[serde(rename = "set_mode")] SetMode {
        mode: ChatMode,
    },
    #[serde(rename = "set_model")] SetModel {
        model: String,
    },
    #[serde(rename = "set_comparison_models")] SetComparisonModels {
        #[serde(default)]
        left: Option<String>,
        #[serde(default)]
        right: Option<String>,
    },
    #[serde(rename = "list_models")]
    ListModels,
    #[serde(rename = "list_conversations")]
    ListConversations,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "processing")] Processing {
        conversation_id: Option<String>,
    },
    #[serde(rename = "conversation")] Conversation {
        conversation: Conversation,
    },
    #[serde(rename = "conversations")] Conversations {
        conversations: Vec<Conversation>,
        active_id: Option<String>,
    },
    #[serde(rename = "models")] Models {
        models: Vec<Model>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comparison_model_update_with_one_side() {
        let msg: ClientMessage = serde_json
            ::from_str(r#"{"type":"set_comparison_models","right":"claude-3"}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::SetComparisonModels {
            left: None,
            right: Some("claude-3".to_string()),
        });
    }

    #[test]
    fn parses_unit_requests() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"list_models"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ListModels);
        let msg: ClientMessage = serde_json
            ::from_str(r#"{"type":"create_conversation","mode":"comparison"}"#)
            .unwrap();
        assert_eq!(msg, ClientMessage::CreateConversation { mode: ChatMode::Comparison });
    }

    #[test]
    fn error_message_is_tagged() {
        let json = serde_json
            ::to_string(&(ServerMessage::Error { message: "boom".to_string() }))
            .unwrap();
        assert_eq!(json, r#"{"type":"error","message":"boom"}"#);
    }
}
