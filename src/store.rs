use log::info;
use thiserror::Error;

use crate::models::chat::{
    ChatMessage,
    ChatMode,
    ComparisonMessage,
    Conversation,
    ConversationEntry,
    Side,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),
    #[error("message '{message_id}' not found in conversation '{conversation_id}'")]
    MessageNotFound {
        conversation_id: String,
        message_id: String,
    },
    #[error("message '{0}' is not a comparison message")]
    NotComparison(String),
}

/// In-memory conversations for one chat session, newest first, with at most
/// one of them active.
#[derive(Debug, Default)]
pub struct ChatStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation, StoreError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    /// Creates a conversation and makes it the active one.
    pub fn create_conversation(&mut self, mode: ChatMode) -> String {
        let conversation = Conversation::new(mode);
        let id = conversation.id.clone();
        info!("Created {} conversation {}", mode, id);
        self.conversations.insert(0, conversation);
        self.active_id = Some(id.clone());
        id
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), StoreError> {
        if self.get(id).is_none() {
            return Err(StoreError::ConversationNotFound(id.to_string()));
        }
        self.active_id = Some(id.to_string());
        Ok(())
    }

    /// Removes a conversation. Deleting the active one hands activity to the
    /// newest remaining conversation.
    pub fn delete_conversation(&mut self, id: &str) -> Result<Conversation, StoreError> {
        let pos = self.conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        let removed = self.conversations.remove(pos);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.conversations.first().map(|c| c.id.clone());
        }
        info!("Deleted conversation {}", id);
        Ok(removed)
    }

    pub fn add_message(
        &mut self,
        conversation_id: &str,
        message: ChatMessage
    ) -> Result<ChatMessage, StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        conversation.push(ConversationEntry::Message(message.clone()));
        Ok(message)
    }

    pub fn add_comparison_message(
        &mut self,
        conversation_id: &str,
        prompt: &str
    ) -> Result<ComparisonMessage, StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        let message = ComparisonMessage::new(prompt);
        conversation.push(ConversationEntry::Comparison(message.clone()));
        Ok(message)
    }

    /// Fills one slot of a comparison message, leaving the other untouched.
    pub fn update_comparison_response(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        side: Side,
        response: ChatMessage
    ) -> Result<(), StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        let entry = conversation.messages
            .iter_mut()
            .find(|entry| entry.id() == message_id)
            .ok_or_else(|| StoreError::MessageNotFound {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
            })?;
        match entry {
            ConversationEntry::Comparison(comparison) => {
                *comparison.slot_mut(side) = Some(response);
            }
            ConversationEntry::Message(_) => {
                return Err(StoreError::NotComparison(message_id.to_string()));
            }
        }
        conversation.touch();
        Ok(())
    }

    pub fn comparison_message(
        &self,
        conversation_id: &str,
        message_id: &str
    ) -> Option<&ComparisonMessage> {
        self.get(conversation_id)?.messages.iter().find_map(|entry| match entry {
            ConversationEntry::Comparison(c) if c.id == message_id => Some(c),
            _ => None,
        })
    }

    pub fn set_mode(&mut self, conversation_id: &str, mode: ChatMode) -> Result<(), StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        conversation.mode = mode;
        conversation.touch();
        Ok(())
    }

    pub fn set_selected_model(
        &mut self,
        conversation_id: &str,
        model_id: &str
    ) -> Result<(), StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        conversation.selected_model = Some(model_id.to_string());
        conversation.touch();
        Ok(())
    }

    /// `None` keeps the side's current model.
    pub fn set_comparison_models(
        &mut self,
        conversation_id: &str,
        left: Option<&str>,
        right: Option<&str>
    ) -> Result<(), StoreError> {
        let conversation = self.get_mut(conversation_id)?;
        if let Some(left) = left {
            conversation.left_model = Some(left.to_string());
        }
        if let Some(right) = right {
            conversation.right_model = Some(right.to_string());
        }
        conversation.touch();
        Ok(())
    }
}
