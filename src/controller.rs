use log::{ info, warn };
use std::collections::HashSet;
use std::sync::{ Arc, Mutex as StdMutex };
use thiserror::Error;
use tokio::sync::Mutex;

use crate::llm::ResponseFetcher;
use crate::models::chat::{ ChatMessage, ChatMode, ComparisonMessage, Conversation, Side };
use crate::models::registry::{ self, DEFAULT_LEFT_MODEL, DEFAULT_MODEL, DEFAULT_RIGHT_MODEL };
use crate::store::{ ChatStore, StoreError };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("conversation '{0}' is still waiting for a reply")]
    Busy(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Models used when a conversation has not picked its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub direct: String,
    pub left: String,
    pub right: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            direct: DEFAULT_MODEL.to_string(),
            left: DEFAULT_LEFT_MODEL.to_string(),
            right: DEFAULT_RIGHT_MODEL.to_string(),
        }
    }
}

impl ModelDefaults {
    pub fn validate(&self) -> Result<(), ControllerError> {
        for id in [&self.direct, &self.left, &self.right] {
            ensure_known_model(id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Direct(ChatMessage),
    Comparison(ComparisonMessage),
}

impl SendOutcome {
    pub fn conversation_entry_id(&self) -> &str {
        match self {
            SendOutcome::Direct(m) => &m.id,
            SendOutcome::Comparison(c) => &c.id,
        }
    }
}

type InFlightSet = Arc<StdMutex<HashSet<String>>>;

/// Marks a conversation as waiting for a reply until dropped.
struct InFlightGuard {
    set: InFlightSet,
    conversation_id: String,
}

impl InFlightGuard {
    fn claim(set: &InFlightSet, conversation_id: &str) -> Result<Self, ControllerError> {
        let mut in_flight = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(conversation_id.to_string()) {
            return Err(ControllerError::Busy(conversation_id.to_string()));
        }
        Ok(Self {
            set: Arc::clone(set),
            conversation_id: conversation_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.conversation_id);
    }
}

fn ensure_known_model(model_id: &str) -> Result<(), ControllerError> {
    if registry::lookup(model_id).is_none() {
        return Err(ControllerError::UnknownModel(model_id.to_string()));
    }
    Ok(())
}

fn ensure_conversation(store: &mut ChatStore) -> String {
    match store.active_id() {
        Some(id) => id.to_string(),
        None => store.create_conversation(ChatMode::Direct),
    }
}

/// The only writer of a session's [`ChatStore`]. The store lock is never held
/// while a reply is being fetched.
#[derive(Clone)]
pub struct ChatController {
    store: Arc<Mutex<ChatStore>>,
    fetcher: ResponseFetcher,
    in_flight: InFlightSet,
    defaults: ModelDefaults,
}

impl ChatController {
    pub fn new(fetcher: ResponseFetcher, defaults: ModelDefaults) -> Self {
        Self {
            store: Arc::new(Mutex::new(ChatStore::new())),
            fetcher,
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
            defaults,
        }
    }

    pub fn defaults(&self) -> &ModelDefaults {
        &self.defaults
    }

    /// Sends to the active conversation in whatever mode it is in.
    pub async fn send(&self, content: &str) -> Result<SendOutcome, ControllerError> {
        let mode = {
            let store = self.store.lock().await;
            store.active().map(|c| c.mode).unwrap_or_default()
        };
        match mode {
            ChatMode::Direct => self.send_direct(content).await.map(SendOutcome::Direct),
            ChatMode::Comparison => self.send_comparison(content).await.map(SendOutcome::Comparison),
        }
    }

    /// Appends the user message, waits for one reply and appends it.
    /// Returns the assistant message.
    pub async fn send_direct(&self, content: &str) -> Result<ChatMessage, ControllerError> {
        if content.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let (conversation_id, model_id, _guard) = {
            let mut store = self.store.lock().await;
            let conversation_id = ensure_conversation(&mut store);
            let guard = InFlightGuard::claim(&self.in_flight, &conversation_id)?;
            store.add_message(&conversation_id, ChatMessage::user(content))?;
            let model_id = store
                .get(&conversation_id)
                .and_then(|c| c.selected_model.clone())
                .unwrap_or_else(|| self.defaults.direct.clone());
            (conversation_id, model_id, guard)
        };

        info!("Direct send in {} using {}", conversation_id, model_id);
        let reply = self.fetcher.fetch_reply(content, &model_id).await;

        let mut store = self.store.lock().await;
        let message = store
            .add_message(&conversation_id, ChatMessage::assistant(reply, model_id))
            .map_err(|e| {
                warn!("Dropping reply for {}: {}", conversation_id, e);
                e
            })?;
        Ok(message)
    }

    /// Queries the left and right models concurrently and fills both slots of
    /// a new comparison message.
    pub async fn send_comparison(&self, content: &str) -> Result<ComparisonMessage, ControllerError> {
        if content.trim().is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let (conversation_id, message_id, left_model, right_model, _guard) = {
            let mut store = self.store.lock().await;
            let conversation_id = ensure_conversation(&mut store);
            let guard = InFlightGuard::claim(&self.in_flight, &conversation_id)?;
            let (left_model, right_model) = {
                let conversation = store.get(&conversation_id);
                (
                    conversation
                        .and_then(|c| c.left_model.clone())
                        .unwrap_or_else(|| self.defaults.left.clone()),
                    conversation
                        .and_then(|c| c.right_model.clone())
                        .unwrap_or_else(|| self.defaults.right.clone()),
                )
            };
            let message = store.add_comparison_message(&conversation_id, content)?;
            (conversation_id, message.id, left_model, right_model, guard)
        };

        info!(
            "Comparison send in {} using {} vs {}",
            conversation_id,
            left_model,
            right_model
        );
        let (left_reply, right_reply) = tokio::join!(
            self.fetcher.fetch_reply(content, &left_model),
            self.fetcher.fetch_reply(content, &right_model)
        );

        let mut store = self.store.lock().await;
        store.update_comparison_response(
            &conversation_id,
            &message_id,
            Side::Left,
            ChatMessage::assistant(left_reply, left_model)
        )?;
        store.update_comparison_response(
            &conversation_id,
            &message_id,
            Side::Right,
            ChatMessage::assistant(right_reply, right_model)
        )?;

        store
            .comparison_message(&conversation_id, &message_id)
            .cloned()
            .ok_or_else(|| {
                ControllerError::Store(StoreError::MessageNotFound {
                    conversation_id: conversation_id.clone(),
                    message_id: message_id.clone(),
                })
            })
    }

    pub async fn create_conversation(&self, mode: ChatMode) -> String {
        self.store.lock().await.create_conversation(mode)
    }

    pub async fn select_conversation(&self, id: &str) -> Result<(), ControllerError> {
        self.store.lock().await.set_active(id)?;
        Ok(())
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), ControllerError> {
        let removed = self.store.lock().await.delete_conversation(id)?;
        info!(
            "Removed '{}' ({} entries, {} mode)",
            removed.title,
            removed.messages.len(),
            removed.mode
        );
        Ok(())
    }

    /// Returns the id of the conversation that was changed.
    pub async fn set_mode(&self, mode: ChatMode) -> Result<String, ControllerError> {
        let mut store = self.store.lock().await;
        let id = ensure_conversation(&mut store);
        store.set_mode(&id, mode)?;
        Ok(id)
    }

    pub async fn set_selected_model(&self, model_id: &str) -> Result<String, ControllerError> {
        ensure_known_model(model_id)?;
        let mut store = self.store.lock().await;
        let id = ensure_conversation(&mut store);
        store.set_selected_model(&id, model_id)?;
        Ok(id)
    }

    pub async fn set_comparison_models(
        &self,
        left: Option<&str>,
        right: Option<&str>
    ) -> Result<String, ControllerError> {
        for model_id in [left, right].into_iter().flatten() {
            ensure_known_model(model_id)?;
        }
        let mut store = self.store.lock().await;
        let id = ensure_conversation(&mut store);
        store.set_comparison_models(&id, left, right)?;
        Ok(id)
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.store.lock().await.conversations().to_vec()
    }

    pub async fn conversation(&self, id: &str) -> Option<Conversation> {
        self.store.lock().await.get(id).cloned()
    }

    pub async fn active_conversation(&self) -> Option<Conversation> {
        self.store.lock().await.active().cloned()
    }

    pub async fn active_id(&self) -> Option<String> {
        self.store.lock().await.active_id().map(str::to_string)
    }

    pub fn is_in_flight(&self, conversation_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(conversation_id)
    }

    /// True while any send of this session is waiting for a reply.
    pub fn is_loading(&self) -> bool {
        !self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}
