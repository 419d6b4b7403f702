use chrono::Utc;
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "New conversation";
const TITLE_MAX_CHARS: usize = 40;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Direct,
    Comparison,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Direct => f.write_str("direct"),
            ChatMode::Comparison => f.write_str("comparison"),
        }
    }
}

impl FromStr for ChatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(ChatMode::Direct),
            "comparison" => Ok(ChatMode::Comparison),
            _ => Err(format!("Unsupported chat mode: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
            model_id: None,
            timestamp: now_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: content.into(),
            model_id: Some(model_id.into()),
            timestamp: now_millis(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonMessage {
    pub id: String,
    pub prompt: String,
    pub left: Option<ChatMessage>,
    pub right: Option<ChatMessage>,
    pub timestamp: i64,
}

impl ComparisonMessage {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            prompt: prompt.into(),
            left: None,
            right: None,
            timestamp: now_millis(),
        }
    }

    pub fn slot_mut(&mut self, side: Side) -> &mut Option<ChatMessage> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversationEntry {
    Message(ChatMessage),
    Comparison(ComparisonMessage),
}

impl ConversationEntry {
    pub fn id(&self) -> &str {
        match self {
            ConversationEntry::Message(m) => &m.id,
            ConversationEntry::Comparison(c) => &c.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub mode: ChatMode,
    pub messages: Vec<ConversationEntry>,
    pub selected_model: Option<String>,
    pub left_model: Option<String>,
    pub right_model: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Conversation {
    pub fn new(mode: ChatMode) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            title: DEFAULT_TITLE.to_string(),
            mode,
            messages: Vec::new(),
            selected_model: None,
            left_model: None,
            right_model: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends an entry, retitling the conversation after its first prompt.
    pub fn push(&mut self, entry: ConversationEntry) {
        if self.title == DEFAULT_TITLE {
            let prompt = match &entry {
                ConversationEntry::Message(m) if m.role == Role::User => Some(m.content.as_str()),
                ConversationEntry::Comparison(c) => Some(c.prompt.as_str()),
                _ => None,
            };
            if let Some(prompt) = prompt {
                self.title = title_from_prompt(prompt);
            }
        }
        self.messages.push(entry);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

pub fn title_from_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str("...");
    title
}
