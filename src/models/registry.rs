use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "grok-3-mini";
pub const DEFAULT_LEFT_MODEL: &str = "grok-3-mini";
pub const DEFAULT_RIGHT_MODEL: &str = "gemini-1.5-pro";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Provider {
    Groq,
    Local,
    Google,
    OpenAI,
    OpenRouter,
    Anthropic,
}

impl Provider {
    /// Providers whose models are answered by the chat backend. Everything
    /// else gets a mock reply.
    pub fn is_backend_served(self) -> bool {
        matches!(self, Provider::Groq | Provider::Google | Provider::OpenRouter | Provider::Local)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::Local => "Local",
            Provider::Google => "Google",
            Provider::OpenAI => "OpenAI",
            Provider::OpenRouter => "OpenRouter",
            Provider::Anthropic => "Anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseProviderError {
    message: String,
}

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseProviderError {}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "local" => Ok(Provider::Local),
            "google" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAI),
            "openrouter" => Ok(Provider::OpenRouter),
            "anthropic" => Ok(Provider::Anthropic),
            _ =>
                Err(ParseProviderError {
                    message: format!("Invalid provider: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: Provider,
    pub description: &'static str,
}

pub static AVAILABLE_MODELS: [Model; 7] = [
    Model {
        id: "grok-3-mini",
        name: "GROK 3",
        provider: Provider::Groq,
        description: "Fast open model",
    },
    Model {
        id: "llama3.1",
        name: "Llama 3.1",
        provider: Provider::Local,
        description: "Local LLM (running on your machine)",
    },
    Model {
        id: "gemini-1.5-pro",
        name: "Gemini Pro",
        provider: Provider::Google,
        description: "More powerful Gemini model",
    },
    Model {
        id: "gpt-4",
        name: "GPT-4",
        provider: Provider::OpenAI,
        description: "Most capable GPT model",
    },
    Model {
        id: "gpt-4.1",
        name: "GPT-4.1",
        provider: Provider::OpenAI,
        description: "Latest GPT-4 iteration",
    },
    Model {
        id: "deepseek-r1",
        name: "DeepSeek R1",
        provider: Provider::OpenRouter,
        description: "Reasoning model (via OpenRouter)",
    },
    Model {
        id: "claude-3",
        name: "Claude 3",
        provider: Provider::Anthropic,
        description: "Advanced reasoning model",
    },
];

pub fn all() -> &'static [Model] {
    &AVAILABLE_MODELS
}

pub fn lookup(id: &str) -> Option<&'static Model> {
    AVAILABLE_MODELS.iter().find(|m| m.id == id)
}

/// Unknown ids are never remote.
pub fn is_remote(id: &str) -> bool {
    lookup(id).map_or(false, |m| m.provider.is_backend_served())
}
