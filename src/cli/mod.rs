use clap::Parser;
use std::time::Duration;

use crate::controller::ModelDefaults;
use crate::models::registry::{ DEFAULT_LEFT_MODEL, DEFAULT_MODEL, DEFAULT_RIGHT_MODEL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat Backend Args ---
    /// Chat backend endpoint receiving `{message, model}` and answering `{reply}`.
    #[arg(long, env = "BACKEND_URL", default_value = "http://127.0.0.1:5000/chat")]
    pub backend_url: String,

    /// Optional request timeout in seconds for the chat backend. Unset means the transport default.
    #[arg(long, env = "BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: Option<u64>,

    /// Simulated latency in milliseconds for models without a real backend.
    #[arg(long, env = "MOCK_DELAY_MS", default_value = "600")]
    pub mock_delay_ms: u64,

    // --- Model Defaults ---
    /// Model used by direct conversations that have not selected one.
    #[arg(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Left-hand model of comparison conversations that have not selected one.
    #[arg(long, env = "DEFAULT_LEFT_MODEL", default_value = DEFAULT_LEFT_MODEL)]
    pub default_left_model: String,

    /// Right-hand model of comparison conversations that have not selected one.
    #[arg(long, env = "DEFAULT_RIGHT_MODEL", default_value = DEFAULT_RIGHT_MODEL)]
    pub default_right_model: String,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional port for the read-only HTTP API (/api/models, /api/health).
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_secs.map(Duration::from_secs)
    }

    pub fn model_defaults(&self) -> ModelDefaults {
        ModelDefaults {
            direct: self.default_model.clone(),
            left: self.default_left_model.clone(),
            right: self.default_right_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "ai-arena",
            "--backend-url",
            "http://backend:9000/chat",
            "--mock-delay-ms",
            "0",
            "--default-right-model",
            "claude-3",
            "--backend-timeout-secs",
            "30",
        ]).unwrap();

        assert_eq!(args.backend_url, "http://backend:9000/chat");
        assert_eq!(args.mock_delay(), Duration::ZERO);
        assert_eq!(args.backend_timeout(), Some(Duration::from_secs(30)));
        let defaults = args.model_defaults();
        assert_eq!(defaults.right, "claude-3");
        assert_eq!(defaults.left, DEFAULT_LEFT_MODEL);
    }
}
