//! Configuration management for agentport.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. API key for the reasoning provider.
//! - `DEFAULT_MODEL` - Optional. The default LLM model to use.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `AGENT_NAME` - Optional. Name advertised on the agent card.
//! - `AGENT_DESCRIPTION` - Optional. Description advertised on the agent card.
//! - `AGENT_URL` - Optional. Externally reachable base URL for the card;
//!   defaults to `http://{host}:{port}/`.
//! - `PUSH_NOTIFICATIONS` - Optional. Enable terminal-event webhooks
//!   (`true`/`false`). Defaults to `false`.
//! - `STREAM_BUFFER_EVENTS` - Optional. Per-subscriber event backlog before
//!   a slow consumer is disconnected. Defaults to `1024`.
//! - `STREAM_RETENTION_SECS` - Optional. How long a finished task's event
//!   buffer is kept for late subscribers. Defaults to `30`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Reasoning-provider API key
    pub api_key: String,

    /// Default LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Name advertised on the agent card
    pub agent_name: String,

    /// Description advertised on the agent card
    pub agent_description: String,

    /// Externally reachable base URL override for the agent card
    pub agent_url: Option<String>,

    /// Whether terminal-event webhooks are offered
    pub push_notifications: bool,

    /// Per-subscriber event backlog before disconnect
    pub stream_buffer_events: usize,

    /// Seconds a finished task's event buffer outlives its terminal event
    pub stream_retention_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not
    /// set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-sonnet-4.5".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let agent_name =
            std::env::var("AGENT_NAME").unwrap_or_else(|_| "Reasoning Agent".to_string());

        let agent_description = std::env::var("AGENT_DESCRIPTION").unwrap_or_else(|_| {
            "Answers questions and carries out conversational reasoning tasks".to_string()
        });

        let agent_url = std::env::var("AGENT_URL").ok();

        let push_notifications = std::env::var("PUSH_NOTIFICATIONS")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let stream_buffer_events = std::env::var("STREAM_BUFFER_EVENTS")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("STREAM_BUFFER_EVENTS".to_string(), format!("{}", e))
            })?;

        let stream_retention_secs = std::env::var("STREAM_RETENTION_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("STREAM_RETENTION_SECS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            api_key,
            default_model,
            host,
            port,
            agent_name,
            agent_description,
            agent_url,
            push_notifications,
            stream_buffer_events,
            stream_retention_secs,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            default_model,
            host: "127.0.0.1".to_string(),
            port: 3000,
            agent_name: "Reasoning Agent".to_string(),
            agent_description: "Answers questions and carries out conversational reasoning tasks"
                .to_string(),
            agent_url: None,
            push_notifications: false,
            stream_buffer_events: 1024,
            stream_retention_secs: 30,
        }
    }

    /// Base URL advertised on the agent card.
    pub fn card_url(&self) -> String {
        self.agent_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", self.host, self.port))
    }
}
