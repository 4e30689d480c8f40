//! agentport - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the agent API.

use agentport::card::{AgentCapabilities, AgentCard, AgentSkill, CardError};
use agentport::{api, Config};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentport=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing provider key is fatal before serving.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded configuration: model={}", config.default_model);

    // Build the immutable capability card once for the process lifetime.
    let card = match build_card(&config) {
        Ok(card) => card,
        Err(e) => {
            error!("Invalid agent card: {}", e);
            std::process::exit(1);
        }
    };
    info!("Advertising agent '{}' at {}", card.name, card.url);

    // Start HTTP server
    info!("Starting server on {}:{}", config.host, config.port);
    api::serve(config, card).await
}

fn build_card(config: &Config) -> Result<AgentCard, CardError> {
    let capabilities = AgentCapabilities {
        streaming: true,
        push_notifications: config.push_notifications,
    };
    let skill = AgentSkill {
        id: "conversational_reasoning".to_string(),
        name: "Conversational Reasoning".to_string(),
        description: "Answers questions and works through multi-turn requests, asking for \
                      clarification when the input is incomplete"
            .to_string(),
        tags: vec!["reasoning".to_string(), "chat".to_string()],
        examples: vec!["What is the exchange rate between USD and GBP?".to_string()],
    };

    AgentCard::new(
        config.agent_name.clone(),
        config.agent_description.clone(),
        config.card_url(),
        env!("CARGO_PKG_VERSION"),
        capabilities,
        vec![skill],
    )
}
