//! Agent card: the static, queryable description of what this agent offers.
//!
//! Built once at startup and shared read-only by every request; it is never
//! recomputed or mutated afterwards. Construction fails fast when mandatory
//! identity fields are missing, so a misconfigured process refuses to start
//! instead of advertising a broken card.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content types the agent accepts and produces by default.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &["text", "text/plain"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("agent card is missing required field: {0}")]
    MissingField(&'static str),
}

/// Feature flags advertised to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Live event streaming for submitted tasks
    pub streaming: bool,
    /// Terminal-event webhooks instead of holding a stream open
    pub push_notifications: bool,
}

/// One advertised skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
}

/// The agent's capability descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    /// Base URL callers reach this agent at
    pub url: String,
    pub version: String,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Build a card, validating the mandatory identity fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        version: impl Into<String>,
        capabilities: AgentCapabilities,
        skills: Vec<AgentSkill>,
    ) -> Result<Self, CardError> {
        let name = name.into();
        let url = url.into();
        if name.trim().is_empty() {
            return Err(CardError::MissingField("name"));
        }
        if url.trim().is_empty() {
            return Err(CardError::MissingField("url"));
        }
        Ok(Self {
            name,
            description: description.into(),
            url,
            version: version.into(),
            default_input_modes: SUPPORTED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_output_modes: SUPPORTED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            capabilities,
            skills,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities() -> AgentCapabilities {
        AgentCapabilities {
            streaming: true,
            push_notifications: false,
        }
    }

    #[test]
    fn test_valid_card() {
        let card = AgentCard::new(
            "Reasoning Agent",
            "Answers questions",
            "http://localhost:3000/",
            "0.1.0",
            capabilities(),
            vec![],
        )
        .unwrap();
        assert_eq!(card.name, "Reasoning Agent");
        assert_eq!(card.default_input_modes, vec!["text", "text/plain"]);
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = AgentCard::new(
            "  ",
            "desc",
            "http://localhost:3000/",
            "0.1.0",
            capabilities(),
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, CardError::MissingField("name"));
    }

    #[test]
    fn test_missing_url_rejected() {
        let err = AgentCard::new("Agent", "desc", "", "0.1.0", capabilities(), vec![]).unwrap_err();
        assert_eq!(err, CardError::MissingField("url"));
    }
}
