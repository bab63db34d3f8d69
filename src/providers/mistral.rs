//! Mistral session implementation for chatbatch
//!
//! Mistral authenticates every request with a long-lived API key. Free-tier
//! keys are rate limited aggressively, so HTTP 429 responses are retried
//! with a configurable backoff up to a fixed number of attempts.

use crate::config::{MistralConfig, RateLimitConfig, SessionConfig};
use crate::error::{AskFailure, ChatbatchError, Result};
use crate::providers::http::{self, ChatCompletionRequest, Exchange};
use crate::providers::{AskOutcome, ChatSession, ConversationHistory};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Mistral models available on the free tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MistralModel {
    /// Mistral NeMo 12B
    #[default]
    #[serde(rename = "open-mistral-nemo")]
    Nemo,
    /// Codestral Mamba
    #[serde(rename = "open-codestral-mamba")]
    CodestralMamba,
    /// Mistral 7B
    #[serde(rename = "open-mistral-7b")]
    Mistral7b,
    /// Mixtral 8x7B
    #[serde(rename = "open-mixtral-8x7b")]
    Mixtral8x7b,
    /// Mixtral 8x22B
    #[serde(rename = "open-mixtral-8x22b")]
    Mixtral8x22b,
}

impl MistralModel {
    /// Every supported model
    pub const ALL: [Self; 5] = [
        Self::Nemo,
        Self::CodestralMamba,
        Self::Mistral7b,
        Self::Mixtral8x7b,
        Self::Mixtral8x22b,
    ];

    /// Identifier sent in the `model` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nemo => "open-mistral-nemo",
            Self::CodestralMamba => "open-codestral-mamba",
            Self::Mistral7b => "open-mistral-7b",
            Self::Mixtral8x7b => "open-mixtral-8x7b",
            Self::Mixtral8x22b => "open-mixtral-8x22b",
        }
    }
}

impl std::fmt::Display for MistralModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MistralModel {
    type Err = ChatbatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ChatbatchError::Config(format!("Unknown Mistral model: {}", s)))
    }
}

/// Mistral chat session
///
/// # Examples
///
/// ```no_run
/// use chatbatch::config::{MistralConfig, SessionConfig};
/// use chatbatch::providers::{ChatSession, MistralClient, MistralModel};
///
/// # async fn example() -> chatbatch::error::Result<()> {
/// let config = MistralConfig {
///     model: MistralModel::CodestralMamba,
///     api_key: Some("sk-...".to_string()),
///     ..Default::default()
/// };
/// let mut session = MistralClient::new(config, &SessionConfig::default())?;
/// let reply = session.ask("fn main() { println!(\"hi\") }", true).await;
/// assert!(reply.is_answer() || reply.failure().is_some());
/// # Ok(())
/// # }
/// ```
pub struct MistralClient {
    client: Client,
    api_key: String,
    model: MistralModel,
    chat_url: String,
    rate_limit: RateLimitConfig,
    history: ConversationHistory,
}

impl MistralClient {
    /// Create a new Mistral session
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or the HTTP client cannot be
    /// built
    pub fn new(config: MistralConfig, session: &SessionConfig) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        let client = http::build_client(session.timeout(), config.verify_tls, None)?;

        tracing::info!("Initialized Mistral client: model={}", config.model);

        Ok(Self {
            client,
            api_key,
            model: config.model,
            chat_url: http::endpoint(&config.api_base, "chat/completions"),
            rate_limit: config.rate_limit,
            history: ConversationHistory::new(session.system_prompt.clone()),
        })
    }
}

#[async_trait]
impl ChatSession for MistralClient {
    async fn ask(&mut self, user_message: &str, clear_history: bool) -> AskOutcome {
        let turn = self.history.begin_turn(user_message, clear_history);
        let request = ChatCompletionRequest {
            model: self.model.as_str(),
            messages: turn.messages(),
            stream: false,
            update_interval: None,
        };

        let max_attempts = self.rate_limit.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match http::post_chat(&self.client, &self.chat_url, &self.api_key, &request).await {
                Ok(Exchange::Answer(answer)) => {
                    tracing::debug!("Mistral response received on attempt {}", attempt);
                    self.history.commit(turn, answer.clone());
                    return AskOutcome::Answer(answer);
                }
                Ok(Exchange::RateLimited) => {
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.rate_limit.delay_for(attempt - 1);
                    tracing::warn!(
                        "Mistral rate limited (attempt {}/{}); retrying in {:?}",
                        attempt,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(Exchange::Rejected { status, body }) => {
                    return AskOutcome::Failed(AskFailure::Status { status, body });
                }
                Err(failure) => return AskOutcome::Failed(failure),
            }
        }

        tracing::error!("Mistral still rate limited after {} attempts", max_attempts);
        AskOutcome::Failed(AskFailure::RetryExhausted {
            attempts: max_attempts,
        })
    }

    fn reset(&mut self) {
        self.history.reset();
    }

    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn provider_name(&self) -> &'static str {
        "mistral"
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }
}
