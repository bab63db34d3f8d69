//! Provider module for chatbatch
//!
//! This module contains the chat session abstraction and its
//! implementations for GigaChat (token-exchange auth) and Mistral
//! (static API key).

pub mod base;
pub mod gigachat;
pub(crate) mod http;
pub mod mistral;

pub use base::{AskOutcome, ChatSession, ConversationHistory, Message, PendingTurn, Role};
pub use gigachat::{AuthState, GigachatClient, GigachatModel, GigachatScope};
pub use mistral::{MistralClient, MistralModel};

use crate::config::Config;
use crate::error::{ChatbatchError, Result};

/// Create a chat session based on configuration
///
/// # Arguments
///
/// * `config` - Full configuration (provider and session settings)
/// * `provider_override` - Optional provider type overriding `provider.type`
///
/// # Returns
///
/// Returns a boxed session with an empty (or system-seeded) history
///
/// # Errors
///
/// Returns error if the provider type is unknown, its credentials are
/// missing, or the HTTP client cannot be built
///
/// # Examples
///
/// ```
/// use chatbatch::config::Config;
/// use chatbatch::providers::create_session;
///
/// let mut config = Config::default();
/// config.provider.mistral.api_key = Some("sk-test".to_string());
///
/// let session = create_session(&config, Some("mistral")).unwrap();
/// assert_eq!(session.provider_name(), "mistral");
/// ```
pub fn create_session(
    config: &Config,
    provider_override: Option<&str>,
) -> Result<Box<dyn ChatSession>> {
    let provider_type = provider_override.unwrap_or(&config.provider.provider_type);

    match provider_type {
        "gigachat" => Ok(Box::new(GigachatClient::new(
            config.provider.gigachat.clone(),
            &config.session,
        )?)),
        "mistral" => Ok(Box::new(MistralClient::new(
            config.provider.mistral.clone(),
            &config.session,
        )?)),
        _ => Err(ChatbatchError::Provider(format!(
            "Unknown provider type: {}",
            provider_type
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_credentials() -> Config {
        let mut config = Config::default();
        config.provider.gigachat.credentials = Some("dGVzdDp0ZXN0".to_string());
        config.provider.mistral.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_create_session_invalid_type() {
        let config = config_with_credentials();
        let result = create_session(&config, Some("invalid"));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_session_default_provider() {
        let config = config_with_credentials();
        let session = create_session(&config, None).unwrap();
        assert_eq!(session.provider_name(), "gigachat");
        assert_eq!(session.model(), "GigaChat");
    }

    #[test]
    fn test_create_session_override() {
        let mut config = config_with_credentials();
        config.provider.mistral.model = MistralModel::Mixtral8x7b;
        let session = create_session(&config, Some("mistral")).unwrap();
        assert_eq!(session.provider_name(), "mistral");
        assert_eq!(session.model(), "open-mixtral-8x7b");
    }

    #[test]
    fn test_create_session_missing_credentials() {
        let config = Config::default();
        let err = create_session(&config, Some("mistral")).err().unwrap();
        assert!(err.to_string().contains("Missing credentials"));
    }

    #[test]
    fn test_create_session_applies_system_prompt() {
        let mut config = config_with_credentials();
        config.session.system_prompt = Some("Review code".to_string());
        let session = create_session(&config, Some("mistral")).unwrap();
        assert_eq!(session.history().messages(), &[Message::system("Review code")]);
    }
}
