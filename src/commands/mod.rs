/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `ask`    — Send one message and print the answer
- `batch`  — Answer every row of a JSON Lines file
- `auth`   — Check provider credentials
- `models` — List provider models

Handlers stay small: they build a session through
[`crate::providers::create_session`] and format the result for a terminal.
*/

use crate::config::Config;
use crate::error::{ChatbatchError, Result};
use crate::providers::{create_session, AskOutcome};
use colored::Colorize;

// Model listing
pub mod models;

// Single question handler
pub mod ask {
    //! One-shot question mode.

    use super::*;

    /// Ask a single question and print the answer to stdout
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `message` - Text to send
    /// * `provider` - Optional override for the configured provider
    /// * `system_prompt` - Optional override for `session.system_prompt`
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be built or the provider gives no
    /// answer
    pub async fn run_ask(
        mut config: Config,
        message: String,
        provider: Option<String>,
        system_prompt: Option<String>,
    ) -> Result<()> {
        if system_prompt.is_some() {
            config.session.system_prompt = system_prompt;
        }

        let mut session = create_session(&config, provider.as_deref())?;
        tracing::debug!(
            "Asking {} ({}) a {}-character message",
            session.provider_name(),
            session.model(),
            message.chars().count()
        );

        match session.ask(&message, true).await {
            AskOutcome::Answer(answer) => {
                println!("{}", answer);
                Ok(())
            }
            AskOutcome::Failed(failure) => {
                eprintln!("{} {}", "Request failed:".red().bold(), failure);
                Err(ChatbatchError::Provider(format!(
                    "{} returned no answer: {}",
                    session.provider_name(),
                    failure
                ))
                .into())
            }
        }
    }
}

// Batch handler
pub mod batch {
    //! Batch mode over JSON Lines files.

    use super::*;
    use crate::batch::{run_batch, BatchSummary};
    use std::path::PathBuf;

    /// Run a batch and print its summary
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `input` - Input JSON Lines file
    /// * `output` - Output JSON Lines file
    /// * `provider` - Optional override for the configured provider
    /// * `show_progress` - Draw a progress bar on stderr
    pub async fn run(
        config: Config,
        input: PathBuf,
        output: PathBuf,
        provider: Option<String>,
        show_progress: bool,
    ) -> Result<BatchSummary> {
        let mut session = create_session(&config, provider.as_deref())?;
        let summary = run_batch(
            session.as_mut(),
            &input,
            &output,
            &config.batch,
            show_progress,
        )
        .await?;

        print_summary(&summary, &output);
        Ok(summary)
    }

    fn print_summary(summary: &BatchSummary, output: &std::path::Path) {
        let failed = if summary.failed == 0 {
            summary.failed.to_string().normal()
        } else {
            summary.failed.to_string().yellow()
        };

        println!(
            "{} {} rows, {} answered, {} failed -> {}",
            "Batch complete:".green().bold(),
            summary.total,
            summary.answered,
            failed,
            output.display()
        );
    }
}

// Authentication handler
pub mod auth {
    use super::*;
    use crate::providers::{AuthState, GigachatClient};

    /// Check that the provider accepts the configured credentials
    ///
    /// GigaChat performs a token exchange and reports the expiry. Mistral
    /// uses a static key, so only its presence is checked.
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `provider` - Provider name ("gigachat" or "mistral")
    pub async fn authenticate(config: Config, provider: String) -> Result<()> {
        tracing::info!("Checking credentials for provider: {}", provider);

        match provider.as_str() {
            "gigachat" => {
                let mut client =
                    GigachatClient::new(config.provider.gigachat.clone(), &config.session)?;

                if let Err(e) = client.refresh_token().await {
                    eprintln!("{} {}", "GigaChat: authentication failed:".red(), e);
                    return Err(e);
                }

                match client.auth_state() {
                    AuthState::Authenticated { expires_at } => {
                        println!(
                            "{} token valid until {}",
                            "GigaChat:".green().bold(),
                            expires_at.to_rfc3339()
                        );
                        Ok(())
                    }
                    AuthState::Unauthenticated => Err(ChatbatchError::Authentication(
                        "token exchange reported success but no token was stored".to_string(),
                    )
                    .into()),
                }
            }
            "mistral" => {
                config.provider.mistral.api_key()?;
                println!(
                    "{} static API key configured; requests authenticate per call",
                    "Mistral:".green().bold()
                );
                Ok(())
            }
            other => {
                Err(ChatbatchError::Provider(format!("Unsupported provider: {}", other)).into())
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_auth_unknown_provider_fails() {
            let res = authenticate(Config::default(), "nope".to_string()).await;
            assert!(res.is_err());
        }

        #[tokio::test]
        async fn test_auth_mistral_requires_key() {
            let res = authenticate(Config::default(), "mistral".to_string()).await;
            assert!(res.is_err());
        }

        #[tokio::test]
        async fn test_auth_mistral_with_key() {
            let mut cfg = Config::default();
            cfg.provider.mistral.api_key = Some("sk-test".to_string());
            assert!(authenticate(cfg, "mistral".to_string()).await.is_ok());
        }

        #[tokio::test]
        async fn test_auth_gigachat_requires_credentials() {
            let res = authenticate(Config::default(), "gigachat".to_string()).await;
            let err = res.unwrap_err();
            assert!(err.to_string().contains("Missing credentials"));
        }
    }
}
