//! GigaChat session implementation for chatbatch
//!
//! GigaChat uses a two-step flow: a static authorization key is exchanged
//! at the OAuth endpoint for a short-lived access token, which is then sent
//! as a bearer token with each chat request. The token is cached with its
//! expiry and renewed ahead of time, so it cannot lapse while a request is in
//! flight.

use crate::config::{GigachatConfig, SessionConfig};
use crate::error::{AskFailure, ChatbatchError, Result};
use crate::providers::http::{self, ChatCompletionRequest, Exchange};
use crate::providers::{AskOutcome, ChatSession, ConversationHistory};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Expiry timestamps below this are taken to be in seconds rather than ms
const SECONDS_EPOCH_CEILING: i64 = 100_000_000_000;

/// Margin subtracted from the token expiry, in milliseconds
const EXPIRY_MARGIN_MS: i64 = 1_000;

/// GigaChat models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GigachatModel {
    /// Base model
    #[default]
    #[serde(rename = "GigaChat")]
    Lite,
    /// Larger model
    #[serde(rename = "GigaChat-Pro")]
    Pro,
}

impl GigachatModel {
    /// Every supported model
    pub const ALL: [Self; 2] = [Self::Lite, Self::Pro];

    /// Identifier sent in the `model` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lite => "GigaChat",
            Self::Pro => "GigaChat-Pro",
        }
    }
}

impl std::fmt::Display for GigachatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GigachatModel {
    type Err = ChatbatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ChatbatchError::Config(format!("Unknown GigaChat model: {}", s)))
    }
}

/// API scope a GigaChat credential was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GigachatScope {
    /// Individuals
    #[default]
    #[serde(rename = "GIGACHAT_API_PERS")]
    Person,
    /// Businesses, pay as you go
    #[serde(rename = "GIGACHAT_API_B2B")]
    B2b,
    /// Businesses, prepaid
    #[serde(rename = "GIGACHAT_API_CORP")]
    Corporation,
}

impl GigachatScope {
    /// Every supported scope
    pub const ALL: [Self; 3] = [Self::Person, Self::B2b, Self::Corporation];

    /// Value sent in the `scope` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "GIGACHAT_API_PERS",
            Self::B2b => "GIGACHAT_API_B2B",
            Self::Corporation => "GIGACHAT_API_CORP",
        }
    }
}

impl std::fmt::Display for GigachatScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GigachatScope {
    type Err = ChatbatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ChatbatchError::Config(format!("Unknown GigaChat scope: {}", s)))
    }
}

/// Response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: i64,
}

/// Cached access token
struct AccessToken {
    value: String,
    /// Unix time in milliseconds
    expires_at_ms: i64,
}

/// Whether the session holds a usable access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token exchange has succeeded yet
    Unauthenticated,
    /// A token was obtained; it may since have expired
    Authenticated {
        /// When the cached token stops being accepted
        expires_at: DateTime<Utc>,
    },
}

/// Whether a token expiring at `expires_at_ms` must be renewed before a
/// request that may take up to `lookahead`
pub(crate) fn token_needs_refresh(now_ms: i64, lookahead: Duration, expires_at_ms: i64) -> bool {
    let projected = now_ms.saturating_add(lookahead.as_millis() as i64);
    projected >= expires_at_ms.saturating_sub(EXPIRY_MARGIN_MS)
}

/// Convert a token-endpoint expiry to Unix milliseconds
fn normalize_expiry(expires_at: i64) -> i64 {
    if expires_at < SECONDS_EPOCH_CEILING {
        expires_at.saturating_mul(1_000)
    } else {
        expires_at
    }
}

/// GigaChat chat session
///
/// Holds the conversation, the authorization key and the cached access
/// token. The token is refreshed lazily by [`ask`](ChatSession::ask); call
/// [`refresh_token`](Self::refresh_token) to authenticate up front.
///
/// # Examples
///
/// ```no_run
/// use chatbatch::config::{GigachatConfig, SessionConfig};
/// use chatbatch::providers::{ChatSession, GigachatClient};
///
/// # async fn example() -> chatbatch::error::Result<()> {
/// let config = GigachatConfig {
///     credentials: Some("base64-key".to_string()),
///     ..Default::default()
/// };
/// let mut session = GigachatClient::new(config, &SessionConfig::default())?;
/// let reply = session.ask("print('hello'", true).await;
/// println!("{}", reply.answer_or(""));
/// # Ok(())
/// # }
/// ```
pub struct GigachatClient {
    client: Client,
    config: GigachatConfig,
    authorization_key: String,
    lookahead: Duration,
    history: ConversationHistory,
    token: Option<AccessToken>,
}

impl GigachatClient {
    /// Create a new GigaChat session
    ///
    /// No network traffic happens here; the first token exchange is made by
    /// the first `ask` or by an explicit `refresh_token`.
    ///
    /// # Errors
    ///
    /// Returns error if no credentials are configured or the HTTP client
    /// cannot be built
    pub fn new(config: GigachatConfig, session: &SessionConfig) -> Result<Self> {
        let authorization_key = config.authorization_key()?;
        let client = http::build_client(
            session.timeout(),
            config.verify_tls,
            config.ca_cert_path.as_deref(),
        )?;

        tracing::info!(
            "Initialized GigaChat client: model={}, scope={}",
            config.model,
            config.scope
        );

        Ok(Self {
            client,
            config,
            authorization_key,
            lookahead: session.timeout(),
            history: ConversationHistory::new(session.system_prompt.clone()),
            token: None,
        })
    }

    /// Current authentication state
    pub fn auth_state(&self) -> AuthState {
        match &self.token {
            None => AuthState::Unauthenticated,
            Some(token) => AuthState::Authenticated {
                expires_at: Utc
                    .timestamp_millis_opt(token.expires_at_ms)
                    .single()
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            },
        }
    }

    /// Exchange the authorization key for a fresh access token
    ///
    /// On success the cached token and expiry are replaced. On failure they
    /// are left exactly as they were.
    ///
    /// # Errors
    ///
    /// Returns `Authentication` if the request fails, the endpoint answers
    /// with a non-200 status, or the body cannot be parsed
    pub async fn refresh_token(&mut self) -> Result<()> {
        tracing::debug!("Requesting GigaChat access token");

        let response = self
            .client
            .post(&self.config.auth_url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Basic {}", self.authorization_key))
            .header("RqUID", Uuid::new_v4().to_string())
            .form(&[("scope", self.config.scope.as_str())])
            .send()
            .await
            .map_err(|e| ChatbatchError::Authentication(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatbatchError::Authentication(format!(
                "Token endpoint returned {}: {}",
                status, body
            ))
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ChatbatchError::Authentication(format!("Failed to parse token response: {}", e))
        })?;

        self.token = Some(AccessToken {
            value: token.access_token,
            expires_at_ms: normalize_expiry(token.expires_at),
        });

        tracing::info!("Obtained GigaChat access token");
        Ok(())
    }

    /// Renew the token if it would expire before a request could finish
    ///
    /// Refresh failures are logged and otherwise ignored; the next call
    /// checks again.
    pub async fn ensure_token_valid(&mut self) {
        let expires_at_ms = self.token.as_ref().map(|t| t.expires_at_ms).unwrap_or(0);
        let now_ms = Utc::now().timestamp_millis();

        if !token_needs_refresh(now_ms, self.lookahead, expires_at_ms) {
            return;
        }

        if let Err(e) = self.refresh_token().await {
            tracing::warn!("GigaChat token refresh failed: {}", e);
        }
    }
}

#[async_trait]
impl ChatSession for GigachatClient {
    async fn ask(&mut self, user_message: &str, clear_history: bool) -> AskOutcome {
        let turn = self.history.begin_turn(user_message, clear_history);

        self.ensure_token_valid().await;
        let Some(token) = self.token.as_mut() else {
            tracing::error!("No GigaChat access token; skipping chat request");
            return AskOutcome::Failed(AskFailure::Unauthenticated);
        };

        let request = ChatCompletionRequest {
            model: self.config.model.as_str(),
            messages: turn.messages(),
            stream: false,
            update_interval: Some(0),
        };
        let url = http::endpoint(&self.config.api_base, "chat/completions");

        match http::post_chat(&self.client, &url, &token.value, &request).await {
            Ok(Exchange::Answer(answer)) => {
                tracing::debug!("GigaChat response received");
                self.history.commit(turn, answer.clone());
                AskOutcome::Answer(answer)
            }
            Ok(Exchange::RateLimited) => AskOutcome::Failed(AskFailure::Status {
                status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                body: String::new(),
            }),
            Ok(Exchange::Rejected { status, body }) => {
                if status == StatusCode::UNAUTHORIZED.as_u16() {
                    tracing::warn!("GigaChat rejected the access token; forcing refresh on next call");
                    token.expires_at_ms = 0;
                }
                AskOutcome::Failed(AskFailure::Status { status, body })
            }
            Err(failure) => AskOutcome::Failed(failure),
        }
    }

    fn reset(&mut self) {
        self.history.reset();
    }

    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn provider_name(&self) -> &'static str {
        "gigachat"
    }

    fn model(&self) -> &str {
        self.config.model.as_str()
    }
}
