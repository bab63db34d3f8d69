//! Shared HTTP plumbing for chat-completion providers
//!
//! Both backends speak the same chat-completions dialect; this module holds
//! the client builder, the wire request/response structures and the single
//! POST that classifies a response into an [`Exchange`].

use crate::error::{AskFailure, ChatbatchError, Result};
use crate::providers::Message;

use reqwest::{Certificate, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// User agent sent with every request
pub(crate) const USER_AGENT: &str = concat!("chatbatch/", env!("CARGO_PKG_VERSION"));

/// Request body for `POST /chat/completions`
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u32>,
}

/// Response body from `POST /chat/completions`
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Classified provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Exchange {
    /// 200 with a usable first choice
    Answer(String),
    /// 429 Too Many Requests
    RateLimited,
    /// Any other status
    Rejected { status: u16, body: String },
}

/// Build the HTTP client shared by a session's requests
///
/// # Arguments
///
/// * `timeout` - Per-request timeout
/// * `verify_tls` - When false, certificate validation is disabled
/// * `ca_cert_path` - Optional PEM bundle added to the trusted roots
///
/// # Errors
///
/// Returns error if the CA bundle cannot be read or parsed, or the client
/// cannot be built
pub(crate) fn build_client(
    timeout: Duration,
    verify_tls: bool,
    ca_cert_path: Option<&Path>,
) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout).user_agent(USER_AGENT);

    if let Some(path) = ca_cert_path {
        let pem = std::fs::read(path).map_err(|e| {
            ChatbatchError::Config(format!(
                "Failed to read CA certificate {}: {}",
                path.display(),
                e
            ))
        })?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| ChatbatchError::Config(format!("Invalid CA certificate: {}", e)))?;
        builder = builder.add_root_certificate(cert);
    }

    if !verify_tls {
        tracing::warn!("TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| ChatbatchError::Provider(format!("Failed to create HTTP client: {}", e)).into())
}

/// Join `path` onto `base` with exactly one slash between them
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST a chat-completion request and classify the response
///
/// Transport failures (connect, TLS, timeout) and unusable success bodies are
/// returned as [`AskFailure`]; every HTTP status is returned as an
/// [`Exchange`].
pub(crate) async fn post_chat(
    client: &Client,
    url: &str,
    bearer: &str,
    request: &ChatCompletionRequest<'_>,
) -> std::result::Result<Exchange, AskFailure> {
    tracing::debug!(
        "Sending chat request: model={}, {} messages",
        request.model,
        request.messages.len()
    );

    let response = client
        .post(url)
        .header("Accept", "application/json")
        .bearer_auth(bearer)
        .json(request)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Chat request failed: {}", e);
            if e.is_timeout() {
                AskFailure::Transport(format!("request timed out: {}", e))
            } else {
                AskFailure::Transport(e.to_string())
            }
        })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("Provider rate limited the request");
        return Ok(Exchange::RateLimited);
    }
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Provider returned error {}: {}", status, body);
        return Ok(Exchange::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
        tracing::error!("Failed to parse chat response: {}", e);
        AskFailure::MalformedResponse(e.to_string())
    })?;

    if let Some(usage) = &parsed.usage {
        tracing::debug!(
            "Token usage: prompt={}, completion={}",
            usage.prompt_tokens,
            usage.completion_tokens
        );
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(Exchange::Answer)
        .ok_or_else(|| AskFailure::MalformedResponse("no message content in first choice".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        assert_eq!(
            endpoint("https://api.mistral.ai/v1/", "/chat/completions"),
            "https://api.mistral.ai/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:9000", "chat/completions"),
            "http://127.0.0.1:9000/chat/completions"
        );
    }

    #[test]
    fn test_request_serialization_omits_update_interval() {
        let messages = vec![Message::user("hi")];
        let request = ChatCompletionRequest {
            model: "open-mistral-nemo",
            messages: &messages,
            stream: false,
            update_interval: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "open-mistral-nemo",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn test_request_serialization_with_update_interval() {
        let messages = vec![Message::system("s"), Message::user("hi")];
        let request = ChatCompletionRequest {
            model: "GigaChat",
            messages: &messages,
            stream: false,
            update_interval: Some(0),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["update_interval"], 0);
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn test_response_deserialize_missing_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_build_client_default() {
        let client = build_client(Duration::from_secs(5), true, None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_client_missing_ca_bundle() {
        let result = build_client(
            Duration::from_secs(5),
            true,
            Some(Path::new("/nonexistent/ca.pem")),
        );
        assert!(result.is_err());
    }
}
