use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use chatbatch::config::{GigachatConfig, MistralConfig, RateLimitConfig};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// GigaChat config whose endpoints live on `server_uri`
#[allow(dead_code)]
pub fn gigachat_config(server_uri: &str) -> GigachatConfig {
    GigachatConfig {
        auth_url: format!("{}/api/v2/oauth", server_uri),
        api_base: format!("{}/api/v1", server_uri),
        credentials: Some("dGVzdDp0ZXN0".to_string()),
        ..Default::default()
    }
}

/// Mistral config on `server_uri` with a short fixed backoff
#[allow(dead_code)]
pub fn mistral_config(server_uri: &str, max_attempts: u32) -> MistralConfig {
    MistralConfig {
        api_base: format!("{}/v1", server_uri),
        api_key: Some("sk-test".to_string()),
        rate_limit: RateLimitConfig {
            max_attempts,
            backoff_ms: 10,
            multiplier: 1.0,
        },
        ..Default::default()
    }
}

/// Chat-completion success body with a single answer
#[allow(dead_code)]
pub fn chat_response(content: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
    })
}

/// Current Unix time in milliseconds
#[allow(dead_code)]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
