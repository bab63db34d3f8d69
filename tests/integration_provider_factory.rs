//! Session factory driven by a loaded configuration file
//!
//! Covers the file -> environment -> CLI layering as it reaches
//! `create_session`.

use serial_test::serial;

use chatbatch::cli::Cli;
use chatbatch::config::Config;
use chatbatch::providers::{create_session, GigachatModel, MistralModel};

mod common;

const CONFIG: &str = r#"
provider:
  type: mistral
  gigachat:
    model: GigaChat-Pro
    scope: GIGACHAT_API_CORP
  mistral:
    model: open-mixtral-8x7b
    rate_limit:
      max_attempts: 2
      backoff_ms: 500
session:
  system_prompt: "Find the bug"
  timeout_seconds: 20
"#;

fn clear_env() {
    for var in [
        "MISTRAL_API_KEY",
        "GIGACHAT_API_TOKEN",
        "GIGACHAT_API_CLIENT_ID",
        "GIGACHAT_API_CLIENT_SECRET",
        "CHATBATCH_PROVIDER",
        "CHATBATCH_MISTRAL_MODEL",
        "CHATBATCH_SYSTEM_PROMPT",
    ] {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_session_from_file_and_env_key() {
    clear_env();
    std::env::set_var("MISTRAL_API_KEY", "sk-from-env");

    let (_dir, path) = common::temp_config_file(CONFIG);
    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.provider.mistral.model, MistralModel::Mixtral8x7b);
    assert_eq!(config.provider.gigachat.model, GigachatModel::Pro);
    assert_eq!(config.provider.mistral.rate_limit.max_attempts, 2);
    assert_eq!(config.session.timeout_seconds, 20);

    let session = create_session(&config, None).unwrap();
    assert_eq!(session.provider_name(), "mistral");
    assert_eq!(session.model(), "open-mixtral-8x7b");
    assert_eq!(session.history().system_prompt(), Some("Find the bug"));

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_provider_and_model() {
    clear_env();
    std::env::set_var("CHATBATCH_PROVIDER", "gigachat");
    std::env::set_var("GIGACHAT_API_CLIENT_ID", "id");
    std::env::set_var("GIGACHAT_API_CLIENT_SECRET", "secret");

    let (_dir, path) = common::temp_config_file(CONFIG);
    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();

    let session = create_session(&config, None).unwrap();
    assert_eq!(session.provider_name(), "gigachat");
    assert_eq!(session.model(), "GigaChat-Pro");

    clear_env();
}

#[test]
#[serial]
fn test_missing_key_is_reported_at_session_creation() {
    clear_env();

    let (_dir, path) = common::temp_config_file(CONFIG);
    let config = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap();
    config.validate().unwrap();

    let err = create_session(&config, None).err().unwrap();
    assert!(err.to_string().contains("Missing credentials"));
}

#[test]
#[serial]
fn test_secrets_are_not_serialized_or_logged() {
    clear_env();
    std::env::set_var("MISTRAL_API_KEY", "sk-very-secret");
    std::env::set_var("GIGACHAT_API_TOKEN", "c2VjcmV0");

    let config = Config::load("does/not/exist.yaml", &Cli::default()).unwrap();

    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(!yaml.contains("sk-very-secret"));
    assert!(!yaml.contains("c2VjcmV0"));

    let debug = format!("{:?}", config);
    assert!(!debug.contains("sk-very-secret"));
    assert!(!debug.contains("c2VjcmV0"));

    clear_env();
}
