//! Model listing command for chatbatch
//!
//! Both providers expose a fixed set of models, so listing needs no network
//! access. The configured model of each provider is marked.

use crate::config::{Config, VALID_PROVIDERS};
use crate::error::{ChatbatchError, Result};
use crate::providers::{GigachatModel, MistralModel};
use prettytable::{row, Table};
use serde::Serialize;

/// One row of model listing output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    /// Provider name
    pub provider: &'static str,
    /// Wire identifier of the model
    pub model: &'static str,
    /// Whether this is the provider's built-in default
    pub default: bool,
    /// Whether the current configuration selects this model
    pub configured: bool,
}

/// Collect the models of one provider, or of all providers
///
/// # Errors
///
/// Returns `Provider` if `provider_name` is not a known provider
pub fn model_entries(config: &Config, provider_name: Option<&str>) -> Result<Vec<ModelEntry>> {
    let providers: Vec<&str> = match provider_name {
        Some(name) if VALID_PROVIDERS.contains(&name) => vec![name],
        Some(name) => {
            return Err(ChatbatchError::Provider(format!("Unknown provider type: {}", name)).into())
        }
        None => VALID_PROVIDERS.to_vec(),
    };

    let mut entries = Vec::new();
    for provider in providers {
        match provider {
            "gigachat" => entries.extend(GigachatModel::ALL.into_iter().map(|m| ModelEntry {
                provider: "gigachat",
                model: m.as_str(),
                default: m == GigachatModel::default(),
                configured: m == config.provider.gigachat.model,
            })),
            _ => entries.extend(MistralModel::ALL.into_iter().map(|m| ModelEntry {
                provider: "mistral",
                model: m.as_str(),
                default: m == MistralModel::default(),
                configured: m == config.provider.mistral.model,
            })),
        }
    }

    Ok(entries)
}

/// Print the available models
///
/// # Arguments
///
/// * `config` - Configuration, used to mark the selected models
/// * `provider_name` - Optional provider filter; all providers if None
/// * `json` - Print JSON instead of a table
///
/// # Examples
///
/// ```no_run
/// use chatbatch::config::Config;
/// use chatbatch::commands::models::list_models;
///
/// list_models(&Config::default(), Some("mistral"), false).unwrap();
/// ```
pub fn list_models(config: &Config, provider_name: Option<&str>, json: bool) -> Result<()> {
    let entries = model_entries(config, provider_name)?;
    tracing::debug!("Listing {} models", entries.len());

    if json {
        let out = serde_json::to_string_pretty(&entries).map_err(ChatbatchError::Serialization)?;
        println!("{}", out);
    } else {
        output_models_table(&entries);
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        ""
    }
}

fn output_models_table(entries: &[ModelEntry]) {
    let mut table = Table::new();
    table.add_row(row!["Provider", "Model", "Default", "Configured"]);

    for entry in entries {
        table.add_row(row![
            entry.provider,
            entry.model,
            yes_no(entry.default),
            yes_no(entry.configured)
        ]);
    }

    println!("\nAvailable models:\n");
    table.printstd();
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_entries_all_providers() {
        let entries = model_entries(&Config::default(), None).unwrap();
        assert_eq!(
            entries.len(),
            GigachatModel::ALL.len() + MistralModel::ALL.len()
        );
        assert_eq!(entries[0].provider, "gigachat");
    }

    #[test]
    fn test_model_entries_marks_configured() {
        let mut config = Config::default();
        config.provider.mistral.model = MistralModel::Mixtral8x22b;

        let entries = model_entries(&config, Some("mistral")).unwrap();
        let configured: Vec<_> = entries.iter().filter(|e| e.configured).collect();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].model, "open-mixtral-8x22b");

        let default: Vec<_> = entries.iter().filter(|e| e.default).collect();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].model, "open-mistral-nemo");
    }

    #[test]
    fn test_model_entries_unknown_provider() {
        assert!(model_entries(&Config::default(), Some("copilot")).is_err());
    }

    #[test]
    fn test_model_entry_json_shape() {
        let entries = model_entries(&Config::default(), Some("gigachat")).unwrap();
        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value[0]["model"], "GigaChat");
        assert_eq!(value[0]["default"], true);
        assert_eq!(value[1]["model"], "GigaChat-Pro");
    }

    #[test]
    fn test_list_models_returns_ok() {
        assert!(list_models(&Config::default(), None, true).is_ok());
        assert!(list_models(&Config::default(), Some("mistral"), false).is_ok());
    }
}
