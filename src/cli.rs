//! Command-line interface definition for chatbatch
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for single questions, batch runs, authentication
//! checks and model listing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatbatch - send prompts to hosted chat models, one at a time or in bulk
///
/// Supports GigaChat (token exchange) and Mistral (API key) backends.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatbatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Request timeout in seconds (overrides session.timeout_seconds)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatbatch
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send one message and print the answer
    Ask {
        /// Message text
        message: String,

        /// Override the provider from config (gigachat, mistral)
        #[arg(short, long)]
        provider: Option<String>,

        /// Override the configured system prompt
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Answer every row of a JSON Lines file
    Batch {
        /// Input JSON Lines file
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON Lines file (overwritten)
        #[arg(short, long)]
        output: PathBuf,

        /// Override the provider from config (gigachat, mistral)
        #[arg(short, long)]
        provider: Option<String>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Verify credentials with a provider
    Auth {
        /// Provider to authenticate with (gigachat, mistral)
        ///
        /// If omitted the configured provider is used.
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// List the models a provider offers
    Models {
        /// Filter by provider (gigachat, mistral); all providers if omitted
        #[arg(short, long)]
        provider: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            timeout: None,
            command: Commands::Models {
                provider: None,
                json: false,
            },
        }
    }
}
