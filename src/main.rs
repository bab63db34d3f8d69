//! chatbatch - send prompts to hosted chat models
//!
#![doc = "chatbatch - send prompts to hosted chat models"]
#![doc = "Main entry point for the chatbatch command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatbatch::cli::{Cli, Commands};
use chatbatch::commands;
use chatbatch::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Ask {
            message,
            provider,
            system,
        } => {
            if let Some(p) = &provider {
                tracing::debug!("Using provider override: {}", p);
            }
            commands::ask::run_ask(config, message, provider, system).await?;
            Ok(())
        }
        Commands::Batch {
            input,
            output,
            provider,
            no_progress,
        } => {
            tracing::info!("Starting batch: {} -> {}", input.display(), output.display());
            commands::batch::run(config, input, output, provider, !no_progress).await?;
            Ok(())
        }
        Commands::Auth { provider } => {
            // Fall back to the configured provider when no override is given
            let provider = provider.unwrap_or_else(|| config.provider.provider_type.clone());
            commands::auth::authenticate(config, provider).await?;
            Ok(())
        }
        Commands::Models { provider, json } => {
            commands::models::list_models(&config, provider.as_deref(), json)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "chatbatch=debug"
    } else {
        "chatbatch=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
