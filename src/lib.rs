//! chatbatch - chat-session clients for hosted LLM APIs
//!
//! This library provides a uniform conversational session over two chat
//! completion providers, GigaChat (OAuth-style token exchange) and Mistral
//! (static API key with rate-limit retries), plus a batch driver that runs
//! one exchange per row of a JSON Lines file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `providers`: The `ChatSession` trait, conversation history, and the
//!   GigaChat and Mistral sessions
//! - `batch`: JSON Lines batch driver
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use chatbatch::{create_session, ChatSession, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let mut session = create_session(&config, None)?;
//!     let reply = session.ask("def f(x) return x", true).await;
//!     println!("{}", reply.answer_or("<no answer>"));
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod providers;

// Re-export commonly used types
pub use batch::{run_batch, BatchSummary};
pub use config::Config;
pub use error::{AskFailure, ChatbatchError, Result};
pub use providers::{create_session, AskOutcome, ChatSession, ConversationHistory, Message, Role};
