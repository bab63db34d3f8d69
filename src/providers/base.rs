//! Session trait and common conversation types for chatbatch
//!
//! This module defines the [`ChatSession`] trait that every backend
//! implements, the [`Message`] and [`ConversationHistory`] types that make up
//! conversation state, and the [`AskOutcome`] returned from a round-trip.

use crate::error::{AskFailure, ChatbatchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Steering instructions seeded at the start of a conversation
    System,
    /// Text submitted by the caller
    User,
    /// Text produced by the model
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation entry, in the shape the chat-completion APIs expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Message {
    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbatch::providers::{Message, Role};
    ///
    /// let msg = Message::system("You are a code reviewer");
    /// assert_eq!(msg.role, Role::System);
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbatch::providers::{Message, Role};
    ///
    /// let msg = Message::user("def f(): pass");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.content, "def f(): pass");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation state owned by one session
///
/// A system message, when present, is always first and there is never more
/// than one. The only mutations are [`reset`](Self::reset) and
/// [`commit`](Self::commit), which keeps that invariant by construction.
///
/// # Examples
///
/// ```
/// use chatbatch::providers::{ConversationHistory, Role};
///
/// let mut history = ConversationHistory::new(Some("Be brief".to_string()));
/// assert_eq!(history.len(), 1);
///
/// let turn = history.begin_turn("print(1", false);
/// history.commit(turn, "Missing closing parenthesis");
/// assert_eq!(history.len(), 3);
/// assert_eq!(history.messages()[0].role, Role::System);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    system_prompt: Option<String>,
}

impl ConversationHistory {
    /// Creates a history seeded with the system prompt, if any
    ///
    /// Blank prompts are treated as absent.
    pub fn new(system_prompt: Option<String>) -> Self {
        let system_prompt = system_prompt.filter(|p| !p.trim().is_empty());
        let mut history = Self {
            messages: Vec::new(),
            system_prompt,
        };
        history.reset();
        history
    }

    /// Rebuilds a history from messages captured on the wire
    ///
    /// # Errors
    ///
    /// Returns error if a system message appears anywhere but first, or more
    /// than once.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        for (index, message) in messages.iter().enumerate() {
            if message.role == Role::System && index != 0 {
                return Err(ChatbatchError::Provider(format!(
                    "system message at position {} must be first and unique",
                    index
                ))
                .into());
            }
        }

        let system_prompt = messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        Ok(Self {
            messages,
            system_prompt,
        })
    }

    /// Clears every message, then re-seeds the system prompt
    pub fn reset(&mut self) {
        self.messages.clear();
        if let Some(prompt) = &self.system_prompt {
            self.messages.push(Message::system(prompt.clone()));
        }
    }

    /// Starts a round-trip without touching the stored history
    ///
    /// The returned turn holds the messages to send: the current history (or
    /// only the system message when `clear_history` is set) followed by the
    /// user message.
    pub fn begin_turn(&self, user_message: &str, clear_history: bool) -> PendingTurn {
        let mut messages = if clear_history {
            self.system_prompt
                .as_ref()
                .map(|p| vec![Message::system(p.clone())])
                .unwrap_or_default()
        } else {
            self.messages.clone()
        };
        messages.push(Message::user(user_message));
        PendingTurn { messages }
    }

    /// Completes a successful round-trip by storing the turn and the answer
    pub fn commit(&mut self, turn: PendingTurn, answer: impl Into<String>) {
        self.messages = turn.messages;
        self.messages.push(Message::assistant(answer));
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The configured system prompt
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Number of messages, system message included
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history holds no messages at all
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Messages prepared for one exchange, not yet part of the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    messages: Vec<Message>,
}

impl PendingTurn {
    /// Messages to send, user message last
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Result of [`ChatSession::ask`]
///
/// Kept distinct from `Option<String>` so that "no answer" cannot be confused
/// with an empty answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// The model's reply
    Answer(String),
    /// The exchange failed; history was left untouched
    Failed(AskFailure),
}

impl AskOutcome {
    /// Whether this outcome carries an answer
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Answer(_))
    }

    /// Borrow the answer, if any
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Failed(_) => None,
        }
    }

    /// Borrow the failure, if any
    pub fn failure(&self) -> Option<&AskFailure> {
        match self {
            Self::Answer(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Take the answer, if any
    pub fn into_answer(self) -> Option<String> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Failed(_) => None,
        }
    }

    /// Take the answer or substitute `placeholder`
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbatch::error::AskFailure;
    /// use chatbatch::providers::AskOutcome;
    ///
    /// let failed = AskOutcome::Failed(AskFailure::Unauthenticated);
    /// assert_eq!(failed.answer_or(""), "");
    /// ```
    pub fn answer_or(self, placeholder: &str) -> String {
        self.into_answer()
            .unwrap_or_else(|| placeholder.to_string())
    }
}

/// A stateful conversation with a remote chat-completion provider
///
/// Each backend owns its history and credentials. Failures never escape as
/// errors: [`ask`](Self::ask) always returns an [`AskOutcome`]. Methods take
/// `&mut self`, so a session is driven by one caller at a time.
#[async_trait]
pub trait ChatSession: Send {
    /// Sends `user_message` and returns the model's reply
    ///
    /// When `clear_history` is set the conversation restarts from the system
    /// prompt. On success the user message and the reply are appended to the
    /// history; on failure the history is left exactly as it was.
    async fn ask(&mut self, user_message: &str, clear_history: bool) -> AskOutcome;

    /// Clears the conversation back to the system prompt
    fn reset(&mut self);

    /// Current conversation state
    fn history(&self) -> &ConversationHistory;

    /// Short provider identifier ("gigachat", "mistral")
    fn provider_name(&self) -> &'static str;

    /// Model identifier sent with every request
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_message_serialization_shape() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_history_without_system_prompt_starts_empty() {
        let history = ConversationHistory::new(None);
        assert!(history.is_empty());
        assert!(history.system_prompt().is_none());
    }

    #[test]
    fn test_history_blank_system_prompt_is_ignored() {
        let history = ConversationHistory::new(Some("   ".to_string()));
        assert!(history.is_empty());
    }

    #[test]
    fn test_history_seeds_system_prompt() {
        let history = ConversationHistory::new(Some("Be brief".to_string()));
        assert_eq!(history.messages(), &[Message::system("Be brief")]);
    }

    #[test]
    fn test_begin_turn_does_not_mutate_history() {
        let history = ConversationHistory::new(Some("Be brief".to_string()));
        let turn = history.begin_turn("hello", false);
        assert_eq!(turn.messages().len(), 2);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_commit_grows_history_by_two() {
        let mut history = ConversationHistory::new(Some("Be brief".to_string()));
        for round in 0..3 {
            let before = history.len();
            let turn = history.begin_turn(&format!("question {}", round), false);
            history.commit(turn, format!("answer {}", round));
            assert_eq!(history.len(), before + 2);
        }
        let system_count = history
            .messages()
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
    }

    #[test]
    fn test_clear_turn_keeps_only_system_and_user() {
        let mut history = ConversationHistory::new(Some("Be brief".to_string()));
        for _ in 0..3 {
            let turn = history.begin_turn("q", false);
            history.commit(turn, "a");
        }
        let turn = history.begin_turn("fresh", true);
        assert_eq!(
            turn.messages(),
            &[Message::system("Be brief"), Message::user("fresh")]
        );
        history.commit(turn, "done");
        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[0].role, Role::System);
    }

    #[test]
    fn test_clear_turn_without_system_prompt() {
        let mut history = ConversationHistory::new(None);
        let turn = history.begin_turn("q", false);
        history.commit(turn, "a");
        let turn = history.begin_turn("fresh", true);
        assert_eq!(turn.messages(), &[Message::user("fresh")]);
    }

    #[test]
    fn test_reset_reseeds_system_prompt() {
        let mut history = ConversationHistory::new(Some("Be brief".to_string()));
        let turn = history.begin_turn("q", false);
        history.commit(turn, "a");
        history.reset();
        assert_eq!(history.messages(), &[Message::system("Be brief")]);
    }

    #[test]
    fn test_from_messages_rejects_late_system_message() {
        let result = ConversationHistory::from_messages(vec![
            Message::user("q"),
            Message::system("late"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_messages_recovers_system_prompt() {
        let history = ConversationHistory::from_messages(vec![
            Message::system("Be brief"),
            Message::user("q"),
            Message::assistant("a"),
        ])
        .unwrap();
        assert_eq!(history.system_prompt(), Some("Be brief"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_outcome_accessors() {
        let answer = AskOutcome::Answer(String::new());
        assert!(answer.is_answer());
        assert_eq!(answer.answer(), Some(""));

        let failed = AskOutcome::Failed(AskFailure::RetryExhausted { attempts: 2 });
        assert!(!failed.is_answer());
        assert!(failed.answer().is_none());
        assert_eq!(
            failed.failure(),
            Some(&AskFailure::RetryExhausted { attempts: 2 })
        );
        assert_eq!(failed.answer_or("n/a"), "n/a");
    }
}
