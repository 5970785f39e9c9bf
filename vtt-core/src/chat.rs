//! Chat command surface.
//!
//! A single entry point takes the raw chat line and tags the result as a
//! dice roll, a plain message or an error. `/roll <expr>` and `/r <expr>` are
//! the only commands.

use crate::dice::{self, DiceRollResult, DieRoller};
use serde::{Deserialize, Serialize};
use std::fmt;

const ROLL_COMMANDS: [&str; 2] = ["/roll", "/r"];

/// Outcome of one chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatOutcome {
    Roll { result: DiceRollResult },
    Message { text: String },
    Error { reason: String },
}

impl ChatOutcome {
    /// Tag used by the chat UI.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatOutcome::Roll { .. } => "roll",
            ChatOutcome::Message { .. } => "message",
            ChatOutcome::Error { .. } => "error",
        }
    }
}

impl fmt::Display for ChatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatOutcome::Roll { result } => {
                write!(f, "rolled {}: {}", result.original, result)
            }
            ChatOutcome::Message { text } => write!(f, "{text}"),
            ChatOutcome::Error { reason } => write!(f, "error: {reason}"),
        }
    }
}

/// Route a chat line to the dice evaluator or pass it through as a message.
pub fn process_chat<R: DieRoller + ?Sized>(input: &str, roller: &mut R) -> ChatOutcome {
    let line = input.trim();
    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    };

    let is_roll = ROLL_COMMANDS
        .iter()
        .any(|cmd| keyword.eq_ignore_ascii_case(cmd));
    if !is_roll {
        return ChatOutcome::Message {
            text: line.to_string(),
        };
    }

    if rest.is_empty() {
        return ChatOutcome::Error {
            reason: format!("no dice expression given; usage: {keyword} <dice>"),
        };
    }

    ChatOutcome::Roll {
        result: dice::roll(rest, roller),
    }
}

/// Who wrote a chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User(String),
    /// Combat narration and other table events.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub author: Author,
    pub outcome: ChatOutcome,
}

/// Ordered chat history for one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, author: Author, outcome: ChatOutcome) {
        self.entries.push(ChatEntry { author, outcome });
    }

    /// Append a system narration line.
    pub fn narrate(&mut self, text: impl Into<String>) {
        self.push(Author::System, ChatOutcome::Message { text: text.into() });
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
