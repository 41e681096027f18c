use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// Header line that opens every rendered transcript
pub const TRANSCRIPT_HEADER: &str = "## Conversation";

/// Transcript shown for a session with no turns
pub const EMPTY_TRANSCRIPT: &str = "## Conversation\n_No messages yet._";

const TURN_DELIMITER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation. Fields are private so a turn cannot change
/// after it has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
    time: String,
}

impl Turn {
    /// Create a turn stamped with the current local time
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self::with_time(role, text, timestamp_now())
    }

    pub fn with_time(role: Role, text: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            time: time.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn time(&self) -> &str {
        &self.time
    }
}

/// Local time in the `2024-05-01T12:30:00+0200` shape used for turns and log context
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

/// Ordered history of one UI session.
///
/// Turns are only ever added as a user/assistant pair through
/// [`SessionState::record_exchange`], so the history never ends on an
/// unanswered user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    turns: Vec<Turn>,
}

impl SessionState {
    pub fn new() -> Self {
        debug!("Creating new session state");
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a user turn and the assistant turn that answers it
    pub fn record_exchange(&mut self, user: Turn, assistant: Turn) {
        debug_assert_eq!(user.role(), Role::User);
        debug_assert_eq!(assistant.role(), Role::Assistant);
        trace!("User turn: {}", user.text());
        trace!("Assistant turn: {}", assistant.text());

        self.turns.push(user);
        self.turns.push(assistant);

        debug!("Session now has {} turns", self.turns.len());
    }

    pub fn clear(&mut self) {
        debug!("Clearing session with {} turns", self.turns.len());
        self.turns.clear();
    }

    /// Render the history as a markdown transcript
    pub fn render_transcript(&self) -> String {
        render_transcript(&self.turns)
    }
}

/// Render turns as `**ROLE (time)**:` blocks under the conversation header.
/// An empty slice renders [`EMPTY_TRANSCRIPT`].
pub fn render_transcript(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }

    let mut lines = Vec::with_capacity(turns.len() + 1);
    lines.push(TRANSCRIPT_HEADER.to_string());
    for turn in turns {
        lines.push(format!(
            "**{} ({})**:\n\n{}\n{}",
            turn.role().as_str().to_uppercase(),
            turn.time(),
            turn.text(),
            TURN_DELIMITER
        ));
    }
    lines.join("\n")
}
