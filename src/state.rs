//! UI-agnostic conversation state
//!
//! The conversation is owned by one session and only ever handed out as
//! shared slices, so stored turns cannot change after they are appended.

use serde::{Deserialize, Serialize};

/// Synthetic assistant turn every conversation starts with.
pub const GREETING: &str = "How may I assist you today?";

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender
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

/// Ordered, append-only list of turns. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            turns: vec![Turn::assistant(GREETING)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    // Always false; kept so clippy's len_without_is_empty stays quiet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> &Turn {
        // The greeting is never removed, so there is always a last turn.
        &self.turns[self.turns.len() - 1]
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Drop the trailing user turn if it has not been answered yet.
    ///
    /// Returns the removed turn. The greeting is an assistant turn, so this
    /// can never empty the conversation.
    pub fn pop_unanswered(&mut self) -> Option<Turn> {
        if self.last().role == Role::User {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Reset to the single greeting turn.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.turns.push(Turn::assistant(GREETING));
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_has_greeting() {
        let conversation = Conversation::new();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.turns()[0], Turn::assistant(GREETING));
    }

    #[test]
    fn test_reset_restores_single_greeting() {
        let mut conversation = Conversation::new();
        conversation.push_user("make me a study plan");
        conversation.push_assistant("Sure.");
        conversation.push_user("and a timetable");

        conversation.reset();

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.last(), &Turn::assistant(GREETING));
    }

    #[test]
    fn test_turns_keep_chronological_order() {
        let mut conversation = Conversation::new();
        conversation.push_user("first");
        conversation.push_assistant("second");

        let roles: Vec<Role> = conversation.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(conversation.last().content, "second");
    }

    #[test]
    fn test_pop_unanswered_only_removes_user_turn() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.pop_unanswered(), None);

        conversation.push_user("homework help");
        assert_eq!(conversation.pop_unanswered(), Some(Turn::user("homework help")));
        assert_eq!(conversation.len(), 1);
        assert!(!conversation.is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
