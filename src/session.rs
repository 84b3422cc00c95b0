//! Per-user chat session and the interaction flow around it.
//!
//! A turn goes through: record the user text, admission check, prompt
//! assembly, generation, record the answer. Callers that drive generation
//! themselves (the terminal UI streams on a background task) use
//! [`Session::submit`] / [`Session::complete`] / [`Session::abandon`];
//! everything else can call [`respond`].

use tracing::{debug, info, warn};

use crate::admission::{self, Rejection};
use crate::ai::{collect_fragments, InferenceClient, InferenceRequest};
use crate::error::Result;
use crate::model::ModelConfig;
use crate::prompt::{build_prompt, SYSTEM_PREAMBLE};
use crate::state::{Conversation, Role};

/// Result of handing new user text to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Blank input; nothing recorded.
    Ignored,
    /// Recorded, but refused before reaching the model.
    Rejected(Rejection),
    /// The latest turn is already an assistant answer; nothing to generate.
    AlreadyAnswered,
    /// Recorded and admitted; run this request and report back.
    Generate(InferenceRequest),
}

/// How a whole interaction driven by [`respond`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ignored,
    Rejected(Rejection),
    AlreadyAnswered,
    Answered(String),
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    conversation: Conversation,
    pub config: ModelConfig,
}

impl Session {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            conversation: Conversation::new(),
            config,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Record the user's text and decide what happens next.
    ///
    /// The user turn is appended before the admission check, so a refused
    /// message still shows in the history. Text is stored as typed;
    /// whitespace-only input is ignored.
    pub fn submit(&mut self, text: &str) -> Submission {
        if text.trim().is_empty() {
            return Submission::Ignored;
        }

        self.conversation.push_user(text);

        if let Err(rejection) = admission::admit(text) {
            info!(?rejection, "message refused by admission check");
            return Submission::Rejected(rejection);
        }

        if self.conversation.last().role == Role::Assistant {
            return Submission::AlreadyAnswered;
        }

        let prompt = build_prompt(self.conversation.turns(), text, SYSTEM_PREAMBLE);
        debug!(
            turns = self.conversation.len(),
            prompt_chars = prompt.len(),
            model = self.config.model.as_str(),
            "message admitted"
        );
        Submission::Generate(InferenceRequest::new(prompt, &self.config))
    }

    /// Record the finished answer.
    pub fn complete(&mut self, response: String) {
        self.conversation.push_assistant(response);
    }

    /// Roll back after a failed generation so no unanswered user turn
    /// lingers in the history.
    pub fn abandon(&mut self) {
        if let Some(turn) = self.conversation.pop_unanswered() {
            debug!(chars = turn.content.len(), "dropped unanswered user turn");
        }
    }

    /// Reset the conversation to the greeting. Model settings are kept.
    pub fn clear(&mut self) {
        self.conversation.reset();
    }
}

/// Run one full interaction, streaming fragments to `on_fragment`.
///
/// On an inference failure the unanswered user turn is rolled back and the
/// error is returned.
pub async fn respond<C, F>(
    session: &mut Session,
    client: &C,
    text: &str,
    on_fragment: F,
) -> Result<Outcome>
where
    C: InferenceClient + ?Sized,
    F: FnMut(&str),
{
    let request = match session.submit(text) {
        Submission::Ignored => return Ok(Outcome::Ignored),
        Submission::Rejected(rejection) => return Ok(Outcome::Rejected(rejection)),
        Submission::AlreadyAnswered => return Ok(Outcome::AlreadyAnswered),
        Submission::Generate(request) => request,
    };

    let generated = match client.stream(&request).await {
        Ok(fragments) => collect_fragments(fragments, on_fragment).await,
        Err(e) => Err(e),
    };

    match generated {
        Ok(response) => {
            session.complete(response.clone());
            Ok(Outcome::Answered(response))
        }
        Err(e) => {
            warn!(error = %e, "generation failed");
            session.abandon();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Turn, GREETING};

    #[test]
    fn test_blank_input_is_ignored() {
        let mut session = Session::default();
        assert_eq!(session.submit("   "), Submission::Ignored);
        assert_eq!(session.conversation().len(), 1);
    }

    #[test]
    fn test_rejected_message_is_still_recorded() {
        let mut session = Session::default();
        assert_eq!(
            session.submit("Tell me a joke"),
            Submission::Rejected(Rejection::OffTopic)
        );
        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.conversation().last(), &Turn::user("Tell me a joke"));
    }

    #[test]
    fn test_admitted_message_builds_request() {
        let mut session = Session::default();
        session.config.nudge_max_length(1);

        let Submission::Generate(request) = session.submit("I need a study plan") else {
            panic!("expected generation");
        };

        assert_eq!(request.model, session.config.model.identifier());
        assert_eq!(request.input.max_length, 520);
        assert_eq!(request.input.repetition_penalty, 1);
        assert!(request.input.prompt.starts_with(SYSTEM_PREAMBLE));
        assert!(request
            .input
            .prompt
            .ends_with("User: I need a study plan\n\n I need a study plan Assistant: "));
        assert!(request.input.prompt.contains(GREETING));
    }

    #[test]
    fn test_input_is_recorded_as_typed() {
        let mut session = Session::default();

        let Submission::Generate(request) = session.submit("  homework schedule \n") else {
            panic!("expected generation");
        };

        assert_eq!(session.conversation().last(), &Turn::user("  homework schedule \n"));
        assert!(request
            .input
            .prompt
            .ends_with("User:   homework schedule \n\n\n   homework schedule \n Assistant: "));
    }

    #[test]
    fn test_complete_appends_assistant_turn() {
        let mut session = Session::default();
        session.submit("homework schedule");
        session.complete("Monday: maths".to_string());

        assert_eq!(session.conversation().len(), 3);
        assert_eq!(session.conversation().last(), &Turn::assistant("Monday: maths"));
    }

    #[test]
    fn test_abandon_rolls_back_user_turn() {
        let mut session = Session::default();
        session.submit("homework schedule");
        session.abandon();
        assert_eq!(session.conversation().len(), 1);

        // Nothing to roll back once answered.
        session.submit("homework schedule");
        session.complete("ok".to_string());
        session.abandon();
        assert_eq!(session.conversation().len(), 3);
    }

    #[test]
    fn test_clear_keeps_model_settings() {
        let mut session = Session::default();
        session.config.nudge_temperature(10);
        session.submit("revision timetable");
        session.complete("done".to_string());

        session.clear();

        assert_eq!(session.conversation().turns(), &[Turn::assistant(GREETING)]);
        assert_eq!(session.config.temperature, 0.2);
    }
}
