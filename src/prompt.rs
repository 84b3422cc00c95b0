use crate::state::{Role, Turn};

/// Instruction prefix sent ahead of every dialogue.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant. You do not respond as 'User' or pretend to be 'User'. You only respond once as 'Assistant'.";

/// Flatten the dialogue into the single prompt string the chat models expect.
///
/// Each turn becomes `User: ...` or `Assistant: ...` followed by a blank
/// line, and the new input is appended with a trailing `Assistant: ` cue.
/// Nothing is truncated, so the prompt grows with the history.
pub fn build_prompt(history: &[Turn], new_input: &str, system_preamble: &str) -> String {
    let mut prompt = String::from(system_preamble);

    for turn in history {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push_str("\n\n");
    }

    prompt.push(' ');
    prompt.push_str(new_input);
    prompt.push_str(" Assistant: ");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GREETING;

    #[test]
    fn test_prompt_layout() {
        let history = vec![Turn::assistant(GREETING), Turn::user("study plan please")];
        let prompt = build_prompt(&history, "study plan please", SYSTEM_PREAMBLE);

        assert_eq!(
            prompt,
            format!(
                "{}Assistant: {}\n\nUser: study plan please\n\n study plan please Assistant: ",
                SYSTEM_PREAMBLE, GREETING
            )
        );
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(build_prompt(&[], "hi", "SYS."), "SYS. hi Assistant: ");
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let history = vec![Turn::assistant(GREETING), Turn::user("homework")];
        let first = build_prompt(&history, "homework", SYSTEM_PREAMBLE);
        let second = build_prompt(&history, "homework", SYSTEM_PREAMBLE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extra_turn_lengthens_and_preserves_order() {
        let mut history = vec![
            Turn::assistant(GREETING),
            Turn::user("revision timetable"),
            Turn::assistant("Here is one."),
        ];
        let shorter = build_prompt(&history, "more", SYSTEM_PREAMBLE);

        history.push(Turn::user("add breaks"));
        let longer = build_prompt(&history, "more", SYSTEM_PREAMBLE);

        assert!(longer.len() > shorter.len());

        let positions: Vec<usize> = ["Assistant: How may", "User: revision", "Assistant: Here is", "User: add breaks"]
            .iter()
            .map(|needle| longer.find(needle).expect("turn present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
