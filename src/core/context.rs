// src/core/context.rs — Render session history into one upstream prompt
//
// The upstream takes a single message string, so prior turns are flattened
// into role-labelled lines. When the result is over the character budget the
// oldest exchange is dropped from the history itself, so the stored session
// never sends that context again.

use crate::core::types::{Role, Turn};

/// Line labels the upstream model was prompted with on the web chat.
const USER_LABEL: &str = "用户";
const MODEL_LABEL: &str = "模型";

/// Rendered prompt plus how many turns were dropped to fit the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub dropped_turns: usize,
}

impl Prompt {
    pub fn was_truncated(&self) -> bool {
        self.dropped_turns > 0
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => USER_LABEL,
        _ => MODEL_LABEL,
    }
}

/// Render `history` followed by the new user line, without truncation.
pub fn render(history: &[Turn], new_message: &str) -> String {
    let mut lines: Vec<String> = history
        .iter()
        .map(|turn| format!("{}: {}", label(turn.role), turn.content))
        .collect();
    lines.push(format!("{USER_LABEL}: {new_message}"));
    lines.join("\n")
}

/// Build the prompt for `new_message`, dropping whole exchanges from the front
/// of `history` until the rendered text fits in `max_chars` characters.
///
/// Dropped turns are removed from `history` in place. The newest message is
/// never cut: if it alone exceeds the budget it is returned as-is once the
/// history is exhausted.
pub fn build_prompt(history: &mut Vec<Turn>, new_message: &str, max_chars: usize) -> Prompt {
    let mut text = render(history, new_message);
    let mut dropped_turns = 0;

    while text.chars().count() > max_chars && !history.is_empty() {
        // oldest user turn, then the assistant turn that answered it
        let take = history.len().min(2);
        history.drain(..take);
        dropped_turns += take;
        text = render(history, new_message);
    }

    if dropped_turns > 0 {
        tracing::warn!(
            dropped_turns,
            remaining_turns = history.len(),
            chars = text.chars().count(),
            max_chars,
            "Context over budget, dropped oldest turns"
        );
    }

    Prompt {
        text,
        dropped_turns,
    }
}
