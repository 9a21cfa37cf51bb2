//! User-facing failure text. The opener varies between calls; the
//! structure (opener, what happened, suggestions) never does.

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::actions::available_actions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingInput,
    NotFound,
    Forbidden,
    Invalid,
    Unrecognized,
    Unavailable,
    Timeout,
}

impl FailureKind {
    fn openers(&self) -> &'static [&'static str] {
        match self {
            FailureKind::MissingInput => &[
                "I need a little more detail to do that.",
                "Almost there, I'm just missing something.",
                "I can do that once I know a bit more.",
            ],
            FailureKind::NotFound => &[
                "I couldn't find what you were looking for.",
                "I looked, but nothing matched.",
                "That one doesn't seem to exist yet.",
            ],
            FailureKind::Forbidden => &[
                "I'm not able to do that for you.",
                "That's outside what your account can change.",
                "Sorry, that action isn't allowed here.",
            ],
            FailureKind::Invalid => &[
                "Something in that request didn't check out.",
                "I couldn't save that as written.",
                "A couple of details need fixing first.",
            ],
            FailureKind::Unrecognized => &[
                "I'm not sure what you'd like me to do.",
                "I didn't quite catch that.",
                "I couldn't map that to something I can do.",
            ],
            FailureKind::Unavailable => &[
                "I'm having trouble reaching the task service right now.",
                "Something went wrong on my side.",
                "I hit a snag while working on that.",
            ],
            FailureKind::Timeout => &[
                "That took longer than expected, so I stopped.",
                "I ran out of time working on that.",
            ],
        }
    }

    fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FailureKind::MissingInput => &[
                "Name the task, person or project explicitly",
                "Put titles in quotes, e.g. create task \"Draft homepage copy\"",
            ],
            FailureKind::NotFound => &[
                "Check the spelling of the name or title",
                "Ask me to search, e.g. search for \"report\"",
                "List tasks or team members to see what exists",
            ],
            FailureKind::Forbidden => &[
                "Ask an admin to make the change",
                "Check that you are assigned to the task",
            ],
            FailureKind::Invalid => &[
                "Use dates like 2025-03-31",
                "Make sure the status or priority exists in your workspace",
            ],
            FailureKind::Unrecognized => &[
                "Try a direct instruction, e.g. show Tom's tasks",
                "Pick one of the actions listed below",
            ],
            FailureKind::Unavailable => &[
                "Try again in a moment",
                "If it keeps happening, let your admin know",
            ],
            FailureKind::Timeout => &[
                "Try again with a shorter, more specific request",
                "Try again in a moment",
            ],
        }
    }
}

pub fn friendly_failure(kind: FailureKind, detail: &str) -> String {
    let opener = kind
        .openers()
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Something went wrong.");

    let mut content = format!("{}\n\n**What happened:** {}\n\n**You could try:**", opener, detail.trim());
    for suggestion in kind.suggestions() {
        content.push_str(&format!("\n• {}", suggestion));
    }
    if kind == FailureKind::Unrecognized {
        content.push_str(&format!("\n\n**Here's what I can do:**\n{}", available_actions()));
    }
    content
}

/// Oracle answered in prose: pass it on with the action list appended.
pub fn with_available_actions(text: &str) -> String {
    format!("{}\n\n**Here's what I can do:**\n{}", text.trim(), available_actions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_is_stable_across_calls() {
        for _ in 0..10 {
            let text = friendly_failure(FailureKind::NotFound, "No task matches \"budget\".");
            let opener = text.lines().next().unwrap();
            assert!(FailureKind::NotFound.openers().contains(&opener));
            assert!(text.contains("**What happened:** No task matches \"budget\"."));
            assert!(text.contains("**You could try:**\n• Check the spelling"));
            assert!(!text.contains("Here's what I can do"));
        }
    }

    #[test]
    fn unrecognized_lists_actions() {
        let text = friendly_failure(FailureKind::Unrecognized, "No rule matched.");
        assert!(text.contains("**create_task**"));
        assert!(with_available_actions("Hello!").starts_with("Hello!\n\n**Here's what I can do:**"));
    }
}
