use std::borrow::Cow;

use tracing::warn;

/// CLIP's 77-token ceiling, approximated in characters. Prompts past
/// this are truncated before submission, never rejected.
pub const MAX_PROMPT_CHARS: usize = 250;

/// Cut an over-long prompt down to the ceiling, preferring to break
/// at the last comma or space past the halfway mark so a trailing
/// clause is dropped whole.
pub fn truncate_prompt(prompt: &str) -> Cow<'_, str> {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        return Cow::Borrowed(prompt);
    }

    let head: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();
    let last_break = head.rfind(',').unwrap_or(0).max(head.rfind(' ').unwrap_or(0));
    let cut = if last_break > 150 {
        head[..last_break].trim_end_matches(',').trim().to_string()
    } else {
        head.trim().to_string()
    };
    warn!(chars = cut.chars().count(), "prompt truncated to fit token ceiling");
    Cow::Owned(cut)
}

/// The text actually submitted: the (truncated) prompt with the
/// project's trigger keyword in front, when it has one.
pub fn effective_prompt(trigger: Option<&str>, prompt: &str) -> String {
    let truncated = truncate_prompt(prompt);
    match trigger {
        Some(trigger) if !trigger.is_empty() => format!("{trigger}, {truncated}"),
        _ => truncated.into_owned(),
    }
}
