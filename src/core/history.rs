//! Conversation memory: a bounded, ordered window of turns supplied by the
//! session layer. Used only for narrative coherence in prompts, never as an
//! implicit SQL filter.

/// Keep at most this many turns when compacting history for a prompt.
const MAX_HISTORY_TURNS: usize = 12;
/// Keep at most this many chars, discarding the oldest text first.
const MAX_HISTORY_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Compact the history into a prompt-sized text block.
///
/// Takes the last `MAX_HISTORY_TURNS` turns, labels each line with the
/// speaker, and truncates from the front (oldest text) down to
/// `MAX_HISTORY_CHARS` so the most recent exchange always survives.
pub fn format_history(history: &[ConversationTurn], assistant_name: &str) -> String {
    if history.is_empty() {
        return String::new();
    }

    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let mut lines = Vec::new();
    for turn in &history[start..] {
        if turn.text.is_empty() {
            continue;
        }
        let speaker = match turn.role {
            Role::User => "Usuário",
            Role::Assistant => assistant_name,
        };
        lines.push(format!("{}: {}", speaker, turn.text));
    }

    let joined = lines.join("\n");
    if joined.len() <= MAX_HISTORY_CHARS {
        return joined;
    }

    let mut cut = joined.len() - MAX_HISTORY_CHARS;
    while !joined.is_char_boundary(cut) {
        cut += 1;
    }
    joined[cut..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_formats_to_empty_string() {
        assert_eq!(format_history(&[], "Marcos"), "");
    }

    #[test]
    fn turns_are_labeled_by_speaker() {
        let history = vec![
            ConversationTurn::user("quantas visitas?"),
            ConversationTurn::assistant("Foram 42 visitas."),
        ];
        let out = format_history(&history, "Marcos");
        assert_eq!(out, "Usuário: quantas visitas?\nMarcos: Foram 42 visitas.");
    }

    #[test]
    fn only_last_twelve_turns_are_kept() {
        let history: Vec<_> = (0..20)
            .map(|i| ConversationTurn::user(format!("pergunta {}", i)))
            .collect();
        let out = format_history(&history, "Marcos");
        assert!(!out.contains("pergunta 7"));
        assert!(out.contains("pergunta 8"));
        assert!(out.contains("pergunta 19"));
    }

    #[test]
    fn oversized_history_keeps_the_most_recent_text() {
        let history = vec![
            ConversationTurn::user("x".repeat(5000)),
            ConversationTurn::assistant("resposta final"),
        ];
        let out = format_history(&history, "Marcos");
        assert!(out.len() <= MAX_HISTORY_CHARS);
        assert!(out.ends_with("resposta final"));
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let history = vec![ConversationTurn::user("çãé".repeat(2000))];
        let out = format_history(&history, "Marcos");
        assert!(out.len() <= MAX_HISTORY_CHARS);
        assert!(out.chars().all(|c| "çãé".contains(c) || c == ':' || c.is_ascii()));
    }

    #[test]
    fn empty_turns_are_skipped() {
        let history = vec![
            ConversationTurn::user(""),
            ConversationTurn::user("só esta"),
        ];
        let out = format_history(&history, "Marcos");
        assert_eq!(out, "Usuário: só esta");
    }
}
