use std::collections::VecDeque;

use tokio::time::Instant;

use confab_types::chat::ConversationTurn;

use super::conversation::WindowSnapshot;

/// In-memory state of one conversation.
///
/// `turns` holds at most `cap` entries, oldest first. The system prompt is
/// kept beside them and never counts against the cap.
#[derive(Debug)]
pub(crate) struct Window {
    pub(crate) system: Option<String>,
    pub(crate) turns: VecDeque<ConversationTurn>,
    /// Whether `turns` reflects storage (or an explicit seed).
    pub(crate) loaded: bool,
    pub(crate) last_access: Instant,
}

impl Window {
    pub(crate) fn new() -> Self {
        Self {
            system: None,
            turns: VecDeque::new(),
            loaded: false,
            last_access: Instant::now(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Replace the turns, keeping only the most recent `cap`.
    pub(crate) fn replace(&mut self, turns: Vec<ConversationTurn>, cap: usize) {
        let skip = turns.len().saturating_sub(cap);
        self.turns = turns.into_iter().skip(skip).collect();
        self.loaded = true;
    }

    /// Push a turn, evicting from the front while over `cap`.
    pub(crate) fn push(&mut self, turn: ConversationTurn, cap: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > cap {
            self.turns.pop_front();
        }
    }

    pub(crate) fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            system: self.system.clone(),
            turns: self.turns.iter().cloned().collect(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.system = None;
        self.turns.clear();
        self.loaded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(text: &str) -> ConversationTurn {
        ConversationTurn::user("c1", "u1", text)
    }

    fn texts(window: &Window) -> Vec<&str> {
        window.turns.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = Window::new();
        for text in ["A", "B", "C"] {
            window.push(turn(text), 2);
        }
        assert_eq!(texts(&window), vec!["B", "C"]);
    }

    #[test]
    fn test_replace_keeps_most_recent() {
        let mut window = Window::new();
        window.replace(vec![turn("A"), turn("B"), turn("C"), turn("D")], 3);
        assert_eq!(texts(&window), vec!["B", "C", "D"]);
        assert!(window.loaded);
    }

    #[test]
    fn test_reset_clears_system_and_turns() {
        let mut window = Window::new();
        window.system = Some("be terse".to_string());
        window.push(turn("A"), 5);
        window.reset();
        assert!(window.system.is_none());
        assert!(window.turns.is_empty());
        assert!(window.loaded);
    }
}
