//! Conversation history.

use crate::model::Message;

/// Append-only log of conversation turns.
///
/// The snapshot is the model context: the entire history is resent on
/// every model call, unsummarized and untruncated. Growth is unbounded by
/// design; `clear` is the only destructive operation and runs only on an
/// explicit user reset.
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Turns are immutable once appended.
    pub fn append(&mut self, turn: Message) {
        self.turns.push(turn);
    }

    /// The ordered turn sequence, used verbatim as model context.
    pub fn snapshot(&self) -> &[Message] {
        &self.turns
    }

    /// Reset to empty. User-initiated only.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut history = History::new();
        history.append(Message::user("first"));
        history.append(Message::assistant("second"));
        history.append(Message::user("third"));

        let texts: Vec<String> = history.snapshot().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn clear_empties_history() {
        let mut history = History::new();
        history.append(Message::user("hello"));
        assert!(!history.is_empty());

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }
}
