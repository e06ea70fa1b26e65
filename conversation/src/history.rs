use llm::{ChatMessage, Role};

/// Append-only conversation log with oldest-first eviction.
///
/// System messages may be stored here but are neither counted against the
/// word budget nor evicted.
#[derive(Clone, Debug, Default)]
pub struct History {
    messages: Vec<ChatMessage>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Total words across non-system messages
    pub fn word_count(&self) -> usize {
        self.non_system().map(ChatMessage::word_count).sum()
    }

    /// Drop the oldest non-system messages until the word total fits in
    /// `max_words` or a single non-system message is left. Returns how many
    /// messages were removed.
    pub fn trim_to(&mut self, max_words: usize) -> usize {
        let mut total = self.word_count();
        let mut remaining = self.non_system().count();
        let mut removed = 0;

        while total > max_words && remaining > 1 {
            let Some(oldest) = self.messages.iter().position(|m| m.role != Role::System) else {
                break;
            };
            total -= self.messages.remove(oldest).word_count();
            remaining -= 1;
            removed += 1;
        }
        removed
    }

    /// Remove the last message if it is a user message still waiting for a reply.
    pub fn pop_unanswered(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(last) if last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    fn non_system(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, tag: &str) -> String {
        (0..n).map(|i| format!("{tag}{i}")).collect::<Vec<_>>().join(" ")
    }

    fn history_of(sizes: &[usize]) -> History {
        let mut history = History::new();
        for (i, &n) in sizes.iter().enumerate() {
            let content = words(n, &format!("m{i}_"));
            if i % 2 == 0 {
                history.push(ChatMessage::user(content));
            } else {
                history.push(ChatMessage::assistant(content));
            }
        }
        history
    }

    #[test]
    fn test_trim_keeps_history_within_budget() {
        let cases: Vec<(Vec<usize>, usize)> = vec![
            (vec![6, 5], 10),
            (vec![1, 1, 1, 1], 2),
            (vec![3, 0, 7, 2, 9], 12),
            (vec![50], 10),
            (vec![0, 0, 0], 0),
            (vec![4, 4, 4, 4, 4, 4], 100),
            (vec![10, 10, 10], 0),
        ];

        for (sizes, max) in cases {
            let mut history = history_of(&sizes);
            history.trim_to(max);
            assert!(
                history.word_count() <= max || history.len() == 1,
                "sizes {sizes:?} max {max}: {} words in {} messages",
                history.word_count(),
                history.len()
            );
        }
    }

    #[test]
    fn test_trim_removes_oldest_first_without_reordering() {
        let mut history = history_of(&[3, 3, 3, 3]);
        let before = history.messages().to_vec();

        let removed = history.trim_to(7);

        assert_eq!(removed, 2);
        assert_eq!(history.messages(), &before[2..]);
    }

    #[test]
    fn test_trim_never_drops_last_message() {
        let mut history = history_of(&[40]);
        assert_eq!(history.trim_to(5), 0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.word_count(), 40);
    }

    #[test]
    fn test_system_messages_are_not_counted_or_evicted() {
        let mut history = History::new();
        history.push(ChatMessage::system("one two three four five six"));
        history.push(ChatMessage::user("a b c"));
        history.push(ChatMessage::assistant("d e f"));

        assert_eq!(history.word_count(), 6);
        history.trim_to(4);

        assert_eq!(
            history.messages(),
            &[
                ChatMessage::system("one two three four five six"),
                ChatMessage::assistant("d e f"),
            ]
        );
    }

    #[test]
    fn test_pop_unanswered() {
        let mut history = History::new();
        history.push(ChatMessage::user("hi"));
        history.push(ChatMessage::assistant("hello"));
        assert_eq!(history.pop_unanswered(), None);

        history.push(ChatMessage::user("again"));
        assert_eq!(history.pop_unanswered(), Some(ChatMessage::user("again")));
        assert_eq!(history.len(), 2);
    }
}
