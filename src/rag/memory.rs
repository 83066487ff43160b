use crate::models::ChatTurn;

/// Append-only conversation log, oldest turn first. Never pruned: a
/// pipeline rebuild replaces the whole memory rather than trimming it.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Vec<ChatTurn>,
}

impl ConversationMemory {
    pub fn append(&mut self, question: String, answer: String) {
        self.turns.push(ChatTurn { question, answer });
    }

    pub fn render(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_keeps_turns_in_call_order() {
        let mut memory = ConversationMemory::default();
        for i in 0..5 {
            memory.append(format!("q{}", i), format!("a{}", i));
        }

        assert_eq!(memory.len(), 5);
        let turns = memory.render();
        for (i, turn) in turns.iter().enumerate() {
            assert_eq!(turn.question, format!("q{}", i));
            assert_eq!(turn.answer, format!("a{}", i));
        }
    }

    #[test]
    fn fresh_memory_is_empty() {
        assert!(ConversationMemory::default().is_empty());
    }
}
