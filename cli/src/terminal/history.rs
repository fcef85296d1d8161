use std::collections::VecDeque;
use crate::session::SerialMessage;

/// Bounded message log. The oldest message is dropped once `capacity` is reached.
pub struct MessageHistory {
    messages: VecDeque<SerialMessage>,
    capacity: usize,
}
impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }
    pub fn push(&mut self, message: SerialMessage) {
        while self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }
    pub fn clear(&mut self) {
        self.messages.clear();
    }
    pub fn get(&self, id: uuid::Uuid) -> Option<&SerialMessage> {
        self.messages.iter().find(|message| message.id() == id)
    }
    pub fn iter(&self) -> impl Iterator<Item = &SerialMessage> {
        self.messages.iter()
    }
    pub fn len(&self) -> usize { self.messages.len() }
    pub const fn capacity(&self) -> usize { self.capacity }
}

#[cfg(test)]
mod tests {
    use serialfmt::DataFormat;
    use super::*;

    fn message(byte: u8) -> SerialMessage {
        SerialMessage::received(vec![byte], DataFormat::Decimal)
    }

    #[test]
    fn test_push_evicts_oldest_at_capacity() {
        let mut history = MessageHistory::new(3);
        for byte in 0..5 {
            history.push(message(byte));
        }
        assert_eq!(history.len(), 3);
        let texts: Vec<_> = history.iter().map(|m| m.text().to_string()).collect();
        assert_eq!(texts, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_get_and_clear() {
        let mut history = MessageHistory::new(10);
        let first = message(1);
        let id = first.id();
        history.push(first);
        history.push(message(2));
        assert_eq!(history.get(id).map(|m| m.data().to_vec()), Some(vec![1]));
        assert!(history.get(uuid::Uuid::new_v4()).is_none());

        history.clear();
        assert_eq!(history.len(), 0);
        assert!(history.get(id).is_none());
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut history = MessageHistory::new(0);
        history.push(message(1));
        history.push(message(2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.iter().next().map(|m| m.text().to_string()), Some("2".to_string()));
    }
}
