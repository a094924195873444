//! Application-facing transmit queue.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::wire::Message;

/// FIFO of payload messages awaiting transmission.
///
/// Any number of producers may push concurrently; only the session worker
/// pops, and only while handling a poll cycle. Insertion order is preserved
/// and the queue is unbounded (backpressure is the caller's concern).
#[derive(Debug, Default)]
pub struct TransmitQueue {
    inner: Mutex<VecDeque<Message>>,
}

impl TransmitQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the back.
    pub fn push(&self, message: Message) {
        self.lock().push_back(message);
    }

    /// Take the oldest pending message, if any.
    pub fn pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    /// Number of pending messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        // A panicked producer leaves the queue itself intact.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = TransmitQueue::new();
        queue.push(Message::Data(vec![1]));
        queue.push(Message::Data(vec![2]));
        queue.push(Message::Data(vec![3]));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(Message::Data(vec![1])));
        assert_eq!(queue.pop(), Some(Message::Data(vec![2])));
        assert_eq!(queue.pop(), Some(Message::Data(vec![3])));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(TransmitQueue::new());

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || queue.push(Message::Data(vec![i])))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 8);
        let mut seen: Vec<u8> = std::iter::from_fn(|| queue.pop())
            .map(|m| match m {
                Message::Data(bytes) => bytes[0],
                other => panic!("unexpected message {other:?}"),
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
