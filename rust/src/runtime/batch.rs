//! Timed batching of outgoing updates.

use crate::clock::Timestamp;

/// Collects items and releases them together once the batch window closes.
///
/// The window opens with the first item, so delivery latency is bounded by
/// the window even under continuous churn.
#[derive(Clone, Debug)]
pub struct UpdateBatcher<T> {
    window_ms: i64,
    pending: Vec<T>,
    flush_at: Option<Timestamp>,
}

impl<T> UpdateBatcher<T> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms as i64,
            pending: Vec::new(),
            flush_at: None,
        }
    }

    pub fn push(&mut self, item: T, now: Timestamp) {
        self.pending.push(item);
        self.flush_at.get_or_insert(now + self.window_ms);
    }

    /// Drain the batch if its window has closed.
    pub fn take_due(&mut self, now: Timestamp) -> Option<Vec<T>> {
        match self.flush_at {
            Some(at) if now >= at => {
                self.flush_at = None;
                Some(std::mem::take(&mut self.pending))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop pending items without delivering them.
    pub fn cancel(&mut self) {
        self.pending.clear();
        self.flush_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_released_together() {
        let mut batcher = UpdateBatcher::new(100);
        batcher.push("a", 0);
        batcher.push("b", 60);
        assert!(batcher.take_due(99).is_none());
        assert_eq!(batcher.take_due(100), Some(vec!["a", "b"]));
        assert!(batcher.is_empty());
        assert!(batcher.take_due(500).is_none());
    }

    #[test]
    fn test_window_starts_with_first_item() {
        let mut batcher = UpdateBatcher::new(100);
        batcher.push(1, 0);
        batcher.push(2, 150);
        assert_eq!(batcher.take_due(150), Some(vec![1, 2]));

        batcher.push(3, 160);
        assert!(batcher.take_due(200).is_none());
        assert_eq!(batcher.take_due(260), Some(vec![3]));
    }

    #[test]
    fn test_cancel_drops_items() {
        let mut batcher = UpdateBatcher::new(100);
        batcher.push(1, 0);
        batcher.cancel();
        assert_eq!(batcher.len(), 0);
        assert!(batcher.take_due(1_000).is_none());
    }
}
