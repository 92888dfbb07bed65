//! Append-only measurement queue owned by one `JobConnection`.
//!
//! Single mutator (the poll loop, via [`MeasurementQueue::append`]), two
//! readers (the aggregator via [`MeasurementQueue::snapshot`], and the
//! auto-flush drainer via [`MeasurementQueue::drain_through_first_delimiter`]).
//! The drain step must be atomic with respect to new arrivals, so it is
//! serialized behind the same mutex as `append`.

use crate::protocol::Measurement;
use std::sync::Mutex;

pub struct MeasurementQueue {
    inner: Mutex<Vec<Measurement>>,
}

impl Default for MeasurementQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Merge-append in delivery order, as returned by a `tryUpdate` poll.
    pub fn append(&self, batch: Vec<Measurement>) {
        let mut guard = self.inner.lock().expect("measurement queue mutex poisoned");
        guard.extend(batch);
    }

    pub fn snapshot(&self) -> Vec<Measurement> {
        self.inner.lock().expect("measurement queue mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("measurement queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().expect("measurement queue mutex poisoned").clear();
    }

    /// Drain everything up to and including the first delimiter, replacing
    /// the live queue with whatever remains after it. Returns `None` if no
    /// delimiter has arrived yet.
    pub fn drain_through_first_delimiter(&self) -> Option<Vec<Measurement>> {
        let mut guard = self.inner.lock().expect("measurement queue mutex poisoned");
        let idx = guard.iter().position(|m| m.is_delimiter)?;
        let batch: Vec<Measurement> = guard.drain(..=idx).collect();
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn measurement(name: &str, is_delimiter: bool) -> Measurement {
        Measurement {
            name: name.to_string(),
            timestamp: Utc::now(),
            value: serde_json::json!(1),
            is_delimiter,
        }
    }

    #[test]
    fn append_preserves_delivery_order() {
        let queue = MeasurementQueue::new();
        queue.append(vec![measurement("a", false), measurement("b", false)]);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot[0].name, "a");
        assert_eq!(snapshot[1].name, "b");
    }

    #[test]
    fn drain_through_first_delimiter_is_none_without_one() {
        let queue = MeasurementQueue::new();
        queue.append(vec![measurement("a", false)]);
        assert!(queue.drain_through_first_delimiter().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_through_first_delimiter_replaces_queue() {
        let queue = MeasurementQueue::new();
        queue.append(vec![measurement("a", false), measurement("b", true), measurement("c", false)]);
        let batch = queue.drain_through_first_delimiter().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].name, "b");
        let remaining = queue.snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "c");
    }

    #[test]
    fn drain_is_idempotent_when_no_new_delimiter_arrives() {
        let queue = MeasurementQueue::new();
        queue.append(vec![measurement("a", true)]);
        let first = queue.drain_through_first_delimiter();
        assert!(first.is_some());
        let second = queue.drain_through_first_delimiter();
        assert!(second.is_none());
    }
}
