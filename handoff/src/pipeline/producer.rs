use std::sync::Arc;

use tracing::{debug, trace};

use crate::pipeline::cell::SharedCell;
use crate::pipeline::error::HandoffError;
use crate::pipeline::identity::IdentityRegistry;

/// States the producer moves through during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Running,
    Publishing,
    WaitingConsumed,
    Closing,
    Done,
}

/// What the producer hands back once the stream is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub id: usize,
    pub published: usize,
}

/// Closes the cell when dropped so consumers terminate even if the producer
/// unwinds mid-stream.
struct CloseGuard<'a>(&'a SharedCell);

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Owns the work item stream and feeds it through the shared cell.
#[derive(Debug)]
pub struct Producer {
    cell: Arc<SharedCell>,
    items: Vec<i64>,
    state: ProducerState,
}

impl Producer {
    pub fn new(cell: Arc<SharedCell>, items: Vec<i64>) -> Self {
        Self {
            cell,
            items,
            state: ProducerState::Running,
        }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    fn transition(&mut self, next: ProducerState) {
        trace!(from = ?self.state, to = ?next, "producer state");
        self.state = next;
    }

    /// Publish every item in order, then close the cell exactly once.
    pub fn run(&mut self, registry: &IdentityRegistry) -> Result<ProducerReport, HandoffError> {
        let id = registry.assign();
        let items = std::mem::take(&mut self.items);
        let cell = Arc::clone(&self.cell);
        let guard = CloseGuard(&cell);

        debug!(producer = id, items = items.len(), "producer started");
        let mut published = 0;
        for item in items {
            self.transition(ProducerState::Publishing);
            // Returns only after a consumer drained the value.
            cell.publish_with(item, || self.transition(ProducerState::WaitingConsumed))?;
            published += 1;
        }

        self.transition(ProducerState::Closing);
        drop(guard);
        self.transition(ProducerState::Done);
        debug!(producer = id, published, "producer closed the cell");

        Ok(ProducerReport { id, published })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_stream_still_closes() {
        let cell = Arc::new(SharedCell::new());
        let registry = IdentityRegistry::new();
        let mut producer = Producer::new(Arc::clone(&cell), Vec::new());
        let report = producer.run(&registry).unwrap();

        assert_eq!(report, ProducerReport { id: 1, published: 0 });
        assert_eq!(producer.state(), ProducerState::Done);
        assert!(cell.is_finished());
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn test_publishes_in_order() {
        let cell = Arc::new(SharedCell::new());
        let drain = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || std::iter::from_fn(|| cell.take()).collect::<Vec<_>>())
        };

        let registry = IdentityRegistry::new();
        let mut producer = Producer::new(Arc::clone(&cell), vec![5, -2, 9]);
        let report = producer.run(&registry).unwrap();

        assert_eq!(report.published, 3);
        assert_eq!(producer.state(), ProducerState::Done);
        assert_eq!(drain.join().unwrap(), vec![5, -2, 9]);
    }

    #[test]
    fn test_closed_cell_is_reported() {
        let cell = Arc::new(SharedCell::new());
        cell.close();
        let registry = IdentityRegistry::new();
        let mut producer = Producer::new(cell, vec![1]);
        let result = producer.run(&registry);
        assert_eq!(result, Err(HandoffError::PublishAfterClose));
        // The rejected value never reached the slot, so nothing was awaited.
        assert_eq!(producer.state(), ProducerState::Publishing);
    }

    #[test]
    fn test_waits_for_consumption_while_the_value_is_pending() {
        let cell = Arc::new(SharedCell::new());
        let producer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                let mut producer = Producer::new(cell, vec![11]);
                let report = producer.run(&IdentityRegistry::new());
                (report, producer.state())
            })
        };

        // Nobody drains yet, so the producer must still be blocked.
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!cell.is_finished());
        assert_eq!(cell.take(), Some(11));

        let (report, state) = producer.join().unwrap();
        assert_eq!(report.unwrap().published, 1);
        assert_eq!(state, ProducerState::Done);
        assert!(cell.is_finished());
    }
}
