use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::cell::SharedCell;
use crate::pipeline::identity::IdentityRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptorReport {
    pub id: usize,
    pub requests_sent: usize,
}

/// Cancels uniformly random consumers until the cell is finished.
///
/// Delivery is fire-and-forget. The same consumer may be struck repeatedly,
/// including after it already left the pool.
#[derive(Debug)]
pub struct Interruptor {
    cell: Arc<SharedCell>,
    targets: Vec<CancelToken>,
    interval: Duration,
}

impl Interruptor {
    pub fn new(cell: Arc<SharedCell>, targets: Vec<CancelToken>, interval: Duration) -> Self {
        Self {
            cell,
            targets,
            interval,
        }
    }

    pub fn run(self, registry: &IdentityRegistry) -> InterruptorReport {
        let id = registry.assign();
        debug!(interruptor = id, targets = self.targets.len(), "interruptor started");

        let mut rng = rand::thread_rng();
        let mut requests_sent = 0;
        while !self.targets.is_empty() && !self.cell.is_finished() {
            let index = rng.gen_range(0..self.targets.len());
            self.targets[index].cancel();
            requests_sent += 1;

            if self.interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(self.interval);
            }
        }

        debug!(interruptor = id, requests_sent, "interruptor stopped");
        InterruptorReport { id, requests_sent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_immediately_on_finished_cell() {
        let cell = Arc::new(SharedCell::new());
        cell.close();
        let tokens = vec![CancelToken::new(), CancelToken::new()];

        let report = Interruptor::new(cell, tokens.clone(), Duration::ZERO).run(&IdentityRegistry::new());

        assert_eq!(report.requests_sent, 0);
        assert!(tokens.iter().all(|token| !token.is_cancelled()));
    }

    #[test]
    fn test_requests_land_on_targets_until_close() {
        let cell = Arc::new(SharedCell::new());
        let tokens: Vec<CancelToken> = (0..3).map(|_| CancelToken::new()).collect();

        let handle = {
            let cell = Arc::clone(&cell);
            let tokens = tokens.clone();
            thread::spawn(move || Interruptor::new(cell, tokens, Duration::from_millis(1)).run(&IdentityRegistry::new()))
        };

        thread::sleep(Duration::from_millis(50));
        cell.close();
        let report = handle.join().unwrap();

        let delivered: usize = tokens.iter().map(CancelToken::requests).sum();
        assert!(report.requests_sent > 0);
        assert_eq!(delivered, report.requests_sent);
    }
}
