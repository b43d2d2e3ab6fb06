//! # Shared Cell
//!
//! Single-slot rendezvous between one producer and a pool of competing
//! consumers. One mutex guards the slot and both flags; two condition
//! variables carry the wakeups in each direction.
//!
//! ## Handshake
//! 1. The producer stores a value, raises `ready` and wakes one consumer
//! 2. The first consumer to observe `ready` reads the value and lowers `ready`
//! 3. That consumer wakes the producer, which returns from `publish`
//!
//! `finished` is terminal. Once it is set every blocked or future `take`
//! returns `None` as soon as no value is pending.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::log_handoff;
use crate::pipeline::error::HandoffError;

#[derive(Debug, Default)]
struct CellState {
    value: i64,
    ready: bool,
    finished: bool,
}

#[derive(Debug, Default)]
pub struct SharedCell {
    state: Mutex<CellState>,
    /// Consumers wait here for `ready` or `finished`.
    consumer_cond: Condvar,
    /// The producer waits here for `ready` to drop.
    producer_cond: Condvar,
}

impl SharedCell {
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing panics while the lock is held, so a poisoned guard still
    // protects consistent fields.
    fn lock(&self) -> MutexGuard<'_, CellState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `value` to exactly one consumer and block until it has been
    /// drained.
    pub fn publish(&self, value: i64) -> Result<(), HandoffError> {
        self.publish_with(value, || {})
    }

    /// Like [`publish`](Self::publish), calling `placed` once the value is in
    /// the slot and before the producer starts waiting.
    ///
    /// `placed` runs with the cell lock held and must not touch the cell.
    pub fn publish_with<F: FnOnce()>(&self, value: i64, placed: F) -> Result<(), HandoffError> {
        let mut state = self.lock();
        if state.finished {
            return Err(HandoffError::PublishAfterClose);
        }

        state.value = value;
        state.ready = true;
        self.consumer_cond.notify_one();
        log_handoff!("published", value);
        placed();

        while state.ready {
            state = self
                .producer_cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    /// Drain the pending value, blocking until one is published.
    ///
    /// Returns `None` once the cell is closed and nothing is pending.
    pub fn take(&self) -> Option<i64> {
        let mut state = self.lock();
        while !state.ready && !state.finished {
            state = self
                .consumer_cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if !state.ready {
            return None;
        }

        let value = state.value;
        state.ready = false;
        self.producer_cond.notify_one();
        log_handoff!("drained", value);
        Some(value)
    }

    /// Mark the stream as finished and wake every blocked consumer.
    ///
    /// Returns `true` for the call that performed the transition.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let first = !state.finished;
        state.finished = true;
        self.consumer_cond.notify_all();
        if first {
            log_handoff!("closed");
        }
        first
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }
}
