//! # Consumer Workers
//!
//! Each consumer repeatedly drains the shared cell into a private
//! accumulator until the stream ends or it honours a cancellation request.
//!
//! ## Cancellation checkpoints
//! A worker looks at its [`CancelToken`] only:
//! - right before calling [`SharedCell::take`]
//! - while pacing between two drains
//!
//! `take` itself never observes cancellation, so a worker that holds the cell
//! lock always clears `ready` and wakes the producer before it can leave.
//!
//! ## Pool liveness
//! All consumers of a run share a [`PoolLiveness`] counter. A worker retires
//! only if another member stays live, so the producer can never be left
//! without anybody to drain its next value.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::{log_worker, worker_span};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::cell::SharedCell;
use crate::pipeline::config::CancelPolicy;
use crate::pipeline::identity::IdentityRegistry;

/// Why a consumer left the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The cell was closed and nothing was pending.
    StreamEnd,
    /// A cancellation request was honoured at a checkpoint.
    Cancelled,
}

/// The state a consumer hands to the aggregator when it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    pub id: usize,
    pub sum: i64,
    /// Drained values, in drain order.
    pub drained: Vec<i64>,
    /// Cancellation requests delivered to this worker, honoured or not.
    pub cancel_requests: usize,
    pub exit: ExitReason,
}

/// Count of pool members that are still in the protocol.
#[derive(Debug)]
pub struct PoolLiveness {
    live: AtomicUsize,
}

impl PoolLiveness {
    pub fn new(members: usize) -> Self {
        Self {
            live: AtomicUsize::new(members),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Leave the pool unless the caller is the last live member.
    pub fn try_retire(&self) -> bool {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                if live > 1 {
                    Some(live - 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Leave the pool after the stream ended.
    pub fn retire_finished(&self) {
        let _ = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| live.checked_sub(1));
    }
}

/// A single member of the consumer pool.
#[derive(Debug)]
pub struct Consumer {
    cell: Arc<SharedCell>,
    token: CancelToken,
    liveness: Arc<PoolLiveness>,
    policy: CancelPolicy,
    pacing_bound: Duration,
    debug: bool,
}

impl Consumer {
    pub fn new(
        cell: Arc<SharedCell>,
        token: CancelToken,
        liveness: Arc<PoolLiveness>,
        policy: CancelPolicy,
        pacing_bound: Duration,
        debug: bool,
    ) -> Self {
        Self {
            cell,
            token,
            liveness,
            policy,
            pacing_bound,
            debug,
        }
    }

    /// Checkpoint: honour a pending cancellation if the policy and the pool
    /// allow it.
    fn should_exit(&self, id: usize) -> bool {
        if self.policy == CancelPolicy::Deferred || !self.token.is_cancelled() {
            return false;
        }
        if self.liveness.try_retire() {
            log_worker!(id, "cancelled", requests = self.token.requests());
            true
        } else {
            debug!(consumer = id, "last live consumer, ignoring cancellation");
            false
        }
    }

    /// Random pause in `[0, pacing_bound)`, cut short by cancellation under
    /// the cooperative policy.
    ///
    /// The last live member cannot retire, so a cancelled token must not cut
    /// its pauses short either.
    fn pace(&self) {
        let bound_ms = self.pacing_bound.as_millis() as u64;
        if bound_ms == 0 {
            return;
        }
        let pause = Duration::from_millis(rand::thread_rng().gen_range(0..bound_ms));
        match self.policy {
            CancelPolicy::Cooperative => {
                let started = Instant::now();
                if self.token.sleep(pause) && self.liveness.live() <= 1 {
                    thread::sleep(pause.saturating_sub(started.elapsed()));
                }
            }
            CancelPolicy::Deferred => thread::sleep(pause),
        }
    }

    /// Drain the cell until stream end or cancellation.
    pub fn run(self, registry: &IdentityRegistry) -> ConsumerReport {
        let id = registry.assign();
        let span = worker_span!(id, policy = ?self.policy);
        let _enter = span.enter();
        log_worker!(id, "started");

        let mut sum: i64 = 0;
        let mut drained = Vec::new();
        let exit = loop {
            if self.should_exit(id) {
                break ExitReason::Cancelled;
            }

            let Some(value) = self.cell.take() else {
                self.liveness.retire_finished();
                break ExitReason::StreamEnd;
            };

            sum = sum.wrapping_add(value);
            drained.push(value);
            debug!(consumer = id, value, sum, "drained");
            if self.debug {
                write_trace(&mut io::stderr(), id, sum);
            }

            self.pace();
        };

        log_worker!(id, "terminated", sum, exit = ?exit);
        ConsumerReport {
            id,
            sum,
            drained,
            cancel_requests: self.token.requests(),
            exit,
        }
    }
}

/// Write one `Thread <id> sum: <sum>` line.
///
/// The line is written after the cell lock is released, so lines of
/// different workers may appear out of drain order.
fn write_trace<W: Write>(out: &mut W, id: usize, sum: i64) {
    if let Err(err) = writeln!(out, "Thread {} sum: {}", id, sum) {
        debug!(consumer = id, error = %err, "debug trace not written");
    }
}
