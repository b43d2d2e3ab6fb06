//! # Handoff Pipeline
//!
//! One producer, a pool of consumers and an interruptor, coordinated through a
//! single [`SharedCell`].
//!
//! ## Participants
//! - [`Producer`]: publishes each item and waits for it to be drained
//! - [`Consumer`]: drains the cell into a private accumulator
//! - [`Interruptor`]: cancels random consumers while the stream is open
//! - [`Aggregator`]: joins everyone and sums the accumulators
//!
//! Every participant runs on its own OS thread. The cell, the identity
//! registry and the cancellation tokens are created per run, so repeated runs
//! never share state.

pub mod aggregator;
pub mod cancel;
pub mod cell;
pub mod config;
pub mod consumer;
pub mod error;
pub mod identity;
pub mod interruptor;
pub mod producer;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, Dispatch};
use uuid::Uuid;

use crate::logging::current_subscriber;
use crate::pipeline_span;

pub use aggregator::{aggregate, AggregateResult, Aggregator};
pub use cancel::CancelToken;
pub use cell::SharedCell;
pub use config::{CancelPolicy, PipelineConfig, MAX_CONSUMERS};
pub use consumer::{Consumer, ConsumerReport, ExitReason, PoolLiveness};
pub use error::{ConfigError, HandoffError, PipelineError, Role};
pub use identity::{assign_worker_identity, IdentityRegistry};
pub use interruptor::{Interruptor, InterruptorReport};
pub use producer::{Producer, ProducerReport, ProducerState};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub total: i64,
    pub published: usize,
    pub cancellations_sent: usize,
    pub consumers: Vec<ConsumerReport>,
    pub elapsed: Duration,
}

impl PipelineSummary {
    pub fn cancelled_consumers(&self) -> usize {
        self.consumers
            .iter()
            .filter(|report| report.exit == ExitReason::Cancelled)
            .count()
    }
}

/// A validated pipeline, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn spawn<T, F>(&self, name: String, role: Role, dispatch: &Dispatch, f: F) -> Result<JoinHandle<T>, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let dispatch = dispatch.clone();
        let span = tracing::Span::current();
        thread::Builder::new()
            .name(name)
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || span.in_scope(f)))
            .map_err(|source: io::Error| {
                error!(%role, error = %source, "failed to spawn thread");
                PipelineError::Spawn { role, source }
            })
    }

    /// Run the full protocol over `items` and wait for every participant.
    pub fn run(&self, items: Vec<i64>) -> Result<PipelineSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = pipeline_span!(run_id, consumers = self.config.num_consumers);
        let _enter = span.enter();

        let started = Instant::now();
        let dispatch = current_subscriber();
        let cell = Arc::new(SharedCell::new());
        let registry = Arc::new(IdentityRegistry::new());
        let liveness = Arc::new(PoolLiveness::new(self.config.num_consumers));
        info!(items = items.len(), policy = ?self.config.cancel_policy, "pipeline starting");

        let mut tokens = Vec::with_capacity(self.config.num_consumers);
        let mut consumers = Vec::with_capacity(self.config.num_consumers);
        for index in 0..self.config.num_consumers {
            let token = CancelToken::new();
            let consumer = Consumer::new(
                Arc::clone(&cell),
                token.clone(),
                Arc::clone(&liveness),
                self.config.cancel_policy,
                self.config.pacing_bound,
                self.config.debug,
            );
            let registry = Arc::clone(&registry);
            let name = self.config.thread_name(&format!("consumer-{}", index));
            match self.spawn(name, Role::Consumer(index), &dispatch, move || consumer.run(&registry)) {
                Ok(handle) => {
                    tokens.push(token);
                    consumers.push(handle);
                }
                Err(err) => {
                    Self::abort(&cell, consumers);
                    return Err(err);
                }
            }
        }

        let interruptor = if self.config.interruptor_enabled {
            let interruptor = Interruptor::new(Arc::clone(&cell), tokens, self.config.interrupt_interval);
            let registry = Arc::clone(&registry);
            let name = self.config.thread_name("interruptor");
            match self.spawn(name, Role::Interruptor, &dispatch, move || interruptor.run(&registry)) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    Self::abort(&cell, consumers);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let mut producer = Producer::new(Arc::clone(&cell), items);
        let producer_registry = Arc::clone(&registry);
        let name = self.config.thread_name("producer");
        let producer = match self.spawn(name, Role::Producer, &dispatch, move || producer.run(&producer_registry)) {
            Ok(handle) => handle,
            Err(err) => {
                Self::abort(&cell, consumers);
                if let Some(handle) = interruptor {
                    let _ = handle.join();
                }
                return Err(err);
            }
        };

        let result = Aggregator::new(producer, interruptor, consumers).join()?;
        let summary = PipelineSummary {
            run_id,
            total: result.total,
            published: result.producer.published,
            cancellations_sent: result.interruptor.as_ref().map_or(0, |report| report.requests_sent),
            consumers: result.consumers,
            elapsed: started.elapsed(),
        };

        info!(
            total = summary.total,
            published = summary.published,
            cancellations_sent = summary.cancellations_sent,
            cancelled_consumers = summary.cancelled_consumers(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok(summary)
    }

    /// Release every consumer that was already started and wait for it.
    fn abort(cell: &SharedCell, consumers: Vec<JoinHandle<ConsumerReport>>) {
        cell.close();
        for handle in consumers {
            let _ = handle.join();
        }
    }
}

/// Run the protocol with the given raw parameters and return the aggregate
/// sum. Out-of-range parameters are rejected before any thread is started.
pub fn run_pipeline(items: &[i64], num_consumers: i64, pacing_bound_ms: i64, debug: bool) -> Result<i64, PipelineError> {
    let config = PipelineConfig::from_raw(num_consumers, pacing_bound_ms, debug)?;
    let summary = Pipeline::new(config)?.run(items.to_vec())?;
    Ok(summary.total)
}
