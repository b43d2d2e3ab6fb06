use std::thread::JoinHandle;

use tracing::{debug, error};

use crate::pipeline::consumer::{ConsumerReport, ExitReason};
use crate::pipeline::error::{HandoffError, PipelineError, Role};
use crate::pipeline::interruptor::InterruptorReport;
use crate::pipeline::producer::ProducerReport;

/// Everything the join barrier collected from a finished run.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub total: i64,
    pub producer: ProducerReport,
    pub interruptor: Option<InterruptorReport>,
    /// One report per consumer, in spawn order.
    pub consumers: Vec<ConsumerReport>,
}

impl AggregateResult {
    pub fn cancelled_consumers(&self) -> usize {
        self.consumers
            .iter()
            .filter(|report| report.exit == ExitReason::Cancelled)
            .count()
    }
}

/// Sum of every consumer accumulator. Cancelled workers are included: every
/// value they drained left the cell exactly once and would otherwise be lost.
pub fn aggregate(reports: &[ConsumerReport]) -> i64 {
    reports
        .iter()
        .fold(0i64, |total, report| total.wrapping_add(report.sum))
}

/// Join barrier for one run: producer first, then the interruptor, then
/// every consumer.
#[derive(Debug)]
pub struct Aggregator {
    producer: JoinHandle<Result<ProducerReport, HandoffError>>,
    interruptor: Option<JoinHandle<InterruptorReport>>,
    consumers: Vec<JoinHandle<ConsumerReport>>,
}

impl Aggregator {
    pub fn new(
        producer: JoinHandle<Result<ProducerReport, HandoffError>>,
        interruptor: Option<JoinHandle<InterruptorReport>>,
        consumers: Vec<JoinHandle<ConsumerReport>>,
    ) -> Self {
        Self {
            producer,
            interruptor,
            consumers,
        }
    }

    /// Join every participant and sum the consumer accumulators.
    ///
    /// All threads are joined even when one of them failed; the first failure
    /// is returned afterwards.
    pub fn join(self) -> Result<AggregateResult, PipelineError> {
        let mut failure: Option<PipelineError> = None;

        let producer = match self.producer.join() {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                error!(error = %err, "producer stopped early");
                failure.get_or_insert(PipelineError::Handoff(err));
                None
            }
            Err(_) => {
                error!("producer thread panicked");
                failure.get_or_insert(PipelineError::WorkerPanicked { role: Role::Producer });
                None
            }
        };

        let interruptor = match self.interruptor.map(JoinHandle::join) {
            Some(Ok(report)) => Some(report),
            Some(Err(_)) => {
                error!("interruptor thread panicked");
                failure.get_or_insert(PipelineError::WorkerPanicked { role: Role::Interruptor });
                None
            }
            None => None,
        };

        let mut consumers = Vec::with_capacity(self.consumers.len());
        for (index, handle) in self.consumers.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => {
                    debug!(consumer = report.id, sum = report.sum, exit = ?report.exit, "joined consumer");
                    consumers.push(report);
                }
                Err(_) => {
                    error!(index, "consumer thread panicked");
                    failure.get_or_insert(PipelineError::WorkerPanicked { role: Role::Consumer(index) });
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        let producer = producer.ok_or(PipelineError::WorkerPanicked { role: Role::Producer })?;

        Ok(AggregateResult {
            total: aggregate(&consumers),
            producer,
            interruptor,
            consumers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn report(id: usize, sum: i64, exit: ExitReason) -> ConsumerReport {
        ConsumerReport {
            id,
            sum,
            drained: vec![sum],
            cancel_requests: 0,
            exit,
        }
    }

    #[test]
    fn test_aggregate_includes_cancelled_workers() {
        let reports = vec![
            report(1, 10, ExitReason::StreamEnd),
            report(2, 5, ExitReason::Cancelled),
            report(3, 0, ExitReason::StreamEnd),
        ];
        assert_eq!(aggregate(&reports), 15);
    }

    #[test]
    fn test_aggregate_of_nothing_is_zero() {
        assert_eq!(aggregate(&[]), 0);
    }

    #[test]
    fn test_join_collects_every_consumer() {
        let producer = thread::spawn(|| Ok(ProducerReport { id: 1, published: 2 }));
        let consumers = vec![
            thread::spawn(|| report(2, 7, ExitReason::StreamEnd)),
            thread::spawn(|| report(3, 4, ExitReason::Cancelled)),
        ];

        let result = Aggregator::new(producer, None, consumers).join().unwrap();
        assert_eq!(result.total, 11);
        assert_eq!(result.consumers.len(), 2);
        assert_eq!(result.cancelled_consumers(), 1);
        assert!(result.interruptor.is_none());
    }

    #[test]
    fn test_join_reports_panicked_consumer() {
        let producer = thread::spawn(|| Ok(ProducerReport { id: 1, published: 0 }));
        let consumers = vec![
            thread::spawn(|| report(2, 1, ExitReason::StreamEnd)),
            thread::spawn(|| -> ConsumerReport { panic!("boom") }),
        ];

        let err = Aggregator::new(producer, None, consumers).join().unwrap_err();
        assert!(matches!(err, PipelineError::WorkerPanicked { role: Role::Consumer(1) }));
    }

    #[test]
    fn test_join_reports_producer_protocol_error() {
        let producer = thread::spawn(|| Err(HandoffError::PublishAfterClose));
        let err = Aggregator::new(producer, None, Vec::new()).join().unwrap_err();
        assert!(matches!(err, PipelineError::Handoff(HandoffError::PublishAfterClose)));
    }
}
