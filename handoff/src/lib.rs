// Handoff
//
// A single-slot producer/consumer handoff: one producer, a pool of competing
// consumers and an interruptor that cancels random consumers while the
// pipeline runs.

pub mod input;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use pipeline::{
    assign_worker_identity, run_pipeline, CancelPolicy, Pipeline, PipelineConfig, PipelineError, PipelineSummary,
};
