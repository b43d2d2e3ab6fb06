use std::io;

use thiserror::Error;

/// Errors raised while validating a pipeline configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Consumer count must be at least 1")]
    NoConsumers,
    #[error("Consumer count cannot be negative: {0}")]
    NegativeConsumers(i64),
    #[error("Consumer count {requested} exceeds the limit of {max}")]
    TooManyConsumers { requested: i64, max: usize },
    #[error("Pacing bound cannot be negative: {0}ms")]
    NegativePacing(i64),
}

/// Violations of the shared cell handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    #[error("Cannot publish into a closed cell")]
    PublishAfterClose,
}

/// The participant a pipeline error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer(usize),
    Interruptor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Consumer(index) => write!(f, "consumer-{}", index),
            Role::Interruptor => write!(f, "interruptor"),
        }
    }
}

/// Errors returned by a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Handoff protocol violation: {0}")]
    Handoff(#[from] HandoffError),
    #[error("Failed to spawn {role} thread: {source}")]
    Spawn {
        role: Role,
        #[source]
        source: io::Error,
    },
    #[error("The {role} thread panicked")]
    WorkerPanicked { role: Role },
}
