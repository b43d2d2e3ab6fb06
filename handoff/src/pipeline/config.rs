use std::time::Duration;

use crate::pipeline::error::ConfigError;

/// Largest consumer pool a run accepts. Every consumer is an OS thread.
pub const MAX_CONSUMERS: usize = 4096;

/// How consumers react to cancellation requests from the interruptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Requests are honoured at checkpoints outside the critical section:
    /// before each `take` and while pacing. The last live consumer keeps
    /// running regardless.
    Cooperative,
    /// Cancellation is masked for the worker's whole life. Requests are
    /// counted but never honoured.
    Deferred,
}

impl Default for CancelPolicy {
    fn default() -> Self {
        CancelPolicy::Cooperative
    }
}

/// Configuration for a single pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of consumer workers in the pool.
    pub num_consumers: usize,

    /// Upper bound of the random pause a consumer takes after each drain.
    /// Zero disables pacing.
    pub pacing_bound: Duration,

    /// Emit a `Thread <id> sum: <sum>` line on stderr after every drain.
    pub debug: bool,

    /// How consumers treat cancellation requests.
    pub cancel_policy: CancelPolicy,

    /// Whether the interruptor runs at all.
    pub interruptor_enabled: bool,

    /// Pause between two cancellation requests. Zero yields instead.
    pub interrupt_interval: Duration,

    /// Prefix for the names of spawned threads.
    pub thread_name_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_consumers: num_cpus::get(),
            pacing_bound: Duration::ZERO,
            debug: false,
            cancel_policy: CancelPolicy::default(),
            interruptor_enabled: true,
            interrupt_interval: Duration::from_millis(1),
            thread_name_prefix: "handoff".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from the signed values an external caller hands
    /// over, rejecting anything out of range before a thread exists.
    pub fn from_raw(num_consumers: i64, pacing_bound_ms: i64, debug: bool) -> Result<Self, ConfigError> {
        if num_consumers < 0 {
            return Err(ConfigError::NegativeConsumers(num_consumers));
        }
        if num_consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if num_consumers > MAX_CONSUMERS as i64 {
            return Err(ConfigError::TooManyConsumers {
                requested: num_consumers,
                max: MAX_CONSUMERS,
            });
        }
        if pacing_bound_ms < 0 {
            return Err(ConfigError::NegativePacing(pacing_bound_ms));
        }

        let config = Self {
            num_consumers: num_consumers as usize,
            pacing_bound: Duration::from_millis(pacing_bound_ms as u64),
            debug,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.num_consumers > MAX_CONSUMERS {
            return Err(ConfigError::TooManyConsumers {
                requested: i64::try_from(self.num_consumers).unwrap_or(i64::MAX),
                max: MAX_CONSUMERS,
            });
        }
        Ok(())
    }

    pub fn with_consumers(mut self, num_consumers: usize) -> Self {
        self.num_consumers = num_consumers;
        self
    }

    pub fn with_pacing(mut self, pacing_bound: Duration) -> Self {
        self.pacing_bound = pacing_bound;
        self
    }

    pub fn with_cancel_policy(mut self, cancel_policy: CancelPolicy) -> Self {
        self.cancel_policy = cancel_policy;
        self
    }

    pub fn with_interruptor(mut self, enabled: bool) -> Self {
        self.interruptor_enabled = enabled;
        self
    }

    pub fn with_interrupt_interval(mut self, interval: Duration) -> Self {
        self.interrupt_interval = interval;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub(crate) fn thread_name(&self, role: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, role)
    }
}
