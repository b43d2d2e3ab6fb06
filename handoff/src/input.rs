//! Command line and stdin parsing for the `handoff` binary.

use std::io;

use thiserror::Error;

use crate::pipeline::{ConfigError, PipelineConfig};

pub const DEBUG_FLAG: &str = "-debug";

/// Errors produced while reading the command line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid arguments: expected <number of threads> <sleep limit>")]
    MissingArguments,
    #[error("Invalid arguments: {0:?} is not an integer")]
    InvalidNumber(String),
    #[error("Invalid arguments: {0}")]
    Config(#[from] ConfigError),
}

/// Everything needed for one run of the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputData {
    pub num_threads: i64,
    pub sleep_limit: i64,
    pub debug: bool,
    pub data: Vec<i64>,
}

impl InputData {
    /// Parse `args` (program name first) and the line of values read from
    /// stdin.
    ///
    /// Values are read up to the first token that is not an integer.
    pub fn parse<S: AsRef<str>>(args: &[S], line: &str) -> Result<Self, InputError> {
        if args.len() < 3 {
            return Err(InputError::MissingArguments);
        }

        let num_threads = parse_number(args[1].as_ref())?;
        let sleep_limit = parse_number(args[2].as_ref())?;
        // Same range checks the pipeline applies.
        PipelineConfig::from_raw(num_threads, sleep_limit, false)?;

        let debug = args.len() == 4 && args[3].as_ref() == DEBUG_FLAG;
        let data = line
            .split_whitespace()
            .map_while(|token| token.parse::<i64>().ok())
            .collect();

        Ok(Self {
            num_threads,
            sleep_limit,
            debug,
            data,
        })
    }

    pub fn to_config(&self) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::from_raw(self.num_threads, self.sleep_limit, self.debug)
    }
}

fn parse_number(arg: &str) -> Result<i64, InputError> {
    arg.trim()
        .parse()
        .map_err(|_| InputError::InvalidNumber(arg.to_string()))
}

/// Write the usage line for `executable`.
pub fn usage<W: io::Write>(out: &mut W, executable: &str) -> io::Result<()> {
    writeln!(out, "Usage: {} <number of threads> <sleep limit> [{}]", executable, DEBUG_FLAG)
}
