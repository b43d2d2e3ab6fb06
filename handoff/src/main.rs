use std::io::{self, BufRead};
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, warn, Level};

use handoff::input::{usage, InputData};
use handoff::logging::{self, LogConfig};
use handoff::pipeline::Pipeline;

/// Path of an optional log file. Setting it also raises the level to INFO so
/// the file records every run.
const LOG_FILE_ENV: &str = "HANDOFF_LOG_FILE";

fn init_logging() {
    let Ok(path) = std::env::var(LOG_FILE_ENV) else {
        logging::init_cli();
        return;
    };

    let config = LogConfig {
        level: Level::INFO,
        ..logging::cli_config()
    };
    if let Err(err) = logging::init_with_file(config, &path) {
        logging::init_cli();
        warn!(path = %path, error = %err, "log file unavailable, logging to stderr only");
    }
}

fn run(args: &[String]) -> anyhow::Result<ExitCode> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read input values from stdin")?;

    let executable = args.first().map(String::as_str).unwrap_or("handoff");
    let input = match InputData::parse(args, &line) {
        Ok(input) => input,
        Err(err) => {
            usage(&mut io::stderr(), executable)?;
            eprintln!("{}", err);
            return Ok(ExitCode::FAILURE);
        }
    };

    let summary = Pipeline::new(input.to_config()?)?.run(input.data)?;
    println!("{}", summary.total);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "handoff failed");
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
