// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

/// Command-line arguments for `fqs-dispatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fqs-dispatch",
    version,
    about = "Run a trading-terminal command through the in-process dispatcher.",
    long_about = None
)]
pub struct CliArgs {
    /// Command to execute, e.g. `hello trader` or `help`.
    ///
    /// Words are joined with single spaces.
    #[arg(value_name = "COMMAND", trailing_var_arg = true)]
    pub command: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `$FQS_CONFIG`, else `Fqs.toml` if present, else built-in
    /// defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Origin label attached to the request (default from `[cli].origin`).
    #[arg(long, value_name = "LABEL")]
    pub origin: Option<String>,

    /// Session context as JSON, e.g. '{"yes_token_id": "..."}'.
    #[arg(long, value_name = "JSON")]
    pub session: Option<String>,

    /// Override the handler timeout for this command, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Print the response as JSON.
    #[arg(long)]
    pub json: bool,

    /// Show command, origin, execution time and error kind.
    #[arg(short, long)]
    pub verbose: bool,

    /// List registered commands and exit.
    #[arg(long)]
    pub list_commands: bool,

    /// Print dispatcher status and exit.
    #[arg(long)]
    pub status: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FQS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// The command words joined into one line.
    pub fn command_text(&self) -> String {
        self.command.join(" ")
    }

    /// `--timeout` as a `Duration`, rejecting values that are not positive
    /// or do not fit.
    pub fn timeout_duration(&self) -> Result<Option<Duration>> {
        let Some(secs) = self.timeout else {
            return Ok(None);
        };
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--timeout must be a positive number of seconds (got {secs})");
        }
        match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => Ok(Some(timeout)),
            Err(_) => bail!("--timeout is too large (got {secs})"),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
