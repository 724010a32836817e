// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DispatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DispatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let handler_timeout = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.dispatcher, raw.cli, handler_timeout))
    }
}

/// Returns the handler timeout as a `Duration`.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<Duration> {
    let handler_timeout = validate_timeout(cfg)?;
    validate_grace_periods(cfg)?;
    validate_concurrency(cfg)?;
    validate_cli(cfg)?;
    Ok(handler_timeout)
}

fn validate_timeout(cfg: &RawConfigFile) -> Result<Duration> {
    let secs = cfg.dispatcher.handler_timeout_secs;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(DispatchError::ConfigError(format!(
            "[dispatcher].handler_timeout_secs must be a positive number (got {secs})"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| {
        DispatchError::ConfigError(format!(
            "[dispatcher].handler_timeout_secs is too large (got {secs})"
        ))
    })
}

fn validate_grace_periods(cfg: &RawConfigFile) -> Result<()> {
    let d = &cfg.dispatcher;

    if d.cancel_grace_ms == 0 {
        return Err(DispatchError::ConfigError(
            "[dispatcher].cancel_grace_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    // Shutdown must leave room for at least one cancel grace period.
    if d.shutdown_grace_ms < d.cancel_grace_ms {
        return Err(DispatchError::ConfigError(format!(
            "[dispatcher].shutdown_grace_ms ({}) must be >= cancel_grace_ms ({})",
            d.shutdown_grace_ms, d.cancel_grace_ms
        )));
    }

    Ok(())
}

fn validate_concurrency(cfg: &RawConfigFile) -> Result<()> {
    if cfg.dispatcher.max_concurrency == Some(0) {
        return Err(DispatchError::ConfigError(
            "[dispatcher].max_concurrency must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_cli(cfg: &RawConfigFile) -> Result<()> {
    if cfg.cli.origin.trim().is_empty() {
        return Err(DispatchError::ConfigError(
            "[cli].origin must not be empty".to_string(),
        ));
    }
    Ok(())
}
