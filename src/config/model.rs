// src/config/model.rs

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::DispatcherConfig;

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [dispatcher]
/// handler_timeout_secs = 30.0
/// cancel_grace_ms = 500
/// shutdown_grace_ms = 2000
/// max_concurrency = 8
///
/// [cli]
/// origin = "cli"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    #[serde(default)]
    pub cli: CliSection,
}

/// `[dispatcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSection {
    /// Per-handler deadline in seconds. Fractions allowed.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: f64,

    /// Wait after cancelling a handler before aborting its task.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Wait for in-flight handlers during `stop()`.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Concurrency ceiling; unset means unbounded.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 30;

fn default_handler_timeout_secs() -> f64 {
    DEFAULT_HANDLER_TIMEOUT_SECS as f64
}

fn default_cancel_grace_ms() -> u64 {
    500
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            handler_timeout_secs: default_handler_timeout_secs(),
            cancel_grace_ms: default_cancel_grace_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            max_concurrency: None,
        }
    }
}

/// `[cli]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliSection {
    /// Origin label used when `--origin` is not given.
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_origin() -> String {
    "cli".to_string()
}

impl Default for CliSection {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)` or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    dispatcher: DispatcherSection,
    cli: CliSection,
    /// `handler_timeout_secs`, already converted during validation.
    handler_timeout: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        dispatcher: DispatcherSection,
        cli: CliSection,
        handler_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            cli,
            handler_timeout,
        }
    }

    pub fn dispatcher(&self) -> &DispatcherSection {
        &self.dispatcher
    }

    pub fn cli(&self) -> &CliSection {
        &self.cli
    }

    /// Runtime settings for `CommandManager::new`.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            handler_timeout: self.handler_timeout,
            cancel_grace: Duration::from_millis(self.dispatcher.cancel_grace_ms),
            shutdown_grace: Duration::from_millis(self.dispatcher.shutdown_grace_ms),
            max_concurrency: self.dispatcher.max_concurrency.and_then(NonZeroUsize::new),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            DispatcherSection::default(),
            CliSection::default(),
            Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS),
        )
    }
}
