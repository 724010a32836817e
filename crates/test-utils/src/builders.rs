#![allow(dead_code)]

use std::time::Duration;

use fqs_dispatch::config::{ConfigFile, RawConfigFile};
use fqs_dispatch::engine::{CommandManager, DispatcherConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn handler_timeout_secs(mut self, secs: f64) -> Self {
        self.config.dispatcher.handler_timeout_secs = secs;
        self
    }

    pub fn cancel_grace_ms(mut self, ms: u64) -> Self {
        self.config.dispatcher.cancel_grace_ms = ms;
        self
    }

    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.dispatcher.shutdown_grace_ms = ms;
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.dispatcher.max_concurrency = Some(limit);
        self
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.config.cli.origin = origin.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatcher settings with short grace periods so shutdown paths finish
/// quickly in tests. The handler timeout mirrors the 3 s used by the
/// interactive test harness.
pub fn test_dispatcher_config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_handler_timeout(Duration::from_secs(3))
        .with_cancel_grace(Duration::from_millis(100))
        .with_shutdown_grace(Duration::from_millis(500))
}

/// A started manager using [`test_dispatcher_config`] with `timeout` as the
/// handler deadline. Must be called inside a tokio runtime.
pub fn started_manager(timeout: Duration) -> CommandManager {
    let manager = CommandManager::new(test_dispatcher_config().with_handler_timeout(timeout));
    manager.start().expect("manager should start inside a runtime");
    manager
}
