// src/engine/mod.rs

//! Command dispatch engine.
//!
//! This module ties together:
//! - the handler registry (command name -> handler)
//! - the admission queue (FIFO between `submit` and dispatch)
//! - the dispatcher loop, which spawns each command under a deadline
//! - the response bus (caller futures + subscriber fan-out)
//! - the lifecycle controller, [`CommandManager`], which owns all of the
//!   above and is what the UI, CLI and HTTP surfaces hold on to.

use std::num::NonZeroUsize;
use std::time::Duration;

pub mod bus;
pub(crate) mod dispatcher;
pub mod manager;
pub(crate) mod queue;
pub mod registry;

pub use bus::{ResponseBus, ResponseFuture, Subscriber, SubscriptionHandle};
pub use manager::{CommandManager, ManagerStatus};
pub use registry::HandlerRegistry;

/// Manager-wide dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Deadline applied to every handler unless `SubmitOptions::timeout`
    /// overrides it.
    pub handler_timeout: Duration,
    /// How long a cancelled handler may take to return before its task is
    /// aborted.
    pub cancel_grace: Duration,
    /// How long `stop()` waits for in-flight commands to wind down.
    pub shutdown_grace: Duration,
    /// Maximum number of handlers running at once. `None` = unbounded.
    pub max_concurrency: Option<NonZeroUsize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(30),
            cancel_grace: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(2),
            max_concurrency: None,
        }
    }
}

impl DispatcherConfig {
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_max_concurrency(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Upper bound on how long `stop()` can take.
    pub fn stop_budget(&self) -> Duration {
        self.shutdown_grace + self.cancel_grace + STOP_SLACK
    }
}

/// Extra time `stop()` allows the dispatcher task to finish its own
/// bookkeeping after the grace periods.
const STOP_SLACK: Duration = Duration::from_millis(250);
