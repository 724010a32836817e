// src/engine/manager.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::DispatcherConfig;
use crate::engine::bus::{ResponseFuture, SubscriptionHandle};
use crate::engine::dispatcher::{DispatchContext, spawn_dispatcher, sweep_active};
use crate::engine::queue::{AdmissionQueue, Envelope, RequestIds, admission_queue};
use crate::engine::registry::HandlerRegistry;
use crate::errors::{DispatchError, Result};
use crate::exec::{CommandHandler, HandlerSnapshot};
use crate::types::{
    CommandRequest, CommandResponse, ErrorKind, SubmitOptions, parse_command_text,
};

/// Owns the registry, the response bus and (while running) the admission
/// queue and dispatcher task.
///
/// Cloning is cheap and every clone drives the same manager, so the
/// composition root can hand one to the UI, the CLI and the HTTP facade.
/// There is no global instance.
#[derive(Clone)]
pub struct CommandManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    ctx: Arc<DispatchContext>,
    ids: RequestIds,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Stopped,
    Running(RunningState),
    Stopping,
}

struct RunningState {
    queue: AdmissionQueue,
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
    started_at: Instant,
}

/// Summary reported to the HTTP facade's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub available: bool,
    pub running: bool,
    pub command_count: usize,
    pub queue_size: usize,
    pub in_flight: usize,
    pub uptime_secs: u64,
}

impl CommandManager {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                ctx: Arc::new(DispatchContext::new(config)),
                ids: RequestIds::new(),
                lifecycle: Mutex::new(Lifecycle::Stopped),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.ctx.config
    }

    // ---------- Lifecycle ----------

    /// Create the admission queue and spawn the dispatcher loop.
    ///
    /// Must be called from within a tokio runtime. Calling it while already
    /// running is a no-op; calling it while a `stop()` is still in progress
    /// is an error.
    pub fn start(&self) -> Result<()> {
        tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        let mut lifecycle = self.inner.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running(_) => {
                debug!("start() called but already running");
                return Ok(());
            }
            Lifecycle::Stopping => return Err(DispatchError::ShutdownInProgress),
            Lifecycle::Stopped => {}
        }

        let (queue, receiver) = admission_queue();
        let shutdown = CancellationToken::new();
        let dispatcher = spawn_dispatcher(Arc::clone(&self.inner.ctx), receiver, shutdown.clone());

        *lifecycle = Lifecycle::Running(RunningState {
            queue,
            shutdown,
            dispatcher,
            started_at: Instant::now(),
        });

        let config = &self.inner.ctx.config;
        info!(
            handler_timeout_ms = config.handler_timeout.as_millis() as u64,
            max_concurrency = ?config.max_concurrency,
            commands = self.inner.ctx.registry.len(),
            "command manager started"
        );
        Ok(())
    }

    /// Stop dispatching, cancel in-flight handlers and fail queued requests.
    ///
    /// Returns within [`DispatcherConfig::stop_budget`] even when handlers
    /// ignore cancellation. After it returns every request submitted so far
    /// has been resolved and `active_handlers_info()` is empty. A concurrent
    /// second call returns immediately.
    pub async fn stop(&self) {
        let running = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
                Lifecycle::Running(running) => running,
                other => {
                    *lifecycle = other;
                    debug!("stop() called but not running");
                    return;
                }
            }
        };

        info!(
            queued = running.queue.len(),
            in_flight = self.inner.ctx.active.len(),
            "stopping command manager"
        );

        let RunningState {
            queue,
            shutdown,
            mut dispatcher,
            ..
        } = running;

        shutdown.cancel();
        drop(queue);

        let budget = self.inner.ctx.config.stop_budget();
        match tokio::time::timeout(budget, &mut dispatcher).await {
            Ok(Ok(())) => debug!("dispatcher loop joined"),
            Ok(Err(err)) => warn!(error = %err, "dispatcher task ended abnormally"),
            Err(_) => {
                warn!(
                    budget_ms = budget.as_millis() as u64,
                    "dispatcher did not finish within the stop budget; aborting it"
                );
                dispatcher.abort();
            }
        }

        let swept = sweep_active(&self.inner.ctx);
        let abandoned = self.inner.ctx.bus.abandon_pending(
            ErrorKind::ShutdownInProgress,
            "Command cancelled: command manager stopped",
        );

        *self.inner.lifecycle.lock() = Lifecycle::Stopped;
        info!(swept, abandoned, "command manager stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.inner.lifecycle.lock(), Lifecycle::Running(_))
    }

    // ---------- Registry ----------

    /// Bind `handler` to `name`, replacing any previous handler for it.
    /// Safe to call while running.
    pub fn register<H: CommandHandler>(&self, name: &str, handler: H) -> Result<()> {
        self.register_shared(name, Arc::new(handler))
    }

    pub fn register_shared(&self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        self.inner.ctx.registry.register(name, handler)?;
        Ok(())
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.inner.ctx.registry.names()
    }

    pub fn registry(&self) -> Arc<HandlerRegistry> {
        Arc::clone(&self.inner.ctx.registry)
    }

    // ---------- Subscribers ----------

    /// Add an observer that receives every response. Callbacks run on the
    /// task that produced the response, so keep them fast. A panicking
    /// callback is logged and skipped.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        self.inner.ctx.bus.subscribe(Arc::new(callback))
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.ctx.bus.unsubscribe(handle)
    }

    // ---------- Submit ----------

    /// Enqueue `text` and return a future resolving to its response.
    ///
    /// Never blocks and never fails: empty input, a stopped manager and
    /// shutdown all resolve the future with a failure response instead.
    pub fn submit(&self, origin: &str, text: &str) -> ResponseFuture {
        self.submit_with(origin, text, SubmitOptions::default())
    }

    pub fn submit_with(&self, origin: &str, text: &str, options: SubmitOptions) -> ResponseFuture {
        let inner = &self.inner;
        let request_id = inner.ids.allocate();
        let future = inner.ctx.bus.track(request_id, text, origin);

        let Some((command, args)) = parse_command_text(text) else {
            debug!(request_id = %request_id, origin = %origin, "rejecting empty command");
            inner.ctx.bus.publish(CommandResponse::failure(
                request_id,
                text,
                origin,
                ErrorKind::EmptyCommand,
                "Empty command",
                Duration::ZERO,
            ));
            return future;
        };

        let request = CommandRequest {
            id: request_id,
            origin: origin.to_string(),
            raw: text.to_string(),
            command,
            args,
            session: options.session,
            submitted_at: Instant::now(),
        };

        let rejected = {
            let lifecycle = inner.lifecycle.lock();
            match &*lifecycle {
                Lifecycle::Running(running) => {
                    let envelope = Envelope {
                        request,
                        timeout: options.timeout,
                    };
                    match running.queue.push(envelope) {
                        Ok(()) => {
                            debug!(
                                request_id = %request_id,
                                origin = %origin,
                                queue = running.queue.len(),
                                "enqueued command"
                            );
                            None
                        }
                        Err(_) => Some(ErrorKind::ShutdownInProgress),
                    }
                }
                Lifecycle::Stopping => Some(ErrorKind::ShutdownInProgress),
                Lifecycle::Stopped => Some(ErrorKind::ManagerNotRunning),
            }
        };

        if let Some(kind) = rejected {
            let message = match kind {
                ErrorKind::ManagerNotRunning => "Command manager is not running",
                _ => "Command manager is shutting down",
            };
            warn!(request_id = %request_id, origin = %origin, reason = %kind, "command rejected");
            inner.ctx.bus.publish(CommandResponse::failure(
                request_id,
                text,
                origin,
                kind,
                message,
                Duration::ZERO,
            ));
        }

        future
    }

    // ---------- Diagnostics ----------

    /// Snapshot of every execution between spawn and resolution, in
    /// dispatch order.
    pub fn active_handlers_info(&self) -> Vec<HandlerSnapshot> {
        self.inner.ctx.active.snapshot()
    }

    pub fn status(&self) -> ManagerStatus {
        let lifecycle = self.inner.lifecycle.lock();
        let (running, queue_size, uptime_secs) = match &*lifecycle {
            Lifecycle::Running(state) => {
                (true, state.queue.len(), state.started_at.elapsed().as_secs())
            }
            _ => (false, 0, 0),
        };

        ManagerStatus {
            available: true,
            running,
            command_count: self.inner.ctx.registry.len(),
            queue_size,
            in_flight: self.inner.ctx.active.len(),
            uptime_secs,
        }
    }
}

impl std::fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("config", &self.inner.ctx.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
