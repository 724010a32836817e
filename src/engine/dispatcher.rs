// src/engine/dispatcher.rs

//! The dispatch control loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::DispatcherConfig;
use crate::engine::bus::ResponseBus;
use crate::engine::queue::{Envelope, QueueReceiver};
use crate::engine::registry::HandlerRegistry;
use crate::exec::active::ActiveExecutions;
use crate::exec::governor::{Limits, govern};
use crate::types::{CommandResponse, ErrorKind, RequestId};

/// Everything the loop and its governed executions share.
pub(crate) struct DispatchContext {
    pub registry: Arc<HandlerRegistry>,
    pub bus: Arc<ResponseBus>,
    pub active: Arc<ActiveExecutions>,
    pub config: DispatcherConfig,
    /// Present when `max_concurrency` is configured.
    pub limiter: Option<Arc<Semaphore>>,
}

impl DispatchContext {
    pub fn new(config: DispatcherConfig) -> Self {
        let limiter = config
            .max_concurrency
            .map(|permits| Arc::new(Semaphore::new(permits.get())));

        Self {
            registry: Arc::new(HandlerRegistry::new()),
            bus: Arc::new(ResponseBus::new()),
            active: Arc::new(ActiveExecutions::new()),
            config,
            limiter,
        }
    }
}

/// Governed executions plus the request each task resolves.
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<()>,
    requests: HashMap<Id, RequestId>,
}

impl InFlight {
    fn spawn<F>(&mut self, request_id: RequestId, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.requests.insert(handle.id(), request_id);
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Book-keep a joined task. A governed execution that died before
    /// publishing has its request resolved here.
    fn settle(&mut self, ctx: &DispatchContext, joined: Result<(Id, ()), JoinError>) {
        let err = match joined {
            Ok((id, ())) => {
                self.requests.remove(&id);
                return;
            }
            Err(err) => err,
        };

        let Some(request_id) = self.requests.remove(&err.id()) else {
            error!(error = %err, "untracked governed execution failed");
            return;
        };

        error!(
            request_id = %request_id,
            error = %err,
            "governed execution failed before resolving its request"
        );
        ctx.active.remove(request_id);
        ctx.bus.fail_pending(
            request_id,
            ErrorKind::HandlerExecutionError,
            "Internal error: command execution failed",
        );
    }
}

/// Spawn the dispatcher loop.
///
/// The loop dequeues one request at a time, in submission order. Requests
/// with a handler are spawned as governed executions and the loop moves on
/// immediately, so many commands can be in flight at once. When `shutdown`
/// fires (or the queue's senders are all gone) the loop:
/// 1. stops dequeuing and fails everything still queued;
/// 2. waits up to `shutdown_grace` for in-flight executions, which see the
///    same token and wind themselves down;
/// 3. aborts whatever is left and resolves those requests itself.
pub(crate) fn spawn_dispatcher(
    ctx: Arc<DispatchContext>,
    queue: QueueReceiver,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(dispatch_loop(ctx, queue, shutdown))
}

async fn dispatch_loop(
    ctx: Arc<DispatchContext>,
    mut queue: QueueReceiver,
    shutdown: CancellationToken,
) {
    info!("dispatcher loop started");

    let mut in_flight = InFlight::default();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("dispatcher received shutdown signal");
                break;
            }

            Some(joined) = in_flight.tasks.join_next_with_id(), if !in_flight.is_empty() => {
                in_flight.settle(&ctx, joined);
            }

            next = queue.next() => match next {
                Some(envelope) => {
                    dispatch_one(&ctx, envelope, &shutdown, &mut in_flight).await;
                }
                None => {
                    // Every sender is gone: the manager was dropped
                    // without `stop()`.
                    info!("admission queue closed; shutting down dispatcher");
                    shutdown.cancel();
                    break;
                }
            },
        }
    }

    fail_queued(&ctx, queue.close_and_drain());
    wait_for_in_flight(&ctx, in_flight).await;

    info!("dispatcher loop finished");
}

async fn dispatch_one(
    ctx: &Arc<DispatchContext>,
    envelope: Envelope,
    shutdown: &CancellationToken,
    in_flight: &mut InFlight,
) {
    let Envelope { request, timeout } = envelope;

    debug!(
        request_id = %request.id,
        command = %request.command,
        origin = %request.origin,
        "dequeued command"
    );

    let Some(handler) = ctx.registry.lookup(&request.command) else {
        warn!(
            request_id = %request.id,
            command = %request.command,
            origin = %request.origin,
            "unknown command"
        );
        ctx.bus.publish(CommandResponse::failure(
            request.id,
            &request.raw,
            &request.origin,
            ErrorKind::UnknownCommand,
            format!("Unknown command: {}", request.command),
            Duration::ZERO,
        ));
        return;
    };

    let permit = match acquire_slot(ctx, shutdown).await {
        Ok(permit) => permit,
        Err(()) => {
            debug!(
                request_id = %request.id,
                "shutdown while waiting for a free execution slot"
            );
            ctx.bus.publish(CommandResponse::failure(
                request.id,
                &request.raw,
                &request.origin,
                ErrorKind::ShutdownInProgress,
                "Command not executed: command manager is shutting down",
                request.submitted_at.elapsed(),
            ));
            return;
        }
    };

    let limits = Limits {
        timeout: timeout.unwrap_or(ctx.config.handler_timeout),
        cancel_grace: ctx.config.cancel_grace,
    };

    info!(
        request_id = %request.id,
        command = %request.command,
        origin = %request.origin,
        in_flight = in_flight.len() + 1,
        "dispatching command"
    );

    ctx.active.insert(&request);

    let request_id = request.id;
    let ctx = Arc::clone(ctx);
    let shutdown = shutdown.clone();
    in_flight.spawn(request_id, async move {
        let _permit = permit;
        let response = govern(handler, request, limits, &shutdown, &ctx.active).await;
        ctx.active.remove(request_id);
        ctx.bus.publish(response);
    });
}

/// Wait for a concurrency slot, or return immediately when unbounded.
/// `Err(())` means shutdown fired first.
async fn acquire_slot(
    ctx: &DispatchContext,
    shutdown: &CancellationToken,
) -> Result<Option<OwnedSemaphorePermit>, ()> {
    let Some(limiter) = &ctx.limiter else {
        return Ok(None);
    };

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(()),
        permit = Arc::clone(limiter).acquire_owned() => Ok(permit.ok()),
    }
}

fn fail_queued(ctx: &DispatchContext, leftover: Vec<Envelope>) {
    if leftover.is_empty() {
        return;
    }

    info!(count = leftover.len(), "failing queued commands on shutdown");

    for Envelope { request, .. } in leftover {
        ctx.bus.publish(CommandResponse::failure(
            request.id,
            &request.raw,
            &request.origin,
            ErrorKind::ShutdownInProgress,
            "Command not executed: command manager is shutting down",
            request.submitted_at.elapsed(),
        ));
    }
}

async fn wait_for_in_flight(ctx: &DispatchContext, mut in_flight: InFlight) {
    if in_flight.is_empty() {
        return;
    }

    info!(count = in_flight.len(), "waiting for in-flight commands to wind down");

    let drained = tokio::time::timeout(ctx.config.shutdown_grace, async {
        while let Some(joined) = in_flight.tasks.join_next_with_id().await {
            in_flight.settle(ctx, joined);
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = in_flight.len(),
            grace_ms = ctx.config.shutdown_grace.as_millis() as u64,
            "in-flight commands did not finish within the shutdown grace period; aborting"
        );
        in_flight.tasks.abort_all();
        sweep_active(ctx);
    }
}

/// Resolve every execution still listed as active with
/// `ShutdownInProgress`. Returns how many were swept.
pub(crate) fn sweep_active(ctx: &DispatchContext) -> usize {
    let leftover = ctx.active.drain();
    let count = leftover.len();

    for (request_id, entry) in leftover {
        ctx.bus.publish(CommandResponse::failure(
            request_id,
            &entry.raw,
            &entry.origin,
            ErrorKind::ShutdownInProgress,
            "Command cancelled: command manager is shutting down",
            entry.started.elapsed(),
        ));
    }

    count
}
