// src/exec/governor.rs

//! Deadline enforcement for a single handler execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::exec::active::ActiveExecutions;
use crate::exec::handler::{CommandHandler, HandlerResult};
use crate::types::{CommandRequest, CommandResponse, ErrorKind, RequestState};

/// Time limits applied to one execution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    /// Deadline, measured from spawn.
    pub timeout: Duration,
    /// How long to wait for a cancelled handler before aborting its task.
    pub cancel_grace: Duration,
}

enum Verdict {
    Finished(Result<HandlerResult, JoinError>),
    Expired,
    Shutdown,
}

/// Aborts the handler task if the governor itself goes away first.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `handler` on its own task and race it against the deadline and the
/// manager's shutdown token.
///
/// - The handler finishes first: its outcome (or error / panic) becomes the
///   response.
/// - The deadline passes first: the handler's token is cancelled, the
///   governor waits at most `cancel_grace` for it to return, aborts the task
///   if it did not, and reports `HandlerTimeout` either way.
/// - The manager stops first: same wind-down, reported as
///   `ShutdownInProgress`.
///
/// Always produces exactly one response; publishing it is the caller's job.
pub(crate) async fn govern(
    handler: Arc<dyn CommandHandler>,
    request: CommandRequest,
    limits: Limits,
    shutdown: &CancellationToken,
    active: &ActiveExecutions,
) -> CommandResponse {
    let started = Instant::now();
    let cancel = shutdown.child_token();

    // `call` runs on the handler task too, so a panic while building the
    // future surfaces as a `JoinError` below.
    let call_request = request.clone();
    let call_cancel = cancel.clone();
    let mut execution =
        tokio::spawn(async move { handler.call(call_request, call_cancel).await });
    let _guard = AbortOnDrop(execution.abort_handle());
    active.set_state(request.id, RequestState::Running);

    debug!(
        request_id = %request.id,
        command = %request.command,
        timeout_ms = limits.timeout.as_millis() as u64,
        "handler running"
    );

    let verdict = tokio::select! {
        joined = &mut execution => Verdict::Finished(joined),
        _ = tokio::time::sleep(limits.timeout) => Verdict::Expired,
        _ = shutdown.cancelled() => Verdict::Shutdown,
    };

    match verdict {
        Verdict::Finished(Ok(Ok(outcome))) => {
            let elapsed = started.elapsed();
            info!(
                request_id = %request.id,
                command = %request.command,
                origin = %request.origin,
                success = outcome.success,
                elapsed_ms = elapsed.as_millis() as u64,
                "command handled"
            );
            active.set_state(request.id, RequestState::Completed);
            CommandResponse::from_outcome(&request, outcome, elapsed)
        }

        Verdict::Finished(Ok(Err(err))) => {
            error!(
                request_id = %request.id,
                command = %request.command,
                error = %format!("{err:#}"),
                "handler returned an error"
            );
            active.set_state(request.id, RequestState::Failed);
            CommandResponse::failure(
                request.id,
                &request.raw,
                &request.origin,
                ErrorKind::HandlerExecutionError,
                format!("Handler error: {err:#}"),
                started.elapsed(),
            )
        }

        Verdict::Finished(Err(join_err)) => {
            let message = if join_err.is_panic() {
                "Handler panicked"
            } else {
                "Handler task was aborted"
            };
            error!(
                request_id = %request.id,
                command = %request.command,
                error = %join_err,
                "handler task did not complete"
            );
            active.set_state(request.id, RequestState::Failed);
            CommandResponse::failure(
                request.id,
                &request.raw,
                &request.origin,
                ErrorKind::HandlerExecutionError,
                message,
                started.elapsed(),
            )
        }

        Verdict::Expired => {
            warn!(
                request_id = %request.id,
                command = %request.command,
                origin = %request.origin,
                timeout_ms = limits.timeout.as_millis() as u64,
                "handler exceeded its deadline; cancelling"
            );
            active.set_state(request.id, RequestState::TimedOut);
            wind_down(execution, &cancel, limits.cancel_grace, &request).await;
            CommandResponse::failure(
                request.id,
                &request.raw,
                &request.origin,
                ErrorKind::HandlerTimeout,
                format!(
                    "Command '{}' timed out after {:.1}s",
                    request.command,
                    limits.timeout.as_secs_f64()
                ),
                started.elapsed(),
            )
        }

        Verdict::Shutdown => {
            info!(
                request_id = %request.id,
                command = %request.command,
                "manager stopping; cancelling in-flight handler"
            );
            active.set_state(request.id, RequestState::Cancelled);
            wind_down(execution, &cancel, limits.cancel_grace, &request).await;
            CommandResponse::failure(
                request.id,
                &request.raw,
                &request.origin,
                ErrorKind::ShutdownInProgress,
                "Command cancelled: command manager is shutting down",
                started.elapsed(),
            )
        }
    }
}

/// Signal cancellation and give the handler `grace` to return.
async fn wind_down(
    mut execution: JoinHandle<HandlerResult>,
    cancel: &CancellationToken,
    grace: Duration,
    request: &CommandRequest,
) {
    cancel.cancel();

    match tokio::time::timeout(grace, &mut execution).await {
        Ok(_) => {
            debug!(request_id = %request.id, "handler acknowledged cancellation");
        }
        Err(_) => {
            warn!(
                request_id = %request.id,
                command = %request.command,
                grace_ms = grace.as_millis() as u64,
                "handler ignored cancellation; aborting its task"
            );
            execution.abort();
        }
    }
}
