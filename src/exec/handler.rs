// src/exec/handler.rs

//! Pluggable command handler abstraction.
//!
//! The dispatcher talks to a [`CommandHandler`] trait object instead of a
//! concrete function type. Production code registers trading handlers
//! (order placement, balance lookup, ...), tests register fakes that record
//! calls or sleep on purpose.
//!
//! Plain async closures are adapted with [`handler_fn`].

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::types::{CommandRequest, HandlerOutcome};

/// Result of running a handler. Errors become `HandlerExecutionError`
/// responses; they never reach the caller as an `Err`.
pub type HandlerResult = anyhow::Result<HandlerOutcome>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Trait abstracting the work bound to a command name.
///
/// The returned future runs on its own tokio task. It receives a
/// [`CancellationToken`] that fires when the deadline passes or the manager
/// stops; handlers that await I/O should select on it. A handler that ignores
/// the token is aborted once the grace period runs out.
///
/// The dispatcher does not serialize access to state a handler captures.
/// Handlers sharing a wallet, order book or connection must lock it
/// themselves.
pub trait CommandHandler: Send + Sync + 'static {
    fn call(&self, request: CommandRequest, cancel: CancellationToken) -> HandlerFuture;
}

/// Adapter turning an async closure into a [`CommandHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler.
///
/// ```ignore
/// manager.register("hello", handler_fn(|_req, _cancel| async {
///     Ok(HandlerOutcome::ok("Hello world"))
/// }))?;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CommandRequest, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandRequest, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: CommandRequest, cancel: CancellationToken) -> HandlerFuture {
        Box::pin((self.f)(request, cancel))
    }
}
