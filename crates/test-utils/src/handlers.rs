//! Fake command handlers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use fqs_dispatch::exec::{CommandHandler, HandlerFuture};
use fqs_dispatch::{CommandRequest, HandlerOutcome};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Shared log of `"<event>:<label>"` strings, in the order they happened.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events starting with `prefix`, with the prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

/// Records `start:<args>` when invoked, sleeps for `delay`, records
/// `end:<args>` and echoes the args back.
pub struct RecordingHandler {
    log: EventLog,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl RecordingHandler {
    pub fn new(log: EventLog, delay: Duration) -> Self {
        Self {
            log,
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl CommandHandler for RecordingHandler {
    fn call(&self, request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let log = self.log.clone();
        let delay = self.delay;
        self.calls.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            log.push(format!("start:{}", request.args));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            log.push(format!("end:{}", request.args));
            Ok(HandlerOutcome::ok(request.args))
        })
    }
}

/// Sleeps for `delay` unless cancelled first. Records `cancelled` in `log`
/// when the token fires.
pub struct SleepHandler {
    pub delay: Duration,
    pub log: EventLog,
}

impl CommandHandler for SleepHandler {
    fn call(&self, _request: CommandRequest, cancel: CancellationToken) -> HandlerFuture {
        let delay = self.delay;
        let log = self.log.clone();

        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(HandlerOutcome::ok("done")),
                _ = cancel.cancelled() => {
                    log.push("cancelled");
                    Ok(HandlerOutcome::fail("cancelled"))
                }
            }
        })
    }
}

/// Sleeps for `delay` without ever looking at its cancellation token.
/// Records `finished` if it is allowed to run to the end.
pub struct StubbornHandler {
    pub delay: Duration,
    pub log: EventLog,
}

impl CommandHandler for StubbornHandler {
    fn call(&self, _request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let delay = self.delay;
        let log = self.log.clone();

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            log.push("finished");
            Ok(HandlerOutcome::ok("finished anyway"))
        })
    }
}

/// Always returns an error with the given message.
pub struct FailingHandler(pub &'static str);

impl CommandHandler for FailingHandler {
    fn call(&self, _request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let message = self.0;
        Box::pin(async move { Err(anyhow!(message)) })
    }
}

/// Panics unless its argument is `calm`.
pub struct PanickingHandler;

impl CommandHandler for PanickingHandler {
    fn call(&self, request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        Box::pin(async move {
            if request.args != "calm" {
                panic!("handler blew up");
            }
            Ok(HandlerOutcome::ok("calm"))
        })
    }
}

/// Parses its argument as a quantity before building the future, so bad input
/// panics inside `call` itself rather than while polling.
pub struct EagerPanicHandler;

impl CommandHandler for EagerPanicHandler {
    fn call(&self, request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let qty: u32 = request.args.parse().expect("quantity");
        Box::pin(async move { Ok(HandlerOutcome::ok(format!("bought {qty}"))) })
    }
}

/// Blocks until the shared [`Notify`] is signalled, then succeeds.
/// Signals `started` once it is running.
pub struct GatedHandler {
    pub gate: Arc<Notify>,
    pub started: Arc<Notify>,
}

impl CommandHandler for GatedHandler {
    fn call(&self, _request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let gate = Arc::clone(&self.gate);
        let started = Arc::clone(&self.started);

        Box::pin(async move {
            started.notify_one();
            gate.notified().await;
            Ok(HandlerOutcome::ok("released"))
        })
    }
}

/// Returns a fixed message.
pub struct StaticHandler(pub &'static str);

impl CommandHandler for StaticHandler {
    fn call(&self, _request: CommandRequest, _cancel: CancellationToken) -> HandlerFuture {
        let message = self.0;
        Box::pin(async move { Ok(HandlerOutcome::ok(message)) })
    }
}
