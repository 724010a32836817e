// src/engine/bus.rs

//! Response delivery.
//!
//! Every finished [`CommandResponse`] goes through [`ResponseBus::publish`],
//! which:
//! - resolves the caller's [`ResponseFuture`] (at most once per request id);
//! - then hands the response to every subscriber, one at a time, catching
//!   panics so a broken observer cannot stall dispatch or starve the others.
//!
//! A second publish for an id that is already resolved is a no-op, which
//! makes racing timeout/completion/shutdown paths harmless.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::types::{CommandResponse, ErrorKind, RequestId};

/// Observer callback invoked once per response.
pub type Subscriber = Arc<dyn Fn(&CommandResponse) + Send + Sync>;

/// Returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct PendingEntry {
    tx: oneshot::Sender<CommandResponse>,
    command: String,
    origin: String,
    submitted_at: Instant,
}

#[derive(Default)]
pub struct ResponseBus {
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    /// Copy-on-write: publishers clone the `Arc` and iterate without holding
    /// the lock.
    subscribers: RwLock<Arc<Vec<(SubscriptionHandle, Subscriber)>>>,
    next_subscription: AtomicU64,
}

impl ResponseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and return the future its caller awaits.
    pub fn track(&self, request_id: RequestId, command: &str, origin: &str) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(
            request_id,
            PendingEntry {
                tx,
                command: command.to_string(),
                origin: origin.to_string(),
                submitted_at: Instant::now(),
            },
        );

        ResponseFuture {
            rx,
            request_id,
            command: command.to_string(),
            origin: origin.to_string(),
        }
    }

    /// Resolve the pending future for `response.request_id` and notify
    /// subscribers. Returns `false` if the request was already resolved, in
    /// which case nothing is delivered.
    pub fn publish(&self, response: CommandResponse) -> bool {
        let entry = self.pending.lock().remove(&response.request_id);
        let Some(entry) = entry else {
            debug!(
                request_id = %response.request_id,
                "response already resolved; ignoring duplicate"
            );
            return false;
        };

        if entry.tx.send(response.clone()).is_err() {
            debug!(
                request_id = %response.request_id,
                "caller dropped its response future; notifying subscribers only"
            );
        }

        self.notify(&response);
        true
    }

    /// Resolve every still-pending request with a failure of `kind`.
    ///
    /// Used as the last step of shutdown so no caller is left waiting.
    pub fn abandon_pending(&self, kind: ErrorKind, message: &str) -> usize {
        let drained: Vec<(RequestId, PendingEntry)> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (request_id, entry) in drained {
            self.resolve_failed(request_id, entry, kind, message);
        }

        count
    }

    /// Resolve one pending request with a failure of `kind`, using the
    /// command text and origin recorded by `track`. Returns `false` if it
    /// was already resolved.
    pub fn fail_pending(&self, request_id: RequestId, kind: ErrorKind, message: &str) -> bool {
        let entry = self.pending.lock().remove(&request_id);
        match entry {
            Some(entry) => {
                self.resolve_failed(request_id, entry, kind, message);
                true
            }
            None => false,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn subscribe(&self, callback: Subscriber) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.subscribers.write();
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.push((handle, callback));
        *guard = Arc::new(next);
        debug!(total = guard.len(), "subscriber added");
        handle
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut guard = self.subscribers.write();
        if !guard.iter().any(|(h, _)| *h == handle) {
            return false;
        }
        let next: Vec<_> = guard.iter().filter(|(h, _)| *h != handle).cloned().collect();
        *guard = Arc::new(next);
        debug!(total = guard.len(), "subscriber removed");
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn resolve_failed(
        &self,
        request_id: RequestId,
        entry: PendingEntry,
        kind: ErrorKind,
        message: &str,
    ) {
        let response = CommandResponse::failure(
            request_id,
            &entry.command,
            &entry.origin,
            kind,
            message,
            entry.submitted_at.elapsed(),
        );
        let _ = entry.tx.send(response.clone());
        self.notify(&response);
    }

    fn notify(&self, response: &CommandResponse) {
        let snapshot = Arc::clone(&self.subscribers.read());

        for (handle, callback) in snapshot.iter() {
            if catch_unwind(AssertUnwindSafe(|| (**callback)(response))).is_err() {
                error!(
                    request_id = %response.request_id,
                    subscriber = handle.0,
                    "subscriber panicked while handling response"
                );
            }
        }
    }
}

/// Future returned by `submit`. Always resolves to a [`CommandResponse`].
pub struct ResponseFuture {
    rx: oneshot::Receiver<CommandResponse>,
    request_id: RequestId,
    command: String,
    origin: String,
}

impl ResponseFuture {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for ResponseFuture {
    type Output = CommandResponse;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(response),
            // Sender dropped without sending: the manager itself went away.
            Poll::Ready(Err(_)) => Poll::Ready(CommandResponse::failure(
                this.request_id,
                &this.command,
                &this.origin,
                ErrorKind::ShutdownInProgress,
                "command manager dropped before the command was resolved",
                Duration::ZERO,
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}
