// src/engine/queue.rs

//! Admission queue between `submit` and the dispatcher loop.
//!
//! Semantics:
//! - FIFO: the dispatcher dequeues in exactly the order requests were pushed.
//! - Unbounded: `push` never waits, so submitting from a UI event handler
//!   cannot stall the UI.
//! - Closing the receiving side makes further pushes fail; whatever was
//!   already queued can still be drained and failed explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::types::{CommandRequest, RequestId};

/// A queued request plus per-call dispatch settings.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub request: CommandRequest,
    pub timeout: Option<Duration>,
}

/// Sending half, held by the manager while it is running.
#[derive(Debug)]
pub(crate) struct AdmissionQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    depth: Arc<AtomicUsize>,
}

/// Receiving half, owned by the dispatcher loop.
#[derive(Debug)]
pub(crate) struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
    depth: Arc<AtomicUsize>,
}

pub(crate) fn admission_queue() -> (AdmissionQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        AdmissionQueue {
            tx,
            depth: Arc::clone(&depth),
        },
        QueueReceiver { rx, depth },
    )
}

impl AdmissionQueue {
    /// Push a request. Gives the envelope back if the dispatcher has already
    /// closed its end.
    pub fn push(&self, envelope: Envelope) -> Result<(), Box<Envelope>> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(envelope).map_err(|err| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            Box::new(err.0)
        })
    }

    /// Number of requests waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

impl QueueReceiver {
    /// Wait for the next request. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Envelope> {
        let envelope = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(envelope)
    }

    /// Stop accepting pushes and return everything still queued, in order.
    pub fn close_and_drain(&mut self) -> Vec<Envelope> {
        self.rx.close();
        let mut leftover = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            leftover.push(envelope);
        }
        leftover
    }
}

/// Allocates request ids. Ids keep increasing across restarts of the same
/// manager.
#[derive(Debug)]
pub(crate) struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
