// src/exec/active.rs

//! Bookkeeping for executions between spawn and resolution.
//!
//! The dispatcher inserts an entry right before it spawns the governed
//! execution; the governor removes it right before publishing the response.
//! Diagnostics only ever read a copy.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::types::{CommandRequest, RequestId, RequestState};

#[derive(Debug, Clone)]
pub(crate) struct ActiveEntry {
    pub command: String,
    pub raw: String,
    pub origin: String,
    pub started: Instant,
    pub state: RequestState,
}

/// Read-only view of one in-flight execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerSnapshot {
    pub request_id: RequestId,
    pub command: String,
    pub origin: String,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub state: RequestState,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(crate::types::millis(*d))
}

#[derive(Debug, Default)]
pub(crate) struct ActiveExecutions {
    entries: Mutex<HashMap<RequestId, ActiveEntry>>,
}

impl ActiveExecutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: &CommandRequest) {
        self.entries.lock().insert(
            request.id,
            ActiveEntry {
                command: request.command.clone(),
                raw: request.raw.clone(),
                origin: request.origin.clone(),
                started: Instant::now(),
                state: RequestState::Dispatched,
            },
        );
    }

    pub fn set_state(&self, id: RequestId, state: RequestState) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.state = state;
        }
    }

    pub fn remove(&self, id: RequestId) -> Option<ActiveEntry> {
        self.entries.lock().remove(&id)
    }

    /// Remove and return every remaining entry.
    pub fn drain(&self) -> Vec<(RequestId, ActiveEntry)> {
        self.entries.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Snapshot sorted by request id (i.e. dispatch order).
    pub fn snapshot(&self) -> Vec<HandlerSnapshot> {
        let now = Instant::now();
        let mut out: Vec<HandlerSnapshot> = self
            .entries
            .lock()
            .iter()
            .map(|(id, entry)| HandlerSnapshot {
                request_id: *id,
                command: entry.command.clone(),
                origin: entry.origin.clone(),
                elapsed: now.saturating_duration_since(entry.started),
                state: entry.state,
            })
            .collect();
        out.sort_by_key(|s| s.request_id);
        out
    }
}
