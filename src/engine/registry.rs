// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{DispatchError, Result};
use crate::exec::CommandHandler;

/// Command name -> handler map.
///
/// Names are case-insensitive and stored lower-cased. Registering a name
/// that already exists replaces the previous handler. Reads from the
/// dispatcher and writes from `register` may happen concurrently.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a handler. Returns `true` if a previous handler was
    /// replaced.
    pub fn register(&self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<bool> {
        let key = normalize_name(name)?;
        let replaced = self.handlers.write().insert(key.clone(), handler).is_some();

        if replaced {
            debug!(command = %key, "handler replaced");
        } else {
            debug!(command = %key, "handler registered");
        }

        Ok(replaced)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.read().get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(DispatchError::InvalidCommandName(name.to_string()));
    }
    Ok(trimmed.to_lowercase())
}
