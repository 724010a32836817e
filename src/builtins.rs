// src/builtins.rs

//! Commands every manager gets out of the box.
//!
//! Trading commands (`buy`, `balance`, `markets`, ...) live with the
//! exchange integration and are registered by the composition root.

use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;

use crate::engine::{CommandManager, HandlerRegistry};
use crate::errors::Result;
use crate::exec::handler_fn;
use crate::types::{CommandRequest, HandlerOutcome};

/// Register `help`, `hello` and `exit` on `manager`.
pub fn register_builtins(manager: &CommandManager) -> Result<()> {
    // Weak: the registry owns this handler.
    let registry: Weak<HandlerRegistry> = Arc::downgrade(&manager.registry());
    manager.register(
        "help",
        handler_fn(move |_req: CommandRequest, _cancel: CancellationToken| {
            let registry = registry.clone();
            async move { Ok(help(registry.upgrade().as_deref())) }
        }),
    )?;

    manager.register(
        "hello",
        handler_fn(|req: CommandRequest, _cancel: CancellationToken| async move {
            Ok(hello(&req))
        }),
    )?;

    manager.register(
        "exit",
        handler_fn(|_req: CommandRequest, _cancel: CancellationToken| async {
            Ok(HandlerOutcome::ok("Returning to welcome screen").navigate_to("welcome"))
        }),
    )?;

    Ok(())
}

fn help(registry: Option<&HandlerRegistry>) -> HandlerOutcome {
    let Some(registry) = registry else {
        return HandlerOutcome::fail("Command registry is no longer available");
    };

    let mut text = String::from("Available commands:\n");
    for name in registry.names() {
        text.push_str("  ");
        text.push_str(&name);
        text.push('\n');
    }
    HandlerOutcome::ok(text.trim_end())
}

fn hello(req: &CommandRequest) -> HandlerOutcome {
    let origin = if req.origin.is_empty() { "unknown" } else { req.origin.as_str() };
    match req.arg_words().next() {
        Some(name) => HandlerOutcome::ok(format!("Hello, {name}! (from {origin})")),
        None => HandlerOutcome::ok(format!("Hello! (from {origin})")),
    }
}
