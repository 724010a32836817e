// src/lib.rs

pub mod builtins;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod render;
pub mod types;

use anyhow::Result;
use tracing::{debug, info};

use crate::builtins::register_builtins;
use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::engine::CommandManager;
use crate::render::{RenderMode, render_command_list, render_response, render_status};
use crate::types::SubmitOptions;

pub use crate::engine::{DispatcherConfig, ResponseFuture, SubscriptionHandle};
pub use crate::exec::{CommandHandler, HandlerResult, HandlerSnapshot, handler_fn};
pub use crate::types::{CommandRequest, CommandResponse, ErrorKind, HandlerOutcome};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - manager construction + built-in commands
/// - one submission, rendered to stdout
/// - a clean stop before returning
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(args.config.as_deref())?;

    let manager = CommandManager::new(cfg.dispatcher_config());
    register_builtins(&manager)?;

    if args.list_commands {
        println!("{}", render_command_list(&manager.command_names(), args.json)?);
        return Ok(0);
    }

    manager.start()?;

    if args.status {
        println!("{}", render_status(&manager.status(), args.json)?);
        manager.stop().await;
        return Ok(0);
    }

    let origin = args
        .origin
        .clone()
        .unwrap_or_else(|| cfg.cli().origin.clone());
    let options = SubmitOptions {
        timeout: args.timeout_duration()?,
        session: args
            .session
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
    };

    let text = args.command_text();
    info!(command = %text, origin = %origin, "submitting command");

    let response = manager.submit_with(&origin, &text, options).await;
    manager.stop().await;

    let mode = RenderMode::from_flags(args.json, args.verbose);
    println!("{}", render_response(&response, mode)?);

    debug!(success = response.success, "command finished");
    Ok(if response.success { 0 } else { 1 })
}
