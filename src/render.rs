// src/render.rs

//! Terminal rendering of responses and status for the CLI front end.

use std::fmt::Write as _;

use crate::engine::ManagerStatus;
use crate::errors::Result;
use crate::types::CommandResponse;

/// How to print a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Text,
    Verbose,
    Json,
}

impl RenderMode {
    pub fn from_flags(json: bool, verbose: bool) -> Self {
        match (json, verbose) {
            (true, _) => RenderMode::Json,
            (false, true) => RenderMode::Verbose,
            (false, false) => RenderMode::Text,
        }
    }
}

pub fn render_response(response: &CommandResponse, mode: RenderMode) -> Result<String> {
    if mode == RenderMode::Json {
        return Ok(serde_json::to_string_pretty(response)?);
    }

    let mut out = String::new();
    let headline = if response.success { "✓ SUCCESS" } else { "✗ ERROR" };
    let message = if response.message.is_empty() {
        "(no message)"
    } else {
        response.message.as_str()
    };
    let _ = writeln!(out, "{headline}\n\n{message}");

    if mode == RenderMode::Verbose {
        let _ = writeln!(out, "\n{}", "─".repeat(60));
        let _ = writeln!(out, "Command: {}", response.command);
        let _ = writeln!(out, "Origin: {}", response.origin);
        let _ = writeln!(out, "Execution time: {:.2} ms", response.execution_time_ms);
        if let Some(nav) = &response.navigation {
            let _ = writeln!(out, "Navigation: {nav}");
        }
        if let Some(kind) = response.error_kind {
            let _ = writeln!(out, "Error type: {kind}");
        }
    }

    Ok(out.trim_end().to_string())
}

pub fn render_status(status: &ManagerStatus, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(status)?);
    }

    Ok(format!(
        "available: {}\nrunning: {}\ncommands: {}\nqueue size: {}\nin flight: {}",
        status.available, status.running, status.command_count, status.queue_size, status.in_flight
    ))
}

pub fn render_command_list(names: &[String], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(names)?);
    }
    Ok(names.join("\n"))
}
