// tests/render_output.rs

use std::error::Error;
use std::time::Duration;

use serde_json::{Value, json};

use fqs_dispatch::builtins::register_builtins;
use fqs_dispatch::engine::ManagerStatus;
use fqs_dispatch::render::{RenderMode, render_command_list, render_response, render_status};
use fqs_dispatch::types::RequestId;
use fqs_dispatch::{CommandResponse, ErrorKind};
use fqs_test_utils::builders::started_manager;
use fqs_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn sample(success: bool) -> CommandResponse {
    CommandResponse {
        request_id: RequestId(1),
        success,
        message: if success { "Logged out".into() } else { "Unknown command: foo".into() },
        command: if success { "exit".into() } else { "foo".into() },
        origin: "cli".into(),
        execution_time_ms: 1.234,
        navigation: success.then(|| "welcome".to_string()),
        error_kind: (!success).then_some(ErrorKind::UnknownCommand),
    }
}

#[test]
fn text_mode_shows_headline_and_message() -> TestResult {
    let ok = render_response(&sample(true), RenderMode::Text)?;
    assert_eq!(ok, "✓ SUCCESS\n\nLogged out");

    let err = render_response(&sample(false), RenderMode::Text)?;
    assert_eq!(err, "✗ ERROR\n\nUnknown command: foo");
    Ok(())
}

#[test]
fn verbose_mode_adds_details() -> TestResult {
    let out = render_response(&sample(false), RenderMode::Verbose)?;

    assert!(out.starts_with("✗ ERROR\n\nUnknown command: foo"));
    assert!(out.contains("Command: foo"));
    assert!(out.contains("Origin: cli"));
    assert!(out.contains("Execution time: 1.23 ms"));
    assert!(out.contains("Error type: unknown_command"));
    assert!(!out.contains("Navigation:"));
    Ok(())
}

#[test]
fn json_mode_matches_http_shape() -> TestResult {
    let out = render_response(&sample(false), RenderMode::Json)?;
    let value: Value = serde_json::from_str(&out)?;

    assert_eq!(
        value,
        json!({
            "success": false,
            "message": "Unknown command: foo",
            "command": "foo",
            "origin": "cli",
            "execution_time_ms": 1.234,
            "navigation": null,
            "error": "unknown_command",
        })
    );
    Ok(())
}

#[test]
fn flags_pick_render_mode() {
    assert_eq!(RenderMode::from_flags(false, false), RenderMode::Text);
    assert_eq!(RenderMode::from_flags(false, true), RenderMode::Verbose);
    assert_eq!(RenderMode::from_flags(true, true), RenderMode::Json);
}

#[test]
fn status_and_command_list_render() -> TestResult {
    let status = ManagerStatus {
        available: true,
        running: true,
        command_count: 3,
        queue_size: 0,
        in_flight: 1,
        uptime_secs: 12,
    };

    let value: Value = serde_json::from_str(&render_status(&status, true)?)?;
    assert_eq!(value["available"], json!(true));
    assert_eq!(value["command_count"], json!(3));
    assert_eq!(value["queue_size"], json!(0));
    assert!(render_status(&status, false)?.contains("in flight: 1"));

    let names = vec!["exit".to_string(), "hello".to_string()];
    assert_eq!(render_command_list(&names, false)?, "exit\nhello");
    assert_eq!(render_command_list(&names, true)?, "[\n  \"exit\",\n  \"hello\"\n]");
    Ok(())
}

#[tokio::test]
async fn builtins_answer_help_hello_and_exit() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    register_builtins(&manager)?;

    assert_eq!(manager.command_names(), vec!["exit", "hello", "help"]);

    let help = with_timeout(manager.submit("cli", "help")).await;
    assert!(help.success);
    assert_eq!(help.message, "Available commands:\n  exit\n  hello\n  help");

    let hello = with_timeout(manager.submit("ui", "hello trader")).await;
    assert_eq!(hello.message, "Hello, trader! (from ui)");

    let hello = with_timeout(manager.submit("api", "Hello")).await;
    assert_eq!(hello.message, "Hello! (from api)");

    let exit = with_timeout(manager.submit("ui", "exit")).await;
    assert!(exit.success);
    assert_eq!(exit.navigation.as_deref(), Some("welcome"));

    manager.stop().await;
    Ok(())
}
