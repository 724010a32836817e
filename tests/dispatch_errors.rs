// tests/dispatch_errors.rs

use std::error::Error;
use std::time::Duration;

use fqs_dispatch::engine::CommandManager;
use fqs_dispatch::errors::DispatchError;
use fqs_dispatch::{ErrorKind, HandlerOutcome, handler_fn};
use fqs_test_utils::builders::{started_manager, test_dispatcher_config};
use fqs_test_utils::handlers::{EagerPanicHandler, FailingHandler, PanickingHandler, StaticHandler};
use fqs_test_utils::{collect_responses, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn empty_and_blank_input_is_rejected_without_dispatch() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    let seen = collect_responses(&manager);

    for text in ["", "   ", "\t\n"] {
        let response = with_timeout(manager.submit("cli", text)).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(ErrorKind::EmptyCommand));
        assert_eq!(response.message, "Empty command");
    }

    assert_eq!(seen.lock().unwrap().len(), 3);
    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn submit_before_start_reports_not_running() -> TestResult {
    init_tracing();

    let manager = CommandManager::new(test_dispatcher_config());
    manager.register("ping", StaticHandler("pong"))?;
    let seen = collect_responses(&manager);

    let response = with_timeout(manager.submit("api", "ping")).await;

    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::ManagerNotRunning));
    assert_eq!(seen.lock().unwrap().len(), 1, "subscribers see rejections too");
    Ok(())
}

#[tokio::test]
async fn submit_after_stop_reports_not_running() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    manager.register("ping", StaticHandler("pong"))?;
    manager.stop().await;

    let response = with_timeout(manager.submit("api", "ping")).await;
    assert_eq!(response.error_kind, Some(ErrorKind::ManagerNotRunning));
    Ok(())
}

#[tokio::test]
async fn handler_error_becomes_execution_error_response() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    manager.register("balance", FailingHandler("wallet locked"))?;

    let response = with_timeout(manager.submit("ui", "balance")).await;

    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::HandlerExecutionError));
    assert!(response.message.contains("wallet locked"), "{}", response.message);

    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn handler_panic_is_contained() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    manager.register("boom", PanickingHandler)?;

    let response = with_timeout(manager.submit("ui", "boom now")).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::HandlerExecutionError));
    assert_eq!(response.message, "Handler panicked");

    // The manager keeps dispatching afterwards.
    let response = with_timeout(manager.submit("ui", "boom calm")).await;
    assert!(response.success);
    assert_eq!(response.message, "calm");
    assert!(manager.active_handlers_info().is_empty());

    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn panic_while_building_handler_future_still_resolves() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    let seen = collect_responses(&manager);
    manager.register("buy", EagerPanicHandler)?;

    let response = with_timeout(manager.submit("ui", "buy abc")).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::HandlerExecutionError));
    assert_eq!(response.message, "Handler panicked");
    assert!(manager.active_handlers_info().is_empty());

    let response = with_timeout(manager.submit("ui", "buy 5")).await;
    assert!(response.success);
    assert_eq!(response.message, "bought 5");

    assert_eq!(seen.lock().unwrap().len(), 2, "each request resolved exactly once");
    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn handler_reported_failure_is_not_an_error_kind() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    manager.register(
        "buy",
        handler_fn(|_req, _cancel| async { Ok(HandlerOutcome::fail("Insufficient balance")) }),
    )?;

    let response = with_timeout(manager.submit("ui", "buy 10")).await;
    assert!(!response.success);
    assert_eq!(response.message, "Insufficient balance");
    assert_eq!(response.error_kind, None);

    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn command_names_are_case_insensitive() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    manager.register("Markets", StaticHandler("3 markets"))?;

    let response = with_timeout(manager.submit("ui", "MARKETS")).await;
    assert!(response.success);
    assert_eq!(response.command, "MARKETS");
    assert_eq!(manager.command_names(), vec!["markets".to_string()]);

    manager.stop().await;
    Ok(())
}

#[test]
fn invalid_command_names_are_rejected() {
    let manager = CommandManager::new(test_dispatcher_config());

    for name in ["", "  ", "two words"] {
        match manager.register(name, StaticHandler("x")) {
            Err(DispatchError::InvalidCommandName(_)) => {}
            other => panic!("expected InvalidCommandName for {name:?}, got {other:?}"),
        }
    }
    assert!(manager.command_names().is_empty());
}

#[test]
fn start_outside_runtime_fails() {
    let manager = CommandManager::new(test_dispatcher_config());
    assert!(matches!(manager.start(), Err(DispatchError::NoRuntime)));
    assert!(!manager.is_running());
}
