// tests/lifecycle.rs

use std::error::Error;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use fqs_dispatch::engine::CommandManager;
use fqs_dispatch::types::RequestState;
use fqs_dispatch::ErrorKind;
use fqs_test_utils::builders::{started_manager, test_dispatcher_config};
use fqs_test_utils::handlers::{GatedHandler, StaticHandler};
use fqs_test_utils::{collect_responses, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn wait_for_active(manager: &CommandManager, count: usize) {
    for _ in 0..200 {
        if manager.active_handlers_info().len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} active handlers");
}

#[tokio::test]
async fn start_and_stop_are_idempotent() -> TestResult {
    init_tracing();

    let manager = CommandManager::new(test_dispatcher_config());
    manager.stop().await;
    assert!(!manager.is_running());

    manager.start()?;
    manager.start()?;
    assert!(manager.is_running());

    manager.stop().await;
    manager.stop().await;
    assert!(!manager.is_running());
    Ok(())
}

#[tokio::test]
async fn manager_can_be_restarted() -> TestResult {
    init_tracing();

    let manager = CommandManager::new(test_dispatcher_config());
    manager.register("ping", StaticHandler("pong"))?;

    manager.start()?;
    let first = with_timeout(manager.submit("ui", "ping")).await;
    manager.stop().await;

    manager.start()?;
    let second = with_timeout(manager.submit("ui", "ping")).await;
    manager.stop().await;

    assert!(first.success && second.success);
    assert!(second.request_id > first.request_id, "ids keep increasing");
    Ok(())
}

#[tokio::test]
async fn stop_fails_queued_and_running_commands() -> TestResult {
    init_tracing();

    let config = test_dispatcher_config().with_max_concurrency(NonZeroUsize::new(1));
    let manager = CommandManager::new(config);
    manager.start()?;
    let seen = collect_responses(&manager);

    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    manager.register(
        "hold",
        GatedHandler {
            gate: Arc::clone(&gate),
            started: Arc::clone(&started),
        },
    )?;

    let running = manager.submit("ui", "hold");
    let queued: Vec<_> = (0..3).map(|_| manager.submit("ui", "hold")).collect();

    with_timeout(started.notified()).await;
    wait_for_active(&manager, 1).await;

    with_timeout(manager.stop()).await;

    let response = with_timeout(running).await;
    assert_eq!(response.error_kind, Some(ErrorKind::ShutdownInProgress));

    for future in queued {
        let response = with_timeout(future).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some(ErrorKind::ShutdownInProgress));
    }

    assert!(manager.active_handlers_info().is_empty());
    assert_eq!(seen.lock().unwrap().len(), 4, "each request resolved exactly once");
    Ok(())
}

#[tokio::test]
async fn active_handlers_info_describes_running_commands() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    manager.register(
        "hold",
        GatedHandler {
            gate: Arc::clone(&gate),
            started: Arc::clone(&started),
        },
    )?;

    let future = manager.submit("api", "HOLD please");
    with_timeout(started.notified()).await;
    wait_for_active(&manager, 1).await;

    let info = manager.active_handlers_info();
    assert_eq!(info[0].request_id, future.request_id());
    assert_eq!(info[0].command, "hold");
    assert_eq!(info[0].origin, "api");
    assert_eq!(info[0].state, RequestState::Running);

    let json = serde_json::to_value(&info[0])?;
    assert_eq!(json["state"], "running");
    assert_eq!(json["command"], "hold");

    let status = manager.status();
    assert!(status.running);
    assert_eq!(status.in_flight, 1);
    assert_eq!(status.queue_size, 0);

    gate.notify_one();
    let response = with_timeout(future).await;
    assert_eq!(response.message, "released");
    assert!(manager.active_handlers_info().is_empty());

    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn status_reflects_lifecycle() -> TestResult {
    init_tracing();

    let manager = CommandManager::new(test_dispatcher_config());
    manager.register("a", StaticHandler("a"))?;
    manager.register("b", StaticHandler("b"))?;

    let status = manager.status();
    assert!(status.available);
    assert!(!status.running);
    assert_eq!(status.command_count, 2);
    assert_eq!(status.uptime_secs, 0);

    manager.start()?;
    assert!(manager.status().running);

    manager.stop().await;
    assert!(!manager.status().running);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_stops_both_return() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    manager.register(
        "hold",
        GatedHandler {
            gate,
            started: Arc::clone(&started),
        },
    )?;

    let pending = manager.submit("ui", "hold");
    with_timeout(started.notified()).await;

    let other = manager.clone();
    let (_, _) = with_timeout(async { tokio::join!(manager.stop(), other.stop()) }).await;

    assert!(!manager.is_running());
    let response = with_timeout(pending).await;
    assert_eq!(response.error_kind, Some(ErrorKind::ShutdownInProgress));
    Ok(())
}

#[tokio::test]
async fn dropping_every_manager_handle_resolves_pending_requests() -> TestResult {
    init_tracing();

    let manager = started_manager(Duration::from_secs(3));
    let gate = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    manager.register(
        "hold",
        GatedHandler {
            gate,
            started: Arc::clone(&started),
        },
    )?;

    let pending = manager.submit("ui", "hold");
    with_timeout(started.notified()).await;
    drop(manager);

    let response = with_timeout(pending).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some(ErrorKind::ShutdownInProgress));
    Ok(())
}

#[test]
fn snapshot_states_cover_slot_holding_phases() -> TestResult {
    let states = [
        (RequestState::Dispatched, "dispatched"),
        (RequestState::Running, "running"),
        (RequestState::Completed, "completed"),
        (RequestState::TimedOut, "timed_out"),
        (RequestState::Failed, "failed"),
        (RequestState::Cancelled, "cancelled"),
    ];
    for (state, label) in states {
        assert_eq!(serde_json::to_value(state)?, label);
    }
    Ok(())
}
