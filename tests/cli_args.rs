// tests/cli_args.rs

use std::time::Duration;

use clap::Parser;

use fqs_dispatch::cli::{CliArgs, LogLevel};

#[test]
fn command_words_are_joined() {
    let args = CliArgs::try_parse_from(["fqs-dispatch", "hello", "trader"]).unwrap();
    assert_eq!(args.command_text(), "hello trader");
    assert!(!args.json);
    assert!(args.origin.is_none());
}

#[test]
fn flags_before_command_are_parsed() {
    let args = CliArgs::try_parse_from([
        "fqs-dispatch",
        "--json",
        "-v",
        "--origin",
        "api",
        "--timeout",
        "1.5",
        "--log-level",
        "debug",
        "buy",
        "10",
    ])
    .unwrap();

    assert!(args.json);
    assert!(args.verbose);
    assert_eq!(args.origin.as_deref(), Some("api"));
    assert_eq!(args.timeout, Some(1.5));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert_eq!(args.command_text(), "buy 10");
}

#[test]
fn no_command_is_allowed_for_listing() {
    let args = CliArgs::try_parse_from(["fqs-dispatch", "--list-commands"]).unwrap();
    assert!(args.list_commands);
    assert!(args.command.is_empty());
}

#[test]
fn timeout_flag_converts_to_duration() {
    let args = CliArgs::try_parse_from(["fqs-dispatch", "--timeout", "1.5", "sync"]).unwrap();
    assert_eq!(args.timeout_duration().unwrap(), Some(Duration::from_millis(1500)));

    let args = CliArgs::try_parse_from(["fqs-dispatch", "sync"]).unwrap();
    assert_eq!(args.timeout_duration().unwrap(), None);
}

#[test]
fn unusable_timeouts_are_errors_not_panics() {
    for value in ["0", "1e30", "inf"] {
        let args = CliArgs::try_parse_from(["fqs-dispatch", "--timeout", value, "sync"]).unwrap();
        assert!(args.timeout_duration().is_err(), "--timeout {value} should be rejected");
    }
}
