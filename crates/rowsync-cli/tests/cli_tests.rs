//! CLI integration tests for rowsync.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that occur before any connection.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the rowsync binary.
fn cmd() -> Command {
    Command::cargo_bin("rowsync").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("rows"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_rows_subcommand_help() {
    cmd()
        .args(["rows", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--prev-key"))
        .stdout(predicate::str::contains("--count"))
        .stdout(predicate::str::contains("--last-key"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rowsync"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_session_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--readonly"))
        .stdout(predicate::str::contains("--snapshot"))
        .stdout(predicate::str::contains("--ssl-mode"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_rows_requires_count_or_last_key() {
    cmd()
        .args(["--engine", "mysql", "--database", "shop", "rows", "--table", "orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--count"));
}

#[test]
fn test_rows_rejects_count_with_last_key() {
    cmd()
        .args([
            "--engine", "mysql", "--database", "shop", "rows", "--table", "orders", "--count",
            "2", "--last-key", "9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7); // EXIT_IO_ERROR - file not found
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1); // EXIT_CONFIG_ERROR
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1); // EXIT_CONFIG_ERROR
}

#[test]
fn test_missing_database_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "engine: postgres").unwrap();
    writeln!(file, "host: localhost").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "schema"])
        .assert()
        .code(1); // EXIT_CONFIG_ERROR
}

#[test]
fn test_unknown_engine_exits_with_code_1() {
    cmd()
        .args(["--engine", "oracle", "--database", "shop", "schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown database engine"));
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_1() {
    cmd()
        .args([
            "--engine", "pg", "--database", "shop", "--ssl-mode", "sometimes", "health-check",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid ssl_mode"));
}

#[test]
fn test_missing_engine_without_config_exits_with_code_1() {
    cmd()
        .args(["--database", "shop", "schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--engine is required"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
