//! Integration tests for CLI argument handling
//!
//! Runs the binary only with arguments that make it exit before binding a
//! port or touching the network.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_coinpulse"))
        .args(args)
        .env_remove("REDIS_URL")
        .output()
        .expect("Failed to execute coinpulse")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("coinpulse"), "Help should mention coinpulse");
    assert!(stdout.contains("--redis-url"), "Help should mention --redis-url");
    assert!(stdout.contains("REDIS_URL"), "Help should name the env variable");
    assert!(stdout.contains("--cache-ttl-secs"));
}

#[test]
fn test_version_flag_exits_successfully() {
    let output = run_cli(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_host_prints_error_and_exits() {
    let output = run_cli(&["--host", "nowhere"]);
    assert!(!output.status.success(), "Expected invalid host to fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid host"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_upstream_url_prints_error_and_exits() {
    let output = run_cli(&["--host", "127.0.0.1", "--coingecko-api-url", "ftp://mirror"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("COINGECKO_API_URL"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_out_of_range_ttl_is_a_usage_error() {
    let output = run_cli(&["--host", "127.0.0.1", "--cache-ttl-secs", "1000000000000000"]);
    assert!(!output.status.success(), "Expected huge TTL to be rejected");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cache-ttl-secs"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_malformed_upstream_url_prints_error_and_exits() {
    let output = run_cli(&["--host", "127.0.0.1", "--coingecko-api-url", "http://[oops"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("COINGECKO_API_URL"), "Unexpected stderr: {}", stderr);
}

#[test]
fn test_non_numeric_port_is_a_usage_error() {
    let output = run_cli(&["--port", "eighty"]);
    assert!(!output.status.success());
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use coinpulse::cli::{Cli, CliError, ServiceConfig};

    #[test]
    fn test_cli_accepts_every_option() {
        let cli = Cli::parse_from([
            "coinpulse",
            "--host",
            "::1",
            "--port",
            "9000",
            "--frontend-url",
            "http://localhost:5173",
            "--coingecko-api-url",
            "https://pro-api.test/api/v3",
            "--sentiment-api-url",
            "https://fng.test/",
            "--cache-ttl-secs",
            "120",
            "--upstream-timeout-secs",
            "4",
        ]);

        let config = ServiceConfig::from_cli(&cli).unwrap();

        assert!(config.server.addr.is_ipv6());
        assert_eq!(config.server.addr.port(), 9000);
        assert_eq!(config.fetcher.ttl_secs, 120);
        assert!(config.fetcher.single_flight);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let cli = Cli::parse_from([
            "coinpulse",
            "--host",
            "0.0.0.0",
            "--frontend-url",
            "http://localhost:3000",
            "--coingecko-api-url",
            "https://api.test",
            "--sentiment-api-url",
            "https://fng.test/",
            "--cache-ttl-secs",
            "600",
            "--upstream-timeout-secs",
            "0",
        ]);

        assert_eq!(
            ServiceConfig::from_cli(&cli).unwrap_err(),
            CliError::Zero("UPSTREAM_TIMEOUT_SECS")
        );
    }
}
