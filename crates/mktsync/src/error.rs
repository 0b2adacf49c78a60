//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use mktsync_config::ConfigError;
use mktsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {host}")]
    #[diagnostic(
        code(mktsync::connection_failed),
        help("Check that the host is reachable and the API service is enabled.\n{reason}")
    )]
    ConnectionFailed { host: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(mktsync::timeout),
        help("Raise `timeout` in the config file or check the remote service.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(mktsync::auth_failed),
        help("Verify mktusr/mktpass for devices and ucrmAppKey for UCRM.")
    )]
    AuthFailed { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Device rejected {command}: {message}")]
    #[diagnostic(code(mktsync::device_rejected))]
    DeviceRejected { command: String, message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(mktsync::api_error))]
    ApiError { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid shaping settings: {}", messages.join("; "))]
    #[diagnostic(
        code(mktsync::invalid_settings),
        help("Fix limitAtPercentage, burstLimitPercentage or burstTime, then run `mktsync validate`.")
    )]
    InvalidSettings { messages: Vec<String> },

    #[error(transparent)]
    #[diagnostic(
        code(mktsync::config),
        help("Run `mktsync config show` to see the effective configuration.")
    )]
    Config(#[from] ConfigError),

    // ── Sync outcome ─────────────────────────────────────────────────
    #[error("{failed} of {total} device(s) failed to synchronize, {rejected} queue write(s) rejected")]
    #[diagnostic(
        code(mktsync::sync_incomplete),
        help("Rerun with -v for per-device details.")
    )]
    SyncIncomplete {
        failed: usize,
        total: usize,
        rejected: usize,
    },

    // ── Output ───────────────────────────────────────────────────────
    #[error("Failed to render output: {message}")]
    #[diagnostic(code(mktsync::render))]
    Render { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::InvalidSettings { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { host, reason } => {
                CliError::ConnectionFailed { host, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceRejected { command, message } => {
                CliError::DeviceRejected { command, message }
            }
            CoreError::DeviceClosed { message } => CliError::ConnectionFailed {
                host: "(device)".into(),
                reason: message,
            },
            CoreError::InvalidConfiguration { messages } => CliError::InvalidSettings { messages },
            CoreError::Config { message } => CliError::Config(ConfigError::Validation {
                field: "config".into(),
                reason: message,
            }),
            CoreError::Api { message, status } => CliError::ApiError {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Internal(message) => CliError::ApiError { message },
        }
    }
}
