// ── Core error types ──
//
// Domain-facing errors. Consumers never see HTTP status codes or RouterOS
// reply words directly; the `From<mktsync_api::Error>` impl translates
// transport-layer failures into these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device rejected {command}: {message}")]
    DeviceRejected { command: String, message: String },

    #[error("Device closed the session: {message}")]
    DeviceClosed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    /// Shaping settings failed validation. Fatal for the whole run.
    #[error("Invalid shaping configuration: {}", messages.join("; "))]
    InvalidConfiguration { messages: Vec<String> },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Billing API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<mktsync_api::Error> for CoreError {
    fn from(err: mktsync_api::Error) -> Self {
        use mktsync_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        host: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::Connect { host, reason } => CoreError::ConnectionFailed { host, reason },
            Api::Trap { command, message } => CoreError::DeviceRejected { command, message },
            Api::Fatal { message } => CoreError::DeviceClosed { message },
            Api::ConnectionClosed => CoreError::DeviceClosed {
                message: "connection closed".into(),
            },
            Api::Timeout(d) => CoreError::Timeout {
                timeout_secs: d.as_secs(),
            },
            Api::Io(e) => CoreError::ConnectionFailed {
                host: String::new(),
                reason: e.to_string(),
            },
        }
    }
}
