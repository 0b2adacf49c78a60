// ── Transport-level error type ──
//
// Everything that can go wrong while talking to the billing API or a
// RouterOS device. `mktsync-core` translates these into domain errors.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport failure (DNS, TLS, connection reset, ...).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Non-success HTTP status from a REST endpoint.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {message}")]
    Deserialization { message: String, body: String },

    /// Could not open a TCP session to a RouterOS device.
    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    /// The device answered a command with `!trap`.
    #[error("device rejected {command}: {message}")]
    Trap { command: String, message: String },

    /// The device sent `!fatal` and closed the session.
    #[error("device closed the session: {message}")]
    Fatal { message: String },

    /// The device closed the socket in the middle of a reply.
    #[error("connection closed by device")]
    ConnectionClosed,

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
