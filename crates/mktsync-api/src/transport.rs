// ── Shared HTTP transport settings ──
//
// One place to build `reqwest::Client` instances so the billing client and
// the site lookup client agree on timeouts and TLS policy.

use std::time::Duration;

use crate::error::Error;

/// Connection tuning shared by the REST clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Accept self-signed certificates. UCRM installs commonly run with one.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build a `reqwest::Client` honoring these settings.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .user_agent(concat!("mktsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)
    }
}
