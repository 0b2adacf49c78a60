// ── Device set ──
//
// Every configured address gets one connection attempt. Failures are
// logged and kept so the run report can list them; the run continues with
// whatever connected. No retries.

use std::future::Future;
use std::time::Duration;

use mktsync_api::RouterOsClient;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{DeviceCredentials, DeviceEndpoint};
use crate::error::CoreError;

/// A connected device with its position in the configured list.
#[derive(Debug)]
pub struct DeviceHandle<D> {
    pub index: usize,
    pub host: String,
    pub device: D,
}

/// A device that could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub index: usize,
    pub host: String,
    pub error: String,
}

#[derive(Debug)]
pub struct DeviceSet<D> {
    pub connected: Vec<DeviceHandle<D>>,
    pub failed: Vec<DeviceFailure>,
}

impl<D> Default for DeviceSet<D> {
    fn default() -> Self {
        Self {
            connected: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<D> DeviceSet<D> {
    /// Attempt `connect` for each endpoint, in configured order.
    pub async fn connect_all<F, Fut>(endpoints: &[DeviceEndpoint], mut connect: F) -> Self
    where
        F: FnMut(&DeviceEndpoint) -> Fut,
        Fut: Future<Output = Result<D, CoreError>>,
    {
        let mut set = Self::default();

        for endpoint in endpoints {
            match connect(endpoint).await {
                Ok(device) => {
                    info!(index = endpoint.index, host = %endpoint.host, "device connected");
                    set.connected.push(DeviceHandle {
                        index: endpoint.index,
                        host: endpoint.host.clone(),
                        device,
                    });
                }
                Err(e) => {
                    warn!(
                        index = endpoint.index,
                        host = %endpoint.host,
                        error = %e,
                        "device connection failed, skipping"
                    );
                    set.failed.push(DeviceFailure {
                        index: endpoint.index,
                        host: endpoint.host.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        set
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }
}

impl DeviceSet<RouterOsClient> {
    /// Log in to every endpoint over the RouterOS API with shared credentials.
    pub async fn connect_routeros(
        endpoints: &[DeviceEndpoint],
        credentials: &DeviceCredentials,
        timeout: Duration,
    ) -> Self {
        Self::connect_all(endpoints, |endpoint| {
            let host = endpoint.host.clone();
            let port = endpoint.port;
            let credentials = credentials.clone();
            async move {
                RouterOsClient::connect(
                    &host,
                    port,
                    &credentials.username,
                    &credentials.password,
                    timeout,
                )
                .await
                .map_err(CoreError::from)
            }
        })
        .await
    }
}
