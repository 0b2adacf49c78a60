// ── Runtime sync configuration ──
//
// These types describe *what* a run talks to and how rules are shaped.
// They carry credential data but never touch disk: `mktsync-config` builds
// a `SyncConfig` from the TOML file and environment and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use url::Url;

/// Default RouterOS API port.
pub const DEFAULT_API_PORT: u16 = 8728;

/// One configured RouterOS device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEndpoint {
    /// Position in the configured address list.
    pub index: usize,
    pub host: String,
    pub port: u16,
}

impl DeviceEndpoint {
    /// Parse a comma-separated address list. Blank entries are skipped but
    /// still consume an index so reports line up with the configuration.
    pub fn parse_list(addresses: &str, port: u16) -> Vec<Self> {
        addresses
            .split(',')
            .enumerate()
            .filter_map(|(index, raw)| {
                let host = raw.trim();
                (!host.is_empty()).then(|| Self {
                    index,
                    host: host.to_owned(),
                    port,
                })
            })
            .collect()
    }
}

/// Login for the RouterOS API. Shared by every configured device.
#[derive(Debug, Clone)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct BillingEndpoint {
    /// UCRM API root, e.g. `https://billing.example.com/api/v1.0/`.
    pub url: Url,
    pub app_key: SecretString,
}

#[derive(Debug, Clone)]
pub struct SiteLookupEndpoint {
    /// UNMS API root, e.g. `https://billing.example.com/nms/api/v2.1/`.
    pub url: Url,
    pub token: SecretString,
}

/// Where a subscriber's address comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AddressMode {
    /// First entry of the service's own `ipRanges`.
    #[default]
    ServiceRanges,
    /// First device IP of the client's site on the device-management layer.
    ClientSite,
}

/// The three `"U/D"` settings that parameterize rule shaping, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawShapingSettings {
    pub limit_at_percentage: String,
    pub burst_limit_percentage: String,
    pub burst_time: String,
}

/// An upload/download pair of small integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DirectionalPair {
    pub upload: u32,
    pub download: u32,
}

/// Validated shaping settings. Built by [`RawShapingSettings::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ShapingSettings {
    /// Guaranteed rate as a percentage of max-limit.
    pub limit_at: DirectionalPair,
    /// Burst rate as a percentage above max-limit.
    pub burst_limit: DirectionalPair,
    /// Burst window in seconds. `0` means no burst window.
    pub burst_time: DirectionalPair,
}

/// Everything a sync run needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub devices: Vec<DeviceEndpoint>,
    pub credentials: DeviceCredentials,
    pub billing: BillingEndpoint,
    /// Present when addresses are resolved through client sites.
    pub site_lookup: Option<SiteLookupEndpoint>,
    pub shaping: RawShapingSettings,
    /// Gate on issuing `add` calls. Updates are always applied.
    pub apply_additions: bool,
    /// Per-request timeout for both the billing API and the devices.
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl SyncConfig {
    pub fn address_mode(&self) -> AddressMode {
        if self.site_lookup.is_some() {
            AddressMode::ClientSite
        } else {
            AddressMode::ServiceRanges
        }
    }
}
