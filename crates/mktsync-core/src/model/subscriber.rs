// ── Billing-side inputs ──

use serde::{Deserialize, Serialize};

/// A billing service: one subscriber line with its declared rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub id: u64,
    pub client_id: u64,
    pub service_plan_id: Option<u64>,
    /// Declared upload rate in Mbps.
    pub upload_mbps: f64,
    /// Declared download rate in Mbps.
    pub download_mbps: f64,
    /// Addresses assigned directly on the service.
    pub ip_ranges: Vec<String>,
    /// Device-management site, used when addresses live there instead.
    pub site_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: u64,
    pub name: Option<String>,
    /// Data usage limit, repurposed as queue priority.
    pub data_usage_limit: Option<f64>,
    pub upload_burst_kb: Option<f64>,
    pub download_burst_kb: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    Individual,
    Organization,
    Other,
}

impl From<Option<u8>> for ClientType {
    fn from(code: Option<u8>) -> Self {
        match code {
            Some(1) => Self::Individual,
            Some(2) => Self::Organization,
            _ => Self::Other,
        }
    }
}

/// The client record behind a service, as needed for queue naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: u64,
    pub client_type: ClientType,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
}
