// ── Raw UCRM response types ──
//
// Field names follow the UCRM v1.0 JSON schema. Everything the sync does not
// read is left out; serde ignores unknown fields.

use serde::{Deserialize, Serialize};

/// One entry of `GET clients/services`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub id: u64,
    pub client_id: u64,
    pub service_plan_id: Option<u64>,
    /// Status code (1 = active, 0 = prepared, 3 = suspended, ...).
    pub status: Option<u8>,
    /// Declared upload rate in Mbps.
    pub upload_speed: Option<f64>,
    /// Declared download rate in Mbps.
    pub download_speed: Option<f64>,
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    /// Site id on the device-management layer (UNMS), when linked.
    pub unms_client_site_id: Option<String>,
}

/// One entry of `GET service-plans`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanEntry {
    pub id: u64,
    pub name: Option<String>,
    /// Monthly data cap. Repurposed as the queue priority.
    pub data_usage_limit: Option<f64>,
    /// Upload burst allowance in KB.
    pub upload_burst: Option<f64>,
    /// Download burst allowance in KB.
    pub download_burst: Option<f64>,
}

/// `GET clients/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEntry {
    pub id: u64,
    /// 1 = residential, 2 = company.
    pub client_type: Option<u8>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
}
