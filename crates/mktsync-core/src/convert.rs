// ── API-to-domain type conversions ──
//
// Bridges raw `mktsync_api` records into `mktsync_core::model` types.
// Missing rates read as zero, missing names as empty strings, and device
// queue rows keep only the attributes that take part in reconciliation.

use mktsync_api::{ClientEntry, Record, ServiceEntry, ServicePlanEntry};

use crate::model::{ClientInfo, DeviceQueue, QueueAttr, ServicePlan, ShapingRule, SubscriberRecord};

// ── Billing ────────────────────────────────────────────────────────

impl From<ServiceEntry> for SubscriberRecord {
    fn from(e: ServiceEntry) -> Self {
        Self {
            id: e.id,
            client_id: e.client_id,
            service_plan_id: e.service_plan_id,
            upload_mbps: e.upload_speed.unwrap_or_default(),
            download_mbps: e.download_speed.unwrap_or_default(),
            ip_ranges: e.ip_ranges,
            site_id: e.unms_client_site_id.filter(|s| !s.is_empty()),
        }
    }
}

impl From<ServicePlanEntry> for ServicePlan {
    fn from(e: ServicePlanEntry) -> Self {
        Self {
            id: e.id,
            name: e.name,
            data_usage_limit: e.data_usage_limit,
            upload_burst_kb: e.upload_burst,
            download_burst_kb: e.download_burst,
        }
    }
}

impl From<ClientEntry> for ClientInfo {
    fn from(e: ClientEntry) -> Self {
        Self {
            id: e.id,
            client_type: e.client_type.into(),
            first_name: e.first_name.unwrap_or_default(),
            last_name: e.last_name.unwrap_or_default(),
            company_name: e.company_name.unwrap_or_default(),
        }
    }
}

// ── Device ─────────────────────────────────────────────────────────

/// Build a rule from a device row. Attributes the row lacks stay `None`;
/// a row without `target` gets an empty target.
pub fn rule_from_record(record: &Record) -> ShapingRule {
    let mut rule = ShapingRule::new(record.get("target").cloned().unwrap_or_default());
    for attr in QueueAttr::SHAPING {
        if let Some(value) = record.get(attr.name()) {
            rule.set(attr, value.clone());
        }
    }
    rule
}

impl From<&Record> for DeviceQueue {
    fn from(record: &Record) -> Self {
        Self {
            id: record.get(".id").cloned(),
            rule: rule_from_record(record),
        }
    }
}
