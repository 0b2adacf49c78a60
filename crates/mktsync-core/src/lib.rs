// mktsync-core: Reconciliation engine that converges MikroTik simple queues
// to the services held in UCRM.
//
// Leaves first: `validate` checks the shaping settings, `pipeline` shapes
// billing services into desired queues, `index` and `diff` classify them
// against the device, and `sync` drives one pass per device.

pub mod config;
pub mod convert;
pub mod devices;
pub mod diff;
pub mod error;
pub mod index;
pub mod ip_range;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod source;
pub mod speed;
pub mod sync;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    AddressMode, BillingEndpoint, DEFAULT_API_PORT, DeviceCredentials, DeviceEndpoint,
    DirectionalPair, RawShapingSettings, ShapingSettings, SiteLookupEndpoint, SyncConfig,
};
pub use devices::{DeviceFailure, DeviceHandle, DeviceSet};
pub use diff::{SyncPlan, plan_changes};
pub use error::CoreError;
pub use index::IndexedRuleSet;
pub use pipeline::{PipelineContext, RunAccumulators};
pub use source::{BillingSource, QueueDevice, UcrmSource};
pub use sync::{DeviceReport, RunReport, SyncOptions, Synchronizer};
pub use validate::{ValidationReport, validate};

// ── Model re-exports ────────────────────────────────────────────────
pub use model::{
    ClientInfo, ClientType, DesiredQueue, DeviceQueue, QueueAttr, RuleSource, ServicePlan,
    ShapingRule, SubscriberRecord,
};

pub use mktsync_api::Record;
