// ── Domain model ──
//
// Typed stand-ins for the loosely shaped billing and device records: a
// `ShapingRule` has explicit optional attributes instead of a string map.

pub mod rule;
pub mod subscriber;

pub use rule::{DesiredQueue, DeviceQueue, QueueAttr, RuleSource, ShapingRule};
pub use subscriber::{ClientInfo, ClientType, ServicePlan, SubscriberRecord};
