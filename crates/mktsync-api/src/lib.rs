// mktsync-api: Async clients for UCRM, the UNMS site lookup and the
// MikroTik RouterOS API. No reconciliation logic lives here.

pub mod billing;
pub mod error;
pub mod routeros;
pub mod transport;

pub use billing::models::{ClientEntry, ServiceEntry, ServicePlanEntry};
pub use billing::{BillingClient, SiteIpClient};
pub use error::Error;
pub use routeros::{Record, Reply, Response, RouterOsClient, Sentence, SentenceCodec};
pub use transport::TransportConfig;
