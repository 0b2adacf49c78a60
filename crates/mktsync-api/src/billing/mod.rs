//! UCRM billing API and the UNMS site address lookup.

pub mod client;
pub mod models;
pub mod sites;

pub use client::BillingClient;
pub use sites::SiteIpClient;
