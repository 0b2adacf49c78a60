// ── Collaborator seams ──
//
// The engine talks to billing and to devices only through these traits.
// Production code plugs in `UcrmSource` and `RouterOsClient`; tests plug in
// in-memory fakes.

use mktsync_api::{BillingClient, Record, RouterOsClient, SiteIpClient, TransportConfig};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::{ClientInfo, ServicePlan, SubscriberRecord};

/// Read-only access to subscriber and plan data.
#[allow(async_fn_in_trait)]
pub trait BillingSource {
    async fn service_plans(&self) -> Result<Vec<ServicePlan>, CoreError>;

    /// Services in any of `statuses`.
    async fn subscribers(&self, statuses: &[u8]) -> Result<Vec<SubscriberRecord>, CoreError>;

    async fn client(&self, client_id: u64) -> Result<ClientInfo, CoreError>;

    /// Addresses of the devices at a client site. Only used when addresses
    /// are resolved through sites.
    async fn site_addresses(&self, site_id: &str) -> Result<Vec<String>, CoreError>;
}

/// The device control channel for one connected device.
#[allow(async_fn_in_trait)]
pub trait QueueDevice {
    /// Human-readable device identity for logs and reports.
    fn label(&self) -> &str;

    async fn print(&mut self, section: &str, proplist: &[&str]) -> Result<Vec<Record>, CoreError>;

    /// Rows of `section` whose `key` equals `value`.
    async fn find(&mut self, section: &str, key: &str, value: &str)
    -> Result<Vec<Record>, CoreError>;

    /// Returns the new item's id when the device reports one.
    async fn add(
        &mut self,
        section: &str,
        attrs: &[(String, String)],
    ) -> Result<Option<String>, CoreError>;

    async fn set(
        &mut self,
        section: &str,
        id: &str,
        attrs: &[(String, String)],
    ) -> Result<(), CoreError>;

    async fn remove(&mut self, section: &str, ids: &[String]) -> Result<Vec<Record>, CoreError>;
}

// ── UCRM / UNMS ────────────────────────────────────────────────────

/// [`BillingSource`] backed by the UCRM REST API, plus the UNMS site lookup
/// when one is configured.
pub struct UcrmSource {
    billing: BillingClient,
    sites: Option<SiteIpClient>,
}

impl UcrmSource {
    pub fn new(billing: BillingClient, sites: Option<SiteIpClient>) -> Self {
        Self { billing, sites }
    }

    /// Build both HTTP clients from a [`SyncConfig`], sharing one transport.
    pub fn from_config(config: &SyncConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::default()
            .with_timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        let http = transport.build_client()?;

        let billing = BillingClient::with_client(
            http.clone(),
            config.billing.url.clone(),
            config.billing.app_key.clone(),
        );
        let sites = config.site_lookup.as_ref().map(|lookup| {
            SiteIpClient::with_client(http.clone(), lookup.url.clone(), lookup.token.clone())
        });

        Ok(Self::new(billing, sites))
    }
}

impl BillingSource for UcrmSource {
    async fn service_plans(&self) -> Result<Vec<ServicePlan>, CoreError> {
        let plans = self.billing.service_plans().await?;
        debug!(count = plans.len(), "fetched service plans");
        Ok(plans.into_iter().map(ServicePlan::from).collect())
    }

    async fn subscribers(&self, statuses: &[u8]) -> Result<Vec<SubscriberRecord>, CoreError> {
        let services = self.billing.client_services(statuses).await?;
        debug!(count = services.len(), ?statuses, "fetched client services");
        Ok(services.into_iter().map(SubscriberRecord::from).collect())
    }

    async fn client(&self, client_id: u64) -> Result<ClientInfo, CoreError> {
        Ok(self.billing.client(client_id).await?.into())
    }

    async fn site_addresses(&self, site_id: &str) -> Result<Vec<String>, CoreError> {
        let sites = self.sites.as_ref().ok_or_else(|| CoreError::Config {
            message: "site address lookup is not configured".into(),
        })?;
        Ok(sites.site_ips(site_id).await?)
    }
}

// ── RouterOS ───────────────────────────────────────────────────────

impl QueueDevice for RouterOsClient {
    fn label(&self) -> &str {
        self.host()
    }

    async fn print(&mut self, section: &str, proplist: &[&str]) -> Result<Vec<Record>, CoreError> {
        Ok(RouterOsClient::print(self, section, proplist).await?)
    }

    async fn find(
        &mut self,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Record>, CoreError> {
        Ok(self.print_where(section, key, value).await?)
    }

    async fn add(
        &mut self,
        section: &str,
        attrs: &[(String, String)],
    ) -> Result<Option<String>, CoreError> {
        Ok(RouterOsClient::add(self, section, attrs).await?)
    }

    async fn set(
        &mut self,
        section: &str,
        id: &str,
        attrs: &[(String, String)],
    ) -> Result<(), CoreError> {
        Ok(RouterOsClient::set(self, section, id, attrs).await?)
    }

    async fn remove(&mut self, section: &str, ids: &[String]) -> Result<Vec<Record>, CoreError> {
        Ok(RouterOsClient::remove(self, section, ids).await?)
    }
}
