// UNMS site address lookup
//
// In deployments where service IPs live on the device-management layer
// rather than on the billing service itself, the address of a subscriber is
// the first IP reported for the devices of its client site.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::billing::client::{decode_json, with_trailing_slash};
use crate::error::Error;
use crate::transport::TransportConfig;

const TOKEN_HEADER: &str = "x-auth-token";

/// HTTP client for `GET devices/ips` on the UNMS API.
pub struct SiteIpClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl SiteIpClient {
    pub fn new(base_url: Url, token: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, token))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            token,
        }
    }

    /// IP addresses (optionally with prefix) of every device at `site_id`.
    ///
    /// `GET devices/ips?siteId={site_id}`
    pub async fn site_ips(&self, site_id: &str) -> Result<Vec<String>, Error> {
        let url = self.base_url.join("devices/ips")?;
        debug!(site_id, "GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(TOKEN_HEADER, self.token.expose_secret())
            .query(&[("siteId", site_id)])
            .send()
            .await?;

        decode_json(resp).await
    }
}
