// UCRM billing API client
//
// Wraps `reqwest::Client` with base-URL joining, app key authentication and
// status-to-error mapping. Endpoint methods return decoded models; callers
// never see raw HTTP responses.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::billing::models::{ClientEntry, ServiceEntry, ServicePlanEntry};
use crate::error::Error;
use crate::transport::TransportConfig;

const APP_KEY_HEADER: &str = "X-Auth-App-Key";

/// HTTP client for the UCRM REST API (`/api/v1.0`).
pub struct BillingClient {
    http: reqwest::Client,
    base_url: Url,
    app_key: SecretString,
}

impl BillingClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://billing.example.com/api/v1.0/`.
    /// A missing trailing slash is added so relative joins keep the version
    /// segment.
    pub fn new(
        base_url: Url,
        app_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, app_key))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, app_key: SecretString) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            app_key,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET service-plans`
    pub async fn service_plans(&self) -> Result<Vec<ServicePlanEntry>, Error> {
        debug!("listing service plans");
        self.get("service-plans", &[]).await
    }

    /// `GET clients/services?statuses[0]=..&statuses[1]=..`
    pub async fn client_services(&self, statuses: &[u8]) -> Result<Vec<ServiceEntry>, Error> {
        debug!(?statuses, "listing client services");
        let query: Vec<(String, String)> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("statuses[{i}]"), s.to_string()))
            .collect();
        self.get("clients/services", &query).await
    }

    /// `GET clients/{id}`
    pub async fn client(&self, client_id: u64) -> Result<ClientEntry, Error> {
        debug!(client_id, "fetching client");
        self.get(&format!("clients/{client_id}"), &[]).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(APP_KEY_HEADER, self.app_key.expose_secret())
            .query(query)
            .send()
            .await?;

        decode_json(resp).await
    }
}

/// Map the HTTP status and decode a JSON body.
pub(crate) async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("HTTP {status}: check the app key or token"),
        });
    }

    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body).to_owned(),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
