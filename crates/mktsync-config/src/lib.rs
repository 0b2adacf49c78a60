//! Configuration for mktsync.
//!
//! One flat TOML file, environment overrides (`MKTSYNC_` prefix), credential
//! resolution (env + keyring + plaintext), and translation to
//! `mktsync_core::SyncConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use mktsync_core::{
    BillingEndpoint, DEFAULT_API_PORT, DeviceCredentials, DeviceEndpoint, RawShapingSettings,
    SiteLookupEndpoint, SyncConfig,
};

/// Keyring service name for every stored secret.
pub const KEYRING_SERVICE: &str = "mktsync";

/// Environment prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MKTSYNC_";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured")]
    NoCredentials { secret: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// The flat configuration mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Comma-separated RouterOS device addresses.
    #[serde(default)]
    pub mktip: String,

    #[serde(default = "default_user")]
    pub mktusr: String,

    /// Device password (plaintext; prefer keyring or env var).
    pub mktpass: Option<String>,

    #[serde(default = "default_port")]
    pub apiport: u16,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_pair")]
    pub limit_at_percentage: String,

    #[serde(default = "default_pair")]
    pub burst_limit_percentage: String,

    #[serde(default = "default_pair")]
    pub burst_time: String,

    /// Create queues for services missing on the device.
    #[serde(default = "default_true")]
    pub add_queue: bool,

    /// UCRM API root, e.g. `https://billing.example.com/api/v1.0/`.
    pub ucrm_url: Option<String>,

    /// UCRM app key (plaintext; prefer keyring or env var).
    pub ucrm_app_key: Option<String>,

    /// UNMS API root. When set, addresses come from client sites.
    pub unms_url: Option<String>,

    pub unms_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Skip TLS verification for the HTTP APIs.
    #[serde(default)]
    pub insecure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mktip: String::new(),
            mktusr: default_user(),
            mktpass: None,
            apiport: default_port(),
            debug_mode: false,
            limit_at_percentage: default_pair(),
            burst_limit_percentage: default_pair(),
            burst_time: default_pair(),
            add_queue: true,
            ucrm_url: None,
            ucrm_app_key: None,
            unms_url: None,
            unms_token: None,
            timeout: default_timeout(),
            insecure: false,
        }
    }
}

fn default_user() -> String {
    "admin".into()
}
fn default_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_pair() -> String {
    "0/0".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

/// Key names as they appear in the file. Environment variables are matched
/// against these case-insensitively.
const KEYS: [&str; 15] = [
    "mktip",
    "mktusr",
    "mktpass",
    "apiport",
    "debugMode",
    "limitAtPercentage",
    "burstLimitPercentage",
    "burstTime",
    "addQueue",
    "ucrmUrl",
    "ucrmAppKey",
    "unmsUrl",
    "unmsToken",
    "timeout",
    "insecure",
];

/// `MKTSYNC_DEBUGMODE` → `debugMode`.
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    KEYS.iter()
        .find(|k| key.as_str().eq_ignore_ascii_case(k))
        .map_or_else(|| key.as_str().to_ascii_lowercase(), |k| (*k).to_owned())
        .into()
}

impl Config {
    /// Parsed shaping settings block.
    pub fn shaping(&self) -> RawShapingSettings {
        RawShapingSettings {
            limit_at_percentage: self.limit_at_percentage.clone(),
            burst_limit_percentage: self.burst_limit_percentage.clone(),
            burst_time: self.burst_time.clone(),
        }
    }

    pub fn devices(&self) -> Vec<DeviceEndpoint> {
        DeviceEndpoint::parse_list(&self.mktip, self.apiport)
    }

    /// A copy with every secret replaced, for display.
    pub fn redacted(&self) -> Self {
        let hide = |s: &Option<String>| s.as_ref().map(|_| REDACTED.to_owned());
        Self {
            mktpass: hide(&self.mktpass),
            ucrm_app_key: hide(&self.ucrm_app_key),
            unms_token: hide(&self.unms_token),
            ..self.clone()
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "mktsync", "mktsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("mktsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then the TOML file (if present), then `MKTSYNC_*`
/// environment variables.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).map(env_key).lowercase(false));

    Ok(figment.extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

fn env_secret(key: &str) -> Option<SecretString> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

fn keyring_secret(account: &str) -> Option<SecretString> {
    keyring::Entry::new(KEYRING_SERVICE, account)
        .ok()?
        .get_password()
        .ok()
        .map(SecretString::from)
}

fn resolve_secret(
    env_key: &str,
    account: &str,
    plaintext: Option<&String>,
    what: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Env var
    if let Some(secret) = env_secret(env_key) {
        return Ok(secret);
    }

    // 2. Keyring
    if let Some(secret) = keyring_secret(account) {
        return Ok(secret);
    }

    // 3. Plaintext in config
    plaintext
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.clone()))
        .ok_or_else(|| ConfigError::NoCredentials {
            secret: what.into(),
        })
}

/// Device API password: `MKTSYNC_MKTPASS`, keyring `<user>@device`, then
/// `mktpass`.
pub fn resolve_device_password(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_secret(
        "MKTPASS",
        &format!("{}@device", cfg.mktusr),
        cfg.mktpass.as_ref(),
        "device password",
    )
}

/// UCRM app key: `MKTSYNC_UCRMAPPKEY`, keyring `billing-app-key`, then
/// `ucrmAppKey`.
pub fn resolve_app_key(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_secret(
        "UCRMAPPKEY",
        "billing-app-key",
        cfg.ucrm_app_key.as_ref(),
        "UCRM app key",
    )
}

/// UNMS token: `MKTSYNC_UNMSTOKEN`, keyring `unms-token`, then `unmsToken`.
pub fn resolve_unms_token(cfg: &Config) -> Result<SecretString, ConfigError> {
    resolve_secret(
        "UNMSTOKEN",
        "unms-token",
        cfg.unms_token.as_ref(),
        "UNMS token",
    )
}

/// Secrets resolved for one run.
pub struct Secrets {
    pub device_password: SecretString,
    pub app_key: SecretString,
    /// Only needed when `unmsUrl` is set.
    pub unms_token: Option<SecretString>,
}

impl Secrets {
    pub fn resolve(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            device_password: resolve_device_password(cfg)?,
            app_key: resolve_app_key(cfg)?,
            unms_token: cfg
                .unms_url
                .as_ref()
                .map(|_| resolve_unms_token(cfg))
                .transpose()?,
        })
    }
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL {raw}: {e}"),
    })
}

/// Build a `SyncConfig` with already-resolved secrets.
pub fn build_sync_config(cfg: &Config, secrets: Secrets) -> Result<SyncConfig, ConfigError> {
    let devices = cfg.devices();
    if devices.is_empty() {
        return Err(ConfigError::Validation {
            field: "mktip".into(),
            reason: "no device address configured".into(),
        });
    }

    let ucrm_url = cfg
        .ucrm_url
        .as_deref()
        .ok_or_else(|| ConfigError::Validation {
            field: "ucrmUrl".into(),
            reason: "missing".into(),
        })?;

    let site_lookup = match (cfg.unms_url.as_deref(), secrets.unms_token) {
        (Some(raw), Some(token)) => Some(SiteLookupEndpoint {
            url: parse_url("unmsUrl", raw)?,
            token,
        }),
        (Some(_), None) => {
            return Err(ConfigError::NoCredentials {
                secret: "UNMS token".into(),
            });
        }
        (None, _) => None,
    };

    Ok(SyncConfig {
        devices,
        credentials: DeviceCredentials {
            username: cfg.mktusr.clone(),
            password: secrets.device_password,
        },
        billing: BillingEndpoint {
            url: parse_url("ucrmUrl", ucrm_url)?,
            app_key: secrets.app_key,
        },
        site_lookup,
        shaping: cfg.shaping(),
        apply_additions: cfg.add_queue,
        timeout: Duration::from_secs(cfg.timeout),
        accept_invalid_certs: cfg.insecure,
    })
}

/// Resolve secrets and build a `SyncConfig`.
pub fn to_sync_config(cfg: &Config) -> Result<SyncConfig, ConfigError> {
    build_sync_config(cfg, Secrets::resolve(cfg)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;
    use mktsync_core::AddressMode;

    fn secrets() -> Secrets {
        Secrets {
            device_password: SecretString::from("pw".to_owned()),
            app_key: SecretString::from("key".to_owned()),
            unms_token: None,
        }
    }

    fn base() -> Config {
        Config {
            mktip: "192.168.88.1,10.0.0.1".into(),
            ucrm_url: Some("https://billing.example.com/api/v1.0/".into()),
            ..Config::default()
        }
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
mktip = "192.168.88.1"
apiport = 8729
debugMode = true
burstLimitPercentage = "10/20"
burstTime = "5/5"
addQueue = false
ucrmUrl = "https://billing.example.com/api/v1.0/"
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.mktip, "192.168.88.1");
        assert_eq!(cfg.apiport, 8729);
        assert!(cfg.debug_mode);
        assert!(!cfg.add_queue);
        assert_eq!(cfg.mktusr, "admin");
        assert_eq!(cfg.limit_at_percentage, "0/0");
        assert_eq!(cfg.burst_limit_percentage, "10/20");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.apiport, DEFAULT_API_PORT);
        assert!(cfg.add_queue);
        assert_eq!(cfg.timeout, 30);
    }

    #[test]
    fn env_keys_map_to_file_keys() {
        assert_eq!(env_key(UncasedStr::new("DEBUGMODE")).as_str(), "debugMode");
        assert_eq!(env_key(UncasedStr::new("mktip")).as_str(), "mktip");
        assert_eq!(env_key(UncasedStr::new("UNKNOWN")).as_str(), "unknown");
    }

    #[test]
    fn sync_config_translation() {
        let sync = build_sync_config(&base(), secrets()).unwrap();

        assert_eq!(sync.devices.len(), 2);
        assert_eq!(sync.devices[1].port, DEFAULT_API_PORT);
        assert_eq!(sync.credentials.username, "admin");
        assert_eq!(sync.credentials.password.expose_secret(), "pw");
        assert_eq!(sync.billing.url.host_str(), Some("billing.example.com"));
        assert_eq!(sync.address_mode(), AddressMode::ServiceRanges);
        assert!(sync.apply_additions);
        assert_eq!(sync.timeout, Duration::from_secs(30));
    }

    #[test]
    fn site_lookup_needs_token() {
        let cfg = Config {
            unms_url: Some("https://billing.example.com/nms/api/v2.1/".into()),
            ..base()
        };

        assert!(matches!(
            build_sync_config(&cfg, secrets()),
            Err(ConfigError::NoCredentials { .. })
        ));

        let with_token = Secrets {
            unms_token: Some(SecretString::from("t".to_owned())),
            ..secrets()
        };
        let sync = build_sync_config(&cfg, with_token).unwrap();
        assert_eq!(sync.address_mode(), AddressMode::ClientSite);
    }

    #[test]
    fn required_fields() {
        let no_devices = Config {
            mktip: " , ".into(),
            ..base()
        };
        assert!(matches!(
            build_sync_config(&no_devices, secrets()),
            Err(ConfigError::Validation { ref field, .. }) if field == "mktip"
        ));

        let bad_url = Config {
            ucrm_url: Some("not a url".into()),
            ..base()
        };
        assert!(matches!(
            build_sync_config(&bad_url, secrets()),
            Err(ConfigError::Validation { ref field, .. }) if field == "ucrmUrl"
        ));
    }

    #[test]
    fn redaction_hides_secrets() {
        let cfg = Config {
            mktpass: Some("hunter2".into()),
            ucrm_app_key: Some("abc".into()),
            ..base()
        };
        let shown = cfg.redacted().to_toml().unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("abc"));
        assert!(shown.contains("mktpass = \"********\""));
        assert!(shown.contains("limitAtPercentage = \"0/0\""));
    }
}
