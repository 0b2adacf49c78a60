// ── Shaping rule types ──

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// A simple-queue attribute that takes part in reconciliation.
///
/// The serialized form is the RouterOS property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QueueAttr {
    Target,
    MaxLimit,
    LimitAt,
    Priority,
    BurstLimit,
    BurstThreshold,
    BurstTime,
}

impl QueueAttr {
    /// Target plus every shaping attribute. Used to detect any drift.
    pub const FULL: [Self; 7] = [
        Self::Target,
        Self::MaxLimit,
        Self::LimitAt,
        Self::Priority,
        Self::BurstLimit,
        Self::BurstThreshold,
        Self::BurstTime,
    ];

    /// Target alone. Used to tell additions from updates.
    pub const TARGET: [Self; 1] = [Self::Target];

    /// Attributes written by `set`; the target of an existing queue is its key.
    pub const SHAPING: [Self; 6] = [
        Self::MaxLimit,
        Self::LimitAt,
        Self::Priority,
        Self::BurstLimit,
        Self::BurstThreshold,
        Self::BurstTime,
    ];

    /// RouterOS property name, e.g. `"max-limit"`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Property names for a `.proplist`.
    pub fn names(attrs: &[Self]) -> Vec<&'static str> {
        attrs.iter().map(|a| a.name()).collect()
    }
}

/// A simple queue as the device sees it, minus its display name.
///
/// Rate attributes are `"<upload>/<download>"` strings in the device's own
/// encoding: bytes/s for rates, `Ns` for burst time, `1..=8` for priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShapingRule {
    /// Network address in CIDR form. Also the natural key on the device.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst_time: Option<String>,
}

impl ShapingRule {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, attr: QueueAttr) -> Option<&str> {
        match attr {
            QueueAttr::Target => Some(self.target.as_str()),
            QueueAttr::MaxLimit => self.max_limit.as_deref(),
            QueueAttr::LimitAt => self.limit_at.as_deref(),
            QueueAttr::Priority => self.priority.as_deref(),
            QueueAttr::BurstLimit => self.burst_limit.as_deref(),
            QueueAttr::BurstThreshold => self.burst_threshold.as_deref(),
            QueueAttr::BurstTime => self.burst_time.as_deref(),
        }
    }

    pub fn set(&mut self, attr: QueueAttr, value: impl Into<String>) {
        let value = value.into();
        match attr {
            QueueAttr::Target => self.target = value,
            QueueAttr::MaxLimit => self.max_limit = Some(value),
            QueueAttr::LimitAt => self.limit_at = Some(value),
            QueueAttr::Priority => self.priority = Some(value),
            QueueAttr::BurstLimit => self.burst_limit = Some(value),
            QueueAttr::BurstThreshold => self.burst_threshold = Some(value),
            QueueAttr::BurstTime => self.burst_time = Some(value),
        }
    }

    /// The address portion of `target`, without its prefix length.
    pub fn address(&self) -> &str {
        self.target
            .split_once('/')
            .map_or(self.target.as_str(), |(addr, _)| addr)
    }

    /// `(name, value)` pairs for `attrs`, skipping absent and empty values.
    pub fn attribute_pairs(&self, attrs: &[QueueAttr]) -> Vec<(String, String)> {
        attrs
            .iter()
            .filter_map(|&attr| {
                self.get(attr)
                    .filter(|v| !v.is_empty())
                    .map(|v| (attr.name().to_owned(), v.to_owned()))
            })
            .collect()
    }
}

/// Anything that carries a [`ShapingRule`] and can therefore be indexed.
pub trait RuleSource {
    fn rule(&self) -> &ShapingRule;
}

impl<T: RuleSource + ?Sized> RuleSource for &T {
    fn rule(&self) -> &ShapingRule {
        (**self).rule()
    }
}

impl RuleSource for ShapingRule {
    fn rule(&self) -> &ShapingRule {
        self
    }
}

/// A rule derived from a billing service, with the identity needed to name
/// its queue when it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredQueue {
    pub rule: ShapingRule,
    pub service_id: u64,
    pub client_id: u64,
    pub service_plan_id: Option<u64>,
}

impl RuleSource for DesiredQueue {
    fn rule(&self) -> &ShapingRule {
        &self.rule
    }
}

/// A simple queue read back from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceQueue {
    /// Device-side item id (e.g. `*1A`).
    pub id: Option<String>,
    pub rule: ShapingRule,
}

impl RuleSource for DeviceQueue {
    fn rule(&self) -> &ShapingRule {
        &self.rule
    }
}
