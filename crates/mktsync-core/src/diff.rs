// ── Desired vs. device reconciliation ──
//
// Three index passes decide what to write:
//   changed  = desired (full key) minus device (full key)
//   add      = changed (target key) minus device (target key)
//   update   = changed (target key) minus add
// A rule that drifted on any attribute is "changed"; its target decides
// whether it is created or patched. Only additions are narrowed by the
// device's scope list.

use mktsync_api::Record;
use serde::Serialize;
use tracing::debug;

use crate::index::IndexedRuleSet;
use crate::ip_range::ip_in_range;
use crate::model::{DesiredQueue, DeviceQueue, QueueAttr, RuleSource, ShapingRule};

/// Address-list entries whose list name starts with this form the scope.
pub const SCOPE_LIST_PREFIX: &str = "sync_with_ucrm";

/// Writes needed to converge one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncPlan {
    /// Targets missing from the device and inside the scope.
    pub additions: Vec<DesiredQueue>,
    /// Targets on the device whose attributes drifted.
    pub updates: Vec<DesiredQueue>,
    /// Missing targets dropped by the scope filter.
    pub out_of_scope: usize,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty()
    }
}

/// Compute additions and updates. An empty `scope` disables the filter.
pub fn plan_changes(desired: &[DesiredQueue], actual: &[DeviceQueue], scope: &[String]) -> SyncPlan {
    let changed = IndexedRuleSet::build(desired, &QueueAttr::FULL)
        .without_keys_of(&IndexedRuleSet::build(actual, &QueueAttr::FULL))
        .reindex(&QueueAttr::TARGET);

    let missing = changed.without_keys_of(&IndexedRuleSet::build(actual, &QueueAttr::TARGET));
    let updates = changed.without_keys_of(&missing);

    let candidates = missing.len();
    let additions: Vec<DesiredQueue> = missing
        .into_values()
        .into_iter()
        .filter(|q| scope.is_empty() || in_scope(q.rule(), scope))
        .cloned()
        .collect();

    debug!(
        changed = changed.len(),
        additions = additions.len(),
        updates = updates.len(),
        "planned changes"
    );

    SyncPlan {
        out_of_scope: candidates - additions.len(),
        additions,
        updates: updates.into_values().into_iter().cloned().collect(),
    }
}

// ── Scope ──────────────────────────────────────────────────────────

/// Add `/32` to a bare single address. Wildcard and bounds ranges are left
/// as they are.
pub fn normalize_scope_range(range: &str) -> String {
    let range = range.trim();
    if range.contains(['/', '*', '-']) {
        range.to_owned()
    } else {
        format!("{range}/32")
    }
}

/// Ranges from address-list rows whose list name carries the scope prefix.
pub fn scope_ranges(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter(|r| {
            r.get("list")
                .is_some_and(|list| list.starts_with(SCOPE_LIST_PREFIX))
        })
        .filter_map(|r| r.get("address").map(String::as_str))
        .map(normalize_scope_range)
        .collect()
}

/// Whether the rule's address falls in any of `ranges`.
pub fn in_scope(rule: &ShapingRule, ranges: &[String]) -> bool {
    ranges.iter().any(|range| ip_in_range(rule.address(), range))
}

// ── Device requests ────────────────────────────────────────────────

/// Attributes of an `add`: name first, then the full rule with empty
/// values left out.
pub fn add_request(queue: &DesiredQueue, name: &str) -> Vec<(String, String)> {
    let mut attrs = vec![("name".to_owned(), name.to_owned())];
    attrs.extend(queue.rule.attribute_pairs(&QueueAttr::FULL));
    attrs
}

/// Attributes of a `set`: name, then the shaping attributes. The target is
/// how the queue was found and is not rewritten.
pub fn set_request(queue: &DesiredQueue, name: &str) -> Vec<(String, String)> {
    let mut attrs = vec![("name".to_owned(), name.to_owned())];
    attrs.extend(queue.rule.attribute_pairs(&QueueAttr::SHAPING));
    attrs
}
