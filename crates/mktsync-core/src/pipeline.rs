// ── Record transform pipeline ──
//
// Turns billing services into fully specified queue rules. Address
// resolution runs first and may drop records; the shaping stages then run
// in a fixed order, each over the whole list, and only ever add attributes.
// Run-wide inputs and the summary totals travel in `PipelineContext`.

use std::collections::HashMap;
use std::ops::AddAssign;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AddressMode, ShapingSettings};
use crate::error::CoreError;
use crate::model::{DesiredQueue, QueueAttr, ServicePlan, ShapingRule, SubscriberRecord};
use crate::source::BillingSource;
use crate::speed::{format_decimal, format_magnitude, kb_to_bytes, mbps_to_bytes};

/// Service statuses that get a queue: active, prepared, suspended, quoted
/// and prepared-blocked.
pub const ACTIVE_SERVICE_STATUSES: [u8; 5] = [1, 0, 3, 4, 6];

/// Lowest queue priority; used whenever a plan does not yield a valid one.
pub const DEFAULT_PRIORITY: f64 = 8.0;

// ── Accumulators ───────────────────────────────────────────────────

/// Summed rates (bytes/s) over every rule built in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunAccumulators {
    pub upload_max_limit: f64,
    pub download_max_limit: f64,
    pub upload_limit_at: f64,
    pub download_limit_at: f64,
}

impl RunAccumulators {
    pub fn merge(&mut self, other: &Self) {
        self.upload_max_limit += other.upload_max_limit;
        self.download_max_limit += other.download_max_limit;
        self.upload_limit_at += other.upload_limit_at;
        self.download_limit_at += other.download_limit_at;
    }

    pub fn log_summary(&self, device: &str) {
        info!(
            device,
            download_limit_at = %format_magnitude(self.download_limit_at),
            upload_limit_at = %format_magnitude(self.upload_limit_at),
            download_max_limit = %format_magnitude(self.download_max_limit),
            upload_max_limit = %format_magnitude(self.upload_max_limit),
            "rate totals"
        );
    }
}

impl AddAssign<&RunAccumulators> for RunAccumulators {
    fn add_assign(&mut self, rhs: &RunAccumulators) {
        self.merge(rhs);
    }
}

// ── Context ────────────────────────────────────────────────────────

/// Settings and plans for one pass, plus the totals it accumulates.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub settings: ShapingSettings,
    plans: HashMap<u64, ServicePlan>,
    pub accumulators: RunAccumulators,
}

impl PipelineContext {
    pub fn new(settings: ShapingSettings, plans: Vec<ServicePlan>) -> Self {
        Self {
            settings,
            plans: plans.into_iter().map(|p| (p.id, p)).collect(),
            accumulators: RunAccumulators::default(),
        }
    }

    pub fn plan(&self, plan_id: Option<u64>) -> Option<&ServicePlan> {
        plan_id.and_then(|id| self.plans.get(&id))
    }
}

/// A subscriber on its way to becoming a [`DesiredQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub subscriber: SubscriberRecord,
    pub rule: ShapingRule,
}

impl From<RuleDraft> for DesiredQueue {
    fn from(draft: RuleDraft) -> Self {
        Self {
            rule: draft.rule,
            service_id: draft.subscriber.id,
            client_id: draft.subscriber.client_id,
            service_plan_id: draft.subscriber.service_plan_id,
        }
    }
}

// ── Address resolution ─────────────────────────────────────────────

/// Append `/32` to a bare address.
pub fn normalize_target(address: &str) -> String {
    if address.contains('/') {
        address.to_owned()
    } else {
        format!("{address}/32")
    }
}

/// Attach a target to every subscriber that has an address.
///
/// Subscribers without one are dropped with a warning. In
/// [`AddressMode::ClientSite`] the first device IP of the client's site is
/// used, which costs one lookup per subscriber.
pub async fn resolve_addresses<B: BillingSource>(
    source: &B,
    mode: AddressMode,
    subscribers: Vec<SubscriberRecord>,
) -> Result<Vec<RuleDraft>, CoreError> {
    let mut drafts = Vec::with_capacity(subscribers.len());

    for subscriber in subscribers {
        let address = match mode {
            AddressMode::ServiceRanges => subscriber.ip_ranges.first().cloned(),
            AddressMode::ClientSite => match subscriber.site_id.as_deref() {
                Some(site) => source.site_addresses(site).await?.into_iter().next(),
                None => None,
            },
        };

        match address.filter(|a| !a.trim().is_empty()) {
            Some(address) => {
                let rule = ShapingRule::new(normalize_target(address.trim()));
                drafts.push(RuleDraft { subscriber, rule });
            }
            None => warn!(service_id = subscriber.id, "service has no ip address set"),
        }
    }

    Ok(drafts)
}

// ── Shaping stages ─────────────────────────────────────────────────

pub type Stage = fn(&mut PipelineContext, &mut RuleDraft);

/// Shaping stages in application order.
pub const STAGES: [(QueueAttr, Stage); 6] = [
    (QueueAttr::MaxLimit, max_limit),
    (QueueAttr::LimitAt, limit_at),
    (QueueAttr::Priority, priority),
    (QueueAttr::BurstLimit, burst_limit),
    (QueueAttr::BurstThreshold, burst_threshold),
    (QueueAttr::BurstTime, burst_time),
];

fn pair(upload: f64, download: f64) -> String {
    format!("{}/{}", format_decimal(upload), format_decimal(download))
}

fn max_limit(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let up = mbps_to_bytes(draft.subscriber.upload_mbps);
    let down = mbps_to_bytes(draft.subscriber.download_mbps);
    draft.rule.set(QueueAttr::MaxLimit, pair(up, down));
    ctx.accumulators.upload_max_limit += up;
    ctx.accumulators.download_max_limit += down;
}

fn limit_at(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let pct = ctx.settings.limit_at;
    let up = mbps_to_bytes(draft.subscriber.upload_mbps) * f64::from(pct.upload) / 100.0;
    let down = mbps_to_bytes(draft.subscriber.download_mbps) * f64::from(pct.download) / 100.0;
    draft.rule.set(QueueAttr::LimitAt, pair(up, down));
    ctx.accumulators.upload_limit_at += up;
    ctx.accumulators.download_limit_at += down;
}

/// The plan's data usage limit when it lies in `1..=8`; anything else
/// snaps to the lowest priority.
fn plan_priority(plan: Option<&ServicePlan>) -> f64 {
    plan.and_then(|p| p.data_usage_limit)
        .filter(|v| (1.0..=DEFAULT_PRIORITY).contains(v))
        .unwrap_or(DEFAULT_PRIORITY)
}

fn priority(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let p = format_decimal(plan_priority(ctx.plan(draft.subscriber.service_plan_id)));
    draft.rule.set(QueueAttr::Priority, format!("{p}/{p}"));
}

fn burst_limit(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let pct = ctx.settings.burst_limit;
    let up = draft.subscriber.upload_mbps;
    let down = draft.subscriber.download_mbps;
    draft.rule.set(
        QueueAttr::BurstLimit,
        pair(
            mbps_to_bytes(up + up * f64::from(pct.upload) / 100.0),
            mbps_to_bytes(down + down * f64::from(pct.download) / 100.0),
        ),
    );
}

fn burst_threshold(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let plan = ctx.plan(draft.subscriber.service_plan_id);
    let up = plan.and_then(|p| p.upload_burst_kb).map_or(0.0, kb_to_bytes);
    let down = plan.and_then(|p| p.download_burst_kb).map_or(0.0, kb_to_bytes);
    draft.rule.set(QueueAttr::BurstThreshold, pair(up, down));
}

fn burst_time(ctx: &mut PipelineContext, draft: &mut RuleDraft) {
    let window = ctx.settings.burst_time;
    draft.rule.set(
        QueueAttr::BurstTime,
        format!("{}s/{}s", window.upload, window.download),
    );
}

/// Apply every shaping stage, in order, to the whole list.
pub fn run_stages(ctx: &mut PipelineContext, drafts: &mut [RuleDraft]) {
    for (attr, stage) in STAGES {
        for draft in drafts.iter_mut() {
            stage(ctx, draft);
        }
        debug!(stage = attr.name(), rules = drafts.len(), "stage applied");
    }
}

/// Shape already-resolved drafts into desired queues.
pub fn build_desired(ctx: &mut PipelineContext, mut drafts: Vec<RuleDraft>) -> Vec<DesiredQueue> {
    run_stages(ctx, &mut drafts);
    drafts.into_iter().map(DesiredQueue::from).collect()
}

/// Fetch the subscribers that get a queue and resolve their addresses.
///
/// Done once per run; every device pass shapes the same drafts.
pub async fn fetch_drafts<B: BillingSource>(
    source: &B,
    mode: AddressMode,
) -> Result<Vec<RuleDraft>, CoreError> {
    let subscribers = source.subscribers(&ACTIVE_SERVICE_STATUSES).await?;
    let fetched = subscribers.len();
    let drafts = resolve_addresses(source, mode, subscribers).await?;
    debug!(fetched, addressed = drafts.len(), "resolved subscriber addresses");
    Ok(drafts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::DirectionalPair;
    use crate::model::ClientInfo;

    fn settings() -> ShapingSettings {
        ShapingSettings {
            limit_at: DirectionalPair {
                upload: 10,
                download: 20,
            },
            burst_limit: DirectionalPair {
                upload: 50,
                download: 25,
            },
            burst_time: DirectionalPair {
                upload: 8,
                download: 16,
            },
        }
    }

    fn plan(id: u64, data_usage_limit: Option<f64>) -> ServicePlan {
        ServicePlan {
            id,
            data_usage_limit,
            ..ServicePlan::default()
        }
    }

    fn draft(plan_id: Option<u64>, up: f64, down: f64) -> RuleDraft {
        RuleDraft {
            subscriber: SubscriberRecord {
                id: 42,
                client_id: 7,
                service_plan_id: plan_id,
                upload_mbps: up,
                download_mbps: down,
                ..SubscriberRecord::default()
            },
            rule: ShapingRule::new("10.0.0.5/32"),
        }
    }

    fn priority_for(plans: Vec<ServicePlan>, plan_id: Option<u64>) -> String {
        let mut ctx = PipelineContext::new(settings(), plans);
        let out = build_desired(&mut ctx, vec![draft(plan_id, 1.0, 1.0)]);
        out[0].rule.priority.clone().unwrap()
    }

    #[test]
    fn full_rule_shape() {
        let mut plan = plan(3, Some(4.0));
        plan.upload_burst_kb = Some(512.0);
        let mut ctx = PipelineContext::new(settings(), vec![plan]);

        let out = build_desired(&mut ctx, vec![draft(Some(3), 10.0, 20.0)]);
        let rule = &out[0].rule;

        assert_eq!(rule.target, "10.0.0.5/32");
        assert_eq!(rule.max_limit.as_deref(), Some("10000000/20000000"));
        assert_eq!(rule.limit_at.as_deref(), Some("1000000/4000000"));
        assert_eq!(rule.priority.as_deref(), Some("4/4"));
        assert_eq!(rule.burst_limit.as_deref(), Some("15000000/25000000"));
        assert_eq!(rule.burst_threshold.as_deref(), Some("512000/0"));
        assert_eq!(rule.burst_time.as_deref(), Some("8s/16s"));
        assert_eq!(out[0].service_id, 42);
        assert_eq!(out[0].client_id, 7);
    }

    #[test]
    fn priority_snaps_to_lowest() {
        let plans = vec![plan(1, Some(0.0)), plan(2, Some(9.0)), plan(3, Some(3.0))];
        assert_eq!(priority_for(plans.clone(), Some(1)), "8/8");
        assert_eq!(priority_for(plans.clone(), Some(2)), "8/8");
        assert_eq!(priority_for(plans.clone(), Some(3)), "3/3");
        assert_eq!(priority_for(plans.clone(), Some(99)), "8/8");
        assert_eq!(priority_for(plans, None), "8/8");
        assert_eq!(priority_for(vec![plan(5, None)], Some(5)), "8/8");
    }

    #[test]
    fn fractional_priority_in_range_is_kept() {
        let plans = vec![plan(1, Some(2.5)), plan(2, Some(0.5)), plan(3, Some(8.5))];
        assert_eq!(priority_for(plans.clone(), Some(1)), "2.5/2.5");
        assert_eq!(priority_for(plans.clone(), Some(2)), "8/8");
        assert_eq!(priority_for(plans, Some(3)), "8/8");
    }

    #[test]
    fn priority_ignores_plan_order() {
        let plans = vec![plan(9, Some(2.0)), plan(4, Some(6.0))];
        assert_eq!(priority_for(plans, Some(4)), "6/6");
    }

    #[test]
    fn accumulators_sum_bytes() {
        let mut ctx = PipelineContext::new(settings(), Vec::new());
        build_desired(
            &mut ctx,
            vec![draft(None, 10.0, 20.0), draft(None, 5.0, 5.0)],
        );

        let totals = ctx.accumulators;
        assert!((totals.upload_max_limit - 15_000_000.0).abs() < 1e-6);
        assert!((totals.download_max_limit - 25_000_000.0).abs() < 1e-6);
        assert!((totals.upload_limit_at - 1_500_000.0).abs() < 1e-6);
        assert!((totals.download_limit_at - 5_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn accumulators_merge() {
        let mut total = RunAccumulators::default();
        let pass = RunAccumulators {
            upload_max_limit: 1.0,
            download_max_limit: 2.0,
            upload_limit_at: 3.0,
            download_limit_at: 4.0,
        };
        total += &pass;
        total += &pass;
        assert!((total.download_limit_at - 8.0).abs() < f64::EPSILON);
        assert!((total.upload_max_limit - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn target_normalization() {
        assert_eq!(normalize_target("10.0.0.5"), "10.0.0.5/32");
        assert_eq!(normalize_target("10.0.0.0/24"), "10.0.0.0/24");
    }

    // ── Address resolution ──

    struct Sites;

    impl BillingSource for Sites {
        async fn service_plans(&self) -> Result<Vec<ServicePlan>, CoreError> {
            Ok(Vec::new())
        }

        async fn subscribers(&self, _: &[u8]) -> Result<Vec<SubscriberRecord>, CoreError> {
            Ok(Vec::new())
        }

        async fn client(&self, _: u64) -> Result<ClientInfo, CoreError> {
            Err(CoreError::Internal("unused".into()))
        }

        async fn site_addresses(&self, site_id: &str) -> Result<Vec<String>, CoreError> {
            Ok(match site_id {
                "site-a" => vec!["172.16.0.9".into(), "172.16.0.10".into()],
                _ => Vec::new(),
            })
        }
    }

    fn subscriber(id: u64, ranges: &[&str], site: Option<&str>) -> SubscriberRecord {
        SubscriberRecord {
            id,
            ip_ranges: ranges.iter().map(|r| (*r).to_owned()).collect(),
            site_id: site.map(str::to_owned),
            ..SubscriberRecord::default()
        }
    }

    #[tokio::test]
    async fn service_ranges_mode_drops_unaddressed() {
        let subs = vec![
            subscriber(1, &["10.0.0.1", "10.0.0.2"], None),
            subscriber(2, &[], None),
            subscriber(3, &["10.1.0.0/24"], None),
        ];

        let drafts = resolve_addresses(&Sites, AddressMode::ServiceRanges, subs)
            .await
            .unwrap();

        let targets: Vec<_> = drafts.iter().map(|d| d.rule.target.as_str()).collect();
        assert_eq!(targets, vec!["10.0.0.1/32", "10.1.0.0/24"]);
    }

    #[tokio::test]
    async fn client_site_mode_uses_first_site_ip() {
        let subs = vec![
            subscriber(1, &["10.0.0.1"], Some("site-a")),
            subscriber(2, &["10.0.0.2"], Some("site-b")),
            subscriber(3, &["10.0.0.3"], None),
        ];

        let drafts = resolve_addresses(&Sites, AddressMode::ClientSite, subs)
            .await
            .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].subscriber.id, 1);
        assert_eq!(drafts[0].rule.target, "172.16.0.9/32");
    }
}
