// ── Device sync loop ──
//
// Subscribers are fetched once per run. Then one pass per connected device,
// strictly in configured order: shape the desired rules, read the scope and
// queue lists, diff, then write. A rejected write is counted and skipped; a
// failing read ends that device's pass and the loop moves on. Shaping
// settings are validated before any I/O; invalid settings end the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{AddressMode, RawShapingSettings, ShapingSettings, SyncConfig};
use crate::devices::{DeviceHandle, DeviceSet};
use crate::diff::{SyncPlan, add_request, plan_changes, scope_ranges, set_request};
use crate::error::CoreError;
use crate::model::{DesiredQueue, DeviceQueue, QueueAttr, ServicePlan};
use crate::naming::queue_name;
use crate::pipeline::{PipelineContext, RuleDraft, RunAccumulators, build_desired, fetch_drafts};
use crate::source::{BillingSource, QueueDevice};

pub const QUEUE_SECTION: &str = "/queue/simple";
pub const ADDRESS_LIST_SECTION: &str = "/ip/firewall/address-list";

/// Queue id used for an update whose target no longer resolves on the device.
pub const NO_QUEUE_ID: &str = "NaN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Issue `add` calls for the add set.
    pub apply_additions: bool,
    /// Plan only: no writes, no naming lookups.
    pub dry_run: bool,
    pub address_mode: AddressMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            apply_additions: true,
            dry_run: false,
            address_mode: AddressMode::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            apply_additions: config.apply_additions,
            dry_run: false,
            address_mode: config.address_mode(),
        }
    }
}

// ── Reports ────────────────────────────────────────────────────────

/// Outcome of one device pass.
///
/// Counts are filled in as the pass goes, so a pass that stops early
/// still reports what it planned and wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceReport {
    pub index: usize,
    pub host: String,
    pub desired: usize,
    pub device_queues: usize,
    pub scope_ranges: usize,
    pub additions_planned: usize,
    pub additions_applied: usize,
    pub additions_failed: usize,
    pub updates_planned: usize,
    pub updates_applied: usize,
    pub updates_failed: usize,
    pub out_of_scope: usize,
    pub accumulators: RunAccumulators,
    /// Set when the pass (or the connection) failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceReport {
    fn failed(index: usize, host: &str, error: String) -> Self {
        Self {
            index,
            host: host.to_owned(),
            error: Some(error),
            ..Self::default()
        }
    }

    /// The pass ran to the end. Individual writes may still have been
    /// rejected; see [`writes_failed`](Self::writes_failed).
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn writes_failed(&self) -> usize {
        self.additions_failed + self.updates_failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Ordered by configured device index.
    pub devices: Vec<DeviceReport>,
    /// Sum of every device's accumulators.
    pub totals: RunAccumulators,
}

impl RunReport {
    pub fn failed_devices(&self) -> usize {
        self.devices.iter().filter(|d| !d.is_ok()).count()
    }

    pub fn failed_writes(&self) -> usize {
        self.devices.iter().map(DeviceReport::writes_failed).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_devices() > 0 || self.failed_writes() > 0
    }
}

/// Tally of one batch of device writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WriteCount {
    applied: usize,
    failed: usize,
}

// ── Synchronizer ───────────────────────────────────────────────────

pub struct Synchronizer<B> {
    source: B,
    settings: ShapingSettings,
    options: SyncOptions,
}

impl<B: BillingSource> Synchronizer<B> {
    /// Validate `shaping` and bind it to a billing source.
    ///
    /// Returns [`CoreError::InvalidConfiguration`] with every validation
    /// message when the settings are unusable.
    pub fn new(
        source: B,
        shaping: &RawShapingSettings,
        options: SyncOptions,
    ) -> Result<Self, CoreError> {
        let settings = shaping.parse()?;
        Ok(Self {
            source,
            settings,
            options,
        })
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn source(&self) -> &B {
        &self.source
    }

    /// Reconcile every connected device in `devices`.
    ///
    /// Plans and subscribers are fetched once and fail the run; everything
    /// after that is per device. Devices that failed to connect appear in
    /// the report with their error.
    pub async fn run<D: QueueDevice>(
        &self,
        devices: &mut DeviceSet<D>,
    ) -> Result<RunReport, CoreError> {
        let started_at = Utc::now();
        info!(
            devices = devices.connected.len(),
            unreachable = devices.failed.len(),
            dry_run = self.options.dry_run,
            "synchronization started"
        );

        let plans = self.source.service_plans().await?;
        debug!(plans = plans.len(), "service plans loaded");
        let drafts = fetch_drafts(&self.source, self.options.address_mode).await?;

        let mut reports: Vec<DeviceReport> = devices
            .failed
            .iter()
            .map(|f| DeviceReport::failed(f.index, &f.host, f.error.clone()))
            .collect();

        for handle in &mut devices.connected {
            let report = self.sync_device(&plans, &drafts, handle).await;
            match &report.error {
                None => info!(
                    device = %handle.host,
                    added = report.additions_applied,
                    updated = report.updates_applied,
                    rejected = report.writes_failed(),
                    "synchronization ended"
                ),
                Some(e) => error!(device = %handle.host, error = %e, "device synchronization failed"),
            }
            reports.push(report);
        }

        reports.sort_by_key(|r| r.index);

        let mut totals = RunAccumulators::default();
        for report in &reports {
            totals += &report.accumulators;
        }

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            devices: reports,
            totals,
        })
    }

    /// One full read, diff and write pass against a single device.
    ///
    /// Never fails outright: a read error ends the pass and lands in
    /// [`DeviceReport::error`] next to whatever was counted before it.
    pub async fn sync_device<D: QueueDevice>(
        &self,
        plans: &[ServicePlan],
        drafts: &[RuleDraft],
        handle: &mut DeviceHandle<D>,
    ) -> DeviceReport {
        debug!(device = %handle.host, label = handle.device.label(), "device pass started");

        let mut ctx = PipelineContext::new(self.settings, plans.to_vec());
        let desired = build_desired(&mut ctx, drafts.to_vec());
        ctx.accumulators.log_summary(&handle.host);

        let mut report = DeviceReport {
            index: handle.index,
            host: handle.host.clone(),
            desired: desired.len(),
            accumulators: ctx.accumulators,
            ..DeviceReport::default()
        };

        if let Err(e) = self.reconcile(&desired, handle, &mut report).await {
            report.error = Some(e.to_string());
        }
        report
    }

    async fn reconcile<D: QueueDevice>(
        &self,
        desired: &[DesiredQueue],
        handle: &mut DeviceHandle<D>,
        report: &mut DeviceReport,
    ) -> Result<(), CoreError> {
        let host = handle.host.as_str();
        let device = &mut handle.device;

        let scope = scope_ranges(&device.print(ADDRESS_LIST_SECTION, &[]).await?);
        report.scope_ranges = scope.len();

        let actual: Vec<DeviceQueue> = device
            .print(QUEUE_SECTION, &QueueAttr::names(&QueueAttr::FULL))
            .await?
            .iter()
            .map(DeviceQueue::from)
            .collect();
        report.device_queues = actual.len();

        let plan = plan_changes(desired, &actual, &scope);
        if plan.out_of_scope > 0 {
            debug!(device = %host, skipped = plan.out_of_scope, "additions outside the scope list");
        }
        report.additions_planned = plan.additions.len();
        report.updates_planned = plan.updates.len();
        report.out_of_scope = plan.out_of_scope;

        if self.options.dry_run {
            log_plan(host, &plan);
            return Ok(());
        }

        if self.options.apply_additions {
            let added = self.apply_additions(host, device, &plan.additions).await;
            report.additions_applied = added.applied;
            report.additions_failed = added.failed;
        } else if !plan.additions.is_empty() {
            info!(device = %host, pending = plan.additions.len(), "queue additions disabled");
        }

        let updated = self.apply_updates(host, device, &plan.updates).await?;
        report.updates_applied = updated.applied;
        report.updates_failed = updated.failed;
        Ok(())
    }

    async fn name_for(&self, queue: &DesiredQueue) -> Result<String, CoreError> {
        let client = self.source.client(queue.client_id).await?;
        Ok(queue_name(&client, queue.service_id))
    }

    /// One `add` per queue. A rejected queue is logged and skipped.
    async fn apply_additions<D: QueueDevice>(
        &self,
        host: &str,
        device: &mut D,
        additions: &[DesiredQueue],
    ) -> WriteCount {
        let mut count = WriteCount::default();
        for queue in additions {
            let result = match self.name_for(queue).await {
                Ok(name) => device
                    .add(QUEUE_SECTION, &add_request(queue, &name))
                    .await
                    .map(|id| debug!(address = %queue.rule.target, ?id, %name, "queue added")),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => count.applied += 1,
                Err(e) => {
                    warn!(device = %host, address = %queue.rule.target, service_id = queue.service_id, error = %e, "queue add failed");
                    count.failed += 1;
                }
            }
        }
        count
    }

    /// One `set` per queue. The id lookup is a read and ends the pass on
    /// error; a rejected `set` is logged and skipped.
    async fn apply_updates<D: QueueDevice>(
        &self,
        host: &str,
        device: &mut D,
        updates: &[DesiredQueue],
    ) -> Result<WriteCount, CoreError> {
        let mut count = WriteCount::default();
        for queue in updates {
            let id = queue_id(device, &queue.rule.target).await?;
            let result = match self.name_for(queue).await {
                Ok(name) => device
                    .set(QUEUE_SECTION, &id, &set_request(queue, &name))
                    .await
                    .map(|()| debug!(address = %queue.rule.target, %id, %name, "queue updated")),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => count.applied += 1,
                Err(e) => {
                    warn!(device = %host, address = %queue.rule.target, %id, error = %e, "queue update failed");
                    count.failed += 1;
                }
            }
        }
        Ok(count)
    }
}

/// Device id of the queue bound to `target`, or [`NO_QUEUE_ID`].
pub async fn queue_id<D: QueueDevice>(device: &mut D, target: &str) -> Result<String, CoreError> {
    let rows = device.find(QUEUE_SECTION, "target", target).await?;
    match rows.first().and_then(|row| row.get(".id")) {
        Some(id) => Ok(id.clone()),
        None => {
            warn!(address = %target, "no queue found for target");
            Ok(NO_QUEUE_ID.to_owned())
        }
    }
}

fn log_plan(host: &str, plan: &SyncPlan) {
    for queue in &plan.additions {
        info!(device = %host, address = %queue.rule.target, service_id = queue.service_id, "would add");
    }
    for queue in &plan.updates {
        info!(device = %host, address = %queue.rule.target, service_id = queue.service_id, "would update");
    }
}
