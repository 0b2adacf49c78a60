#![allow(clippy::unwrap_used)]
// End-to-end reconciliation against in-memory billing and device fakes.

use std::cell::Cell;
use std::collections::HashMap;

use pretty_assertions::assert_eq;

use mktsync_core::sync::{ADDRESS_LIST_SECTION, NO_QUEUE_ID, QUEUE_SECTION};
use mktsync_core::{
    AddressMode, BillingSource, ClientInfo, ClientType, CoreError, DeviceFailure, DeviceHandle,
    DeviceSet, QueueDevice, RawShapingSettings, Record, ServicePlan, SubscriberRecord,
    SyncOptions, Synchronizer,
};

// ── Fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeBilling {
    plans: Vec<ServicePlan>,
    services: Vec<SubscriberRecord>,
    clients: HashMap<u64, ClientInfo>,
    client_lookups: Cell<usize>,
    subscriber_fetches: Cell<usize>,
}

impl BillingSource for FakeBilling {
    async fn service_plans(&self) -> Result<Vec<ServicePlan>, CoreError> {
        Ok(self.plans.clone())
    }

    async fn subscribers(&self, statuses: &[u8]) -> Result<Vec<SubscriberRecord>, CoreError> {
        assert_eq!(statuses, &[1, 0, 3, 4, 6]);
        self.subscriber_fetches.set(self.subscriber_fetches.get() + 1);
        Ok(self.services.clone())
    }

    async fn client(&self, client_id: u64) -> Result<ClientInfo, CoreError> {
        self.client_lookups.set(self.client_lookups.get() + 1);
        self.clients.get(&client_id).cloned().ok_or(CoreError::Api {
            message: format!("client {client_id} not found"),
            status: Some(404),
        })
    }

    async fn site_addresses(&self, _site_id: &str) -> Result<Vec<String>, CoreError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeDevice {
    queues: Vec<Record>,
    address_list: Vec<Record>,
    calls: Vec<String>,
    written: Vec<Vec<(String, String)>>,
    broken: bool,
    forget_targets: bool,
    /// Targets whose `add` the device traps on.
    reject_targets: Vec<String>,
    next_id: usize,
}

impl QueueDevice for FakeDevice {
    fn label(&self) -> &str {
        "fake"
    }

    async fn print(&mut self, section: &str, _proplist: &[&str]) -> Result<Vec<Record>, CoreError> {
        if self.broken {
            return Err(CoreError::DeviceClosed {
                message: "connection closed".into(),
            });
        }
        Ok(match section {
            QUEUE_SECTION => self.queues.clone(),
            ADDRESS_LIST_SECTION => self.address_list.clone(),
            _ => Vec::new(),
        })
    }

    async fn find(
        &mut self,
        _section: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Record>, CoreError> {
        if self.forget_targets {
            return Ok(Vec::new());
        }
        Ok(self
            .queues
            .iter()
            .filter(|row| row.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn add(
        &mut self,
        _section: &str,
        attrs: &[(String, String)],
    ) -> Result<Option<String>, CoreError> {
        let mut row: Record = attrs.iter().cloned().collect();
        self.calls.push(format!("add {}", row["target"]));
        if self.reject_targets.contains(&row["target"]) {
            return Err(CoreError::DeviceRejected {
                command: "/queue/simple/add".into(),
                message: "invalid value for argument target".into(),
            });
        }
        self.next_id += 1;
        let id = format!("*N{}", self.next_id);
        row.insert(".id".into(), id.clone());
        self.queues.push(row);
        self.written.push(attrs.to_vec());
        Ok(Some(id))
    }

    async fn set(
        &mut self,
        _section: &str,
        id: &str,
        attrs: &[(String, String)],
    ) -> Result<(), CoreError> {
        self.calls.push(format!("set {id}"));
        let Some(row) = self
            .queues
            .iter_mut()
            .find(|row| row.get(".id").map(String::as_str) == Some(id))
        else {
            return Err(CoreError::DeviceRejected {
                command: "/queue/simple/set".into(),
                message: "no such item".into(),
            });
        };
        row.extend(attrs.iter().cloned());
        self.written.push(attrs.to_vec());
        Ok(())
    }

    async fn remove(&mut self, _section: &str, _ids: &[String]) -> Result<Vec<Record>, CoreError> {
        Ok(Vec::new())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn queue_row(id: &str, target: &str, max: &str, limit_at: &str, priority: &str) -> Record {
    record(&[
        (".id", id),
        ("target", target),
        ("max-limit", max),
        ("limit-at", limit_at),
        ("priority", priority),
        ("burst-limit", max),
        ("burst-threshold", "0/0"),
        ("burst-time", "0s/0s"),
    ])
}

fn shaping() -> RawShapingSettings {
    RawShapingSettings {
        limit_at_percentage: "10/10".into(),
        burst_limit_percentage: "0/0".into(),
        burst_time: "0/0".into(),
    }
}

fn service(id: u64, client_id: u64, plan: u64, mbps: f64, ip: Option<&str>) -> SubscriberRecord {
    SubscriberRecord {
        id,
        client_id,
        service_plan_id: Some(plan),
        upload_mbps: mbps,
        download_mbps: mbps,
        ip_ranges: ip.map(|ip| vec![ip.to_owned()]).unwrap_or_default(),
        site_id: None,
    }
}

fn billing() -> FakeBilling {
    let clients = [
        ClientInfo {
            id: 100,
            client_type: ClientType::Individual,
            first_name: "Ana".into(),
            last_name: "Ruiz".into(),
            company_name: String::new(),
        },
        ClientInfo {
            id: 200,
            client_type: ClientType::Organization,
            first_name: String::new(),
            last_name: String::new(),
            company_name: "Acme".into(),
        },
    ];

    FakeBilling {
        plans: vec![
            ServicePlan {
                id: 1,
                data_usage_limit: Some(3.0),
                ..ServicePlan::default()
            },
            ServicePlan {
                id: 2,
                ..ServicePlan::default()
            },
        ],
        services: vec![
            service(1, 100, 1, 10.0, Some("10.0.0.1")),
            service(2, 200, 2, 20.0, Some("10.0.0.2/32")),
            service(3, 100, 1, 10.0, Some("10.0.0.3")),
            service(4, 100, 1, 10.0, None),
        ],
        clients: clients.into_iter().map(|c| (c.id, c)).collect(),
        client_lookups: Cell::new(0),
        subscriber_fetches: Cell::new(0),
    }
}

/// Device holding one converged queue and one drifted queue.
fn device() -> FakeDevice {
    FakeDevice {
        queues: vec![
            queue_row("*A", "10.0.0.1/32", "10000000/10000000", "1000000/1000000", "3/3"),
            queue_row("*B", "10.0.0.2/32", "5000000/5000000", "500000/500000", "8/8"),
        ],
        ..FakeDevice::default()
    }
}

fn single(device: FakeDevice) -> DeviceSet<FakeDevice> {
    DeviceSet {
        connected: vec![DeviceHandle {
            index: 0,
            host: "192.168.88.1".into(),
            device,
        }],
        failed: Vec::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn converges_device_and_is_idempotent() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let mut devices = single(device());

    let report = sync.run(&mut devices).await.unwrap();
    let dev = &report.devices[0];
    assert_eq!(dev.desired, 3);
    assert_eq!(dev.device_queues, 2);
    assert_eq!((dev.additions_planned, dev.additions_applied), (1, 1));
    assert_eq!((dev.updates_planned, dev.updates_applied), (1, 1));
    assert!(!report.has_failures());

    let fake = &devices.connected[0].device;
    assert_eq!(fake.calls, vec!["add 10.0.0.3/32", "set *B"]);

    let added = &fake.written[0];
    assert_eq!(added[0], ("name".into(), "Ana Ruiz - Service ID:3".into()));
    assert_eq!(added[1], ("target".into(), "10.0.0.3/32".into()));
    let updated = &fake.written[1];
    assert_eq!(updated[0], ("name".into(), "Acme - Service ID: 2".into()));
    assert!(updated.contains(&("max-limit".into(), "20000000/20000000".into())));
    assert!(updated.contains(&("priority".into(), "8/8".into())));

    let second = sync.run(&mut devices).await.unwrap();
    assert_eq!(second.devices[0].additions_planned, 0);
    assert_eq!(second.devices[0].updates_planned, 0);
    assert_eq!(devices.connected[0].device.calls.len(), 2);
}

#[tokio::test]
async fn accumulators_are_per_device_and_totalled() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let mut devices = single(device());
    devices.connected.push(DeviceHandle {
        index: 1,
        host: "192.168.88.2".into(),
        device: device(),
    });

    let report = sync.run(&mut devices).await.unwrap();

    for dev in &report.devices {
        assert!((dev.accumulators.upload_max_limit - 40_000_000.0).abs() < 1e-6);
        assert!((dev.accumulators.download_limit_at - 4_000_000.0).abs() < 1e-6);
    }
    assert!((report.totals.upload_max_limit - 80_000_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn subscribers_are_fetched_once_per_run() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let mut devices = single(device());
    devices.connected.push(DeviceHandle {
        index: 1,
        host: "192.168.88.2".into(),
        device: device(),
    });

    let report = sync.run(&mut devices).await.unwrap();

    assert_eq!(report.devices.len(), 2);
    assert!(report.devices.iter().all(|d| d.desired == 3));
    assert_eq!(devices.connected[1].device.calls, vec!["add 10.0.0.3/32", "set *B"]);

    assert_eq!(sync.source().subscriber_fetches.get(), 1);
}

#[tokio::test]
async fn scope_list_limits_additions() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let mut fake = device();
    fake.address_list = vec![
        record(&[("list", "sync_with_ucrm"), ("address", "172.16.0.0/12")]),
        record(&[("list", "other"), ("address", "10.0.0.0/8")]),
    ];
    let mut devices = single(fake);

    let report = sync.run(&mut devices).await.unwrap();
    let dev = &report.devices[0];
    assert_eq!(dev.scope_ranges, 1);
    assert_eq!(dev.additions_planned, 0);
    assert_eq!(dev.out_of_scope, 1);
    assert_eq!(devices.connected[0].device.calls, vec!["set *B"]);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::default()
    };
    let sync = Synchronizer::new(billing(), &shaping(), options).unwrap();
    let mut devices = single(device());

    let report = sync.run(&mut devices).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.devices[0].additions_planned, 1);
    assert_eq!(report.devices[0].additions_applied, 0);
    assert!(devices.connected[0].device.calls.is_empty());
    assert_eq!(sync.source().client_lookups.get(), 0);
}

#[tokio::test]
async fn additions_can_be_disabled() {
    let options = SyncOptions {
        apply_additions: false,
        dry_run: false,
        address_mode: AddressMode::ServiceRanges,
    };
    let sync = Synchronizer::new(billing(), &shaping(), options).unwrap();
    let mut devices = single(device());

    sync.run(&mut devices).await.unwrap();
    assert_eq!(devices.connected[0].device.calls, vec!["set *B"]);
}

#[tokio::test]
async fn unresolved_queue_id_is_sent_and_rejection_does_not_stop_the_pass() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let mut fake = device();
    // Both existing queues drifted; neither can be found by target.
    fake.queues[0] = queue_row("*A", "10.0.0.1/32", "1/1", "0/0", "3/3");
    fake.forget_targets = true;
    let mut devices = single(fake);

    let report = sync.run(&mut devices).await.unwrap();

    let placeholder = format!("set {NO_QUEUE_ID}");
    assert_eq!(
        devices.connected[0].device.calls,
        vec!["add 10.0.0.3/32".to_owned(), placeholder.clone(), placeholder]
    );

    let dev = &report.devices[0];
    assert!(dev.is_ok());
    assert_eq!(dev.desired, 3);
    assert_eq!((dev.additions_applied, dev.additions_failed), (1, 0));
    assert_eq!(dev.updates_planned, 2);
    assert_eq!((dev.updates_applied, dev.updates_failed), (0, 2));
    assert!((dev.accumulators.upload_max_limit - 40_000_000.0).abs() < 1e-6);
    assert_eq!(report.failed_writes(), 2);
    assert!(report.has_failures());
}

#[tokio::test]
async fn rejected_add_does_not_stop_later_adds() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let fake = FakeDevice {
        reject_targets: vec!["10.0.0.1/32".into()],
        ..FakeDevice::default()
    };
    let mut devices = single(fake);

    let report = sync.run(&mut devices).await.unwrap();

    assert_eq!(
        devices.connected[0].device.calls,
        vec!["add 10.0.0.1/32", "add 10.0.0.2/32", "add 10.0.0.3/32"]
    );
    let dev = &report.devices[0];
    assert_eq!(dev.additions_planned, 3);
    assert_eq!((dev.additions_applied, dev.additions_failed), (2, 1));
    assert_eq!(dev.writes_failed(), 1);
    assert!(dev.is_ok());
}

#[tokio::test]
async fn failing_device_does_not_stop_the_run() {
    let sync = Synchronizer::new(billing(), &shaping(), SyncOptions::default()).unwrap();
    let broken = FakeDevice {
        broken: true,
        ..FakeDevice::default()
    };
    let mut devices = DeviceSet {
        connected: vec![
            DeviceHandle {
                index: 0,
                host: "r0".into(),
                device: broken,
            },
            DeviceHandle {
                index: 2,
                host: "r2".into(),
                device: device(),
            },
        ],
        failed: vec![DeviceFailure {
            index: 1,
            host: "r1".into(),
            error: "Cannot connect to r1: refused".into(),
        }],
    };

    let report = sync.run(&mut devices).await.unwrap();

    let hosts: Vec<_> = report.devices.iter().map(|d| d.host.as_str()).collect();
    assert_eq!(hosts, vec!["r0", "r1", "r2"]);
    assert_eq!(report.failed_devices(), 2);

    // The broken device still reports what it built before the read failed.
    let broken = &report.devices[0];
    assert!(broken.error.as_deref().unwrap().contains("connection closed"));
    assert_eq!(broken.desired, 3);
    assert!((broken.accumulators.upload_max_limit - 40_000_000.0).abs() < 1e-6);
    assert!((report.totals.upload_max_limit - 80_000_000.0).abs() < 1e-6);

    assert!(report.devices[2].is_ok());
    assert_eq!(report.devices[2].additions_applied, 1);
}

#[test]
fn invalid_settings_are_fatal() {
    let bad = RawShapingSettings {
        burst_limit_percentage: "10/20".into(),
        burst_time: "0/5".into(),
        limit_at_percentage: "10/10".into(),
    };

    let err = Synchronizer::new(billing(), &bad, SyncOptions::default())
        .err()
        .unwrap();
    match err {
        CoreError::InvalidConfiguration { messages } => {
            assert_eq!(
                messages,
                vec!["Upload Burst Time can't be 0 if Upload Burst Limit is configured"]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}
