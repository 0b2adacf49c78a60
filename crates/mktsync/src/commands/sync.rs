//! `mktsync sync`: connect, reconcile, report.

use tracing::{debug, warn};

use mktsync_core::{DeviceSet, SyncOptions, Synchronizer, UcrmSource};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = mktsync_config::load_config(global.config.as_deref())?;
    let config = mktsync_config::to_sync_config(&cfg)?;

    let options = SyncOptions {
        dry_run: args.dry_run,
        ..SyncOptions::from_config(&config)
    };
    debug!(?options, devices = config.devices.len(), "sync configuration loaded");

    // Settings are validated here, before any device is contacted
    let source = UcrmSource::from_config(&config)?;
    let synchronizer = Synchronizer::new(source, &config.shaping, options)?;

    let mut devices =
        DeviceSet::connect_routeros(&config.devices, &config.credentials, config.timeout).await;
    if devices.is_empty() {
        warn!("no configured device could be reached");
    }

    let report = synchronizer.run(&mut devices).await?;
    output::print_output(&output::render_report(global.output, &report)?, global.quiet);

    if report.has_failures() {
        return Err(CliError::SyncIncomplete {
            failed: report.failed_devices(),
            total: report.devices.len(),
            rejected: report.failed_writes(),
        });
    }
    Ok(())
}
