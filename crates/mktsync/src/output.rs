//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use mktsync_core::speed::format_magnitude;
use mktsync_core::{DeviceReport, RunAccumulators, RunReport, ValidationReport};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// `detail_fn` produces the table view, `plain_fn` the scripting view.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(plain_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Render {
        message: e.to_string(),
    })
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render {
        message: e.to_string(),
    })
}

// ── Run report ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Desired")]
    desired: usize,
    #[tabled(rename = "On device")]
    device_queues: usize,
    #[tabled(rename = "Scope")]
    scope: usize,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Max-limit ↑/↓")]
    max_limit: String,
    #[tabled(rename = "Limit-at ↑/↓")]
    limit_at: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// `applied/planned`, with rejected writes appended when there are any.
fn applied(applied: usize, planned: usize, failed: usize) -> String {
    if failed == 0 {
        format!("{applied}/{planned}")
    } else {
        format!("{applied}/{planned} ({failed} rejected)")
    }
}

fn rates(upload: f64, download: f64) -> String {
    format!("{} / {}", format_magnitude(upload), format_magnitude(download))
}

impl From<&DeviceReport> for DeviceRow {
    fn from(d: &DeviceReport) -> Self {
        Self {
            index: d.index,
            host: d.host.clone(),
            desired: d.desired,
            device_queues: d.device_queues,
            scope: d.scope_ranges,
            added: applied(d.additions_applied, d.additions_planned, d.additions_failed),
            updated: applied(d.updates_applied, d.updates_planned, d.updates_failed),
            max_limit: rates(d.accumulators.upload_max_limit, d.accumulators.download_max_limit),
            limit_at: rates(d.accumulators.upload_limit_at, d.accumulators.download_limit_at),
            status: d.error.clone().unwrap_or_else(|| "ok".into()),
        }
    }
}

fn totals_line(totals: &RunAccumulators) -> String {
    format!(
        "Total max-limit ↑/↓: {}   limit-at ↑/↓: {}",
        rates(totals.upload_max_limit, totals.download_max_limit),
        rates(totals.upload_limit_at, totals.download_limit_at),
    )
}

fn report_table(report: &RunReport) -> String {
    let rows: Vec<DeviceRow> = report.devices.iter().map(DeviceRow::from).collect();
    let mut out = render_table(&rows);
    out.push('\n');
    out.push_str(&totals_line(&report.totals));
    if report.dry_run {
        out.push_str("\n(dry run: nothing was written)");
    }
    out
}

fn report_plain(report: &RunReport) -> String {
    report
        .devices
        .iter()
        .map(|d| {
            format!(
                "{}\t{}\t+{}\t~{}",
                d.host,
                if d.is_ok() { "ok" } else { "failed" },
                d.additions_applied,
                d.updates_applied
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_report(format: OutputFormat, report: &RunReport) -> Result<String, CliError> {
    render_single(format, report, report_table, report_plain)
}

// ── Validation report ────────────────────────────────────────────────

pub fn render_validation(
    format: OutputFormat,
    report: &ValidationReport,
) -> Result<String, CliError> {
    let text = |r: &ValidationReport| {
        if r.valid {
            "Shaping settings are valid".to_owned()
        } else {
            r.messages.join("\n")
        }
    };
    render_single(format, report, text, text)
}
