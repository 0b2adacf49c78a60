// ── Shaping settings validation ──
//
// Each setting is written as "U/D": an upload and a download component,
// both decimal, joined by a single separator character. Checks
// short-circuit: burst time is only looked at once the burst limit passed,
// and limit-at only while everything before it passed.

use serde::Serialize;

use crate::config::{DirectionalPair, RawShapingSettings, ShapingSettings};
use crate::error::CoreError;

/// Largest percentage or burst window accepted for any component.
pub const MAX_COMPONENT: u32 = 99;

pub const BURST_LIMIT_FORMAT: &str = "Burst Limit Percentage should be set in format UU/DD, U= Upload percentage, D= Download percentage";
pub const BURST_LIMIT_RANGE: &str = "Burst Limit Percentage should be set between 0 and 99";
pub const BURST_TIME_FORMAT: &str = "Burst Time should be set in format UU/DD, U= Upload Burst time, D= Download Burst time";
pub const BURST_TIME_RANGE: &str = "Burst Time should be set between 0 and 99";
pub const UPLOAD_BURST_WINDOW: &str =
    "Upload Burst Time can't be 0 if Upload Burst Limit is configured";
pub const DOWNLOAD_BURST_WINDOW: &str =
    "Download Burst Time can't be 0 if Download Burst Limit is configured";
pub const LIMIT_AT_FORMAT: &str = "LimitAt should be set in format UU/DD, U= Upload LimitAt percentage, D= Download LimitAt percentage";
pub const LIMIT_AT_RANGE: &str = "LimitAt percentage should be set between 0 and 99";

/// Outcome of [`validate`]: overall verdict plus every failure message in
/// the order it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub messages: Vec<String>,
}

impl ValidationReport {
    fn fail(&mut self, message: &str) {
        self.valid = false;
        self.messages.push(message.to_owned());
    }
}

/// Split `"U<sep>D"` into its two components.
///
/// The separator is any single ASCII character that is neither alphanumeric
/// nor `_`. Components are runs of ASCII digits; values too large for `u32`
/// saturate so they are reported as out of range, not as malformed.
fn parse_pair(raw: &str) -> Option<DirectionalPair> {
    let sep = raw.find(|c: char| !c.is_ascii_digit())?;
    let (upload, rest) = raw.split_at(sep);
    let mut rest = rest.chars();
    let separator = rest.next()?;
    let download = rest.as_str();

    let is_separator = separator.is_ascii() && !separator.is_ascii_alphanumeric() && separator != '_';
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if !is_separator || !is_number(upload) || !is_number(download) {
        return None;
    }

    Some(DirectionalPair {
        upload: upload.parse().unwrap_or(u32::MAX),
        download: download.parse().unwrap_or(u32::MAX),
    })
}

fn in_range(pair: DirectionalPair) -> bool {
    pair.upload <= MAX_COMPONENT && pair.download <= MAX_COMPONENT
}

/// Check a single percentage setting, recording at most one message.
fn check_percentage(
    raw: &str,
    format_msg: &str,
    range_msg: &str,
    report: &mut ValidationReport,
) -> Option<DirectionalPair> {
    match parse_pair(raw) {
        Some(pair) if in_range(pair) => Some(pair),
        Some(_) => {
            report.fail(range_msg);
            None
        }
        None => {
            report.fail(format_msg);
            None
        }
    }
}

/// Validate the three shaping settings.
///
/// A burst time component of `0` means "no burst window" and is accepted,
/// unless the matching burst limit component is non-zero. Both directions
/// are checked and both failures reported.
pub fn validate(settings: &RawShapingSettings) -> ValidationReport {
    let mut report = ValidationReport {
        valid: true,
        messages: Vec::new(),
    };

    let burst_limit = check_percentage(
        &settings.burst_limit_percentage,
        BURST_LIMIT_FORMAT,
        BURST_LIMIT_RANGE,
        &mut report,
    );

    if let Some(limit) = burst_limit {
        if let Some(time) = check_percentage(
            &settings.burst_time,
            BURST_TIME_FORMAT,
            BURST_TIME_RANGE,
            &mut report,
        ) {
            if time.upload == 0 && limit.upload != 0 {
                report.fail(UPLOAD_BURST_WINDOW);
            }
            if time.download == 0 && limit.download != 0 {
                report.fail(DOWNLOAD_BURST_WINDOW);
            }
        }
    }

    if report.valid {
        check_percentage(
            &settings.limit_at_percentage,
            LIMIT_AT_FORMAT,
            LIMIT_AT_RANGE,
            &mut report,
        );
    }

    report
}

impl RawShapingSettings {
    /// Validate and convert. An invalid configuration is fatal for the run.
    pub fn parse(&self) -> Result<ShapingSettings, CoreError> {
        let report = validate(self);
        if !report.valid {
            return Err(CoreError::InvalidConfiguration {
                messages: report.messages,
            });
        }

        let pair = |raw: &str| {
            parse_pair(raw).ok_or_else(|| CoreError::Internal(format!("unparsable setting {raw:?}")))
        };

        Ok(ShapingSettings {
            limit_at: pair(&self.limit_at_percentage)?,
            burst_limit: pair(&self.burst_limit_percentage)?,
            burst_time: pair(&self.burst_time)?,
        })
    }
}
