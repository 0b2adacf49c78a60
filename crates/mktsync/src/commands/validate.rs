//! `mktsync validate`: check the shaping settings alone.

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = mktsync_config::load_config(global.config.as_deref())?;
    let report = mktsync_core::validate(&cfg.shaping());

    // Failures reach the user through the error diagnostic; structured
    // formats still get the report on stdout.
    let human = matches!(global.output, OutputFormat::Table | OutputFormat::Plain);
    if report.valid || !human {
        output::print_output(&output::render_validation(global.output, &report)?, global.quiet);
    }

    if report.valid {
        Ok(())
    } else {
        Err(CliError::InvalidSettings {
            messages: report.messages,
        })
    }
}
