//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(mktsync_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = mktsync_config::load_config(global.config.as_deref())?.redacted();
            let rendered = match global.output {
                OutputFormat::Table | OutputFormat::Plain => cfg.to_toml()?,
                format => output::render_single(format, &cfg, |_| String::new(), |_| String::new())?,
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
