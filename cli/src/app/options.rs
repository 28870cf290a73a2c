//! Command-line options for `buildship deploy`

use std::path::PathBuf;

use clap::builder::PossibleValuesParser;
use clap::Args;

use crate::project::config::DEFAULT_CONFIG_FILE;
use crate::storage::settings::LogTransport;

/// Log levels accepted by the deployed app
pub const APP_LOG_LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "INTERNAL"];

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// Path to the project config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Override the app name from the config file
    #[arg(long)]
    pub name: Option<String>,

    /// Log level of the deployed app
    #[arg(
        long,
        default_value = "INFO",
        ignore_case = true,
        value_parser = PossibleValuesParser::new(APP_LOG_LEVELS)
    )]
    pub log_level: String,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub disable_confirmation: bool,

    /// Do not collect build logs
    #[arg(long)]
    pub disable_build_logs: bool,

    /// Exit once the build has started instead of following it
    #[arg(long)]
    pub detach: bool,

    /// How build logs are delivered
    #[arg(long, value_enum)]
    pub log_transport: Option<LogTransport>,
}

impl Default for DeployArgs {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            name: None,
            log_level: "INFO".to_string(),
            disable_confirmation: false,
            disable_build_logs: false,
            detach: false,
            log_transport: None,
        }
    }
}

impl DeployArgs {
    /// Directory holding the config file, which is the project root
    pub fn project_root(&self) -> PathBuf {
        match self.config_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Log level as sent to the server
    pub fn app_log_level(&self) -> String {
        self.log_level.to_uppercase()
    }
}
