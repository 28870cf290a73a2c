//! Reading `buildship.toml` from disk

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::CliError;
use crate::project::config::ProjectConfig;

#[derive(Deserialize)]
struct ConfigFile {
    buildship: Option<ProjectConfig>,
}

/// Load and default a project config file
pub fn load(path: &Path) -> Result<ProjectConfig, CliError> {
    if !path.exists() {
        return Err(CliError::Configuration(format!(
            "config file not found: {}. Run `buildship init` to create one",
            path.display()
        )));
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Configuration(format!("failed to read {}: {e}", path.display())))?;
    let config = parse(&contents).map_err(|e| match e {
        CliError::Configuration(msg) => {
            CliError::Configuration(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    debug!("loaded project config for '{}'", config.deployment.name);
    Ok(config)
}

/// Parse config text and apply defaults
pub fn parse(contents: &str) -> Result<ProjectConfig, CliError> {
    let file: ConfigFile = toml::from_str(contents)?;
    let mut config = file.buildship.ok_or_else(|| {
        CliError::Configuration("'buildship' table not found; the file must start with [buildship.deployment]".into())
    })?;
    config.apply_defaults();
    Ok(config)
}
