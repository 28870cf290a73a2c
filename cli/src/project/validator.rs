//! Checks run on a project config before any deployment work starts

use std::path::Path;

use crate::errors::CliError;
use crate::project::config::ProjectConfig;

const UNSUPPORTED_PROVIDERS: [&str; 1] = ["coreweave"];

/// Validate `config` against the project rooted at `root`.
///
/// Also fills in `gpu_count = 1` for GPU compute without an explicit count.
pub fn validate(config: &mut ProjectConfig, root: &Path) -> Result<(), CliError> {
    if config.deployment.name.trim().is_empty() {
        return Err(CliError::Configuration(
            "`deployment.name` is required in the config file".into(),
        ));
    }

    if let Some(provider) = config.hardware.provider.as_deref() {
        if UNSUPPORTED_PROVIDERS.contains(&provider.to_lowercase().as_str()) {
            return Err(CliError::Configuration(format!(
                "provider '{provider}' is no longer supported; switch the app to aws"
            )));
        }
    }

    let custom = config.runtime.custom.as_ref();
    if let Some(custom) = custom.filter(|c| c.has_dockerfile()) {
        if !root.join(&custom.dockerfile_path).exists() {
            return Err(CliError::Configuration(format!(
                "dockerfile not found at path: {}",
                custom.dockerfile_path
            )));
        }
    }

    let has_dockerfile = custom.is_some_and(|c| c.has_dockerfile());
    let has_entrypoint = custom.is_some_and(|c| c.has_custom_entrypoint());
    let is_partner = config.partner().is_some();
    if !has_dockerfile && !has_entrypoint && !is_partner && !root.join("main.py").exists() {
        return Err(CliError::Configuration(
            "main.py not found. Add a main.py, or configure a custom runtime with a dockerfile or entrypoint".into(),
        ));
    }

    if config.hardware.uses_gpu() && config.hardware.gpu_count.is_none() {
        config.hardware.gpu_count = Some(1);
    }

    Ok(())
}
