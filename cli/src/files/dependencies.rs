//! Synthetic package manifests and build scripts injected into the archive

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::CliError;
use crate::project::config::{PackageMap, ProjectConfig};

pub const PIP_FILE: &str = "requirements.txt";
pub const CONDA_FILE: &str = "conda_pkglist.txt";
pub const APT_FILE: &str = "pkglist.txt";
pub const SHELL_COMMANDS_FILE: &str = "shell_commands.sh";
pub const PRE_BUILD_COMMANDS_FILE: &str = "pre_build_commands.sh";

/// Generated files keyed by archive entry name
pub type DependencyFiles = BTreeMap<String, String>;

/// Build every synthetic file the remote builder expects.
///
/// Dependency file paths are resolved against `root`.
pub fn generate_dependency_files(
    config: &ProjectConfig,
    root: &Path,
) -> Result<DependencyFiles, CliError> {
    let deps = &config.dependencies;
    let mut files = DependencyFiles::new();

    add_package_file(&mut files, PIP_FILE, &deps.pip, deps.paths.pip.as_deref(), root)?;
    add_package_file(&mut files, CONDA_FILE, &deps.conda, deps.paths.conda.as_deref(), root)?;
    add_package_file(&mut files, APT_FILE, &deps.apt, deps.paths.apt.as_deref(), root)?;

    if !config.deployment.shell_commands.is_empty() {
        files.insert(
            SHELL_COMMANDS_FILE.to_string(),
            render_script(&config.deployment.shell_commands),
        );
    }
    if !config.deployment.pre_build_commands.is_empty() {
        files.insert(
            PRE_BUILD_COMMANDS_FILE.to_string(),
            render_script(&config.deployment.pre_build_commands),
        );
    }

    Ok(files)
}

fn add_package_file(
    files: &mut DependencyFiles,
    name: &str,
    packages: &PackageMap,
    path: Option<&str>,
    root: &Path,
) -> Result<(), CliError> {
    let path = path.filter(|p| !p.is_empty());
    match path {
        Some(_) if !packages.is_empty() => Err(CliError::Configuration(format!(
            "both a file path and inline packages are configured for {name}; specify only one"
        ))),
        Some(path) => {
            let full = root.join(path);
            if !full.is_file() {
                return Err(CliError::Configuration(format!(
                    "the dependency file '{path}' was not found"
                )));
            }
            let contents = std::fs::read_to_string(&full).map_err(|e| {
                CliError::Configuration(format!("failed to read dependency file '{path}': {e}"))
            })?;
            files.insert(name.to_string(), contents);
            Ok(())
        }
        None if !packages.is_empty() => {
            files.insert(name.to_string(), render_packages(packages));
            Ok(())
        }
        None => Ok(()),
    }
}

/// One requirement per line, sorted by package name
pub fn render_packages(packages: &PackageMap) -> String {
    let lines: Vec<String> = packages
        .iter()
        .map(|(name, version)| {
            let version = version.trim();
            if version.is_empty() || version == "*" || version == "latest" {
                name.clone()
            } else if version.starts_with(['=', '>', '<', '!']) {
                format!("{name}{version}")
            } else {
                format!("{name}=={version}")
            }
        })
        .collect();
    lines.join("\n") + "\n"
}

/// A bash script that stops on the first failing command
pub fn render_script(commands: &[String]) -> String {
    let mut lines = vec!["#!/bin/bash".to_string(), "set -e".to_string(), String::new()];
    lines.extend(commands.iter().cloned());
    lines.join("\n") + "\n"
}
