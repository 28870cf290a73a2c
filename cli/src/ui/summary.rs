//! Plain text deployment summary shown before confirmation

use std::fmt::Write as _;

use crate::project::config::PackageMap;
use crate::project::ProjectConfig;

fn section(out: &mut String, header: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{header}:");
    for item in items {
        let _ = writeln!(out, "  {item}");
    }
    out.push('\n');
}

fn packages(map: &PackageMap, separator: &str) -> String {
    map.iter()
        .map(|(name, version)| match version.as_str() {
            "" | "latest" => name.clone(),
            v => format!("{name}{separator}{v}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the configuration the user is about to deploy
pub fn render_summary(config: &ProjectConfig, project_id: &str) -> String {
    let mut out = String::from("\n========== DEPLOYMENT CONFIGURATION ==========\n\n");

    let hw = &config.hardware;
    let mut hardware = Vec::new();
    if let Some(compute) = &hw.compute {
        hardware.push(format!("Compute: {compute}"));
    }
    if let Some(cpu) = hw.cpu {
        hardware.push(format!("CPU: {cpu:.1}"));
    }
    if let Some(memory) = hw.memory {
        hardware.push(format!("Memory: {memory:.0} GB"));
    }
    if let (Some(gpus), true) = (hw.gpu_count, hw.uses_gpu()) {
        hardware.push(format!("GPU Count: {gpus}"));
    }
    if let Some(region) = &hw.region {
        hardware.push(format!("Region: {region}"));
    }
    if let Some(provider) = &hw.provider {
        hardware.push(format!("Provider: {provider}"));
    }
    section(&mut out, "HARDWARE PARAMETERS", &hardware);

    let d = &config.deployment;
    let custom = config.runtime.custom.as_ref();
    let runtime = match (config.partner(), custom) {
        (Some(partner), _) => partner,
        (None, Some(_)) => "custom",
        (None, None) => "cortex",
    };
    let mut deployment = vec![
        format!("Name: {}", d.name),
        format!("Project: {project_id}"),
        format!("Runtime: {runtime}"),
    ];
    if !d.python_version.is_empty() {
        deployment.push(format!("Python Version: {}", d.python_version));
    }
    if !d.docker_base_image.is_empty() {
        deployment.push(format!("Docker Image: {}", d.docker_base_image));
    }
    if let Some(c) = custom.filter(|c| c.has_dockerfile()) {
        deployment.push(format!("Dockerfile: {}", c.dockerfile_path));
    }
    if !d.include.is_empty() {
        deployment.push(format!("Include: {}", d.include.join(", ")));
    }
    if !d.exclude.is_empty() {
        deployment.push(format!("Exclude: {}", d.exclude.join(", ")));
    }
    section(&mut out, "DEPLOYMENT PARAMETERS", &deployment);

    let s = &config.scaling;
    let mut scaling = Vec::new();
    if let Some(cooldown) = s.cooldown {
        scaling.push(format!("Cooldown: {cooldown}s"));
    }
    if let Some(min) = s.min_replicas {
        scaling.push(format!("Min Replicas: {min}"));
    }
    if let Some(max) = s.max_replicas {
        scaling.push(format!("Max Replicas: {max}"));
    }
    if let Some(concurrency) = s.replica_concurrency {
        let mut line = format!("Replica Concurrency: {concurrency}");
        if hw.uses_gpu() && concurrency > 1 {
            line.push_str(" (multiple concurrent requests on GPU)");
        }
        scaling.push(line);
    }
    section(&mut out, "SCALING PARAMETERS", &scaling);

    // a Dockerfile owns its own dependencies
    if !custom.is_some_and(|c| c.has_dockerfile()) {
        let deps = &config.dependencies;
        let mut items = Vec::new();
        if !deps.pip.is_empty() {
            items.push(format!("Pip: {}", packages(&deps.pip, "==")));
        }
        if !deps.apt.is_empty() {
            items.push(format!("Apt: {}", packages(&deps.apt, "=")));
        }
        if !deps.conda.is_empty() {
            items.push(format!("Conda: {}", packages(&deps.conda, "==")));
        }
        section(&mut out, "DEPENDENCIES", &items);
    }

    out
}
