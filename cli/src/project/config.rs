//! Project configuration model and API payload

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_CONFIG_FILE: &str = "buildship.toml";
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";
pub const DEFAULT_BASE_IMAGE: &str = "debian:bookworm-slim";
pub const DEFAULT_PROVIDER: &str = "aws";
pub const DEFAULT_EVALUATION_INTERVAL: u32 = 30;
pub const DEFAULT_LOAD_BALANCING: &str = "round-robin";
pub const DEFAULT_PORT: u16 = 8000;
pub const PARTNER_RUNTIMES: [&str; 2] = ["deepgram", "rime"];

pub fn default_include() -> Vec<String> {
    vec!["./*".into(), "main.py".into(), DEFAULT_CONFIG_FILE.into()]
}

pub fn default_exclude() -> Vec<String> {
    vec![".*".into()]
}

pub fn default_entrypoint() -> Vec<String> {
    ["uvicorn", "app.main:server", "--host", "0.0.0.0", "--port", "8000"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Contents of `buildship.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub dependencies: DependenciesConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub python_version: String,
    #[serde(default)]
    pub docker_base_image: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub shell_commands: Vec<String>,
    #[serde(default)]
    pub pre_build_commands: Vec<String>,
    pub disable_auth: Option<bool>,
    pub use_uv: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub compute: Option<String>,
    pub gpu_count: Option<u32>,
    pub provider: Option<String>,
    pub region: Option<String>,
}

impl HardwareConfig {
    pub fn uses_gpu(&self) -> bool {
        self.compute.as_deref().is_some_and(|c| c != "CPU")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
    pub cooldown: Option<u32>,
    pub replica_concurrency: Option<u32>,
    pub response_grace_period: Option<u32>,
    pub scaling_metric: Option<String>,
    pub scaling_target: Option<u32>,
    pub scaling_buffer: Option<u32>,
    pub roll_out_duration_seconds: Option<u32>,
    pub evaluation_interval: Option<u32>,
    pub load_balancing_algorithm: Option<String>,
}

/// Package names mapped to version constraints
pub type PackageMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependenciesConfig {
    #[serde(default)]
    pub pip: PackageMap,
    #[serde(default)]
    pub conda: PackageMap,
    #[serde(default)]
    pub apt: PackageMap,
    #[serde(default)]
    pub paths: DependencyPaths,
}

/// Dependency files shipped verbatim instead of inline package tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyPaths {
    pub pip: Option<String>,
    pub conda: Option<String>,
    pub apt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub custom: Option<CustomRuntimeConfig>,
    pub deepgram: Option<PartnerRuntimeConfig>,
    pub rime: Option<PartnerRuntimeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomRuntimeConfig {
    #[serde(default)]
    pub entrypoint: Vec<String>,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub healthcheck_endpoint: String,
    #[serde(default)]
    pub readycheck_endpoint: String,
    #[serde(default)]
    pub dockerfile_path: String,
}

impl CustomRuntimeConfig {
    pub fn has_dockerfile(&self) -> bool {
        !self.dockerfile_path.is_empty()
    }

    /// An entrypoint other than the default uvicorn server
    pub fn has_custom_entrypoint(&self) -> bool {
        self.entrypoint.first().is_some_and(|cmd| cmd != "uvicorn")
    }
}

/// Remote-managed runtime that needs no local archive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartnerRuntimeConfig {
    pub port: Option<u16>,
    pub model_name: Option<String>,
}

impl ProjectConfig {
    /// Name of the configured partner runtime, if any
    pub fn partner(&self) -> Option<&'static str> {
        if self.runtime.deepgram.is_some() {
            Some(PARTNER_RUNTIMES[0])
        } else if self.runtime.rime.is_some() {
            Some(PARTNER_RUNTIMES[1])
        } else {
            None
        }
    }

    fn partner_config(&self) -> Option<&PartnerRuntimeConfig> {
        self.runtime.deepgram.as_ref().or(self.runtime.rime.as_ref())
    }

    /// Fill in everything the user left out
    pub fn apply_defaults(&mut self) {
        let deployment = &mut self.deployment;
        if deployment.python_version.is_empty() {
            deployment.python_version = DEFAULT_PYTHON_VERSION.to_string();
        }
        if deployment.docker_base_image.is_empty() {
            deployment.docker_base_image = DEFAULT_BASE_IMAGE.to_string();
        }
        if deployment.include.is_empty() {
            deployment.include = default_include();
        }
        if deployment.exclude.is_empty() {
            deployment.exclude = default_exclude();
        }
        deployment.disable_auth.get_or_insert(true);

        self.hardware
            .provider
            .get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
        self.scaling
            .evaluation_interval
            .get_or_insert(DEFAULT_EVALUATION_INTERVAL);
        self.scaling
            .load_balancing_algorithm
            .get_or_insert_with(|| DEFAULT_LOAD_BALANCING.to_string());

        if let Some(custom) = self.runtime.custom.as_mut() {
            if custom.entrypoint.is_empty() {
                custom.entrypoint = default_entrypoint();
            }
            if custom.port == 0 {
                custom.port = DEFAULT_PORT;
            }
        }
    }

    /// Body of the create-app request, with camelCase keys
    pub fn to_payload(&self) -> Value {
        let d = &self.deployment;
        let mut payload = Map::new();
        payload.insert("name".into(), json!(d.name));
        payload.insert("pythonVersion".into(), json!(d.python_version));
        payload.insert("baseImage".into(), json!(d.docker_base_image));
        payload.insert("include".into(), json!(d.include));
        payload.insert("exclude".into(), json!(d.exclude));
        payload.insert("shellCommands".into(), json!(d.shell_commands));
        payload.insert("preBuildCommands".into(), json!(d.pre_build_commands));
        insert_opt(&mut payload, "disableAuth", d.disable_auth);
        insert_opt(&mut payload, "useUv", d.use_uv);

        let h = &self.hardware;
        insert_opt(&mut payload, "cpu", h.cpu);
        insert_opt(&mut payload, "memory", h.memory);
        insert_opt(&mut payload, "compute", h.compute.as_ref());
        if h.uses_gpu() {
            insert_opt(&mut payload, "gpuCount", h.gpu_count);
        }
        insert_opt(&mut payload, "provider", h.provider.as_ref());
        insert_opt(&mut payload, "region", h.region.as_ref());

        let s = &self.scaling;
        insert_opt(&mut payload, "minReplicaCount", s.min_replicas);
        insert_opt(&mut payload, "maxReplicaCount", s.max_replicas);
        insert_opt(&mut payload, "cooldownPeriodSeconds", s.cooldown);
        insert_opt(&mut payload, "replicaConcurrency", s.replica_concurrency);
        insert_opt(&mut payload, "responseGracePeriodSeconds", s.response_grace_period);
        insert_opt(&mut payload, "scalingMetric", s.scaling_metric.as_ref());
        insert_opt(&mut payload, "scalingTarget", s.scaling_target);
        insert_opt(&mut payload, "scalingBuffer", s.scaling_buffer);
        insert_opt(&mut payload, "rollOutDurationSeconds", s.roll_out_duration_seconds);
        insert_opt(&mut payload, "evaluationIntervalSeconds", s.evaluation_interval);
        insert_opt(&mut payload, "loadBalancingAlgorithm", s.load_balancing_algorithm.as_ref());

        if let Some(custom) = &self.runtime.custom {
            payload.insert("entrypoint".into(), json!(custom.entrypoint));
            payload.insert("port".into(), json!(custom.port));
            payload.insert("healthcheckEndpoint".into(), json!(custom.healthcheck_endpoint));
            payload.insert("readycheckEndpoint".into(), json!(custom.readycheck_endpoint));
            payload.insert("dockerfilePath".into(), json!(custom.dockerfile_path));
            payload.insert("runtime".into(), json!("custom"));
        }
        match (self.partner(), self.partner_config()) {
            (Some(name), Some(partner)) => {
                payload.insert("partnerService".into(), json!(name));
                payload.insert("runtime".into(), json!(name));
                if self.runtime.custom.is_none() {
                    insert_opt(&mut payload, "port", partner.port);
                }
                insert_opt(&mut payload, "modelName", partner.model_name.as_ref());
            }
            _ if self.runtime.custom.is_none() => {
                payload.insert("runtime".into(), json!("cortex"));
            }
            _ => {}
        }

        Value::Object(payload)
    }
}

fn insert_opt<T: Serialize>(payload: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        payload.insert(key.to_string(), json!(value));
    }
}
