//! Small helpers shared across the CLI

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Build metadata stamped in by `build.rs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "buildship {}", self.version)?;
        writeln!(f, "git hash:   {}", self.git_hash)?;
        write!(f, "build time: {}", self.build_time)
    }
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// `User-Agent` sent on every outbound request
pub fn user_agent() -> String {
    format!("buildship-cli/{}", env!("CARGO_PKG_VERSION"))
}

/// Backoff between retried API calls
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Delay before retry number `attempt` (0-based), capped at `max_delay`
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay = options.base_delay.as_secs_f64() * options.multiplier.powi(attempt as i32);
    Duration::from_secs_f64(delay.min(options.max_delay.as_secs_f64()))
}

pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lowercase hex for digests
pub(crate) mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        let mut out = String::with_capacity(data.len() * 2);
        for byte in data {
            out.push(HEX_CHARS[(byte >> 4) as usize] as char);
            out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        out
    }
}
