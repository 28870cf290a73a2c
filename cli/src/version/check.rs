//! Compare the running version against the latest published release

use std::time::Duration;

use openapi_client::GithubRelease;
use tracing::debug;

use crate::errors::CliError;
use crate::filesys::file::File;
use crate::version::cache::VersionCache;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// `latest` is a strictly newer semver than `current`. A leading `v` is ignored
/// on both sides and unparsable versions never compare as newer.
pub fn is_newer(latest: &str, current: &str) -> bool {
    match (
        semver::Version::parse(latest.trim_start_matches('v')),
        semver::Version::parse(current.trim_start_matches('v')),
    ) {
        (Ok(latest), Ok(current)) => latest > current,
        _ => false,
    }
}

async fn fetch_latest(client: &reqwest::Client, release_url: &str) -> Result<String, CliError> {
    let response = client
        .get(release_url)
        .header(reqwest::header::USER_AGENT, crate::utils::user_agent())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(CliError::api_status(
            response.status().as_u16(),
            format!("release lookup returned {}", response.status()),
        ));
    }
    let release: GithubRelease = response.json().await?;
    Ok(release.tag_name)
}

/// Returns the latest release tag when it is newer than `current`.
///
/// A fresh cache avoids the network entirely. Any failure is logged and
/// treated as no update.
pub async fn check_for_update(
    client: &reqwest::Client,
    cache_file: &File,
    current: &str,
    release_url: &str,
) -> Option<String> {
    let latest = match VersionCache::load(cache_file).await {
        Some(cache) if cache.is_fresh() => cache.latest_version,
        _ => match fetch_latest(client, release_url).await {
            Ok(latest) => {
                if let Err(e) = VersionCache::new(&latest).save(cache_file).await {
                    debug!("failed to save version cache: {}", e);
                }
                latest
            }
            Err(e) => {
                debug!("version check failed: {}", e);
                return None;
            }
        },
    };
    is_newer(&latest, current).then_some(latest)
}
