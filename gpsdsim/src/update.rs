//! Self-update check.
//!
//! Fetches the latest published release once at startup and prints a
//! banner when it is newer than the running build. Never fatal: failures
//! are logged at debug level and retried a few times.

use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::log::Logger;
use crate::{log_debug, log_raw};

/// Release feed of the project.
pub const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/gpsdsim/gpsdsim/releases/latest";

const RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LatestRelease {
    name: String,
    html_url: String,
    #[serde(default)]
    body: String,
}

/// Check the release feed and announce a newer version through the
/// logger's raw output.
pub async fn check_for_update(cancel: CancellationToken, logger: Arc<dyn Logger>, current: Version) {
    check_against(cancel, logger, current, LATEST_RELEASE_URL).await;
}

async fn check_against(
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
    current: Version,
    url: &str,
) {
    let Ok(http) = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(format!("gpsdsim/{}", crate::VERSION))
        .build()
    else {
        return;
    };

    for _ in 0..RETRIES {
        if cancel.is_cancelled() {
            return;
        }

        let release = match fetch(&http, url).await {
            Ok(release) => release,
            Err(e) => {
                log_debug!(logger, "update: error fetching latest release: {e}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        match newer_version(&release.name, &current) {
            Ok(Some(latest)) => notify_update_available(&logger, &latest, &release),
            Ok(None) => {}
            Err(e) => {
                log_debug!(logger, "update: error parsing latest release version: {e}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        }
        return;
    }
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<LatestRelease, String> {
    let response = http.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("release feed status is {status}"));
    }
    response.json().await.map_err(|e| e.to_string())
}

/// Parse a release name like `v1.2.3` and return it when newer than the
/// running version.
fn newer_version(name: &str, current: &Version) -> Result<Option<Version>, semver::Error> {
    let latest = Version::parse(name.trim().trim_start_matches('v'))?;
    Ok((latest > *current).then_some(latest))
}

fn notify_update_available(logger: &Arc<dyn Logger>, latest: &Version, release: &LatestRelease) {
    let rule = "#".repeat(120);
    log_raw!(logger, "");
    log_raw!(logger, "{rule}");
    log_raw!(logger, "New version available: v{latest}");
    log_raw!(logger, "Release notes: {}", release.body);
    log_raw!(logger, "Download link: {}", release.html_url);
    log_raw!(logger, "{rule}");
    log_raw!(logger, "");
}
