use crate::error::{HoHatchError, Result};
use futures_util::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const TEXCONV_URL: &str =
    "https://github.com/Microsoft/DirectXTex/releases/latest/download/texconv.exe";
pub const SPECIAL_K_URL: &str = "https://sk-data.special-k.info/SpecialK.exe";
pub const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/dracoboost/hohatch/releases/latest";

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// Per read, not per request: large installers stream for minutes
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client; GitHub's API rejects requests without a user agent
pub fn http_client() -> Result<reqwest::Client> {
    client_with_timeouts(CONNECT_TIMEOUT, READ_TIMEOUT)
}

fn client_with_timeouts(connect: Duration, read: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(format!("HoHatch/{}", APP_VERSION))
        .connect_timeout(connect)
        .read_timeout(read)
        .build()?)
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// Data goes to `<dest>.part` first so an interrupted download never leaves a
/// truncated executable behind.
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    log::info!("Downloading {} -> {}", url, dest.display());
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| HoHatchError::Download(format!("Failed to download {}: {}", url, e)))?;

    let total_size = response.content_length().unwrap_or(0);
    let part = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&part).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&part).await;
                return Err(HoHatchError::Download(format!("Failed to read chunk: {}", e)));
            }
        };
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, dest).await?;
    log::info!("Downloaded {} bytes (expected {})", downloaded, total_size);
    Ok(downloaded)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateInfo {
    pub current_version: String,
    pub latest_version: String,
    pub update_type: UpdateType,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// `major.minor.patch`, tolerating a leading `v` and trailing pre-release text
pub fn parse_version(version: &str) -> Result<(u64, u64, u64)> {
    let re = Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)")
        .map_err(|e| HoHatchError::Config(format!("Invalid version pattern: {}", e)))?;
    let caps = re
        .captures(version.trim())
        .ok_or_else(|| HoHatchError::Download(format!("Unrecognised version: {}", version)))?;

    let part = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|e| HoHatchError::Download(format!("Unrecognised version {}: {}", version, e)))
    };
    Ok((part(1)?, part(2)?, part(3)?))
}

/// Which component of the version an update would bump
pub fn classify_update(current: &str, latest: &str) -> Result<UpdateType> {
    let current = parse_version(current)?;
    let latest = parse_version(latest)?;

    Ok(if latest <= current {
        UpdateType::None
    } else if latest.0 > current.0 {
        UpdateType::Major
    } else if latest.1 > current.1 {
        UpdateType::Minor
    } else {
        UpdateType::Patch
    })
}

/// Compare the running version with the latest GitHub release
pub async fn check_for_updates(client: &reqwest::Client, url: &str) -> Result<UpdateInfo> {
    let release: LatestRelease = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| HoHatchError::Download(format!("Failed to check for updates: {}", e)))?
        .json()
        .await
        .map_err(|e| HoHatchError::Download(format!("Failed to parse release info: {}", e)))?;

    let latest_version = release.tag_name.trim_start_matches('v').to_string();
    let update_type = classify_update(APP_VERSION, &latest_version)?;

    Ok(UpdateInfo {
        current_version: APP_VERSION.to_string(),
        latest_version,
        update_type,
    })
}
