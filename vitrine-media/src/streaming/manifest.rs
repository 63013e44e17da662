//! HLS master playlist parsing and fetching.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;
use vitrine_config::StreamingConfig;

use crate::error::{MediaError, Result};

pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// One rendition advertised by the master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamQualityLevel {
    /// Vertical resolution, when the playlist declares one.
    pub height: Option<u32>,
    pub width: Option<u32>,
    /// Peak bits per second.
    pub bandwidth: u64,
    pub uri: String,
}

impl StreamQualityLevel {
    pub fn label(&self) -> String {
        match self.height {
            Some(height) => format!("{height}p"),
            None => format!("{}kbps", self.bandwidth / 1000),
        }
    }
}

/// Parse a master playlist into quality levels, lowest first. Relative
/// variant URIs are resolved against `base`.
pub fn parse_master_playlist(content: &str, base: &Url) -> Result<Vec<StreamQualityLevel>> {
    if !content.trim_start().starts_with("#EXTM3U") {
        return Err(MediaError::InvalidManifest("missing #EXTM3U header".into()));
    }

    let mut levels = Vec::new();
    let mut lines = content.lines().map(str::trim).filter(|line| !line.is_empty());

    while let Some(line) = lines.next() {
        let Some(info) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };

        let mut bandwidth = 0;
        let mut resolution = None;
        for (key, value) in attributes(info) {
            match key {
                "BANDWIDTH" => bandwidth = value.parse().unwrap_or(0),
                "RESOLUTION" => {
                    resolution = value.split_once('x').and_then(|(w, h)| {
                        Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?))
                    });
                }
                _ => {}
            }
        }

        // The variant URI is the next non-tag line.
        let Some(path) = lines.by_ref().find(|line| !line.starts_with('#')) else {
            break;
        };
        let uri = base.join(path)?.to_string();

        levels.push(StreamQualityLevel {
            height: resolution.map(|(_, h)| h),
            width: resolution.map(|(w, _)| w),
            bandwidth,
            uri,
        });
    }

    if levels.is_empty() {
        return Err(MediaError::InvalidManifest(
            "no variants found in master playlist".into(),
        ));
    }

    levels.sort_by_key(|level| (level.height.unwrap_or(0), level.bandwidth));
    Ok(levels)
}

/// Split an attribute list on commas that are not inside quotes.
fn attributes(info: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, ch) in info.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&info[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&info[start..]);

    parts.into_iter().filter_map(|attr| {
        let (key, value) = attr.split_once('=')?;
        Some((key.trim(), value.trim().trim_matches('"')))
    })
}

/// Fetch and parse a master playlist.
pub async fn fetch_manifest_levels(client: &Client, url: &Url) -> Result<Vec<StreamQualityLevel>> {
    log::info!("Fetching master playlist: {url}");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| MediaError::ManifestFetch(format!("{url}: {err}")))?;

    if !response.status().is_success() {
        return Err(MediaError::ManifestFetch(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }

    let content = response.text().await?;
    parse_master_playlist(&content, url)
}

/// Fetch with the bounded retry budget from `config`. Malformed playlists
/// are not retried.
pub async fn fetch_manifest_levels_with_retry(
    client: &Client,
    url: &Url,
    config: &StreamingConfig,
) -> Result<Vec<StreamQualityLevel>> {
    let mut attempt = 0;
    loop {
        match fetch_manifest_levels(client, url).await {
            Ok(levels) => return Ok(levels),
            Err(err @ MediaError::InvalidManifest(_)) => return Err(err),
            Err(err) if attempt < config.manifest_retries => {
                attempt += 1;
                log::warn!(
                    "Master playlist fetch failed, retrying ({}/{}): {}",
                    attempt,
                    config.manifest_retries,
                    err
                );
                tokio::time::sleep(config.retry_backoff()).await;
            }
            Err(err) => return Err(err),
        }
    }
}
