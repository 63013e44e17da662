pub mod resume;
pub mod streaming;
pub mod watchdog;
pub mod waveform;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;
use resume::ResumeConfig;
use streaming::StreamingConfig;
use watchdog::WatchdogConfig;
use waveform::WaveformConfig;

/// Environment variable naming a TOML or JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "VITRINE_MEDIA_CONFIG_PATH";
/// Environment variable carrying inline JSON configuration.
pub const CONFIG_JSON_ENV: &str = "VITRINE_MEDIA_CONFIG_JSON";

/// Source that produced the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Top-level runtime settings. Each section is optional in the source file;
/// anything left out keeps its compiled default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaRuntimeConfig {
    /// Waveform player: peak descriptor host, bin count, progress throttle,
    /// lazy-init pre-roll margin and starting volume.
    pub waveform: WaveformConfig,
    /// Adaptive video: bandwidth tiers used to cap renditions and the
    /// bounded retry budget for manifest/segment loads and fatal recoveries.
    pub streaming: StreamingConfig,
    /// Stall watchdog cadence and escalation rate limit. These are tuned
    /// empirically; treat them as knobs, not as a contract.
    pub watchdog: WatchdogConfig,
    /// Hidden-tab resume retry cadence for ambient video.
    pub resume: ResumeConfig,
}

impl MediaRuntimeConfig {
    /// Load configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$VITRINE_MEDIA_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$VITRINE_MEDIA_CONFIG_JSON` (inline JSON),
    /// 3) the first default file candidate that exists,
    /// 4) defaults if none of the above is present.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var(CONFIG_PATH_ENV)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            tracing::info!(path = %path.display(), "media config loaded from env path");
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var(CONFIG_JSON_ENV)
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_ENV}"))?;
            parsed.validate()?;
            tracing::info!("media config loaded from inline json");
            return Ok((parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            tracing::info!(path = %path.display(), "media config loaded from default file");
            return Ok((config, ConfigSource::File(path)));
        }

        tracing::debug!("no media config found, using defaults");
        Ok((Self::default(), ConfigSource::Default))
    }

    /// Read, parse and validate a configuration file. The extension picks the
    /// format; unknown extensions try TOML first, then JSON.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read media config from {}", path.display())
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid media config {}", path.display())
            })?,
            Some("toml") | Some("tml") => {
                toml::from_str(&contents).map_err(|err| {
                    anyhow!("invalid media config {}: {}", path.display(), err)
                })?
            }
            _ => Self::parse_from_str(&contents, &path.display().to_string())?,
        };

        config.validate().with_context(|| {
            format!("media config {} failed validation", path.display())
        })?;
        Ok(config)
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        // Try TOML first, then JSON for convenience.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse media config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid media config json: {err}"))
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.waveform.validate()?;
        self.streaming.validate()?;
        self.watchdog.validate()?;
        self.resume.validate()?;
        Ok(())
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "vitrine-media.toml",
            "vitrine-media.json",
            "config/vitrine-media.toml",
            "config/vitrine-media.json",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }
}
