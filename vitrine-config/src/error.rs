use thiserror::Error;

/// Guard-rail violations found by [`crate::MediaRuntimeConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("streaming.quality_tiers must contain at least one tier")]
    NoQualityTiers,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
