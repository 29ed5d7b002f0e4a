//! Term parsing configuration

use serde::{Deserialize, Serialize};

use crate::error::TermError;
use crate::formula::{is_valid_prior_scale, DEFAULT_PRIOR_SCALE};

/// Name given to the single implicit group of ungrouped terms
pub const DEFAULT_SYNTHETIC_GROUP: &str = "all";

/// Serialized form of a configuration, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ParseConfigSpec {
    synthetic_group: String,
    default_prior_scale: f64,
}

impl Default for ParseConfigSpec {
    fn default() -> Self {
        Self {
            synthetic_group: DEFAULT_SYNTHETIC_GROUP.to_string(),
            default_prior_scale: DEFAULT_PRIOR_SCALE,
        }
    }
}

/// Settings that apply to every term parsed in one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParseConfigSpec", into = "ParseConfigSpec")]
pub struct ParseConfig {
    synthetic_group: String,
    default_prior_scale: f64,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            synthetic_group: DEFAULT_SYNTHETIC_GROUP.to_string(),
            default_prior_scale: DEFAULT_PRIOR_SCALE,
        }
    }
}

impl ParseConfig {
    /// Group name used for terms without a group column
    pub fn synthetic_group(&self) -> &str {
        &self.synthetic_group
    }

    /// Prior scale for terms that do not set `prior_scale`
    pub fn default_prior_scale(&self) -> f64 {
        self.default_prior_scale
    }

    pub fn with_synthetic_group(mut self, name: impl Into<String>) -> Self {
        self.synthetic_group = name.into();
        self
    }

    /// Replace the default prior scale, which must be finite and positive
    pub fn with_default_prior_scale(mut self, scale: f64) -> Result<Self, TermError> {
        self.default_prior_scale = check_prior_scale(scale)?;
        Ok(self)
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, TermError> {
        let spec: ParseConfigSpec = serde_json::from_str(json)?;
        Self::try_from(spec)
    }
}

fn check_prior_scale(scale: f64) -> Result<f64, TermError> {
    if is_valid_prior_scale(scale) {
        Ok(scale)
    } else {
        Err(TermError::InvalidConfig(format!(
            "default_prior_scale must be positive, got {}",
            scale
        )))
    }
}

impl TryFrom<ParseConfigSpec> for ParseConfig {
    type Error = TermError;

    fn try_from(spec: ParseConfigSpec) -> Result<Self, Self::Error> {
        Ok(Self {
            synthetic_group: spec.synthetic_group,
            default_prior_scale: check_prior_scale(spec.default_prior_scale)?,
        })
    }
}

impl From<ParseConfig> for ParseConfigSpec {
    fn from(config: ParseConfig) -> Self {
        Self {
            synthetic_group: config.synthetic_group,
            default_prior_scale: config.default_prior_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ParseConfig::default();
        assert_eq!(config.synthetic_group(), "all");
        assert_eq!(config.default_prior_scale(), 0.2);
        assert_eq!(ParseConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn test_partial_json() {
        let config = ParseConfig::from_json(r#"{ "default_prior_scale": 0.5 }"#).unwrap();
        assert_eq!(config.synthetic_group(), DEFAULT_SYNTHETIC_GROUP);
        assert_eq!(config.default_prior_scale(), 0.5);
    }

    #[test]
    fn test_rejects_non_positive_prior_scale() {
        let err = ParseConfig::from_json(r#"{"default_prior_scale": -1}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: default_prior_scale must be positive, got -1"
        );
        assert!(ParseConfig::from_json(r#"{"default_prior_scale": 0}"#).is_err());

        let deserialized: Result<ParseConfig, _> =
            serde_json::from_str(r#"{"default_prior_scale": -1}"#);
        assert!(deserialized.is_err());
    }

    #[test]
    fn test_builder_checks_prior_scale() {
        assert!(ParseConfig::default().with_default_prior_scale(0.0).is_err());
        assert!(ParseConfig::default().with_default_prior_scale(f64::NAN).is_err());
        assert!(ParseConfig::default().with_default_prior_scale(f64::INFINITY).is_err());

        let config = ParseConfig::default()
            .with_synthetic_group("pooled")
            .with_default_prior_scale(0.05)
            .unwrap();
        assert_eq!(config.default_prior_scale(), 0.05);
        assert_eq!(config.synthetic_group(), "pooled");
    }

    #[test]
    fn test_serializes_plain_fields() {
        let config = ParseConfig::default().with_synthetic_group("pooled");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "synthetic_group": "pooled", "default_prior_scale": 0.2 })
        );
    }
}
