//! Pipeline configuration
//!
//! Every field has a default, so an empty JSON object, TOML table, or YAML
//! mapping is a valid configuration.

use crate::error::{Error, Result};
use crate::stabilizer::AgreementRule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Label vocabulary used when none is configured
pub const DEFAULT_LABELS: [&str; 12] = [
    "hello", "thanks", "iloveyou", "how", "today", "cooking", "you", "weather", "what", "name",
    "fine", "your",
];

/// Configuration for a caption pipeline session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of feature vectors per classified window (N)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Number of recent top predictions kept (M)
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// How many of the most recent predictions the agreement rule looks at
    #[serde(default = "default_agreement_window")]
    pub agreement_window: usize,

    /// Maximum caption entries kept (K)
    #[serde(default = "default_caption_capacity")]
    pub caption_capacity: usize,

    /// Confidence a top prediction must strictly exceed to be confirmed
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Agreement rule applied to the recent prediction history
    #[serde(default)]
    pub agreement_rule: AgreementRule,

    /// Ordered label vocabulary; position is the classifier output index
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Expected feature vector width (None = take it from the first vector)
    #[serde(default)]
    pub feature_width: Option<usize>,

    /// Classifications allowed in flight in the async frame loop
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_window_size() -> usize {
    30
}

fn default_history_size() -> usize {
    10
}

fn default_agreement_window() -> usize {
    10
}

fn default_caption_capacity() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.7
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|s| s.to_string()).collect()
}

fn default_max_in_flight() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            history_size: default_history_size(),
            agreement_window: default_agreement_window(),
            caption_capacity: default_caption_capacity(),
            threshold: default_threshold(),
            agreement_rule: AgreementRule::default(),
            labels: default_labels(),
            feature_width: None,
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl PipelineConfig {
    /// Create config from JSON value
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a `.json`, `.toml`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config: Self = match extension.as_str() {
            "json" => serde_json::from_str(&text)?,
            "toml" => toml::from_str(&text).map_err(|e| Error::config(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&text).map_err(|e| Error::config(e.to_string()))?
            }
            other => {
                return Err(Error::config(format!(
                    "Unsupported config format '{}' for {}",
                    other,
                    path.display()
                )))
            }
        };

        config.validate()?;
        tracing::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("window_size", self.window_size),
            ("history_size", self.history_size),
            ("agreement_window", self.agreement_window),
            ("caption_capacity", self.caption_capacity),
            ("max_in_flight", self.max_in_flight),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{} must be at least 1", name)));
            }
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::config(format!(
                "Invalid threshold: {}. Must be between 0.0 and 1.0",
                self.threshold
            )));
        }

        if self.labels.is_empty() {
            return Err(Error::config("labels must not be empty"));
        }

        let mut seen = HashSet::new();
        for label in &self.labels {
            if !seen.insert(label.as_str()) {
                return Err(Error::config(format!("Duplicate label '{}'", label)));
            }
        }

        if self.feature_width == Some(0) {
            return Err(Error::config("feature_width must be at least 1"));
        }

        Ok(())
    }

    /// Number of label classes (L)
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_size, 30);
        assert_eq!(config.history_size, 10);
        assert_eq!(config.agreement_window, 10);
        assert_eq!(config.caption_capacity, 5);
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.agreement_rule, AgreementRule::OldestRecent);
        assert_eq!(config.num_labels(), 12);
        assert_eq!(config.labels[2], "iloveyou");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = serde_json::json!({
            "window_size": 8,
            "threshold": 0.5,
            "agreement_rule": "majority",
            "labels": ["a", "b", "c"]
        });
        let config = PipelineConfig::from_json(&json).unwrap();
        assert_eq!(config.window_size, 8);
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.agreement_rule, AgreementRule::Majority);
        assert_eq!(config.num_labels(), 3);
        assert_eq!(config.caption_capacity, 5);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PipelineConfig::default();
        config.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.labels = vec!["hi".into(), "hi".into()];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.labels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "window_size = 4\ncaption_capacity = 3\nlabels = [\"yes\", \"no\"]").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.window_size, 4);
        assert_eq!(config.caption_capacity, 3);
        assert_eq!(config.labels, vec!["yes", "no"]);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "threshold: 0.9\nagreement_rule: lowest_recent").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.agreement_rule, AgreementRule::LowestRecent);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
