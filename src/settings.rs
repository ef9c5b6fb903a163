use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GraderError, Result};

/// Penalty added for each kind of mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Penalties {
    pub type_mismatch: f64,
    pub token_count_mismatch: f64,
    pub numeric_mismatch: f64,
    pub character_mismatch: f64,
    pub run_failure: f64,
    pub compile_failure: f64,
    pub timeout: f64,
    pub missing_string: f64,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            type_mismatch: 20.0,
            token_count_mismatch: 50.0,
            numeric_mismatch: 10.0,
            character_mismatch: 50.0,
            run_failure: 100.0,
            compile_failure: 1000.0,
            timeout: 100.0,
            missing_string: 100.0,
        }
    }
}

impl Penalties {
    fn named(&self) -> [(&'static str, f64); 8] {
        [
            ("type_mismatch", self.type_mismatch),
            ("token_count_mismatch", self.token_count_mismatch),
            ("numeric_mismatch", self.numeric_mismatch),
            ("character_mismatch", self.character_mismatch),
            ("run_failure", self.run_failure),
            ("compile_failure", self.compile_failure),
            ("timeout", self.timeout),
            ("missing_string", self.missing_string),
        ]
    }
}

/// Grading configuration. Deserializes from a flat object; keys it does not
/// know are kept aside and reported, never rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub penalties: Penalties,
    /// Decay rate of the penalty to grade conversion
    pub penalty_weight: f64,
    pub pass_threshold: f64,
    pub collapse_whitespace: bool,
    pub ignore_nonnumeric_tokens: bool,
    /// Treat integer vs float as a type mismatch
    pub enforce_floating_point: bool,
    pub connect_adjacent_words: bool,
    #[serde(flatten)]
    unrecognized: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            penalties: Penalties::default(),
            penalty_weight: 0.1,
            pass_threshold: 95.0,
            collapse_whitespace: true,
            ignore_nonnumeric_tokens: false,
            enforce_floating_point: false,
            connect_adjacent_words: false,
            unrecognized: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Builds settings from a JSON object, logging every key that was not
    /// recognized.
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        let settings: Settings = serde_json::from_value(value)?;
        for key in settings.unrecognized_keys() {
            tracing::warn!("Configuration setting {key} was not recognized");
        }
        Ok(settings)
    }

    pub fn unrecognized_keys(&self) -> Vec<&str> {
        self.unrecognized.keys().map(String::as_str).collect()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.penalties.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(GraderError::invalid_setting(
                    name,
                    format!("penalty must be a non-negative number, got {value}"),
                ));
            }
        }

        if !self.penalty_weight.is_finite() || self.penalty_weight < 0.0 {
            return Err(GraderError::invalid_setting(
                "penalty_weight",
                format!("must be a non-negative number, got {}", self.penalty_weight),
            ));
        }

        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(GraderError::invalid_setting(
                "pass_threshold",
                format!("must be within 0..=100, got {}", self.pass_threshold),
            ));
        }

        Ok(())
    }

    pub fn with_penalties(mut self, penalties: Penalties) -> Self {
        self.penalties = penalties;
        self
    }

    pub fn with_penalty_weight(mut self, penalty_weight: f64) -> Self {
        self.penalty_weight = penalty_weight;
        self
    }

    pub fn with_pass_threshold(mut self, pass_threshold: f64) -> Self {
        self.pass_threshold = pass_threshold;
        self
    }

    pub fn with_collapse_whitespace(mut self, collapse_whitespace: bool) -> Self {
        self.collapse_whitespace = collapse_whitespace;
        self
    }

    pub fn with_ignore_nonnumeric_tokens(mut self, ignore: bool) -> Self {
        self.ignore_nonnumeric_tokens = ignore;
        self
    }

    pub fn with_enforce_floating_point(mut self, enforce: bool) -> Self {
        self.enforce_floating_point = enforce;
        self
    }

    pub fn with_connect_adjacent_words(mut self, connect: bool) -> Self {
        self.connect_adjacent_words = connect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.penalties.type_mismatch, 20.0);
        assert_eq!(s.penalties.compile_failure, 1000.0);
        assert_eq!(s.penalty_weight, 0.1);
        assert_eq!(s.pass_threshold, 95.0);
        assert!(s.collapse_whitespace);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn flat_keys_and_unknown_keys() {
        let s = Settings::from_json(json!({
            "numeric_mismatch": 4,
            "pass_threshold": 80,
            "connect_adjacent_words": true,
            "language": "java"
        }))
        .unwrap();

        assert_eq!(s.penalties.numeric_mismatch, 4.0);
        assert_eq!(s.penalties.type_mismatch, 20.0);
        assert_eq!(s.pass_threshold, 80.0);
        assert!(s.connect_adjacent_words);
        assert_eq!(s.unrecognized_keys(), vec!["language"]);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let s = Settings::default().with_pass_threshold(120.0);
        assert!(matches!(
            s.validate(),
            Err(GraderError::InvalidSetting { ref name, .. }) if name == "pass_threshold"
        ));

        let mut penalties = Penalties::default();
        penalties.timeout = -1.0;
        assert!(Settings::default()
            .with_penalties(penalties)
            .validate()
            .is_err());
    }
}
