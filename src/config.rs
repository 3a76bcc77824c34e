//! Engine configuration
//!
//! The expirations table is the only persistent setting that changes
//! behaviour; the rest is diagnostics and units.

use crate::error::{CueError, Result};
use crate::expiration::ExpirationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for a cue engine.
///
/// ```json
/// { "name": "drums", "verbose": true, "expirations": { "midi": 5, "ui": 50 } }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// Instance name used in diagnostics.
    pub name: String,
    pub verbose: bool,
    /// Grace period in ticks per class tag. Absent classes never expire.
    pub expirations: BTreeMap<String, f64>,
    /// Scrub notifications report `delta / scrub_unit_ticks`.
    pub scrub_unit_ticks: f64,
    pub ticks_per_beat: f64,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            verbose: false,
            expirations: BTreeMap::new(),
            scrub_unit_ticks: 1.0,
            ticks_per_beat: 480.0,
        }
    }
}

impl CueConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: CueConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scrub_unit_ticks.is_finite() && self.scrub_unit_ticks > 0.0) {
            return Err(CueError::Config(format!(
                "scrub_unit_ticks must be positive, got {}",
                self.scrub_unit_ticks
            )));
        }
        if !(self.ticks_per_beat.is_finite() && self.ticks_per_beat > 0.0) {
            return Err(CueError::Config(format!(
                "ticks_per_beat must be positive, got {}",
                self.ticks_per_beat
            )));
        }
        self.expiration_policy().map(|_| ())
    }

    pub fn expiration_policy(&self) -> Result<ExpirationPolicy> {
        ExpirationPolicy::from_pairs(self.expirations.iter().map(|(k, v)| (k.clone(), *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CueConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CueConfig::default());
        assert_eq!(config.name, "unnamed");
        assert!(config.expiration_policy().unwrap().is_empty());
    }

    #[test]
    fn test_parse_expirations() {
        let config =
            CueConfig::from_json_str(r#"{"name": "drums", "expirations": {"midi": 5, "ui": 50}}"#)
                .unwrap();
        let policy = config.expiration_policy().unwrap();
        assert_eq!(policy.grace_for("midi"), Some(5.0));
        assert_eq!(policy.grace_for("ui"), Some(50.0));
        assert_eq!(policy.grace_for("done"), None);
    }

    #[test]
    fn test_rejects_negative_grace() {
        assert!(matches!(
            CueConfig::from_json_str(r#"{"expirations": {"midi": -5}}"#),
            Err(CueError::InvalidExpiration { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_units() {
        assert!(matches!(
            CueConfig::from_json_str(r#"{"scrub_unit_ticks": 0}"#),
            Err(CueError::Config(_))
        ));
        assert!(matches!(
            CueConfig::from_json_str(r#"{"name": 3}"#),
            Err(CueError::ConfigParse(_))
        ));
    }
}
