use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Immutable test template.
///
/// `distribution` and `execution` are step-sequence documents handed to the
/// sequencer; `reporting` is the View tree rendered into reports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub distribution: Value,
    #[serde(default)]
    pub execution: Value,
    #[serde(default)]
    pub reporting: Value,
    /// Nominal duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_profile_loads() {
        let yaml = r#"
name: thermal-soak
description: Long soak on every rig
duration: 3600
execution:
  steps:
    - cmd: ./soak.sh
reporting:
  sections:
    - name: Thermal
      items:
        - key: temp
"#;
        let profile = Profile::from_yaml_str(yaml).unwrap();
        assert_eq!(profile.name, "thermal-soak");
        assert_eq!(profile.duration, Some(3600));
        assert_eq!(profile.execution["steps"][0]["cmd"], "./soak.sh");
        assert!(profile.distribution.is_null());
    }

    #[test]
    fn json_profile_minimal() {
        let profile = Profile::from_json_str(r#"{"name": "smoke"}"#).unwrap();
        assert_eq!(profile, Profile::new("smoke"));
    }

    #[test]
    fn missing_name_is_error() {
        assert!(Profile::from_json_str("{}").is_err());
    }
}
