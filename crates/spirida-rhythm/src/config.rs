//! TOML configuration for an orchestrator and its fields.
//!
//! Resolution order (highest priority first):
//! 1. an explicit path (`--config`)
//! 2. the `SPIRIDA_CONFIG` environment variable
//! 3. compiled defaults

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spirida_core::{RECLAIM_THRESHOLD, ReclamationPolicy};

use crate::error::{Result, RhythmError};
use crate::scheduler::Rhythm;

pub const CONFIG_ENV: &str = "SPIRIDA_CONFIG";

/// Largest seed that survives a round trip through TOML.
pub const MAX_SEED: u64 = i64::MAX as u64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    /// Base reclamation threshold, before policy adjustment.
    pub threshold: f64,
    /// Seeds every field's narrative rng when set.
    pub seed: Option<u64>,
    /// Bound on `stop_maintenance`; defaults to one cycle plus a second.
    pub stop_timeout_ms: Option<u64>,
    pub rhythm: RhythmConfig,
    pub fields: Vec<FieldConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "spirida".to_string(),
            threshold: RECLAIM_THRESHOLD,
            seed: None,
            stop_timeout_ms: None,
            rhythm: RhythmConfig::default(),
            fields: vec![FieldConfig::new("garden", ReclamationPolicy::Natural)],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmConfig {
    pub inhale_secs: f64,
    pub hold_secs: f64,
    pub exhale_secs: f64,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        let rhythm = Rhythm::default();
        Self::from(rhythm)
    }
}

impl From<Rhythm> for RhythmConfig {
    fn from(rhythm: Rhythm) -> Self {
        Self {
            inhale_secs: rhythm.inhale.as_secs_f64(),
            hold_secs: rhythm.hold.as_secs_f64(),
            exhale_secs: rhythm.exhale.as_secs_f64(),
        }
    }
}

impl RhythmConfig {
    pub fn to_rhythm(&self) -> Result<Rhythm> {
        Rhythm::from_secs(self.inhale_secs, self.hold_secs, self.exhale_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub policy: ReclamationPolicy,
    /// Only meaningful for the seasonal policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_cycle_hours: Option<f64>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, policy: ReclamationPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            seasonal_cycle_hours: None,
        }
    }

    pub fn seasonal_cycle_hours(mut self, hours: f64) -> Self {
        self.seasonal_cycle_hours = Some(hours);
        self
    }
}

impl SystemConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SystemConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `explicit`, else from `$SPIRIDA_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match Self::config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn rhythm(&self) -> Result<Rhythm> {
        self.rhythm.to_rhythm()
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(invalid(format!(
                "threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        self.rhythm()?;
        // TOML integers are signed 64-bit.
        if let Some(seed) = self.seed {
            if seed > MAX_SEED {
                return Err(invalid(format!("seed must be at most {MAX_SEED}, got {seed}")));
            }
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("field name must not be empty".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field name '{}'", field.name)));
            }
            if let Some(hours) = field.seasonal_cycle_hours {
                if !hours.is_finite() || hours <= 0.0 {
                    return Err(invalid(format!(
                        "field '{}': seasonal_cycle_hours must be positive, got {hours}",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: String) -> RhythmError {
    RhythmError::InvalidParameter(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert_eq!(config.name, "spirida");
        assert_eq!(config.threshold, 0.01);
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.rhythm().unwrap(), Rhythm::default());
        assert_eq!(config.stop_timeout(), None);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_document() {
        let config = SystemConfig::from_toml_str(
            r#"
            name = "grove"
            threshold = 0.05
            seed = 7
            stop_timeout_ms = 250

            [rhythm]
            inhale_secs = 0.2
            hold_secs = 0.1
            exhale_secs = 0.2

            [[fields]]
            name = "memory"
            policy = "resonant"

            [[fields]]
            name = "seasons"
            policy = "seasonal"
            seasonal_cycle_hours = 6.0
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "grove");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.stop_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.rhythm().unwrap().cycle_duration(), Duration::from_millis(500));
        assert_eq!(config.fields[0].policy, ReclamationPolicy::Resonant);
        assert_eq!(config.fields[1].seasonal_cycle_hours, Some(6.0));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = SystemConfig::from_toml_str("name = \"solo\"\n").unwrap();
        assert_eq!(config.name, "solo");
        assert_eq!(config.threshold, RECLAIM_THRESHOLD);
        assert_eq!(config.fields, SystemConfig::default().fields);
    }

    #[test]
    fn test_field_policy_defaults_to_natural() {
        let config = SystemConfig::from_toml_str("[[fields]]\nname = \"plain\"\n").unwrap();
        assert_eq!(config.fields.len(), 1);
        assert_eq!(config.fields[0].policy, ReclamationPolicy::Natural);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let err = SystemConfig::from_toml_str("[[fields]]\nname = \"x\"\npolicy = \"tidal\"\n")
            .unwrap_err();
        assert!(matches!(err, RhythmError::Config(_)), "{err}");
    }

    #[test]
    fn test_rejects_seed_beyond_toml_range() {
        let mut config = SystemConfig {
            seed: Some(u64::MAX),
            ..SystemConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("seed must be at most"), "{err}");

        config.seed = Some(MAX_SEED);
        config.validate().unwrap();
        assert!(config.to_toml_string().unwrap().contains(&format!("seed = {MAX_SEED}")));
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let err = SystemConfig::from_toml_str(
            "[[fields]]\nname = \"a\"\n\n[[fields]]\nname = \"a\"\npolicy = \"lunar\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate field name 'a'"));
    }

    #[test]
    fn test_rejects_negative_rhythm() {
        let err = SystemConfig::from_toml_str("[rhythm]\nhold_secs = -1.0\n").unwrap_err();
        assert!(matches!(err, RhythmError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_bad_seasonal_cycle() {
        let err = SystemConfig::from_toml_str(
            "[[fields]]\nname = \"s\"\npolicy = \"seasonal\"\nseasonal_cycle_hours = 0.0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("seasonal_cycle_hours"));
    }

    #[test]
    fn test_toml_output_reparses() {
        let mut config = SystemConfig::default();
        config.seed = Some(42);
        config
            .fields
            .push(FieldConfig::new("tides", ReclamationPolicy::Seasonal).seasonal_cycle_hours(12.0));
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[[fields]]"));
        assert_eq!(SystemConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-disk\"\nthreshold = 0.2").unwrap();
        let config = SystemConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "from-disk");
        assert_eq!(config.threshold, 0.2);
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spirida.toml");
        std::fs::write(&path, "name = \"explicit\"\n").unwrap();
        let config = SystemConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.name, "explicit");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, RhythmError::Io(_)));
    }
}
