//! Reclamation policies and their cycle phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::LUNAR_CYCLE_HOURS;
use crate::error::CoreError;
use crate::time::cycle_phase;

/// How a field decides which faded pulses to release.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReclamationPolicy {
    /// Remove everything below the threshold.
    #[default]
    Natural,
    /// Threshold doubles in the last quarter of each seasonal cycle and
    /// halves otherwise.
    Seasonal,
    /// Faded pulses survive while they resonate with a living one.
    Resonant,
    /// 28-day cycle; threshold ×1.5 around new and full moon, ×0.3 otherwise.
    Lunar,
}

impl ReclamationPolicy {
    pub const ALL: [ReclamationPolicy; 4] = [
        ReclamationPolicy::Natural,
        ReclamationPolicy::Seasonal,
        ReclamationPolicy::Resonant,
        ReclamationPolicy::Lunar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReclamationPolicy::Natural => "natural",
            ReclamationPolicy::Seasonal => "seasonal",
            ReclamationPolicy::Resonant => "resonant",
            ReclamationPolicy::Lunar => "lunar",
        }
    }
}

impl fmt::Display for ReclamationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReclamationPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "natural" => Ok(ReclamationPolicy::Natural),
            "seasonal" => Ok(ReclamationPolicy::Seasonal),
            "resonant" => Ok(ReclamationPolicy::Resonant),
            "lunar" => Ok(ReclamationPolicy::Lunar),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown reclamation policy '{other}' (expected natural, seasonal, resonant or lunar)"
            ))),
        }
    }
}

/// Seasonal threshold: ×2 for `phase ∈ [0.75, 1.0)`, ×0.5 otherwise.
pub fn seasonal_threshold(phase: f64, threshold: f64) -> f64 {
    if (0.75..1.0).contains(&phase) {
        threshold * 2.0
    } else {
        threshold * 0.5
    }
}

/// Lunar threshold: ×1.5 near new or full moon, ×0.3 otherwise.
pub fn lunar_threshold(phase: f64, threshold: f64) -> f64 {
    let near_full = (0.45..=0.55).contains(&phase);
    let near_new = (0.95..=1.0).contains(&phase) || (0.0..=0.05).contains(&phase);
    if near_full || near_new {
        threshold * 1.5
    } else {
        threshold * 0.3
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_phase(phase: f64) -> Self {
        if phase < 0.25 {
            Season::Spring
        } else if phase < 0.5 {
            Season::Summer
        } else if phase < 0.75 {
            Season::Autumn
        } else {
            Season::Winter
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MoonPhase {
    #[serde(rename = "New Moon")]
    New,
    #[serde(rename = "Waxing Moon")]
    Waxing,
    #[serde(rename = "Full Moon")]
    Full,
    #[serde(rename = "Waning Moon")]
    Waning,
}

impl MoonPhase {
    pub fn from_phase(phase: f64) -> Self {
        if phase < 0.125 {
            MoonPhase::New
        } else if phase < 0.375 {
            MoonPhase::Waxing
        } else if phase < 0.625 {
            MoonPhase::Full
        } else {
            MoonPhase::Waning
        }
    }
}

/// Where a field sits in its policy's cycle. Observability only.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PhaseStatus {
    Natural,
    Seasonal {
        phase: f64,
        season: Season,
        cycle_hours: f64,
    },
    Resonant,
    Lunar {
        phase: f64,
        moon: MoonPhase,
        cycle_hours: f64,
    },
}

impl PhaseStatus {
    pub fn compute(
        policy: ReclamationPolicy,
        birth: f64,
        now: f64,
        seasonal_cycle_hours: f64,
    ) -> Self {
        match policy {
            ReclamationPolicy::Natural => PhaseStatus::Natural,
            ReclamationPolicy::Resonant => PhaseStatus::Resonant,
            ReclamationPolicy::Seasonal => {
                let phase = cycle_phase(birth, now, seasonal_cycle_hours);
                PhaseStatus::Seasonal {
                    phase,
                    season: Season::from_phase(phase),
                    cycle_hours: seasonal_cycle_hours,
                }
            }
            ReclamationPolicy::Lunar => {
                let phase = cycle_phase(birth, now, LUNAR_CYCLE_HOURS);
                PhaseStatus::Lunar {
                    phase,
                    moon: MoonPhase::from_phase(phase),
                    cycle_hours: LUNAR_CYCLE_HOURS,
                }
            }
        }
    }

    pub fn phase(&self) -> Option<f64> {
        match self {
            PhaseStatus::Seasonal { phase, .. } | PhaseStatus::Lunar { phase, .. } => Some(*phase),
            PhaseStatus::Natural | PhaseStatus::Resonant => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SECS_PER_HOUR;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_policy_names() {
        for policy in ReclamationPolicy::ALL {
            assert_eq!(policy.as_str().parse::<ReclamationPolicy>().unwrap(), policy);
        }
        assert_eq!(" Lunar ".parse::<ReclamationPolicy>().unwrap(), ReclamationPolicy::Lunar);
    }

    #[test]
    fn test_parse_unknown_policy() {
        let err = "tidal".parse::<ReclamationPolicy>().unwrap_err();
        assert!(err.to_string().contains("tidal"));
    }

    #[test]
    fn test_seasonal_boundaries() {
        assert_relative_eq!(seasonal_threshold(0.8, 0.01), 0.02, epsilon = 1e-12);
        assert_relative_eq!(seasonal_threshold(0.75, 0.01), 0.02, epsilon = 1e-12);
        assert_relative_eq!(seasonal_threshold(0.5, 0.01), 0.005, epsilon = 1e-12);
        assert_relative_eq!(seasonal_threshold(0.7499, 0.01), 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_lunar_windows() {
        assert_relative_eq!(lunar_threshold(0.5, 0.01), 0.015, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.45, 0.01), 0.015, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.55, 0.01), 0.015, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.0, 0.01), 0.015, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.97, 0.01), 0.015, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.2, 0.01), 0.003, epsilon = 1e-12);
        assert_relative_eq!(lunar_threshold(0.56, 0.01), 0.003, epsilon = 1e-12);
    }

    #[test]
    fn test_season_names() {
        assert_eq!(Season::from_phase(0.1), Season::Spring);
        assert_eq!(Season::from_phase(0.3), Season::Summer);
        assert_eq!(Season::from_phase(0.6), Season::Autumn);
        assert_eq!(Season::from_phase(0.8), Season::Winter);
    }

    #[test]
    fn test_moon_names() {
        assert_eq!(MoonPhase::from_phase(0.05), MoonPhase::New);
        assert_eq!(MoonPhase::from_phase(0.2), MoonPhase::Waxing);
        assert_eq!(MoonPhase::from_phase(0.5), MoonPhase::Full);
        assert_eq!(MoonPhase::from_phase(0.9), MoonPhase::Waning);
    }

    #[test]
    fn test_phase_status_seasonal() {
        let status = PhaseStatus::compute(ReclamationPolicy::Seasonal, 0.0, 18.0 * SECS_PER_HOUR, 24.0);
        assert_relative_eq!(status.phase().unwrap(), 0.75);
        assert!(matches!(status, PhaseStatus::Seasonal { season: Season::Winter, .. }));
    }

    #[test]
    fn test_phase_status_plain_policies_have_no_phase() {
        assert_eq!(PhaseStatus::compute(ReclamationPolicy::Natural, 0.0, 1e6, 24.0).phase(), None);
        assert_eq!(PhaseStatus::compute(ReclamationPolicy::Resonant, 0.0, 1e6, 24.0).phase(), None);
    }

    #[test]
    fn test_phase_status_serializes_with_mode() {
        let status = PhaseStatus::compute(ReclamationPolicy::Lunar, 0.0, 14.0 * 24.0 * SECS_PER_HOUR, 24.0);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["mode"], "lunar");
        assert_eq!(json["moon"], "Full Moon");
        assert_eq!(json["cycle_hours"], 672.0);

        let json = serde_json::to_value(PhaseStatus::Natural).unwrap();
        assert_eq!(json, serde_json::json!({ "mode": "natural" }));
    }
}
