// core/src/config.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tidskrav for økten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sammenhengende tid i posisjon før vedlikehold starter (sek)
    pub calibration_secs: f64,
    /// Samlet vedlikeholdstid før økten er ferdig (sek)
    pub maintain_target_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            calibration_secs: 5.0,
            maintain_target_secs: 30.0,
        }
    }
}

impl SessionConfig {
    pub fn calibration_duration(&self) -> Duration {
        secs_to_duration(self.calibration_secs)
    }

    pub fn maintain_target(&self) -> Duration {
        secs_to_duration(self.maintain_target_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_duration("session.calibration_secs", self.calibration_secs)?;
        check_duration("session.maintain_target_secs", self.maintain_target_secs)
    }
}

/// Klemt konvertering; verdier utenfor `Duration` blir 0 eller `Duration::MAX`.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

fn check_duration(name: &'static str, secs: f64) -> Result<(), ConfigError> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(ConfigError::NonPositive(name, secs));
    }
    if Duration::try_from_secs_f64(secs).is_err() {
        return Err(ConfigError::OutOfRange(name, secs));
    }
    Ok(())
}

/// Hvordan terskelen settes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Én terskel per fase-skive (alle CALIBRATING-samples, alle MAINTAINING-samples)
    #[default]
    GlobalThreshold,
    /// Hvert kalibreringssegment gir baseline for vedlikeholdssegmentet rett etter
    SegmentedBaseline,
}

/// Maks avstand fra forrige medlem for at en topp skal bli med i samme klynge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterDistance {
    Samples(usize),
    Seconds(f64),
}

impl Default for ClusterDistance {
    fn default() -> Self {
        ClusterDistance::Samples(40)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub mode: AnalysisMode,
    /// k i terskel = mean + k·std
    pub threshold_multiplier: f64,
    /// Minste indeksavstand mellom aksepterte topper
    pub min_peak_distance: usize,
    pub cluster_distance: ClusterDistance,
    /// Eksplisitt målkolonne; `None` = øvelsens egen / heuristikk
    pub target_column: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::global_threshold()
    }
}

impl AnalyzerConfig {
    /// Enkel modus: k=0.5, d_min=20, klyngeavstand 40 samples.
    pub fn global_threshold() -> Self {
        Self {
            mode: AnalysisMode::GlobalThreshold,
            threshold_multiplier: 0.5,
            min_peak_distance: 20,
            cluster_distance: ClusterDistance::Samples(40),
            target_column: None,
        }
    }

    /// Segmentert baseline: k=1.0, sammenslåing innen 2.0 s.
    pub fn segmented_baseline() -> Self {
        Self {
            mode: AnalysisMode::SegmentedBaseline,
            threshold_multiplier: 1.0,
            min_peak_distance: 20,
            cluster_distance: ClusterDistance::Seconds(2.0),
            target_column: None,
        }
    }

    pub fn with_multiplier(mut self, k: f64) -> Self {
        self.threshold_multiplier = k;
        self
    }

    pub fn with_cluster_distance(mut self, d: ClusterDistance) -> Self {
        self.cluster_distance = d;
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let k = self.threshold_multiplier;
        if !k.is_finite() || k < 0.0 {
            return Err(ConfigError::InvalidMultiplier(k));
        }
        if let ClusterDistance::Seconds(s) = self.cluster_distance {
            if !(s.is_finite() && s > 0.0) {
                return Err(ConfigError::NonPositive("analyzer.cluster_distance.seconds", s));
            }
        }
        Ok(())
    }
}

/// Samlet konfig (lastes fra JSON via `storage::load_config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Cfg {
    pub session: SessionConfig,
    pub analyzer: AnalyzerConfig,
}

impl Cfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.analyzer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_simple_mode() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.mode, AnalysisMode::GlobalThreshold);
        assert_eq!(c.threshold_multiplier, 0.5);
        assert_eq!(c.min_peak_distance, 20);
        assert_eq!(c.cluster_distance, ClusterDistance::Samples(40));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn negative_multiplier_is_rejected() {
        let c = AnalyzerConfig::default().with_multiplier(-1.0);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidMultiplier(_))));
    }

    #[test]
    fn zero_merge_seconds_is_rejected() {
        let c = AnalyzerConfig::segmented_baseline().with_cluster_distance(ClusterDistance::Seconds(0.0));
        assert!(c.validate().is_err());
    }
}
