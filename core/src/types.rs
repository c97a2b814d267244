use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::BaselineSegment;
use crate::config::AnalysisMode;
use crate::models::{ExerciseType, PhaseLabel};

/// Lokalt maksimum over terskel i én skive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    pub index: usize, // posisjon i skiva (etter at sentinel-verdier er fjernet)
    pub time: f64,    // sek
    pub value: f64,
}

/// Nærliggende topper slått sammen til én kanonisk repetisjon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakCluster {
    pub phase: PhaseLabel,
    /// Baseline-segment (kun segmentert modus)
    pub segment: Option<usize>,
    pub members: Vec<PeakCandidate>,
    /// round(Σ index·value / energy), klemt til [0, n-1]
    pub centroid_index: usize,
    /// Energivektet snitt av medlemmenes tider, klemt til skivas tidsrom
    pub centroid_time: f64,
    /// Σ medlemsverdier = høyden på den kanoniske toppen
    pub energy: f64,
}

impl PeakCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Statistikk for én analysert skive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PassAnalysis {
    pub phase: Option<PhaseLabel>,
    pub segment: Option<usize>,
    pub n_values: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    pub raw_peak_count: usize,
    pub cluster_count: usize,
    pub peak_reduction_ratio: f64,
    pub energy_preservation_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub exercise: Option<ExerciseType>,
    pub mode: AnalysisMode,
    pub target_column: String,
    pub total_data_points: usize,
    pub calibrating_peak_count: usize,
    pub maintaining_peak_count: usize,
    /// Vises til brukeren som "repetisjoner fullført"
    pub total_peak_count: usize,
    pub clusters: Vec<PeakCluster>,
    pub mean_value: f64,
    pub std_dev: f64,
    pub threshold: f64,
    pub peak_reduction_ratio: f64,
    pub energy_preservation_ratio: f64,
    pub passes: Vec<PassAnalysis>,
    pub segments: Vec<BaselineSegment>,
}

impl AnalysisResult {
    /// Antall rå topper før klynging, over alle skiver.
    pub fn raw_peak_count(&self) -> usize {
        self.passes.iter().map(|p| p.raw_peak_count).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exercise = self.exercise.map(|e| e.label()).unwrap_or("UNKNOWN");
        writeln!(f, "Peak analysis ({:?})", self.mode)?;
        writeln!(f, "--------------------")?;
        writeln!(f, "Exercise:        {exercise}")?;
        writeln!(f, "Target column:   {}", self.target_column)?;
        writeln!(f, "Data points:     {}", self.total_data_points)?;
        writeln!(f, "Mean value:      {:.4}", self.mean_value)?;
        writeln!(f, "--------------------")?;
        for seg in &self.segments {
            writeln!(
                f,
                "Segment {}: calib {:.1}-{:.1} s, maintain {:.1}-{:.1} s, mean {:.4}, std {:.4}, threshold {:.4}, peaks {}",
                seg.id + 1,
                seg.calib_start_time,
                seg.calib_end_time,
                seg.maintain_start_time,
                seg.maintain_end_time,
                seg.mean,
                seg.std_dev,
                seg.threshold,
                seg.peak_count
            )?;
        }
        writeln!(f, "Calibrating peaks: {}", self.calibrating_peak_count)?;
        writeln!(f, "Maintaining peaks: {}", self.maintaining_peak_count)?;
        writeln!(f, "Total peaks:       {}", self.total_peak_count)?;
        writeln!(f, "Peak reduction:    {:.1}%", self.peak_reduction_ratio)?;
        write!(f, "Energy preserved:  {:.1}%", self.energy_preservation_ratio)
    }
}
