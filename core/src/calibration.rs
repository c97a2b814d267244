// core/src/calibration.rs
use serde::{Deserialize, Serialize};

use crate::analyzer::{finite_values, stats};
use crate::models::{PhaseLabel, Sample};

/// Et kalibreringssegment og vedlikeholdssegmentet rett etter det.
/// Indeksene er inklusive og peker inn i hele sample-loggen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSegment {
    pub id: usize,
    pub calib_start: usize,
    pub calib_end: usize,
    pub maintain_start: usize,
    pub maintain_end: usize,
    pub calib_start_time: f64,
    pub calib_end_time: f64,
    pub maintain_start_time: f64,
    pub maintain_end_time: f64,
    /// Baseline fra kalibreringssegmentet
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    /// Overlevende klynger i vedlikeholdssegmentet (fylles av analysatoren)
    pub peak_count: usize,
}

impl BaselineSegment {
    pub fn calib_samples<'a>(&self, samples: &'a [Sample]) -> &'a [Sample] {
        &samples[self.calib_start..=self.calib_end]
    }

    pub fn maintain_samples<'a>(&self, samples: &'a [Sample]) -> &'a [Sample] {
        &samples[self.maintain_start..=self.maintain_end]
    }
}

/// Sammenhengende løp av samme fase: (fase, start, slutt) inklusive.
pub fn phase_runs(samples: &[Sample]) -> Vec<(PhaseLabel, usize, usize)> {
    let mut runs: Vec<(PhaseLabel, usize, usize)> = Vec::new();
    for (i, s) in samples.iter().enumerate() {
        match runs.last_mut() {
            Some((phase, _, end)) if *phase == s.phase => *end = i,
            _ => runs.push((s.phase, i, i)),
        }
    }
    runs
}

/// Del loggen i (kalibrering → vedlikehold)-par og regn baseline for hvert.
///
/// Et vedlikeholdsløp uten kalibrering foran har ingen baseline og hoppes
/// over. Et kalibreringsløp helt til slutt (uten vedlikehold etter) gir
/// heller ikke noe segment.
pub fn find_baseline_segments(samples: &[Sample], channel: usize, k: f64) -> Vec<BaselineSegment> {
    let runs = phase_runs(samples);
    let mut out = Vec::new();

    for (i, &(phase, m_start, m_end)) in runs.iter().enumerate() {
        if phase != PhaseLabel::Maintaining {
            continue;
        }
        let Some(&(PhaseLabel::Calibrating, c_start, c_end)) = i.checked_sub(1).map(|j| &runs[j]) else {
            log::debug!(
                "maintaining run {}..={} has no preceding calibration, skipped",
                m_start,
                m_end
            );
            continue;
        };

        let calib_values = finite_values(&samples[c_start..=c_end], channel);
        let (mean, std_dev) = stats(&calib_values);

        out.push(BaselineSegment {
            id: out.len(),
            calib_start: c_start,
            calib_end: c_end,
            maintain_start: m_start,
            maintain_end: m_end,
            calib_start_time: samples[c_start].t,
            calib_end_time: samples[c_end].t,
            maintain_start_time: samples[m_start].t,
            maintain_end_time: samples[m_end].t,
            mean,
            std_dev,
            threshold: mean + k * std_dev,
            peak_count: 0,
        });
    }

    log::debug!("baseline segments: {}", out.len());
    out
}
