// core/src/analyzer.rs
use ordered_float::OrderedFloat;

use crate::calibration::find_baseline_segments;
use crate::config::{AnalysisMode, AnalyzerConfig, ClusterDistance};
use crate::error::{AnalyzeError, ConfigError};
use crate::models::{ExerciseType, PhaseLabel, Sample, Session};
use crate::types::{AnalysisResult, PassAnalysis, PeakCandidate, PeakCluster};

/// Toppdeteksjon + klynging + energiomfordeling over en ferdig logg.
///
/// Ren og re-entrant: ingen delt tilstand, og ingen globale tellere
/// oppdateres. Kan kjøres på hvilken som helst tråd når loggen er frosset.
#[derive(Debug, Clone, Default)]
pub struct PeakAnalyzer {
    config: AnalyzerConfig,
}

/// Resultat fra én skive før det slås sammen til `AnalysisResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceOutcome {
    pub pass: PassAnalysis,
    pub raw_peaks: Vec<PeakCandidate>,
    pub clusters: Vec<PeakCluster>,
}

impl PeakAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyser en økt; målkolonnen velges fra konfig, øvelse eller heuristikk.
    pub fn analyze_session(&self, session: &Session) -> Result<AnalysisResult, AnalyzeError> {
        let channel = resolve_target_column(
            &session.columns,
            Some(session.exercise),
            self.config.target_column.as_deref(),
        )?;
        Ok(self.analyze_channel(session, channel))
    }

    /// Analyser en allerede valgt kanal i økten.
    pub fn analyze_channel(&self, session: &Session, channel: usize) -> AnalysisResult {
        let mut result = self.analyze(&session.samples, channel);
        result.exercise = Some(session.exercise);
        if let Some(name) = session.columns.get(channel) {
            result.target_column = name.clone();
        }
        result
    }

    /// Analyser én metrikk-kanal i en ordnet logg.
    pub fn analyze(&self, samples: &[Sample], channel: usize) -> AnalysisResult {
        let k = self.config.threshold_multiplier;

        let all_values = finite_values(samples, channel);
        let (mean_value, std_dev) = stats(&all_values);

        let mut outcomes: Vec<SliceOutcome> = Vec::new();
        let mut segments = Vec::new();

        match self.config.mode {
            AnalysisMode::GlobalThreshold => {
                for phase in [PhaseLabel::Calibrating, PhaseLabel::Maintaining] {
                    let slice: Vec<&Sample> = samples.iter().filter(|s| s.phase == phase).collect();
                    if slice.is_empty() {
                        continue;
                    }
                    let (times, values) = finite_series(slice.into_iter(), channel);
                    let (mean, std) = stats(&values);
                    let threshold = mean + k * std;
                    let mut out = analyze_slice(&times, &values, threshold, &self.config, phase, None);
                    out.pass.mean = mean;
                    out.pass.std_dev = std;
                    outcomes.push(out);
                }
            }
            AnalysisMode::SegmentedBaseline => {
                segments = find_baseline_segments(samples, channel, k);
                for seg in segments.iter_mut() {
                    let (times, values) = finite_series(seg.maintain_samples(samples).iter(), channel);
                    let mut out = analyze_slice(
                        &times,
                        &values,
                        seg.threshold,
                        &self.config,
                        PhaseLabel::Maintaining,
                        Some(seg.id),
                    );
                    out.pass.mean = seg.mean;
                    out.pass.std_dev = seg.std_dev;
                    seg.peak_count = out.clusters.len();
                    outcomes.push(out);
                }
            }
        }

        let count_for = |phase: PhaseLabel| -> usize {
            outcomes
                .iter()
                .filter(|o| o.pass.phase == Some(phase))
                .map(|o| o.clusters.len())
                .sum()
        };
        let calibrating_peak_count = count_for(PhaseLabel::Calibrating);
        let maintaining_peak_count = count_for(PhaseLabel::Maintaining);

        let raw: Vec<&PeakCandidate> = outcomes.iter().flat_map(|o| o.raw_peaks.iter()).collect();
        let mut clusters: Vec<PeakCluster> = outcomes.iter().flat_map(|o| o.clusters.iter().cloned()).collect();
        clusters.sort_by_key(|c| OrderedFloat(c.centroid_time));

        let original_energy: f64 = raw.iter().map(|p| p.value).sum();
        let cluster_energy: f64 = clusters.iter().map(|c| c.energy).sum();

        log::debug!(
            "analysis done: mode={:?}, points={}, raw={}, clusters={} (calib={}, maint={})",
            self.config.mode,
            all_values.len(),
            raw.len(),
            clusters.len(),
            calibrating_peak_count,
            maintaining_peak_count
        );

        AnalysisResult {
            exercise: None,
            mode: self.config.mode,
            target_column: format!("metric[{channel}]"),
            total_data_points: all_values.len(),
            calibrating_peak_count,
            maintaining_peak_count,
            total_peak_count: calibrating_peak_count + maintaining_peak_count,
            mean_value,
            std_dev,
            threshold: mean_value + k * std_dev,
            peak_reduction_ratio: reduction_ratio(raw.len(), clusters.len()),
            energy_preservation_ratio: preservation_ratio(cluster_energy, original_energy),
            clusters,
            passes: outcomes.into_iter().map(|o| o.pass).collect(),
            segments,
        }
    }
}

/// Kjør hele algoritmen over én skive (tider og verdier like lange).
pub fn analyze_slice(
    times: &[f64],
    values: &[f64],
    threshold: f64,
    config: &AnalyzerConfig,
    phase: PhaseLabel,
    segment: Option<usize>,
) -> SliceOutcome {
    let raw_peaks = detect_peaks(times, values, threshold, config.min_peak_distance);
    let groups = cluster_peaks(&raw_peaks, config.cluster_distance);

    let time_range = match (times.first(), times.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => (0.0, 0.0),
    };
    let clusters: Vec<PeakCluster> = groups
        .into_iter()
        .map(|g| redistribute(g, values.len(), time_range, phase, segment))
        .collect();

    for c in &clusters {
        log::trace!(
            "  cluster: {} peaks → index {}, t={:.3}, height {:.6}",
            c.members.len(),
            c.centroid_index,
            c.centroid_time,
            c.energy
        );
    }

    let original_energy: f64 = raw_peaks.iter().map(|p| p.value).sum();
    let cluster_energy: f64 = clusters.iter().map(|c| c.energy).sum();

    log::debug!(
        "{} slice{}: n={}, threshold={:.6}, raw peaks={}, clusters={}",
        phase,
        segment.map(|s| format!(" (segment {})", s + 1)).unwrap_or_default(),
        values.len(),
        threshold,
        raw_peaks.len(),
        clusters.len()
    );

    SliceOutcome {
        pass: PassAnalysis {
            phase: Some(phase),
            segment,
            n_values: values.len(),
            mean: 0.0,
            std_dev: 0.0,
            threshold,
            raw_peak_count: raw_peaks.len(),
            cluster_count: clusters.len(),
            peak_reduction_ratio: reduction_ratio(raw_peaks.len(), clusters.len()),
            energy_preservation_ratio: preservation_ratio(cluster_energy, original_energy),
        },
        raw_peaks,
        clusters,
    }
}

/// Populasjons-snitt og -standardavvik. Tom input → (0, 0).
pub fn stats(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Finitte verdier i en kanal (sentinel-verdier hoppes over).
pub fn finite_values(samples: &[Sample], channel: usize) -> Vec<f64> {
    samples.iter().map(|s| s.value(channel)).filter(|v| v.is_finite()).collect()
}

fn finite_series<'a>(samples: impl Iterator<Item = &'a Sample>, channel: usize) -> (Vec<f64>, Vec<f64>) {
    samples
        .filter_map(|s| {
            let v = s.value(channel);
            v.is_finite().then_some((s.t, v))
        })
        .unzip()
}

/// Lokale maksima over terskel med grådig minsteavstand.
///
/// Kandidat `i` (1..n-1) må være > terskel og > begge naboer. Ligger den
/// nærmere enn `min_distance` til en allerede akseptert topp, beholdes bare
/// den høyeste av de to; ved likhet vinner den som ble akseptert først.
pub fn detect_peaks(times: &[f64], values: &[f64], threshold: f64, min_distance: usize) -> Vec<PeakCandidate> {
    let n = values.len();
    if n < 3 {
        return Vec::new();
    }

    // stigende indeksrekkefølge holdes ved å fjerne + pushe ved erstatning
    let mut accepted: Vec<usize> = Vec::new();
    for i in 1..n - 1 {
        let v = values[i];
        if !(v > threshold && v > values[i - 1] && v > values[i + 1]) {
            continue;
        }
        match accepted.iter().position(|&e| i.abs_diff(e) < min_distance) {
            Some(pos) => {
                if v > values[accepted[pos]] {
                    accepted.remove(pos);
                    accepted.push(i);
                }
            }
            None => accepted.push(i),
        }
    }
    accepted.sort_unstable();

    accepted
        .into_iter()
        .map(|i| PeakCandidate {
            index: i,
            time: times.get(i).copied().unwrap_or(i as f64),
            value: values[i],
        })
        .collect()
}

/// Grupper topper: en topp blir med i åpen klynge hvis avstanden til
/// klyngens *siste* medlem er ≤ grensen, ellers åpnes en ny.
pub fn cluster_peaks(peaks: &[PeakCandidate], distance: ClusterDistance) -> Vec<Vec<PeakCandidate>> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by_key(|p| p.index);

    let mut groups: Vec<Vec<PeakCandidate>> = Vec::new();
    for p in sorted {
        let joins = match groups.last().and_then(|g| g.last()) {
            Some(last) => match distance {
                ClusterDistance::Samples(d) => p.index - last.index <= d,
                ClusterDistance::Seconds(s) => p.time - last.time <= s,
            },
            None => false,
        };
        match groups.last_mut() {
            Some(g) if joins => g.push(p),
            _ => groups.push(vec![p]),
        }
    }
    groups
}

/// Slå en klynge sammen til én kanonisk topp med høyde = energi i
/// energivektet tyngdepunkt.
pub fn redistribute(
    members: Vec<PeakCandidate>,
    n: usize,
    time_range: (f64, f64),
    phase: PhaseLabel,
    segment: Option<usize>,
) -> PeakCluster {
    let energy: f64 = members.iter().map(|p| p.value).sum();
    let first = members.first().copied().unwrap_or(PeakCandidate { index: 0, time: time_range.0, value: 0.0 });
    let max_index = n.saturating_sub(1);

    let (centroid_index, centroid_time) = if energy.abs() > f64::EPSILON {
        let weighted_idx: f64 = members.iter().map(|p| p.index as f64 * p.value).sum::<f64>() / energy;
        let weighted_t: f64 = members.iter().map(|p| p.time * p.value).sum::<f64>() / energy;
        let idx = weighted_idx.round().clamp(0.0, max_index as f64) as usize;
        let (lo, hi) = time_range;
        (idx, if hi >= lo { weighted_t.clamp(lo, hi) } else { weighted_t })
    } else {
        (first.index.min(max_index), first.time)
    };

    PeakCluster {
        phase,
        segment,
        members,
        centroid_index,
        centroid_time,
        energy,
    }
}

/// (original - klynger) / original · 100, 0 når det ikke fantes topper.
pub fn reduction_ratio(original: usize, clusters: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let r = (original.saturating_sub(clusters)) as f64 / original as f64 * 100.0;
    r.clamp(0.0, 100.0)
}

/// Σ klyngeenergi / Σ opprinnelige topphøyder · 100, 0 når nevneren ≤ 0.
pub fn preservation_ratio(cluster_energy: f64, original_energy: f64) -> f64 {
    if !(original_energy > 0.0) {
        return 0.0;
    }
    (cluster_energy / original_energy * 100.0).clamp(0.0, 100.0)
}

/// Velg kanalen som skal analyseres.
///
/// Rekkefølge: eksplisitt navn → øvelsens målkolonne → første kolonne som
/// inneholder "ratio" eller "value" → siste kolonne.
pub fn resolve_target_column(
    columns: &[String],
    exercise: Option<ExerciseType>,
    explicit: Option<&str>,
) -> Result<usize, AnalyzeError> {
    if columns.is_empty() {
        return Err(AnalyzeError::NoMetricColumns);
    }
    let find = |name: &str| columns.iter().position(|c| c.trim().eq_ignore_ascii_case(name.trim()));

    if let Some(name) = explicit {
        return find(name).ok_or_else(|| AnalyzeError::UnknownTargetColumn(name.to_string(), columns.to_vec()));
    }
    if let Some(idx) = exercise.and_then(|ex| find(ex.target_column())) {
        return Ok(idx);
    }
    let heuristic = columns.iter().position(|c| {
        let lc = c.to_lowercase();
        lc.contains("ratio") || lc.contains("value")
    });
    Ok(heuristic.unwrap_or(columns.len() - 1))
}
