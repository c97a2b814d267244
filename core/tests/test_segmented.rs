// core/tests/test_segmented.rs
use rehab_core::calibration::find_baseline_segments;
use rehab_core::config::{AnalysisMode, AnalyzerConfig, ClusterDistance};
use rehab_core::models::{PhaseLabel, Sample};
use rehab_core::PeakAnalyzer;

/// To sykluser: kalibrering (1.0/1.2 vekselvis) → vedlikehold (1.0 med topper).
fn two_cycles() -> Vec<Sample> {
    let mut out = Vec::new();
    let mut push = |phase: PhaseLabel, v: f64| {
        let t = out.len() as f64 * 0.1;
        out.push(Sample { t, phase, metrics: vec![v] });
    };
    for i in 0..50 {
        push(PhaseLabel::Calibrating, if i % 2 == 0 { 1.0 } else { 1.2 });
    }
    for i in 50..150 {
        let v = match i {
            80 => 5.0,
            85 => 5.5,
            120 => 6.0,
            _ => 1.0,
        };
        push(PhaseLabel::Maintaining, v);
    }
    for i in 150..200 {
        push(PhaseLabel::Calibrating, if i % 2 == 0 { 1.0 } else { 1.2 });
    }
    for i in 200..300 {
        push(PhaseLabel::Maintaining, if i == 250 { 4.0 } else { 1.0 });
    }
    out
}

fn segmented() -> AnalyzerConfig {
    let mut cfg = AnalyzerConfig::segmented_baseline();
    cfg.min_peak_distance = 2;
    cfg
}

#[test]
fn test_each_calibration_sets_its_own_baseline() {
    let samples = two_cycles();
    let segs = find_baseline_segments(&samples, 0, 1.0);
    assert_eq!(segs.len(), 2, "to kalibrering→vedlikehold-par");

    for s in &segs {
        assert!((s.mean - 1.1).abs() < 1e-9, "snitt {}", s.mean);
        assert!((s.std_dev - 0.1).abs() < 1e-9, "std {}", s.std_dev);
        assert!((s.threshold - 1.2).abs() < 1e-9);
    }
    assert_eq!((segs[0].calib_start, segs[0].calib_end), (0, 49));
    assert_eq!((segs[0].maintain_start, segs[0].maintain_end), (50, 149));
    assert_eq!((segs[1].calib_start, segs[1].maintain_end), (150, 299));
    assert!((segs[1].maintain_start_time - 20.0).abs() < 1e-9);
}

#[test]
fn test_segmented_mode_merges_by_time() {
    let samples = two_cycles();
    let r = PeakAnalyzer::new(segmented()).unwrap().analyze(&samples, 0);

    assert_eq!(r.mode, AnalysisMode::SegmentedBaseline);
    assert_eq!(r.calibrating_peak_count, 0, "kalibrering er bare baseline i segmentert modus");
    // 80 og 85 ligger 0.5 s fra hverandre → én klynge; 120 og 250 alene
    assert_eq!(r.maintaining_peak_count, 3);
    assert_eq!(r.total_peak_count, 3);
    assert_eq!(r.segments[0].peak_count, 2);
    assert_eq!(r.segments[1].peak_count, 1);
    assert_eq!(r.passes.len(), 2);
    assert_eq!(r.passes[1].segment, Some(1));

    let merged = &r.clusters[0];
    assert_eq!(merged.segment, Some(0));
    assert_eq!(merged.members.len(), 2);
    assert!((merged.energy - 10.5).abs() < 1e-12);
    // (8.0·5 + 8.5·5.5) / 10.5
    let expected_t = (8.0 * 5.0 + 8.5 * 5.5) / 10.5;
    assert!((merged.centroid_time - expected_t).abs() < 1e-9);
}

#[test]
fn test_smaller_merge_distance_splits_cluster() {
    let samples = two_cycles();
    let cfg = segmented().with_cluster_distance(ClusterDistance::Seconds(0.2));
    let r = PeakAnalyzer::new(cfg).unwrap().analyze(&samples, 0);
    assert_eq!(r.total_peak_count, 4);
}

#[test]
fn test_higher_multiplier_filters_small_peaks() {
    let samples = two_cycles();
    // baseline 1.1 ± 0.1: k=35 → terskel 4.6, toppen på 4.0 i andre syklus faller bort
    let r = PeakAnalyzer::new(segmented().with_multiplier(35.0)).unwrap().analyze(&samples, 0);
    assert_eq!(r.segments[1].peak_count, 0);
    assert_eq!(r.total_peak_count, 2);
}

#[test]
fn test_maintaining_without_calibration_is_ignored() {
    let samples: Vec<Sample> = (0..100)
        .map(|i| Sample {
            t: i as f64 * 0.1,
            phase: PhaseLabel::Maintaining,
            metrics: vec![if i == 50 { 9.0 } else { 0.0 }],
        })
        .collect();
    let r = PeakAnalyzer::new(segmented()).unwrap().analyze(&samples, 0);
    assert!(r.segments.is_empty());
    assert_eq!(r.total_peak_count, 0);
}
