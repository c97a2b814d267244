// core/src/recorder.rs
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::metrics;
use crate::models::{ExerciseType, PhaseLabel, Sample, Session};
use crate::storage::{quantize_metric, quantize_time, TIME_STEP};
use crate::telemetry;

/// Append-only logg for én økt.
///
/// Tid regnes fra veggklokke-delta ved append (ikke frame-indeks), så hull i
/// frame-strømmen synes i loggen. Verdier kvantiseres til samme presisjon
/// som CSV-formatet, slik at lagret og levende logg analyseres likt.
#[derive(Debug, Clone)]
pub struct SignalRecorder {
    session: Session,
    origin: Instant,
    last_t: Option<f64>,
}

impl SignalRecorder {
    pub fn new(exercise: ExerciseType) -> Self {
        Self::starting_at(exercise, Instant::now(), Utc::now())
    }

    /// Recorder med eksplisitt nullpunkt (for deterministiske kjøringer).
    pub fn starting_at(exercise: ExerciseType, origin: Instant, started_at: DateTime<Utc>) -> Self {
        Self {
            session: Session::new(exercise, started_at),
            origin,
            last_t: None,
        }
    }

    pub fn append(&mut self, phase: PhaseLabel, values: Vec<f64>) -> &Sample {
        self.append_at(phase, values, Instant::now())
    }

    pub fn append_at(&mut self, phase: PhaseLabel, mut values: Vec<f64>, now: Instant) -> &Sample {
        let mut t = quantize_time(self.elapsed_secs(now));
        if let Some(prev) = self.last_t {
            if t <= prev {
                let bumped = quantize_time(prev + TIME_STEP);
                log::trace!("non-increasing time {t:.3} after {prev:.3}, bumped to {bumped:.3}");
                t = bumped;
            }
        }

        let width = self.session.columns.len();
        if values.len() != width {
            log::warn!(
                "frame has {} metrics, log has {} columns; padding/truncating",
                values.len(),
                width
            );
            values.resize(width, f64::NAN);
        }
        for v in values.iter_mut() {
            *v = quantize_metric(*v);
        }

        telemetry::record_frame(phase, metrics::is_undefined(&values));
        self.last_t = Some(t);
        self.session.samples.push(Sample { t, phase, metrics: values });
        let idx = self.session.samples.len() - 1;
        &self.session.samples[idx]
    }

    /// Sekunder siden økt-start.
    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.origin).as_secs_f64()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.session.samples
    }

    pub fn len(&self) -> usize {
        self.session.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.samples.is_empty()
    }

    /// Forkast hele loggen (avbrutt økt). Tidslinjen starter ikke på nytt.
    pub fn clear(&mut self) {
        log::debug!("recorder cleared ({} samples dropped)", self.session.samples.len());
        self.session.samples.clear();
        self.last_t = None;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}
