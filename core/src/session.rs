// core/src/session.rs
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analyzer::{resolve_target_column, PeakAnalyzer};
use crate::config::Cfg;
use crate::error::SessionError;
use crate::metrics;
use crate::models::{ExerciseType, PhaseLabel, PhaseState, Point2, Session};
use crate::recorder::SignalRecorder;
use crate::telemetry;
use crate::types::AnalysisResult;

/// Fremdrift til visning (sekunder).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub state: PhaseState,
    pub calibration_elapsed_secs: f64,
    pub calibration_remaining_secs: f64,
    pub maintained_secs: f64,
    pub maintain_remaining_secs: f64,
}

/// Varsler fra tilstandsmaskinen. Alle metoder har tom standard.
pub trait SessionObserver {
    fn on_state_change(&mut self, _from: PhaseState, _to: PhaseState) {}
    fn on_progress(&mut self, _progress: &SessionProgress) {}
    fn on_completed(&mut self, _result: &AnalysisResult) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Frossen økt + analysen. Finnes bare etter at maskinen nådde `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    session: Session,
    result: AnalysisResult,
}

impl CompletedSession {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }

    /// Antall repetisjoner vist til brukeren.
    pub fn repetitions(&self) -> usize {
        self.result.total_peak_count
    }

    pub fn into_parts(self) -> (Session, AnalysisResult) {
        (self.session, self.result)
    }
}

/// Styrer kalibrering/vedlikehold per tick.
///
/// Én skriver: verten må serialisere kallene til `tick` for samme økt.
/// Tap av posisjon under vedlikehold sender maskinen tilbake til
/// kalibrering, men opptjent vedlikeholdstid beholdes.
pub struct SessionStateMachine<O: SessionObserver = NoopObserver> {
    cfg: Cfg,
    analyzer: PeakAnalyzer,
    channel: usize,
    recorder: SignalRecorder,
    observer: O,
    state: PhaseState,
    calibration_started: Option<Instant>,
    maintain_resumed: Option<Instant>,
    maintained_total: Duration,
    result: Option<AnalysisResult>,
}

impl SessionStateMachine<NoopObserver> {
    pub fn new(exercise: ExerciseType, cfg: Cfg, now: Instant) -> Result<Self, SessionError> {
        Self::with_observer(exercise, cfg, NoopObserver, now)
    }
}

impl<O: SessionObserver> SessionStateMachine<O> {
    pub fn with_observer(exercise: ExerciseType, cfg: Cfg, observer: O, now: Instant) -> Result<Self, SessionError> {
        cfg.validate()?;
        let analyzer = PeakAnalyzer::new(cfg.analyzer.clone())?;
        let recorder = SignalRecorder::starting_at(exercise, now, Utc::now());
        let channel = resolve_target_column(
            &recorder.session().columns,
            Some(exercise),
            cfg.analyzer.target_column.as_deref(),
        )?;

        log::info!(
            "session started: exercise={}, calibration={:.1}s, maintain target={:.1}s, target column={}",
            exercise,
            cfg.session.calibration_secs,
            cfg.session.maintain_target_secs,
            recorder.session().columns[channel]
        );

        Ok(Self {
            cfg,
            analyzer,
            channel,
            recorder,
            observer,
            state: PhaseState::Calibrating,
            calibration_started: None,
            maintain_resumed: None,
            maintained_total: Duration::ZERO,
            result: None,
        })
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn exercise(&self) -> ExerciseType {
        self.recorder.session().exercise
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn recorder(&self) -> &SignalRecorder {
        &self.recorder
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Analysen, når økten er fullført.
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// Én frame: keypoints + om brukeren er i posisjon.
    pub fn tick(&mut self, keypoints: &[Point2], in_bounds: bool, now: Instant) -> PhaseState {
        match (self.state, in_bounds) {
            (PhaseState::Completed, _) => {
                log::warn!("tick on completed session ignored");
                return self.state;
            }
            (PhaseState::Calibrating, true) => {
                let started = *self.calibration_started.get_or_insert(now);
                self.record(PhaseLabel::Calibrating, keypoints, now);
                if now.saturating_duration_since(started) >= self.cfg.session.calibration_duration() {
                    self.calibration_started = None;
                    self.maintain_resumed = Some(now);
                    self.transition(PhaseState::Maintaining);
                }
            }
            (PhaseState::Calibrating, false) => {
                self.calibration_started = None;
                self.transition(PhaseState::OutOfBounds);
            }
            (PhaseState::Maintaining, true) => {
                self.record(PhaseLabel::Maintaining, keypoints, now);
                if self.maintained(now) >= self.cfg.session.maintain_target() {
                    self.bank_maintained(now);
                    self.transition(PhaseState::Completed);
                    self.complete();
                }
            }
            (PhaseState::Maintaining, false) => {
                self.bank_maintained(now);
                self.calibration_started = None;
                self.transition(PhaseState::Calibrating);
            }
            (PhaseState::OutOfBounds, true) => {
                self.calibration_started = None;
                self.transition(PhaseState::Calibrating);
            }
            (PhaseState::OutOfBounds, false) => {}
        }

        let progress = self.progress(now);
        self.observer.on_progress(&progress);
        self.state
    }

    /// Samlet vedlikeholdstid, inkludert løpende segment.
    pub fn maintained(&self, now: Instant) -> Duration {
        let running = match (self.state, self.maintain_resumed) {
            (PhaseState::Maintaining, Some(r)) => now.saturating_duration_since(r),
            _ => Duration::ZERO,
        };
        self.maintained_total + running
    }

    pub fn maintained_secs(&self, now: Instant) -> f64 {
        self.maintained(now).as_secs_f64()
    }

    pub fn progress(&self, now: Instant) -> SessionProgress {
        let calib = match (self.state, self.calibration_started) {
            (PhaseState::Calibrating, Some(s)) => now.saturating_duration_since(s),
            _ => Duration::ZERO,
        };
        let maintained = self.maintained(now);
        SessionProgress {
            state: self.state,
            calibration_elapsed_secs: calib.as_secs_f64(),
            calibration_remaining_secs: self.cfg.session.calibration_duration().saturating_sub(calib).as_secs_f64(),
            maintained_secs: maintained.as_secs_f64(),
            maintain_remaining_secs: self.cfg.session.maintain_target().saturating_sub(maintained).as_secs_f64(),
        }
    }

    /// Overlever frossen økt + analyse. Feiler (og forkaster loggen) hvis
    /// økten ikke er fullført.
    pub fn finish(self) -> Result<CompletedSession, SessionError> {
        match self.result {
            Some(result) if self.state.is_terminal() => Ok(CompletedSession {
                session: self.recorder.into_session(),
                result,
            }),
            _ => Err(SessionError::NotCompleted(self.state)),
        }
    }

    /// Avbryt: loggen forkastes.
    pub fn abort(self) {
        log::info!(
            "session aborted in state {} ({} samples discarded)",
            self.state,
            self.recorder.len()
        );
    }

    fn record(&mut self, phase: PhaseLabel, keypoints: &[Point2], now: Instant) {
        let values = metrics::compute(keypoints, self.exercise());
        if metrics::is_undefined(&values) {
            log::warn!("malformed frame ({} keypoints), logged as undefined", keypoints.len());
        }
        self.recorder.append_at(phase, values, now);
    }

    fn bank_maintained(&mut self, now: Instant) {
        if let Some(r) = self.maintain_resumed.take() {
            self.maintained_total += now.saturating_duration_since(r);
        }
    }

    fn transition(&mut self, to: PhaseState) {
        let from = self.state;
        if from == to {
            return;
        }
        log::info!(
            "state {} → {} (maintained {:.2}s)",
            from,
            to,
            self.maintained_total.as_secs_f64()
        );
        self.state = to;
        self.observer.on_state_change(from, to);
    }

    fn complete(&mut self) {
        if self.result.is_some() {
            return;
        }
        let result = self.analyzer.analyze_channel(self.recorder.session(), self.channel);
        telemetry::record_peaks(result.raw_peak_count(), result.total_peak_count);
        telemetry::record_session_completed();
        log::info!(
            "session completed: {} samples, {} repetitions",
            self.recorder.len(),
            result.total_peak_count
        );
        self.observer.on_completed(&result);
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Vec<Point2> {
        vec![Point2::new(0.5, 0.5); metrics::FACE_MESH_POINTS]
    }

    #[test]
    fn out_of_bounds_frames_are_not_logged() {
        let t0 = Instant::now();
        let mut m = SessionStateMachine::new(ExerciseType::PoutLips, Cfg::default(), t0).unwrap();
        let kp = face();
        m.tick(&kp, false, t0);
        assert_eq!(m.state(), PhaseState::OutOfBounds);
        m.tick(&kp, false, t0 + Duration::from_millis(100));
        assert!(m.recorder().is_empty());
        m.tick(&kp, true, t0 + Duration::from_millis(200));
        assert_eq!(m.state(), PhaseState::Calibrating);
        assert!(m.recorder().is_empty());
    }

    #[test]
    fn finish_before_completion_fails() {
        let t0 = Instant::now();
        let m = SessionStateMachine::new(ExerciseType::SipLips, Cfg::default(), t0).unwrap();
        assert!(matches!(m.finish(), Err(SessionError::NotCompleted(PhaseState::Calibrating))));
    }
}
