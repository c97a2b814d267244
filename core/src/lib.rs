// core/src/lib.rs
//! Øktstyring og repetisjonstelling fra ansiktsgeometri-signaler.
//!
//! Flyt per frame: keypoints + posisjonsflagg → `SessionStateMachine`
//! (fase, `metrics::compute`, `SignalRecorder::append`) → ved fullføring
//! `PeakAnalyzer` → `AnalysisResult`.

pub mod analyzer;
pub mod calibration;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod recorder;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(feature = "python")]
mod py;

pub use analyzer::PeakAnalyzer;
pub use calibration::BaselineSegment;
pub use config::{AnalysisMode, AnalyzerConfig, Cfg, ClusterDistance, SessionConfig};
pub use error::{AnalyzeError, ConfigError, SessionError, StorageError};
pub use models::{ExerciseType, PhaseLabel, PhaseState, Point2, Sample, Session};
pub use recorder::SignalRecorder;
pub use session::{CompletedSession, NoopObserver, SessionObserver, SessionProgress, SessionStateMachine};
pub use types::{AnalysisResult, PassAnalysis, PeakCandidate, PeakCluster};
