// core/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 2D-punkt fra ansiktsgeometri-detektoren (normaliserte eller piksel-koordinater).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point2 {
    fn from(p: [f32; 2]) -> Self {
        Self { x: p[0] as f64, y: p[1] as f64 }
    }
}

/// Øvelsestyper kjernen kan regne metrikk for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    /// Lepper presses sammen (arealforhold over/under-leppe)
    SipLips,
    /// Trutmunn (høyde/bredde-forhold)
    PoutLips,
    JawLeft,
    JawRight,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 4] = [
        ExerciseType::SipLips,
        ExerciseType::PoutLips,
        ExerciseType::JawLeft,
        ExerciseType::JawRight,
    ];

    /// Etikett brukt i filnavn og logg.
    pub fn label(&self) -> &'static str {
        match self {
            ExerciseType::SipLips => "SIP_LIPS",
            ExerciseType::PoutLips => "POUT_LIPS",
            ExerciseType::JawLeft => "JAW_LEFT",
            ExerciseType::JawRight => "JAW_RIGHT",
        }
    }

    /// Metrikk-kolonner i samme rekkefølge som `metrics::compute` returnerer dem.
    pub fn metric_columns(&self) -> &'static [&'static str] {
        match self {
            ExerciseType::SipLips => &["upper_lip_area", "lower_lip_area", "area_ratio"],
            ExerciseType::PoutLips => &["mouth_height", "mouth_width", "height_width_ratio"],
            ExerciseType::JawLeft | ExerciseType::JawRight => &["jaw_shift", "jaw_shift_abs"],
        }
    }

    /// Kolonnen som teller repetisjoner.
    pub fn target_column(&self) -> &'static str {
        match self {
            ExerciseType::SipLips => "area_ratio",
            ExerciseType::PoutLips => "height_width_ratio",
            ExerciseType::JawLeft | ExerciseType::JawRight => "jaw_shift_abs",
        }
    }

    /// Finn øvelsen ut fra metrikk-kolonnene i en lagret logg.
    /// Jaw-variantene deler kolonner, så de faller tilbake til `JawLeft`.
    pub fn from_metric_columns<S: AsRef<str>>(columns: &[S]) -> Option<ExerciseType> {
        ExerciseType::ALL.into_iter().find(|ex| {
            let expected = ex.metric_columns();
            expected.len() == columns.len()
                && expected.iter().zip(columns).all(|(a, b)| *a == b.as_ref().trim())
        })
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_uppercase();
        ExerciseType::ALL
            .into_iter()
            .find(|ex| ex.label() == up)
            .ok_or_else(|| format!("unknown exercise label: {s}"))
    }
}

/// Fasen en logget sample tilhører. `OutOfBounds` logges aldri.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseLabel {
    Calibrating,
    Maintaining,
}

impl PhaseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Calibrating => "CALIBRATING",
            PhaseLabel::Maintaining => "MAINTAINING",
        }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CALIBRATING" => Ok(PhaseLabel::Calibrating),
            "MAINTAINING" => Ok(PhaseLabel::Maintaining),
            other => Err(format!("unknown phase label: {other}")),
        }
    }
}

/// Tilstanden til selve økten (inkl. de som ikke logges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    Calibrating,
    Maintaining,
    OutOfBounds,
    Completed,
}

impl PhaseState {
    /// Fasen som skal logges for denne tilstanden, hvis noen.
    pub fn recorded_phase(&self) -> Option<PhaseLabel> {
        match self {
            PhaseState::Calibrating => Some(PhaseLabel::Calibrating),
            PhaseState::Maintaining => Some(PhaseLabel::Maintaining),
            PhaseState::OutOfBounds | PhaseState::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseState::Completed)
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Calibrating => "CALIBRATING",
            PhaseState::Maintaining => "MAINTAINING",
            PhaseState::OutOfBounds => "OUT_OF_BOUNDS",
            PhaseState::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Én logget frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64, // sek siden økt-start
    pub phase: PhaseLabel,
    pub metrics: Vec<f64>, // NaN = udefinert metrikk (feilformet frame)
}

impl Sample {
    /// Verdi i en gitt metrikk-kanal (NaN hvis kanalen mangler).
    #[inline]
    pub fn value(&self, channel: usize) -> f64 {
        self.metrics.get(channel).copied().unwrap_or(f64::NAN)
    }
}

/// En økt: øvelse, starttid og ordnet logg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub exercise: ExerciseType,
    pub started_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub samples: Vec<Sample>,
}

impl Session {
    pub fn new(exercise: ExerciseType, started_at: DateTime<Utc>) -> Self {
        Self {
            exercise,
            started_at,
            columns: exercise.metric_columns().iter().map(|c| c.to_string()).collect(),
            samples: Vec::new(),
        }
    }

    /// Kolonneindeks for et metrikk-navn.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name.trim()))
    }

    /// Varighet (sek) fra første til siste sample.
    pub fn duration_secs(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(a), Some(b)) => b.t - a.t,
            _ => 0.0,
        }
    }
}
