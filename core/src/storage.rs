// core/src/storage.rs
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::config::Cfg;
use crate::error::StorageError;
use crate::models::{ExerciseType, PhaseLabel, Sample, Session};

pub const TIME_COLUMN: &str = "time_seconds";
pub const STATE_COLUMN: &str = "state";
/// Minste tidssteg i lagret logg (3 desimaler).
pub const TIME_STEP: f64 = 0.001;

const FILE_PREFIX: &str = "FaceTraining_";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn format_time(t: f64) -> String {
    format!("{t:.3}")
}

pub fn format_metric(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.6}")
    }
}

/// Rund av til lagret presisjon, slik at skriv → les gir samme verdi.
pub fn quantize_time(t: f64) -> f64 {
    format_time(t).parse().unwrap_or(t)
}

pub fn quantize_metric(v: f64) -> f64 {
    format_metric(v).parse().unwrap_or(v)
}

/// `FaceTraining_<LABEL>_<yyyyMMdd_HHmmss>.csv`
pub fn session_file_name(exercise: ExerciseType, started_at: DateTime<Utc>) -> String {
    format!("{}{}_{}.csv", FILE_PREFIX, exercise.label(), started_at.format(STAMP_FORMAT))
}

/// Tolk et filnavn på formen over. Ukjent etikett gir `None` for øvelsen.
pub fn parse_session_file_name(name: &str) -> Option<(Option<ExerciseType>, DateTime<Utc>)> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(".csv")?;
    // stempelet er alltid 15 tegn: yyyyMMdd_HHmmss
    let split = stem.len().checked_sub(16)?;
    if !stem.is_char_boundary(split) {
        return None;
    }
    let (label, stamp) = stem.split_at(split);
    let stamp = stamp.strip_prefix('_')?;
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some((label.parse().ok(), Utc.from_utc_datetime(&naive)))
}

/// Skriv loggen som `time_seconds,state,<metrikk-kolonner…>`.
pub fn write_session_csv<W: Write>(session: &Session, writer: W) -> Result<(), StorageError> {
    let mut w = csv::Writer::from_writer(writer);

    let mut header = vec![TIME_COLUMN.to_string(), STATE_COLUMN.to_string()];
    header.extend(session.columns.iter().cloned());
    w.write_record(&header)?;

    for s in &session.samples {
        let mut row = Vec::with_capacity(header.len());
        row.push(format_time(s.t));
        row.push(s.phase.as_str().to_string());
        for ch in 0..session.columns.len() {
            row.push(format_metric(s.value(ch)));
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

/// Lagre økten i `dir` under standard filnavn. Returnerer full sti.
///
/// Feil her rører ikke økten eller analysen i minnet; verten kan prøve igjen.
pub fn save_session_csv(session: &Session, dir: &Path) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(session_file_name(session.exercise, session.started_at));
    let file = File::create(&path)?;
    write_session_csv(session, file)?;
    log::info!(
        "session saved to {} ({} samples)",
        path.display(),
        session.samples.len()
    );
    Ok(path)
}

/// Les en logg. Øvelsen tas fra kolonnene, ellers fra `exercise_hint`.
pub fn read_session_csv<R: Read>(
    reader: R,
    exercise_hint: Option<ExerciseType>,
    started_at: DateTime<Utc>,
) -> Result<Session, StorageError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let time_idx = find(TIME_COLUMN).ok_or(StorageError::MissingColumn(TIME_COLUMN))?;
    let state_idx = find(STATE_COLUMN).ok_or(StorageError::MissingColumn(STATE_COLUMN))?;

    let metric_idx: Vec<usize> = (0..headers.len()).filter(|&i| i != time_idx && i != state_idx).collect();
    if metric_idx.is_empty() {
        return Err(StorageError::NoMetricColumns);
    }
    let columns: Vec<String> = metric_idx.iter().map(|&i| headers[i].clone()).collect();

    let exercise = match ExerciseType::from_metric_columns(&columns) {
        // jaw-kolonnene er felles, så hintet avgjør venstre/høyre
        Some(ex) => match exercise_hint {
            Some(hint) if hint.metric_columns() == ex.metric_columns() => hint,
            _ => ex,
        },
        None => exercise_hint.ok_or_else(|| StorageError::UnknownLayout(columns.clone()))?,
    };

    let mut samples = Vec::new();
    let mut prev: Option<f64> = None;
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let row = i + 1;
        let cell = |idx: usize| rec.get(idx).unwrap_or("");

        let t = parse_number(cell(time_idx), row, TIME_COLUMN)?;
        // tiden må være endelig
        if !t.is_finite() {
            return Err(StorageError::NonFiniteTime {
                row,
                value: cell(time_idx).to_string(),
            });
        }
        if let Some(p) = prev {
            if t <= p {
                return Err(StorageError::NonMonotonicTime { row, t, prev: p });
            }
        }
        prev = Some(t);

        let phase: PhaseLabel = cell(state_idx).parse().map_err(|_| StorageError::UnknownPhase {
            row,
            value: cell(state_idx).to_string(),
        })?;

        let mut metrics = Vec::with_capacity(metric_idx.len());
        for (&idx, name) in metric_idx.iter().zip(&columns) {
            let raw = cell(idx);
            if raw.is_empty() {
                metrics.push(f64::NAN);
            } else {
                metrics.push(parse_number(raw, row, name)?);
            }
        }
        samples.push(Sample { t, phase, metrics });
    }

    log::debug!(
        "read session: exercise={}, columns={:?}, samples={}",
        exercise,
        columns,
        samples.len()
    );

    Ok(Session {
        exercise,
        started_at,
        columns,
        samples,
    })
}

/// Les en lagret økt fra disk.
///
/// Starttid og øvelse hentes fra filnavnet når det følger standardformatet,
/// ellers brukes filens endringstid.
pub fn load_session_csv(path: &Path) -> Result<Session, StorageError> {
    let parsed = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_session_file_name);

    let (hint, started_at) = match parsed {
        Some((hint, at)) => (hint, at),
        None => {
            let mtime = fs::metadata(path)?.modified().ok().map(DateTime::<Utc>::from);
            (None, mtime.unwrap_or_else(Utc::now))
        }
    };

    let file = File::open(path)?;
    let session = read_session_csv(file, hint, started_at)?;
    log::info!(
        "session loaded from {} ({} samples)",
        path.display(),
        session.samples.len()
    );
    Ok(session)
}

fn parse_number(raw: &str, row: usize, column: &str) -> Result<f64, StorageError> {
    raw.parse::<f64>().map_err(|_| StorageError::InvalidNumber {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Leser konfig fra disk (JSON).
/// Hvis filen ikke finnes, returneres standardkonfig.
pub fn load_config(path: &Path) -> Result<Cfg, StorageError> {
    if !path.exists() {
        log::info!("no config at {}, using defaults", path.display());
        return Ok(Cfg::default());
    }
    let contents = fs::read_to_string(path)?;
    let cfg = parse_config(&contents)?;
    log::info!("config loaded from {} (mode={:?})", path.display(), cfg.analyzer.mode);
    Ok(cfg)
}

/// Tolk og valider konfig-JSON; feil peker på feltet som feilet.
pub fn parse_config(json: &str) -> Result<Cfg, StorageError> {
    let mut de = serde_json::Deserializer::from_str(json);
    let cfg: Cfg = serde_path_to_error::deserialize(&mut de)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Lagrer konfig til disk som JSON (pretty-print).
pub fn save_config(cfg: &Cfg, path: &Path) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json)?;
    log::info!("config saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let name = session_file_name(ExerciseType::JawRight, at);
        assert_eq!(name, "FaceTraining_JAW_RIGHT_20240309_140507.csv");
        let (ex, parsed) = parse_session_file_name(&name).unwrap();
        assert_eq!(ex, Some(ExerciseType::JawRight));
        assert_eq!(parsed, at);
    }

    #[test]
    fn foreign_file_name_is_ignored() {
        assert!(parse_session_file_name("notes.csv").is_none());
        assert!(parse_session_file_name("FaceTraining_x.csv").is_none());
    }

    #[test]
    fn quantize_is_stable() {
        let q = quantize_metric(0.123_456_789);
        assert_eq!(q, 0.123457);
        assert_eq!(format_metric(q), "0.123457");
        assert!(quantize_metric(f64::NAN).is_nan());
        assert_eq!(quantize_time(1.23456), 1.235);
    }
}
