// Python-bindinger. Alt går inn og ut som JSON-strenger.
use std::path::Path;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::analyzer::PeakAnalyzer;
use crate::config::Cfg;
use crate::models::{PhaseLabel, Sample};
use crate::storage;

// ──────────────────────────────────────────────────────────────────────────────
// HJELPERE (uten pyo3-typer)
// ──────────────────────────────────────────────────────────────────────────────

fn cfg_from_json(cfg_json: Option<&str>) -> Result<Cfg, String> {
    match cfg_json {
        Some(s) if !s.trim().is_empty() => storage::parse_config(s).map_err(|e| e.to_string()),
        _ => Ok(Cfg::default()),
    }
}

fn analyze_csv_from_json(path: &str, cfg_json: Option<&str>) -> Result<String, String> {
    let cfg = cfg_from_json(cfg_json)?;
    let session = storage::load_session_csv(Path::new(path)).map_err(|e| e.to_string())?;
    let analyzer = PeakAnalyzer::new(cfg.analyzer).map_err(|e| e.to_string())?;
    let result = analyzer.analyze_session(&session).map_err(|e| e.to_string())?;
    result.to_json().map_err(|e| e.to_string())
}

fn analyze_series_from_json(
    times: &[f64],
    phases: &[String],
    values: &[f64],
    cfg_json: Option<&str>,
) -> Result<String, String> {
    if times.len() != phases.len() || times.len() != values.len() {
        return Err(format!(
            "times/phases/values må ha samme lengde ({}/{}/{})",
            times.len(),
            phases.len(),
            values.len()
        ));
    }
    let cfg = cfg_from_json(cfg_json)?;

    let samples = times
        .iter()
        .zip(phases)
        .zip(values)
        .map(|((&t, phase), &v)| {
            let phase: PhaseLabel = phase.parse()?;
            Ok(Sample { t, phase, metrics: vec![v] })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let analyzer = PeakAnalyzer::new(cfg.analyzer).map_err(|e| e.to_string())?;
    let mut result = analyzer.analyze(&samples, 0);
    result.target_column = "value".to_string();
    result.to_json().map_err(|e| e.to_string())
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-MODUL
// ──────────────────────────────────────────────────────────────────────────────

#[pyfunction]
#[pyo3(signature = (path, cfg_json=None))]
fn analyze_csv_json(path: &str, cfg_json: Option<&str>) -> PyResult<String> {
    analyze_csv_from_json(path, cfg_json).map_err(PyValueError::new_err)
}

#[pyfunction]
#[pyo3(signature = (times, phases, values, cfg_json=None))]
fn analyze_series_json(
    times: Vec<f64>,
    phases: Vec<String>,
    values: Vec<f64>,
    cfg_json: Option<&str>,
) -> PyResult<String> {
    analyze_series_from_json(&times, &phases, &values, cfg_json).map_err(PyValueError::new_err)
}

#[pyfunction]
fn telemetry_text() -> String {
    crate::telemetry::gather_text()
}

#[pymodule]
fn rehab_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(analyze_csv_json, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_series_json, m)?)?;
    m.add_function(wrap_pyfunction!(telemetry_text, m)?)?;
    Ok(())
}
