// core/src/telemetry.rs
//! Prometheus-tellere for opptak og analyse.
//!
//! Tellerne ligger i et eget register slik at verten selv bestemmer om og
//! hvordan de eksponeres (`gather_text`). Registrering er best-effort: feiler
//! den, logges det og tellingen hoppes over.
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::models::PhaseLabel;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static FRAMES_RECORDED: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    counter_vec(
        "rehab_frames_recorded_total",
        "Frames appended to a session log",
        &["phase"],
    )
});

static MALFORMED_FRAMES: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter(
        "rehab_malformed_frames_total",
        "Frames whose metrics were the undefined sentinel",
    )
});

static PEAKS: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    counter_vec(
        "rehab_peaks_total",
        "Detected peaks before (raw) and after (clustered) redistribution",
        &["stage"],
    )
});

static SESSIONS_COMPLETED: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter(
        "rehab_sessions_completed_total",
        "Sessions that reached the completed state",
    )
});

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    let c = match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("telemetry: cannot create {name}: {e}");
            return None;
        }
    };
    if let Err(e) = REGISTRY.register(Box::new(c.clone())) {
        log::warn!("telemetry: cannot register {name}: {e}");
    }
    Some(c)
}

fn counter(name: &str, help: &str) -> Option<IntCounter> {
    let c = match IntCounter::new(name, help) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("telemetry: cannot create {name}: {e}");
            return None;
        }
    };
    if let Err(e) = REGISTRY.register(Box::new(c.clone())) {
        log::warn!("telemetry: cannot register {name}: {e}");
    }
    Some(c)
}

pub fn record_frame(phase: PhaseLabel, malformed: bool) {
    if let Some(c) = FRAMES_RECORDED.as_ref() {
        c.with_label_values(&[phase.as_str()]).inc();
    }
    if malformed {
        if let Some(c) = MALFORMED_FRAMES.as_ref() {
            c.inc();
        }
    }
}

pub fn record_peaks(raw: usize, clustered: usize) {
    if let Some(c) = PEAKS.as_ref() {
        c.with_label_values(&["raw"]).inc_by(raw as u64);
        c.with_label_values(&["clustered"]).inc_by(clustered as u64);
    }
}

/// Nåværende verdi av `rehab_peaks_total{stage}` (0 hvis telleren mangler).
pub fn peaks_total(stage: &str) -> u64 {
    PEAKS
        .as_ref()
        .map(|c| c.with_label_values(&[stage]).get())
        .unwrap_or(0)
}

pub fn record_session_completed() {
    if let Some(c) = SESSIONS_COMPLETED.as_ref() {
        c.inc();
    }
}

/// Tekstformat (Prometheus exposition) av alle tellere.
pub fn gather_text() -> String {
    // sørg for at alle tellere finnes selv om ingenting er talt ennå
    Lazy::force(&FRAMES_RECORDED);
    Lazy::force(&MALFORMED_FRAMES);
    Lazy::force(&PEAKS);
    Lazy::force(&SESSIONS_COMPLETED);

    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buf) {
        log::warn!("telemetry: encode failed: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}
