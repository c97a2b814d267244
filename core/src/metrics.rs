// core/src/metrics.rs
use ordered_float::OrderedFloat;

use crate::models::{ExerciseType, Point2};

/// Antall punkter i ansikts-meshen (iris-varianten har 478, begge godtas).
pub const FACE_MESH_POINTS: usize = 468;

// Overleppe: ytre kontur venstre→høyre, så indre kontur høyre→venstre.
pub const UPPER_LIP: [usize; 18] = [
    185, 40, 39, 37, 0, 267, 269, 270, 409, 415, 310, 311, 312, 13, 82, 81, 80, 191,
];
// Underleppe: samme omløpsretning som overleppen.
pub const LOWER_LIP: [usize; 18] = [
    146, 91, 181, 84, 17, 314, 405, 321, 375, 324, 318, 402, 317, 14, 87, 178, 88, 95,
];

/// Ytre leppepunkter for vertikal utstrekning (topp over- og bunn underleppe).
pub const MOUTH_VERTICAL: [usize; 6] = [0, 37, 267, 17, 84, 314];
/// Munnviker (venstre, høyre).
pub const MOUTH_CORNERS: [usize; 2] = [61, 291];

pub const NOSE_TIP: usize = 1;
pub const EYE_OUTER_RIGHT: usize = 33;
pub const EYE_OUTER_LEFT: usize = 263;
pub const CHIN: [usize; 3] = [152, 148, 377];

/// Minste øyeavstand før normalisering gir mening.
const MIN_EYE_DISTANCE: f64 = 1e-6;

/// Beregn metrikk-vektoren for én frame.
///
/// Feilformet input (for få punkter, eller ikke-finitte referansepunkter)
/// gir NaN i alle kanaler i stedet for feil, slik at frame-en fortsatt
/// kan logges og tidslinjen holdes sammenhengende.
pub fn compute(keypoints: &[Point2], exercise: ExerciseType) -> Vec<f64> {
    if keypoints.len() < FACE_MESH_POINTS {
        log::trace!(
            "malformed frame for {}: {} keypoints (need {})",
            exercise,
            keypoints.len(),
            FACE_MESH_POINTS
        );
        return undefined(exercise);
    }

    match exercise {
        ExerciseType::SipLips => {
            let upper = polygon_area(&pick(keypoints, &UPPER_LIP));
            let lower = polygon_area(&pick(keypoints, &LOWER_LIP));
            vec![upper, lower, safe_ratio(upper, lower)]
        }
        ExerciseType::PoutLips => {
            let height = vertical_extent(&pick(keypoints, &MOUTH_VERTICAL));
            let width = horizontal_extent(&pick(keypoints, &MOUTH_CORNERS));
            vec![height, width, safe_ratio(height, width)]
        }
        ExerciseType::JawLeft | ExerciseType::JawRight => match jaw_shift(keypoints) {
            Some(shift) => vec![shift, shift.abs()],
            None => undefined(exercise),
        },
    }
}

/// NaN-sentinel for alle kanaler i øvelsen.
pub fn undefined(exercise: ExerciseType) -> Vec<f64> {
    vec![f64::NAN; exercise.metric_columns().len()]
}

/// Sann når frame-en bare består av sentinel-verdier.
pub fn is_undefined(metrics: &[f64]) -> bool {
    !metrics.is_empty() && metrics.iter().all(|v| v.is_nan())
}

fn pick(keypoints: &[Point2], indices: &[usize]) -> Vec<Point2> {
    indices
        .iter()
        .filter_map(|&i| keypoints.get(i))
        .filter(|p| p.is_finite())
        .copied()
        .collect()
}

#[inline]
fn safe_ratio(num: f64, den: f64) -> f64 {
    if den.abs() > f64::EPSILON { num / den } else { 0.0 }
}

/// Polygon-areal med skolisseformelen. Færre enn 3 punkter → 0.
pub fn polygon_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut twice = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    (twice * 0.5).abs()
}

/// max(y) - min(y). Færre enn 2 punkter → 0.
pub fn vertical_extent(points: &[Point2]) -> f64 {
    extent(points.iter().map(|p| p.y))
}

/// max(x) - min(x). Færre enn 2 punkter → 0.
pub fn horizontal_extent(points: &[Point2]) -> f64 {
    extent(points.iter().map(|p| p.x))
}

fn extent(values: impl Iterator<Item = f64> + Clone) -> f64 {
    if values.clone().count() < 2 {
        return 0.0;
    }
    let lo = values.clone().map(OrderedFloat).min();
    let hi = values.map(OrderedFloat).max();
    match (lo, hi) {
        (Some(lo), Some(hi)) => hi.0 - lo.0,
        _ => 0.0,
    }
}

/// Sideforskyvning av haken relativt til nesetippen, rotert inn i
/// øyelinjens koordinatsystem og normalisert med øyeavstanden.
/// `None` når et referansepunkt mangler; 0 når øyeavstanden er degenerert.
pub fn jaw_shift(keypoints: &[Point2]) -> Option<f64> {
    let nose = *keypoints.get(NOSE_TIP)?;
    let eye_r = *keypoints.get(EYE_OUTER_RIGHT)?;
    let eye_l = *keypoints.get(EYE_OUTER_LEFT)?;
    let chin_pts = CHIN
        .iter()
        .map(|&i| keypoints.get(i).copied())
        .collect::<Option<Vec<_>>>()?;

    if !(nose.is_finite() && eye_r.is_finite() && eye_l.is_finite())
        || chin_pts.iter().any(|p| !p.is_finite())
    {
        return None;
    }

    let chin_x = chin_pts.iter().map(|p| p.x).sum::<f64>() / chin_pts.len() as f64;
    let chin_y = chin_pts.iter().map(|p| p.y).sum::<f64>() / chin_pts.len() as f64;

    let dx = eye_r.x - eye_l.x;
    let dy = eye_r.y - eye_l.y;
    let eye_dist = dx.hypot(dy);
    if eye_dist < MIN_EYE_DISTANCE {
        log::debug!("eye distance {:.2e} too small, jaw shift set to 0", eye_dist);
        return Some(0.0);
    }

    // Rotér med -theta slik at øyelinjen blir horisontal
    let theta = dy.atan2(dx);
    let rel_x = chin_x - nose.x;
    let rel_y = chin_y - nose.y;
    let rot_x = rel_x * (-theta).cos() - rel_y * (-theta).sin();

    Some(rot_x / eye_dist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_area() {
        let sq = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!((polygon_area(&sq) - 1.0).abs() < 1e-12);
        // motsatt omløpsretning gir samme areal
        let rev: Vec<_> = sq.iter().rev().copied().collect();
        assert!((polygon_area(&rev) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_polygon_is_zero() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)]), 0.0);
    }

    #[test]
    fn extents_need_two_points() {
        assert_eq!(vertical_extent(&[Point2::new(0.0, 3.0)]), 0.0);
        let pts = [Point2::new(1.0, -2.0), Point2::new(4.0, 5.0), Point2::new(2.0, 0.0)];
        assert!((vertical_extent(&pts) - 7.0).abs() < 1e-12);
        assert!((horizontal_extent(&pts) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn lip_subsets_are_disjoint() {
        for i in UPPER_LIP {
            assert!(!LOWER_LIP.contains(&i), "index {i} i begge leppe-polygonene");
        }
    }
}
