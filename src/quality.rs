//! Measurement kernels: triangle quality and bar-length statistics.
//!
//! Both kernels are pure over read-only mesh views and are the only places
//! the crate fans out with `rayon` (behind the `parallel` feature). Results
//! are collected in index order either way, so output is bit-stable.

use crate::core::{Point2, signed_area};
use crate::mesh::TriMesh;

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        use rayon::prelude::*;

        fn per_triangle_quality(mesh: &TriMesh) -> Vec<f64> {
            let points = &mesh.points;
            mesh.triangles
                .par_iter()
                .map(|&[a, b, c]| triangle_quality(points[a], points[b], points[c]))
                .collect()
        }

        fn per_bar_lengths(mesh: &TriMesh, rest_length_scale: f64) -> Vec<(f64, f64)> {
            let points = &mesh.points;
            let l0 = &mesh.l0;
            mesh.bars
                .par_iter()
                .map(|&[a, b]| {
                    let length = points[a].distance_to(points[b]);
                    let rest = rest_length_scale * 0.5 * (l0[a] + l0[b]);
                    (length, rest)
                })
                .collect()
        }
    } else {
        fn per_triangle_quality(mesh: &TriMesh) -> Vec<f64> {
            let points = &mesh.points;
            mesh.triangles
                .iter()
                .map(|&[a, b, c]| triangle_quality(points[a], points[b], points[c]))
                .collect()
        }

        fn per_bar_lengths(mesh: &TriMesh, rest_length_scale: f64) -> Vec<(f64, f64)> {
            let points = &mesh.points;
            let l0 = &mesh.l0;
            mesh.bars
                .iter()
                .map(|&[a, b]| {
                    let length = points[a].distance_to(points[b]);
                    let rest = rest_length_scale * 0.5 * (l0[a] + l0[b]);
                    (length, rest)
                })
                .collect()
        }
    }
}

/// Quality factor of a triangle with vertex positions `a`, `b`, `c`.
///
/// `q = 4√3·A / (a² + b² + c²)` with signed area: 1 for equilateral, 0 for
/// degenerate, negative for inverted winding.
#[must_use]
pub fn triangle_quality(a: Point2, b: Point2, c: Point2) -> f64 {
    let area = signed_area(a, b, c);
    let e2 = a.distance_squared_to(b) + b.distance_squared_to(c) + c.distance_squared_to(a);
    if e2 <= 0.0 {
        return 0.0;
    }
    4.0 * 3.0_f64.sqrt() * area / e2
}

// ─────────────────────────────────────────────────────────────────────────────
// QualityReport
// ─────────────────────────────────────────────────────────────────────────────

/// Per-triangle quality plus aggregates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityReport {
    /// Quality factor per triangle, in triangle order.
    pub q: Vec<f64>,
    /// Minimum quality over all triangles.
    pub worst: f64,
    /// Mean quality over all triangles.
    pub mean: f64,
}

impl QualityReport {
    /// Fraction of triangles with `q < q_tol`, in `[0, 1]`.
    #[must_use]
    pub fn fraction_below(&self, q_tol: f64) -> f64 {
        if self.q.is_empty() {
            return 0.0;
        }
        let below = self.q.iter().filter(|&&q| q < q_tol).count();
        below as f64 / self.q.len() as f64
    }

    /// True when both aggregate targets are met.
    #[must_use]
    pub fn meets(&self, q_tol: f64, mean_q_tol: f64) -> bool {
        self.worst >= q_tol && self.mean >= mean_q_tol
    }
}

/// Evaluate quality for every triangle of the mesh.
#[must_use]
pub fn evaluate_quality(mesh: &TriMesh) -> QualityReport {
    let q = per_triangle_quality(mesh);

    let worst = q.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = if q.is_empty() {
        0.0
    } else {
        q.iter().sum::<f64>() / q.len() as f64
    };

    QualityReport {
        q,
        worst: if worst.is_finite() { worst } else { 0.0 },
        mean,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BarMetrics
// ─────────────────────────────────────────────────────────────────────────────

/// Post-solve bar measurements: actual lengths against rest lengths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BarMetrics {
    /// Actual bar lengths `L`, in bar order.
    pub lengths: Vec<f64>,
    /// Rest lengths `L0_bar = scale · (l0[a] + l0[b]) / 2`, in bar order.
    pub rest_lengths: Vec<f64>,
    /// Relative misfit `(L − L0_bar) / L0_bar`, in bar order.
    pub rel_change: Vec<f64>,
    /// `|rel_change|`, in bar order.
    pub rel_change_abs: Vec<f64>,
    /// Mean of `rel_change_abs`.
    pub mean_misfit: f64,
}

impl BarMetrics {
    /// Fraction of bars with `|rel_change| ≥ threshold`, in `[0, 1]`.
    #[must_use]
    pub fn fraction_misfit_above(&self, threshold: f64) -> f64 {
        if self.rel_change_abs.is_empty() {
            return 0.0;
        }
        let above = self
            .rel_change_abs
            .iter()
            .filter(|&&m| m >= threshold)
            .count();
        above as f64 / self.rel_change_abs.len() as f64
    }

    /// RMS of the nodal density estimate `ρ = √2 / L²` over actual lengths.
    #[must_use]
    pub fn rho_rms_actual(&self) -> f64 {
        rho_rms(&self.lengths)
    }

    /// RMS of the desired density `ρ₀ = √2 / L0_bar²`.
    #[must_use]
    pub fn rho_rms_desired(&self) -> f64 {
        rho_rms(&self.rest_lengths)
    }
}

fn rho_rms(lengths: &[f64]) -> f64 {
    if lengths.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = lengths
        .iter()
        .map(|&l| {
            let rho = 2.0_f64.sqrt() / (l * l);
            rho * rho
        })
        .sum();
    (sum_sq / lengths.len() as f64).sqrt()
}

/// Measure every bar of the mesh against its rest length, which is the
/// endpoint-mean desired length times `rest_length_scale` (pass 1.0 to
/// measure against the desired field itself).
#[must_use]
pub fn bar_metrics(mesh: &TriMesh, rest_length_scale: f64) -> BarMetrics {
    let pairs = per_bar_lengths(mesh, rest_length_scale);

    let mut lengths = Vec::with_capacity(pairs.len());
    let mut rest_lengths = Vec::with_capacity(pairs.len());
    let mut rel_change = Vec::with_capacity(pairs.len());
    let mut rel_change_abs = Vec::with_capacity(pairs.len());

    for (length, rest) in pairs {
        let rel = if rest > 0.0 {
            (length - rest) / rest
        } else {
            0.0
        };
        lengths.push(length);
        rest_lengths.push(rest);
        rel_change.push(rel);
        rel_change_abs.push(rel.abs());
    }

    let mean_misfit = if rel_change_abs.is_empty() {
        0.0
    } else {
        rel_change_abs.iter().sum::<f64>() / rel_change_abs.len() as f64
    };

    BarMetrics {
        lengths,
        rest_lengths,
        rel_change,
        rel_change_abs,
        mean_misfit,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
