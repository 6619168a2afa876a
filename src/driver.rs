//! Iteration driver: the fixed-point relaxation loop.
//!
//! Each iteration solves the spring system for new node positions, then runs
//! either the density controller (while the bar-length misfit is large) or
//! the interior smoother (once lengths track the desired field), and finally
//! re-evaluates quality. Sub-phases run under a monotone-improvement harness
//! with snapshot rollback, so a worsening step never survives an iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use serde::Serialize;

use crate::assembly::{displaced_positions, find_inverted, solve_displacements};
use crate::core::{Point2, Vec2};
use crate::density::add_reject_pass;
use crate::error::MeshError;
use crate::guide::GuideMesh;
use crate::mesh::TriMesh;
use crate::quality::{bar_metrics, evaluate_quality};
use crate::seed;
use crate::settings::{ConfigError, MesherSettings, Refinement};
use crate::smooth::smooth_pass;

/// Density-phase branch point on `|rms(ρ) − rms(ρ₀)| / rms(ρ)`.
const RHO_RATIO_THRESHOLD: f64 = 0.40;

/// A bar counts as badly misfit when `|rel_change| ≥ 50%`.
const LARGE_MISFIT: f64 = 0.5;

/// Hard cap on monotone sub-loop rounds; hitting it counts as
/// non-improvement.
const SUBLOOP_CAP: usize = 32;

/// Diagonal shift used for the single retry after a failed factorization.
const RETRY_REGULARIZATION: f64 = 1e-8;

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Convergence record returned alongside the final mesh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConvergenceReport {
    /// Outer iterations used.
    pub iterations: u32,
    /// Minimum triangle quality at exit.
    pub worst_q: f64,
    /// Mean triangle quality at exit.
    pub mean_q: f64,
    /// Mean relative bar-length misfit at exit.
    pub mean_misfit_bar_length: f64,
    /// Whether both quality tolerances were met.
    pub converged: bool,
}

/// Final mesh plus its convergence record.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshingResult {
    pub mesh: TriMesh,
    pub report: ConvergenceReport,
}

// ─────────────────────────────────────────────────────────────────────────────
// MeshDriver
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the settings, the guide field and the cancellation flag, and runs the
/// relaxation loop over an exclusively owned mesh.
#[derive(Debug)]
pub struct MeshDriver {
    settings: MesherSettings,
    guide: GuideMesh,
    cancel: Arc<AtomicBool>,
}

impl MeshDriver {
    /// Driver for regular (constant `h0`) meshing.
    ///
    /// Guide-mesh refinement requires [`MeshDriver::with_guide`].
    pub fn new(settings: MesherSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let guide = match settings.refinement {
            Refinement::Regular => GuideMesh::uniform(settings.domain, settings.h0)?,
            Refinement::GuideMesh => return Err(ConfigError::MissingGuideMesh),
        };
        Ok(Self {
            settings,
            guide,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Driver with an explicit guide mesh supplying the desired-length field.
    pub fn with_guide(settings: MesherSettings, guide: GuideMesh) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            guide,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &MesherSettings {
        &self.settings
    }

    #[must_use]
    pub fn guide(&self) -> &GuideMesh {
        &self.guide
    }

    /// Cooperative cancellation flag, checked between iterations. Setting it
    /// makes the driver return the current (valid) mesh with
    /// `converged = false`.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Seed, triangulate and relax a fresh mesh.
    pub fn run(&self) -> Result<MeshingResult, MeshError> {
        let mut mesh = seed::seed_mesh(self.settings.domain, &self.guide);
        self.refresh_l0(&mut mesh);
        mesh.retriangulate()?;
        self.run_from(mesh)
    }

    /// Relax an existing mesh (e.g. re-running with identical settings, or a
    /// host-perturbed configuration). The mesh is retriangulated first when
    /// its connectivity is empty.
    pub fn run_from(&self, mut mesh: TriMesh) -> Result<MeshingResult, MeshError> {
        if mesh.triangles.is_empty() {
            mesh.retriangulate()?;
        }
        self.refresh_l0(&mut mesh);
        debug_assert!(mesh.validate().is_ok());

        // Pre-tolerance values just below the targets so the loop enters.
        let mut worst_q = self.settings.q_tol - f64::EPSILON;
        let mut mean_q = self.settings.mean_q_tol - f64::EPSILON;
        let mut mean_misfit = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.settings.itmax {
            if self.cancel.load(Ordering::Relaxed) {
                debug!("meshing cancelled after {iterations} iteration(s)");
                break;
            }
            iterations += 1;

            let last_good = mesh.clone();
            match self.iterate(&mut mesh) {
                Ok(misfit) => mean_misfit = misfit,
                Err(e @ (MeshError::SingularSystem(_) | MeshError::InvertedTriangle { .. })) => {
                    warn!("iteration {iterations} aborted ({e}); returning last good mesh");
                    mesh = last_good;
                    break;
                }
                Err(e) => return Err(e),
            }

            let quality = evaluate_quality(&mesh);
            worst_q = quality.worst;
            mean_q = quality.mean;
            debug!(
                "iter {iterations}: nodes={} triangles={} worst_q={worst_q:.4} \
                 mean_q={mean_q:.4} misfit={mean_misfit:.4}",
                mesh.node_count(),
                mesh.triangle_count(),
            );

            if worst_q >= self.settings.q_tol && mean_q >= self.settings.mean_q_tol {
                converged = true;
                break;
            }
        }

        Ok(MeshingResult {
            mesh,
            report: ConvergenceReport {
                iterations,
                worst_q,
                mean_q,
                mean_misfit_bar_length: mean_misfit,
                converged,
            },
        })
    }

    /// One outer iteration: solve, phase, measure. Returns the post-phase
    /// mean bar misfit.
    ///
    /// Phase metrics compare bar lengths against the UNSCALED desired
    /// lengths: `rest_length_scale` biases the spring rest configuration so
    /// the truss stays slightly compressed, but the misfit the loop steers
    /// on is misfit against the desired field itself.
    fn iterate(&self, mesh: &mut TriMesh) -> Result<f64, MeshError> {
        self.refresh_l0(mesh);
        self.solve_step(mesh)?;
        self.refresh_l0(mesh);

        let metrics = bar_metrics(mesh, 1.0);
        if metrics.mean_misfit >= self.settings.mean_misfit_bar_length_tol {
            // A density phase with nothing to add or reject would leave the
            // iteration a no-op; fall through to smoothing so quality keeps
            // improving while the misfit parks near its threshold.
            if self.density_phase(mesh)? == 0 {
                self.smoothing_phase(mesh)?;
            }
        } else {
            self.smoothing_phase(mesh)?;
        }
        self.refresh_l0(mesh);

        Ok(bar_metrics(mesh, 1.0).mean_misfit)
    }

    /// Spring solve with the recovery ladder of the error design: retry a
    /// failed factorization once with a diagonal shift at half step; halve
    /// interior displacements once when a triangle inverts.
    fn solve_step(&self, mesh: &mut TriMesh) -> Result<(), MeshError> {
        let (displacements, mut step) = match solve_displacements(mesh, &self.settings, 0.0) {
            Ok(d) => (d, 1.0),
            Err(MeshError::SingularSystem(first)) => {
                warn!("stiffness factorization failed ({first}); retrying regularized");
                let d = solve_displacements(mesh, &self.settings, RETRY_REGULARIZATION)?;
                (d, 0.5)
            }
            Err(e) => return Err(e),
        };

        let mut positions = displaced_positions(&mesh.points, &displacements, step);
        if find_inverted(mesh, &positions).is_some() {
            // Halve the interior displacements only; boundary nodes keep
            // their tangential step.
            positions = self.stepped_positions(mesh, &displacements, step, step * 0.5);
            if let Some(node) = find_inverted(mesh, &positions) {
                return Err(MeshError::InvertedTriangle { node });
            }
            step *= 0.5;
            debug!("inverted triangle after solve; interior step halved to {step}");
        }

        mesh.points = positions;
        mesh.snap_boundary(self.settings.domain);
        mesh.retriangulate()
    }

    /// Positions with boundary displacements scaled by `boundary_step` and
    /// interior displacements by `interior_step`.
    fn stepped_positions(
        &self,
        mesh: &TriMesh,
        displacements: &[Vec2],
        boundary_step: f64,
        interior_step: f64,
    ) -> Vec<Point2> {
        mesh.points
            .iter()
            .zip(displacements)
            .zip(&mesh.classes)
            .map(|((&p, &d), class)| {
                if class.is_boundary() {
                    p + d * boundary_step
                } else {
                    p + d * interior_step
                }
            })
            .collect()
    }

    /// Density phase: global add/reject while nodal density is far from the
    /// target, otherwise monotone improvement on the badly-misfit bar
    /// fraction. Returns the number of add/reject rounds that were kept.
    fn density_phase(&self, mesh: &mut TriMesh) -> Result<usize, MeshError> {
        let metrics = bar_metrics(mesh, 1.0);
        let rms = metrics.rho_rms_actual();
        let rms0 = metrics.rho_rms_desired();
        let ratio = if rms > 0.0 {
            (rms - rms0).abs() / rms
        } else {
            0.0
        };

        if ratio > RHO_RATIO_THRESHOLD {
            let mut rounds = 0;
            while rounds < SUBLOOP_CAP {
                let m = bar_metrics(mesh, 1.0);
                let rms = m.rho_rms_actual();
                if rms <= 0.0 || (rms - m.rho_rms_desired()).abs() / rms <= RHO_RATIO_THRESHOLD {
                    break;
                }
                let outcome = add_reject_pass(mesh, &m, &self.guide, &self.settings)?;
                if !outcome.changed() {
                    break;
                }
                self.refresh_l0(mesh);
                rounds += 1;
            }
            debug!("density phase (global): {rounds} add/reject round(s)");
            return Ok(rounds);
        }

        let guide = &self.guide;
        let settings = &self.settings;
        let rounds = improve_while(
            mesh,
            |m| bar_metrics(m, 1.0).fraction_misfit_above(LARGE_MISFIT),
            |m| {
                let metrics = bar_metrics(m, 1.0);
                let outcome = add_reject_pass(m, &metrics, guide, settings)?;
                Ok(outcome.changed())
            },
        )?;
        self.refresh_l0(mesh);
        debug!("density phase (monotone): {rounds} add/reject round(s)");
        Ok(rounds)
    }

    /// Smoothing phase: monotone improvement on the below-tolerance triangle
    /// fraction. Exits immediately when both quality targets already hold.
    fn smoothing_phase(&self, mesh: &mut TriMesh) -> Result<(), MeshError> {
        let quality = evaluate_quality(mesh);
        if quality.meets(self.settings.q_tol, self.settings.mean_q_tol) {
            return Ok(());
        }

        let q_tol = self.settings.q_tol;
        let scale = self.settings.rest_length_scale;
        let rounds = improve_while(
            mesh,
            |m| evaluate_quality(m).fraction_below(q_tol),
            |m| {
                let outcome = smooth_pass(m, scale)?;
                Ok(outcome.moved > 0)
            },
        )?;
        debug!("smoothing phase: {rounds} sweep(s)");
        Ok(())
    }

    fn refresh_l0(&self, mesh: &mut TriMesh) {
        for i in 0..mesh.node_count() {
            mesh.l0[i] = self.guide.interpolate(mesh.points[i]);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Monotone-improvement harness
// ─────────────────────────────────────────────────────────────────────────────

/// Run `step` while `metric` strictly decreases.
///
/// A snapshot is taken before every step; on the first non-improvement (or
/// when `step` reports no change, or the round cap is hit) the snapshot is
/// restored byte-for-byte and the loop stops. Returns the number of steps
/// kept.
pub(crate) fn improve_while<M, S>(
    mesh: &mut TriMesh,
    mut metric: M,
    mut step: S,
) -> Result<usize, MeshError>
where
    M: FnMut(&TriMesh) -> f64,
    S: FnMut(&mut TriMesh) -> Result<bool, MeshError>,
{
    let mut best = metric(mesh);
    let mut rounds = 0;

    while rounds < SUBLOOP_CAP {
        let snapshot = mesh.clone();
        let changed = step(mesh)?;
        let current = metric(mesh);
        if !changed || current >= best {
            *mesh = snapshot;
            break;
        }
        best = current;
        rounds += 1;
    }
    Ok(rounds)
}
