//! Spring assembler and sparse solver.
//!
//! Every bar is an axial linear spring of unit stiffness whose rest length
//! comes from the desired-length field. The global 2N×2N stiffness matrix is
//! assembled in COO form from per-element contributions, boundary conditions
//! are applied as large diagonal penalties (which keeps the system SPD), and
//! the system is solved by sparse Cholesky. The solution is the displacement
//! `Δp` toward the equilibrium of a truss whose rest configuration is the
//! target.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::core::{Point2, Vec2, signed_area};
use crate::error::MeshError;
use crate::mesh::TriMesh;
use crate::quality::BarMetrics;
use crate::settings::MesherSettings;

/// Diagonal penalty pinning a constrained degree of freedom.
const PIN_PENALTY: f64 = 1e8;

/// Below this bar length the unit direction is meaningless and the element is
/// skipped; the density controller removes such bars anyway.
const MIN_BAR_LENGTH: f64 = 1e-12;

// ─────────────────────────────────────────────────────────────────────────────
// Blocked triplet accumulation
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulates element contributions in a cache-sized local buffer before
/// scattering them into the global COO assembly.
///
/// Flush order is the push order, so assembly stays deterministic for any
/// block size; the block size is a performance knob only.
struct TripletBlock {
    buf: Vec<(usize, usize, f64)>,
    capacity: usize,
}

impl TripletBlock {
    fn new(block_size: usize) -> Self {
        // A bar contributes 16 stiffness entries; size the buffer so one
        // block of elements fits without reallocation.
        let capacity = block_size.max(1) * 16;
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, coo: &mut CooMatrix<f64>, row: usize, col: usize, value: f64) {
        self.buf.push((row, col, value));
        if self.buf.len() >= self.capacity {
            self.flush(coo);
        }
    }

    fn flush(&mut self, coo: &mut CooMatrix<f64>) {
        for &(row, col, value) in &self.buf {
            coo.push(row, col, value);
        }
        self.buf.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Assembly
// ─────────────────────────────────────────────────────────────────────────────

/// Solve the assembled truss for per-node displacements.
///
/// Rest lengths are the desired lengths scaled by
/// `settings.rest_length_scale`, which keeps the springs slightly compressed
/// so nodes spread toward uniform coverage. The optional `regularization` is
/// added to every diagonal entry; the driver passes a non-zero value only on
/// the retry after a `SingularSystem` failure.
pub fn solve_displacements(
    mesh: &TriMesh,
    settings: &MesherSettings,
    regularization: f64,
) -> Result<Vec<Vec2>, MeshError> {
    let metrics: BarMetrics = crate::quality::bar_metrics(mesh, settings.rest_length_scale);
    let n = mesh.node_count();
    let ndof = 2 * n;
    let mut coo = CooMatrix::new(ndof, ndof);
    let mut force = DVector::zeros(ndof);
    let mut block = TripletBlock::new(settings.assembly_block_size);

    assemble_bars(mesh, &metrics, &mut coo, &mut block, &mut force);

    if settings.cross_bars {
        assemble_cross_bars(mesh, settings, &mut coo, &mut block, &mut force);
    }
    if settings.balloon_forces {
        assemble_balloon_forces(mesh, settings, &mut force);
    }

    // Boundary constraints: large diagonal penalty on pinned DOFs, zeroed
    // rhs so the penalized solve returns (numerically) zero displacement.
    for (i, class) in mesh.classes.iter().enumerate() {
        if class.pins_x() {
            block.push(&mut coo, 2 * i, 2 * i, PIN_PENALTY);
            force[2 * i] = 0.0;
        }
        if class.pins_y() {
            block.push(&mut coo, 2 * i + 1, 2 * i + 1, PIN_PENALTY);
            force[2 * i + 1] = 0.0;
        }
    }

    if regularization > 0.0 {
        for d in 0..ndof {
            block.push(&mut coo, d, d, regularization);
        }
    }
    block.flush(&mut coo);

    // Duplicate triplets are summed on conversion.
    let stiffness = CscMatrix::from(&coo);
    let cholesky = CscCholesky::factor(&stiffness)
        .map_err(|e| MeshError::SingularSystem(format!("{e:?}")))?;

    let rhs = DMatrix::from_column_slice(ndof, 1, force.as_slice());
    let solution = cholesky.solve(&rhs);

    let mut displacements = Vec::with_capacity(n);
    for i in 0..n {
        displacements.push(Vec2::new(solution[(2 * i, 0)], solution[(2 * i + 1, 0)]));
    }
    Ok(displacements)
}

fn assemble_bars(
    mesh: &TriMesh,
    metrics: &BarMetrics,
    coo: &mut CooMatrix<f64>,
    block: &mut TripletBlock,
    force: &mut DVector<f64>,
) {
    for (bi, &[a, b]) in mesh.bars.iter().enumerate() {
        let length = metrics.lengths[bi];
        if length < MIN_BAR_LENGTH {
            continue;
        }
        let rest = metrics.rest_lengths[bi];
        let dir = (mesh.points[b] - mesh.points[a]) / length;
        let elongation = length - rest;

        // Unit stiffness: K_e = [nnᵀ, −nnᵀ; −nnᵀ, nnᵀ].
        let nn = [
            [dir.x * dir.x, dir.x * dir.y],
            [dir.y * dir.x, dir.y * dir.y],
        ];
        for da in 0..2 {
            for db in 0..2 {
                let v = nn[da][db];
                block.push(coo, 2 * a + da, 2 * a + db, v);
                block.push(coo, 2 * b + da, 2 * b + db, v);
                block.push(coo, 2 * a + da, 2 * b + db, -v);
                block.push(coo, 2 * b + da, 2 * a + db, -v);
            }
        }

        // Residual force: a stretched bar pulls its endpoints together.
        force[2 * a] += elongation * dir.x;
        force[2 * a + 1] += elongation * dir.y;
        force[2 * b] -= elongation * dir.x;
        force[2 * b + 1] -= elongation * dir.y;
    }
}

/// Virtual vertex-to-opposite-midpoint springs resisting shear collapse.
///
/// The midpoint is expressed through the two edge endpoints with equal
/// weights, giving the combination vector `(1, −½, −½)` over the three
/// vertices. Triangles whose vertices all sit on the boundary are skipped:
/// their shape is already pinned.
fn assemble_cross_bars(
    mesh: &TriMesh,
    settings: &MesherSettings,
    coo: &mut CooMatrix<f64>,
    block: &mut TripletBlock,
    force: &mut DVector<f64>,
) {
    let k = settings.cross_bar_stiffness;
    if k <= 0.0 {
        return;
    }
    let altitude = 3.0_f64.sqrt() / 2.0;

    for tri in &mesh.triangles {
        if tri.iter().all(|&v| mesh.classes[v].is_boundary()) {
            continue;
        }
        let mean_l0 = (mesh.l0[tri[0]] + mesh.l0[tri[1]] + mesh.l0[tri[2]]) / 3.0;
        let rest = altitude * settings.rest_length_scale * mean_l0;

        for rot in 0..3 {
            let a = tri[rot];
            let b = tri[(rot + 1) % 3];
            let c = tri[(rot + 2) % 3];

            let mid = mesh.points[b].midpoint(mesh.points[c]);
            let d = mid - mesh.points[a];
            let length = d.length();
            if length < MIN_BAR_LENGTH {
                continue;
            }
            let dir = d / length;
            let elongation = length - rest;

            let verts = [a, b, c];
            let g = [-1.0, 0.5, 0.5];
            let nn = [
                [dir.x * dir.x, dir.x * dir.y],
                [dir.y * dir.x, dir.y * dir.y],
            ];
            for (i, &vi) in verts.iter().enumerate() {
                for (j, &vj) in verts.iter().enumerate() {
                    let coeff = k * g[i] * g[j];
                    for da in 0..2 {
                        for db in 0..2 {
                            block.push(coo, 2 * vi + da, 2 * vj + db, coeff * nn[da][db]);
                        }
                    }
                }
                let f = -k * elongation * g[i];
                force[2 * vi] += f * dir.x;
                force[2 * vi + 1] += f * dir.y;
            }
        }
    }
}

/// Pressure-like outward forces preventing near-collinear triangles.
///
/// Force-only: each vertex is pushed away from its opposite edge in
/// proportion to the triangle's area deficit against the desired-length
/// target.
fn assemble_balloon_forces(mesh: &TriMesh, settings: &MesherSettings, force: &mut DVector<f64>) {
    let coeff = settings.balloon_coefficient;
    if coeff <= 0.0 {
        return;
    }

    for tri in &mesh.triangles {
        let (pa, pb, pc) = (
            mesh.points[tri[0]],
            mesh.points[tri[1]],
            mesh.points[tri[2]],
        );
        let area = signed_area(pa, pb, pc);
        let l0_tri = settings.rest_length_scale
            * (mesh.l0[tri[0]] + mesh.l0[tri[1]] + mesh.l0[tri[2]])
            / 3.0;
        let deficit = l0_tri * l0_tri - area;

        for rot in 0..3 {
            let a = tri[rot];
            let b = tri[(rot + 1) % 3];
            let c = tri[(rot + 2) % 3];

            let mid = mesh.points[b].midpoint(mesh.points[c]);
            let Some(dir) = (mesh.points[a] - mid).normalized() else {
                continue;
            };
            force[2 * a] += coeff * deficit * dir.x;
            force[2 * a + 1] += coeff * deficit * dir.y;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Displacement application
// ─────────────────────────────────────────────────────────────────────────────

/// Apply displacements scaled by `step` and return the updated positions.
///
/// Positions of pinned coordinates are corrected afterwards by
/// [`TriMesh::snap_boundary`]; this function does not consult node classes.
#[must_use]
pub fn displaced_positions(points: &[Point2], displacements: &[Vec2], step: f64) -> Vec<Point2> {
    points
        .iter()
        .zip(displacements)
        .map(|(&p, &d)| p + d * step)
        .collect()
}

/// Index of a node whose incident triangle inverts under `positions`, if any.
///
/// Uses the current connectivity; returns the first offending triangle's
/// first vertex for diagnostics.
#[must_use]
pub fn find_inverted(mesh: &TriMesh, positions: &[Point2]) -> Option<usize> {
    for &[a, b, c] in &mesh.triangles {
        if signed_area(positions[a], positions[b], positions[c]) <= 0.0 {
            return Some(a);
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
