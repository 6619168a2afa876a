//! Interior smoother: one weighted Laplacian sweep.
//!
//! Each interior node is pulled toward the centroid of its bar-neighbors
//! weighted by the inverse desired edge length, so short-edge regions attract
//! more strongly. A move that would invert an incident triangle is rolled
//! back for that node only.

use crate::core::{Point2, signed_area};
use crate::error::MeshError;
use crate::mesh::TriMesh;

/// What one smoothing sweep changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmoothOutcome {
    /// Nodes repositioned.
    pub moved: usize,
    /// Nodes whose move was rolled back to avoid an inverted triangle.
    pub rolled_back: usize,
}

/// One Laplacian sweep over the interior nodes, followed by a Delaunay
/// refresh.
///
/// Weights are `1 / L0_bar_ij` with `L0_bar_ij = scale·(l0[i]+l0[j])/2`.
/// Inversion checks run against the pre-refresh connectivity, node by node,
/// so a rejected move cannot leak into its neighbors' updates.
pub fn smooth_pass(
    mesh: &mut TriMesh,
    rest_length_scale: f64,
) -> Result<SmoothOutcome, MeshError> {
    let neighbors = mesh.neighbor_lists();
    let incident_triangles = mesh.incident_triangles();
    let mut outcome = SmoothOutcome::default();

    for i in 0..mesh.node_count() {
        if mesh.classes[i].is_boundary() || neighbors[i].is_empty() {
            continue;
        }

        let mut weighted = Point2::ORIGIN;
        let mut weight_sum = 0.0;
        for &j in &neighbors[i] {
            let rest = rest_length_scale * 0.5 * (mesh.l0[i] + mesh.l0[j]);
            if rest <= 0.0 {
                continue;
            }
            let w = 1.0 / rest;
            weighted.x += w * mesh.points[j].x;
            weighted.y += w * mesh.points[j].y;
            weight_sum += w;
        }
        if weight_sum <= 0.0 {
            continue;
        }

        let candidate = Point2::new(weighted.x / weight_sum, weighted.y / weight_sum);
        let previous = mesh.points[i];
        mesh.points[i] = candidate;

        let inverted = incident_triangles[i].iter().any(|&ti| {
            let [a, b, c] = mesh.triangles[ti];
            signed_area(mesh.points[a], mesh.points[b], mesh.points[c]) <= 0.0
        });
        if inverted {
            mesh.points[i] = previous;
            outcome.rolled_back += 1;
        } else {
            outcome.moved += 1;
        }
    }

    mesh.retriangulate()?;
    Ok(outcome)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;
    use crate::guide::GuideMesh;
    use crate::mesh::NodeClass;
    use crate::quality::evaluate_quality;
    use crate::seed;

    /// Square with one interior node pushed off-center.
    fn skewed_mesh() -> TriMesh {
        let mut mesh = TriMesh::from_points(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.8, 0.75),
            ],
            vec![
                NodeClass::Corner,
                NodeClass::Corner,
                NodeClass::Corner,
                NodeClass::Corner,
                NodeClass::Interior,
            ],
        );
        mesh.l0 = vec![1.0; 5];
        mesh.retriangulate().unwrap();
        mesh
    }

    #[test]
    fn uniform_weights_pull_to_neighbor_centroid() {
        let mut mesh = skewed_mesh();
        let outcome = smooth_pass(&mut mesh, 1.0).unwrap();

        assert_eq!(outcome.moved, 1);
        assert_eq!(outcome.rolled_back, 0);
        // Equal l0 everywhere: the target is the plain centroid of the four
        // corners.
        assert!(mesh.points[4].distance_to(Point2::new(0.5, 0.5)) < 1e-12);
        assert!(mesh.all_triangles_positive());
    }

    #[test]
    fn smoothing_never_moves_boundary_nodes() {
        let domain = Rect::UNIT;
        let guide = GuideMesh::uniform(domain, 0.2).unwrap();
        let mut mesh = seed::seed_mesh(domain, &guide);
        for i in 0..mesh.node_count() {
            mesh.l0[i] = guide.interpolate(mesh.points[i]);
        }
        mesh.retriangulate().unwrap();

        let boundary_before: Vec<Point2> = mesh
            .points
            .iter()
            .zip(&mesh.classes)
            .filter(|(_, c)| c.is_boundary())
            .map(|(p, _)| *p)
            .collect();

        smooth_pass(&mut mesh, 1.0).unwrap();

        let boundary_after: Vec<Point2> = mesh
            .points
            .iter()
            .zip(&mesh.classes)
            .filter(|(_, c)| c.is_boundary())
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(boundary_before, boundary_after);
    }

    #[test]
    fn smoothing_improves_worst_quality_on_skewed_mesh() {
        let mut mesh = skewed_mesh();
        let before = evaluate_quality(&mesh).worst;
        smooth_pass(&mut mesh, 1.0).unwrap();
        let after = evaluate_quality(&mesh).worst;

        assert!(after > before);
    }

    #[test]
    fn smoothing_keeps_triangles_positive() {
        let domain = Rect::UNIT;
        let guide = GuideMesh::uniform(domain, 0.15).unwrap();
        let mut mesh = seed::seed_mesh(domain, &guide);
        for i in 0..mesh.node_count() {
            mesh.l0[i] = guide.interpolate(mesh.points[i]);
        }
        mesh.retriangulate().unwrap();

        for _ in 0..3 {
            smooth_pass(&mut mesh, 1.2).unwrap();
            assert!(mesh.all_triangles_positive());
        }
    }
}
