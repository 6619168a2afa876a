//! Initial point placement: boundary discretization plus hexagonal interior
//! packing.

use crate::core::{Point2, Rect};
use crate::guide::GuideMesh;
use crate::mesh::{NodeClass, TriMesh};

/// Fraction of the local spacing below which an interior lattice candidate is
/// considered to collide with a boundary node.
const BOUNDARY_CLEARANCE: f64 = 0.7;

/// Seed a mesh over `domain` using the guide field for local spacing.
///
/// Boundary sides get `round(length/h) + 1` equally spaced nodes with `h`
/// evaluated at the side midpoint; corners are shared. The interior is tiled
/// with a hexagonal lattice at the spacing of the domain centroid, dropping
/// candidates within `0.7·h` of any boundary node.
#[must_use]
pub fn seed_mesh(domain: Rect, guide: &GuideMesh) -> TriMesh {
    let mut points: Vec<Point2> = Vec::new();
    let mut classes: Vec<NodeClass> = Vec::new();

    // The four corners first, in CCW order.
    for corner in domain.corners() {
        points.push(corner);
        classes.push(NodeClass::Corner);
    }

    // Side-interior boundary nodes. Each side samples its own spacing at the
    // side midpoint.
    let sides: [(Point2, Point2, NodeClass); 4] = [
        (
            Point2::new(domain.x_min, domain.y_min),
            Point2::new(domain.x_max, domain.y_min),
            NodeClass::Bottom,
        ),
        (
            Point2::new(domain.x_min, domain.y_max),
            Point2::new(domain.x_max, domain.y_max),
            NodeClass::Top,
        ),
        (
            Point2::new(domain.x_min, domain.y_min),
            Point2::new(domain.x_min, domain.y_max),
            NodeClass::Left,
        ),
        (
            Point2::new(domain.x_max, domain.y_min),
            Point2::new(domain.x_max, domain.y_max),
            NodeClass::Right,
        ),
    ];

    for (start, end, class) in sides {
        let length = start.distance_to(end);
        let h = guide.interpolate(start.midpoint(end));
        let segments = side_segment_count(length, h);
        for k in 1..segments {
            let t = k as f64 / segments as f64;
            points.push(start.lerp(end, t));
            classes.push(class);
        }
    }

    let boundary_count = points.len();

    // Hexagonal interior lattice at the centroid spacing.
    let h = guide.interpolate(domain.center());
    let row_step = h * 3.0_f64.sqrt() / 2.0;
    let clearance_sq = (BOUNDARY_CLEARANCE * h) * (BOUNDARY_CLEARANCE * h);

    let mut row = 0usize;
    loop {
        row += 1;
        let y = domain.y_min + row as f64 * row_step;
        if y >= domain.y_max {
            break;
        }
        let offset = if row % 2 == 0 { h } else { h * 0.5 };
        let mut x = domain.x_min + offset;
        while x < domain.x_max {
            let candidate = Point2::new(x, y);
            let clear = points[..boundary_count]
                .iter()
                .all(|b| b.distance_squared_to(candidate) > clearance_sq);
            if clear {
                points.push(candidate);
                classes.push(NodeClass::Interior);
            }
            x += h;
        }
    }

    TriMesh::from_points(points, classes)
}

/// Number of segments a side of `length` is split into for spacing `h`:
/// `round(length/h)`, at least 1, so the node count is `round(length/h) + 1`.
#[must_use]
pub fn side_segment_count(length: f64, h: f64) -> usize {
    if !(h > 0.0) || !h.is_finite() {
        return 1;
    }
    ((length / h).round() as usize).max(1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tolerance;

    fn count_class(mesh: &TriMesh, class: NodeClass) -> usize {
        mesh.classes.iter().filter(|&&c| c == class).count()
    }

    #[test]
    fn rectangle_boundary_counts_match_spacing() {
        // 2×1 rectangle at h0 = 0.25: long sides round(2/0.25)+1 = 9 nodes,
        // short sides round(1/0.25)+1 = 5, corners shared.
        let domain = Rect::new(0.0, 2.0, 0.0, 1.0);
        let guide = GuideMesh::uniform(domain, 0.25).unwrap();
        let mesh = seed_mesh(domain, &guide);

        assert_eq!(count_class(&mesh, NodeClass::Corner), 4);
        // Side-interior counts exclude the two shared corners.
        assert_eq!(count_class(&mesh, NodeClass::Bottom), 7);
        assert_eq!(count_class(&mesh, NodeClass::Top), 7);
        assert_eq!(count_class(&mesh, NodeClass::Left), 3);
        assert_eq!(count_class(&mesh, NodeClass::Right), 3);
    }

    #[test]
    fn boundary_nodes_sit_exactly_on_extents() {
        let domain = Rect::new(-1.0, 3.0, 2.0, 4.0);
        let guide = GuideMesh::uniform(domain, 0.5).unwrap();
        let mesh = seed_mesh(domain, &guide);

        for (p, class) in mesh.points.iter().zip(&mesh.classes) {
            match class {
                NodeClass::Bottom => assert_eq!(p.y, domain.y_min),
                NodeClass::Top => assert_eq!(p.y, domain.y_max),
                NodeClass::Left => assert_eq!(p.x, domain.x_min),
                NodeClass::Right => assert_eq!(p.x, domain.x_max),
                NodeClass::Corner => {
                    assert!(p.x == domain.x_min || p.x == domain.x_max);
                    assert!(p.y == domain.y_min || p.y == domain.y_max);
                }
                NodeClass::Interior => assert!(domain.contains(*p)),
            }
        }
    }

    #[test]
    fn interior_nodes_keep_clearance_from_boundary() {
        let domain = Rect::UNIT;
        let h = 0.1;
        let guide = GuideMesh::uniform(domain, h).unwrap();
        let mesh = seed_mesh(domain, &guide);

        let boundary: Vec<Point2> = mesh
            .points
            .iter()
            .zip(&mesh.classes)
            .filter(|(_, c)| c.is_boundary())
            .map(|(p, _)| *p)
            .collect();

        let tol = Tolerance::LOOSE;
        for (p, class) in mesh.points.iter().zip(&mesh.classes) {
            if class.is_boundary() {
                continue;
            }
            for b in &boundary {
                assert!(b.distance_to(*p) > BOUNDARY_CLEARANCE * h - tol.eps);
            }
        }
    }

    #[test]
    fn unit_square_seed_count_is_plausible() {
        let domain = Rect::UNIT;
        let guide = GuideMesh::uniform(domain, 0.1).unwrap();
        let mesh = seed_mesh(domain, &guide);

        // 40 boundary nodes plus a hex-packed interior; the relaxation loop
        // settles the count near 121 later.
        let boundary = mesh.classes.iter().filter(|c| c.is_boundary()).count();
        assert_eq!(boundary, 40);
        assert!(mesh.node_count() > 100 && mesh.node_count() < 170);
    }

    #[test]
    fn seeded_mesh_triangulates() {
        let domain = Rect::UNIT;
        let guide = GuideMesh::uniform(domain, 0.2).unwrap();
        let mut mesh = seed_mesh(domain, &guide);
        mesh.retriangulate().unwrap();

        assert!(mesh.triangle_count() > 0);
        assert!(mesh.all_triangles_positive());
        assert!(mesh.validate().is_ok());
    }
}
