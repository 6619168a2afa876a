//! Thin wrapper around the external Delaunay primitive.
//!
//! The mesher treats Delaunay triangulation as opaque: points in, CCW
//! triangles out. `delaunator` works in either axis convention, so the
//! wrapper normalizes winding by signed area rather than trusting the
//! library's convention.

use crate::core::{Point2, orient2d};
use crate::error::MeshError;

/// Delaunay-triangulate a point set.
///
/// Returns CCW triangles over the input indices. Fails with
/// [`MeshError::DegenerateGeometry`] when fewer than three points are given
/// or when the points are collinear and no triangle can be formed.
pub fn triangulate(points: &[Point2]) -> Result<Vec<[usize; 3]>, MeshError> {
    if points.len() < 3 {
        return Err(MeshError::DegenerateGeometry {
            points: points.len(),
            triangles: 0,
        });
    }

    let input: Vec<delaunator::Point> = points
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();

    let triangulation = delaunator::triangulate(&input);
    if triangulation.triangles.is_empty() {
        return Err(MeshError::DegenerateGeometry {
            points: points.len(),
            triangles: 0,
        });
    }

    let mut triangles = Vec::with_capacity(triangulation.triangles.len() / 3);
    for tri in triangulation.triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        if orient2d(points[a], points[b], points[c]) > 0.0 {
            triangles.push([a, b, c]);
        } else {
            triangles.push([a, c, b]);
        }
    }

    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signed_area;

    #[test]
    fn square_triangulates_to_two_ccw_triangles() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let triangles = triangulate(&points).unwrap();

        assert_eq!(triangles.len(), 2);
        for &[a, b, c] in &triangles {
            assert!(signed_area(points[a], points[b], points[c]) > 0.0);
        }
    }

    #[test]
    fn every_point_is_used_for_generic_input() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.1),
            Point2::new(1.9, 1.8),
            Point2::new(0.1, 2.0),
            Point2::new(1.0, 0.9),
        ];
        let triangles = triangulate(&points).unwrap();

        let mut used = vec![false; points.len()];
        for tri in &triangles {
            for &v in tri {
                used[v] = true;
            }
        }
        assert!(used.into_iter().all(|u| u));
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(matches!(
            triangulate(&points),
            Err(MeshError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn too_few_points_are_degenerate() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(matches!(
            triangulate(&points),
            Err(MeshError::DegenerateGeometry { .. })
        ));
    }
}
