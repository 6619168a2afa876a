//! Mesh data model: node positions, classes, connectivity.
//!
//! `TriMesh` owns the point set, the node classification, the per-point
//! desired edge length, and the connectivity derived from the most recent
//! Delaunay refresh. Triangles and bars are ephemeral: whenever the point set
//! changes in count or position, [`TriMesh::retriangulate`] rebuilds both.

use serde::{Deserialize, Serialize};

use crate::core::{Point2, Rect, signed_area};
use crate::delaunay;
use crate::error::MeshError;

// ─────────────────────────────────────────────────────────────────────────────
// NodeClass
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a mesh node against the rectangular domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Domain corner; both coordinates pinned for the entire run.
    Corner,
    /// On the bottom edge; y pinned to `y_min`, x free to slide.
    Bottom,
    /// On the top edge; y pinned to `y_max`, x free to slide.
    Top,
    /// On the left edge; x pinned to `x_min`, y free to slide.
    Left,
    /// On the right edge; x pinned to `x_max`, y free to slide.
    Right,
    /// Free interior node.
    Interior,
}

impl NodeClass {
    #[must_use]
    pub fn is_boundary(self) -> bool {
        self != Self::Interior
    }

    /// Whether the x coordinate is constrained.
    #[must_use]
    pub fn pins_x(self) -> bool {
        matches!(self, Self::Corner | Self::Left | Self::Right)
    }

    /// Whether the y coordinate is constrained.
    #[must_use]
    pub fn pins_y(self) -> bool {
        matches!(self, Self::Corner | Self::Bottom | Self::Top)
    }

    /// The pinned coordinate value on `domain`, when one exists.
    ///
    /// Returns `(x, y)` with `None` for the free coordinate. Corners pin
    /// both, but their exact position depends on which corner, so they are
    /// handled by the caller and return `(None, None)` here.
    #[must_use]
    pub fn pinned_coords(self, domain: Rect) -> (Option<f64>, Option<f64>) {
        match self {
            Self::Bottom => (None, Some(domain.y_min)),
            Self::Top => (None, Some(domain.y_max)),
            Self::Left => (Some(domain.x_min), None),
            Self::Right => (Some(domain.x_max), None),
            Self::Corner | Self::Interior => (None, None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TriMesh
// ─────────────────────────────────────────────────────────────────────────────

/// The working mesh: points, classes, desired lengths, connectivity.
///
/// Cloning a `TriMesh` clones only the five flat arrays; the driver uses
/// clones as iteration snapshots for rollback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriMesh {
    /// Node positions. Indices are stable between connectivity refreshes.
    pub points: Vec<Point2>,
    /// Node classification, parallel to `points`.
    pub classes: Vec<NodeClass>,
    /// Desired edge length at each node, parallel to `points`.
    pub l0: Vec<f64>,
    /// Triangle list, CCW, from the last Delaunay refresh.
    pub triangles: Vec<[usize; 3]>,
    /// Unique bars `(a, b)` with `a < b`, sorted lexicographically.
    pub bars: Vec<[usize; 2]>,
}

impl TriMesh {
    /// Build a mesh from seeded points and classes; `l0` starts empty and is
    /// filled by the driver from the guide field.
    #[must_use]
    pub fn from_points(points: Vec<Point2>, classes: Vec<NodeClass>) -> Self {
        debug_assert_eq!(points.len(), classes.len());
        let l0 = vec![0.0; points.len()];
        Self {
            points,
            classes,
            l0,
            triangles: Vec::new(),
            bars: Vec::new(),
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    #[must_use]
    pub fn interior_count(&self) -> usize {
        self.classes
            .iter()
            .filter(|c| !c.is_boundary())
            .count()
    }

    /// Refresh connectivity: Delaunay over the current points, then bar
    /// re-extraction. Fails with `DegenerateGeometry` when the point set
    /// cannot be triangulated.
    pub fn retriangulate(&mut self) -> Result<(), MeshError> {
        self.triangles = delaunay::triangulate(&self.points)?;
        self.bars = extract_bars(&self.triangles);
        Ok(())
    }

    /// Remove the node at `index` by swap-remove across all point-indexed
    /// arrays. Connectivity is stale afterwards; callers retriangulate.
    pub fn swap_remove_node(&mut self, index: usize) {
        self.points.swap_remove(index);
        self.classes.swap_remove(index);
        self.l0.swap_remove(index);
    }

    /// Append a node. Connectivity is stale afterwards; callers
    /// retriangulate.
    pub fn push_node(&mut self, p: Point2, class: NodeClass, l0: f64) {
        self.points.push(p);
        self.classes.push(class);
        self.l0.push(l0);
    }

    /// Per-node neighbor lists from the current bars.
    #[must_use]
    pub fn neighbor_lists(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![Vec::new(); self.points.len()];
        for &[a, b] in &self.bars {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        neighbors
    }

    /// Per-node incident-bar index lists from the current bars.
    #[must_use]
    pub fn incident_bars(&self) -> Vec<Vec<usize>> {
        let mut incident = vec![Vec::new(); self.points.len()];
        for (bi, &[a, b]) in self.bars.iter().enumerate() {
            incident[a].push(bi);
            incident[b].push(bi);
        }
        incident
    }

    /// Per-node incident-triangle index lists.
    #[must_use]
    pub fn incident_triangles(&self) -> Vec<Vec<usize>> {
        let mut incident = vec![Vec::new(); self.points.len()];
        for (ti, tri) in self.triangles.iter().enumerate() {
            for &v in tri {
                incident[v].push(ti);
            }
        }
        incident
    }

    /// True when every triangle has strictly positive signed area under the
    /// current positions.
    #[must_use]
    pub fn all_triangles_positive(&self) -> bool {
        self.triangles.iter().all(|&[a, b, c]| {
            signed_area(self.points[a], self.points[b], self.points[c]) > 0.0
        })
    }

    /// Structural validation: parallel array lengths, index bounds, finite
    /// coordinates, canonical bars.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.points.len();
        if self.classes.len() != n || self.l0.len() != n {
            return Err("point-indexed arrays have mismatched lengths".to_string());
        }
        if self.points.iter().any(|p| !p.is_finite()) {
            return Err("mesh has non-finite node coordinates".to_string());
        }
        if self
            .triangles
            .iter()
            .any(|t| t.iter().any(|&v| v >= n))
        {
            return Err("triangle references node out of range".to_string());
        }
        for w in self.bars.windows(2) {
            if w[0] >= w[1] {
                return Err("bars are not strictly sorted".to_string());
            }
        }
        if self.bars.iter().any(|&[a, b]| a >= b || b >= n) {
            return Err("bar endpoints are not canonical".to_string());
        }
        Ok(())
    }

    /// Snap every constrained coordinate exactly onto the domain extent.
    ///
    /// Called after each solve so boundary invariants hold to machine
    /// precision regardless of the penalty formulation.
    pub fn snap_boundary(&mut self, domain: Rect) {
        for (p, class) in self.points.iter_mut().zip(&self.classes) {
            match class.pinned_coords(domain) {
                (Some(x), None) => p.x = x,
                (None, Some(y)) => p.y = y,
                _ => {}
            }
            if *class == NodeClass::Corner {
                p.x = if (p.x - domain.x_min).abs() <= (p.x - domain.x_max).abs() {
                    domain.x_min
                } else {
                    domain.x_max
                };
                p.y = if (p.y - domain.y_min).abs() <= (p.y - domain.y_max).abs() {
                    domain.y_min
                } else {
                    domain.y_max
                };
            }
        }
    }
}

/// Derive unique undirected bars from a triangle list.
///
/// Each triangle edge is canonicalized to `(min, max)`; the result is sorted
/// lexicographically and deduplicated so bar-indexed arrays are comparable
/// across refreshes.
#[must_use]
pub fn extract_bars(triangles: &[[usize; 3]]) -> Vec<[usize; 2]> {
    let mut bars = Vec::with_capacity(triangles.len() * 3);
    for &[a, b, c] in triangles {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            bars.push([u.min(v), u.max(v)]);
        }
    }
    bars.sort_unstable();
    bars.dedup();
    bars
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
