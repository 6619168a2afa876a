//! Guide mesh: a small static triangulation carrying the desired edge-length
//! field.
//!
//! The core consumes the guide mesh through one operation only:
//! [`GuideMesh::interpolate`], which locates the triangle containing a query
//! point and blends the per-vertex lengths with barycentric weights. Queries
//! outside the convex hull clamp to the nearest triangle so the field is
//! total over the plane.

use crate::core::{Point2, Rect, barycentric};
use crate::delaunay;
use crate::settings::ConfigError;

/// Static triangulation `(V_g, T_g)` with a desired length per vertex.
///
/// Never mutated by the relaxation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideMesh {
    vertices: Vec<Point2>,
    triangles: Vec<[usize; 3]>,
    l0: Vec<f64>,
    /// Per-triangle AABBs `(min, max)` for point-location pruning.
    aabbs: Vec<(Point2, Point2)>,
}

impl GuideMesh {
    /// Build and validate a guide mesh.
    pub fn new(
        vertices: Vec<Point2>,
        triangles: Vec<[usize; 3]>,
        l0: Vec<f64>,
    ) -> Result<Self, ConfigError> {
        if vertices.is_empty() {
            return Err(ConfigError::EmptyGuideMesh);
        }
        if triangles.is_empty() {
            return Err(ConfigError::GuideMeshWithoutTriangles);
        }
        for (vi, v) in vertices.iter().enumerate() {
            if !v.is_finite() {
                return Err(ConfigError::NonFiniteGuideVertex { vertex: vi });
            }
        }
        for (ti, tri) in triangles.iter().enumerate() {
            for &v in tri {
                if v >= vertices.len() {
                    return Err(ConfigError::GuideMeshIndexOutOfRange {
                        triangle: ti,
                        vertex: v,
                    });
                }
            }
        }
        if l0.len() != vertices.len() {
            return Err(ConfigError::EmptyGuideMesh);
        }
        for (vi, &l) in l0.iter().enumerate() {
            if !(l > 0.0) || !l.is_finite() {
                return Err(ConfigError::NonPositiveGuideLength {
                    vertex: vi,
                    value: l,
                });
            }
        }

        let aabbs = triangles
            .iter()
            .map(|&[a, b, c]| {
                let (pa, pb, pc) = (vertices[a], vertices[b], vertices[c]);
                let min = Point2::new(pa.x.min(pb.x).min(pc.x), pa.y.min(pb.y).min(pc.y));
                let max = Point2::new(pa.x.max(pb.x).max(pc.x), pa.y.max(pb.y).max(pc.y));
                (min, max)
            })
            .collect();

        Ok(Self {
            vertices,
            triangles,
            l0,
            aabbs,
        })
    }

    /// Constant field over a rectangle: two triangles, all vertices carrying
    /// `l0`.
    pub fn uniform(domain: Rect, l0: f64) -> Result<Self, ConfigError> {
        let corners = domain.corners().to_vec();
        let triangles = vec![[0, 1, 2], [0, 2, 3]];
        Self::new(corners, triangles, vec![l0; 4])
    }

    /// Rectangular guide mesh with a refined window.
    ///
    /// Vertices are three explicit zones over the domain:
    /// - the four domain corners (coarse, `l0_coarse`),
    /// - the window corners expanded outward by `transition`, clamped to the
    ///   domain (transition zone, carrying `l0_coarse` so the field is C⁰
    ///   across the interface),
    /// - the window corners and centre (refined zone, `l0_refined`).
    ///
    /// Connectivity is the Delaunay triangulation of the union.
    pub fn rect_with_refined_window(
        domain: Rect,
        window: Rect,
        transition: f64,
        l0_coarse: f64,
        l0_refined: f64,
    ) -> Result<Self, ConfigError> {
        if !window.is_valid()
            || window.x_min < domain.x_min
            || window.x_max > domain.x_max
            || window.y_min < domain.y_min
            || window.y_max > domain.y_max
        {
            return Err(ConfigError::WindowOutsideDomain);
        }

        let mut vertices: Vec<Point2> = domain.corners().to_vec();
        let mut l0 = vec![l0_coarse; 4];

        let ring = window.expand_by(transition.abs()).clamped_to(domain);
        for corner in ring.corners() {
            vertices.push(corner);
            l0.push(l0_coarse);
        }

        for corner in window.corners() {
            vertices.push(corner);
            l0.push(l0_refined);
        }
        vertices.push(window.center());
        l0.push(l0_refined);

        let triangles =
            delaunay::triangulate(&vertices).map_err(|_| ConfigError::WindowOutsideDomain)?;
        Self::new(vertices, triangles, l0)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Desired edge length at `(x, y)` by piecewise-linear interpolation.
    ///
    /// Points inside the triangulation interpolate exactly; points outside
    /// the convex hull clamp to the nearest triangle (the one whose minimum
    /// barycentric coordinate is least negative), with negative weights
    /// clamped away and the rest renormalized.
    #[must_use]
    pub fn interpolate(&self, p: Point2) -> f64 {
        // Containment test with a small slack so hull-boundary queries do not
        // fall through to the clamped path.
        const INSIDE_EPS: f64 = -1e-12;

        let mut best: Option<([f64; 3], [usize; 3], f64)> = None;

        for (ti, &tri) in self.triangles.iter().enumerate() {
            let (min, max) = self.aabbs[ti];
            let slack = 1e-9 * (1.0 + max.x - min.x + max.y - min.y);
            if p.x < min.x - slack
                || p.x > max.x + slack
                || p.y < min.y - slack
                || p.y > max.y + slack
            {
                // AABB prune only helps interior queries; exterior clamping
                // still needs the candidate, so track it below via `best`
                // only when no containing triangle exists. Skipping here is
                // fine because the fallback pass scans all triangles.
                continue;
            }

            let [a, b, c] = tri;
            let Some(w) = barycentric(p, self.vertices[a], self.vertices[b], self.vertices[c])
            else {
                continue;
            };
            let w_min = w[0].min(w[1]).min(w[2]);
            if w_min >= INSIDE_EPS {
                return w[0] * self.l0[a] + w[1] * self.l0[b] + w[2] * self.l0[c];
            }
            match &best {
                Some((_, _, best_min)) if *best_min >= w_min => {}
                _ => best = Some((w, tri, w_min)),
            }
        }

        // No containing triangle: clamp to the nearest one over the full set.
        for &tri in &self.triangles {
            let [a, b, c] = tri;
            let Some(w) = barycentric(p, self.vertices[a], self.vertices[b], self.vertices[c])
            else {
                continue;
            };
            let w_min = w[0].min(w[1]).min(w[2]);
            match &best {
                Some((_, _, best_min)) if *best_min >= w_min => {}
                _ => best = Some((w, tri, w_min)),
            }
        }

        let Some((w, [a, b, c], _)) = best else {
            // All guide triangles degenerate; fall back to the first vertex.
            return self.l0[0];
        };

        let wa = w[0].max(0.0);
        let wb = w[1].max(0.0);
        let wc = w[2].max(0.0);
        let sum = wa + wb + wc;
        if sum <= 0.0 {
            return self.l0[a];
        }
        (wa * self.l0[a] + wb * self.l0[b] + wc * self.l0[c]) / sum
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
